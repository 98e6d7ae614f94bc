//! Per-frame spatial recomputation (spec §4.D steps 1-2): Doppler factor
//! and per-room gain. Entity/listener/room bookkeeping itself is owned by
//! the engine's registries; these are the plain position/velocity
//! snapshots a channel reads from them each frame.

use resonant_core::math::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub location: Vec3,
    pub velocity: Vec3,
}

impl Default for EntityState {
    fn default() -> Self {
        Self { location: Vec3::ZERO, velocity: Vec3::ZERO }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerState {
    pub location: Vec3,
    pub velocity: Vec3,
}

impl Default for ListenerState {
    fn default() -> Self {
        Self { location: Vec3::ZERO, velocity: Vec3::ZERO }
    }
}

/// An axis-aligned room volume with a base gain applied to anything inside
/// (or near) it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomState {
    pub min: Vec3,
    pub max: Vec3,
    pub base_gain: f32,
}

impl RoomState {
    /// The point inside the room's volume closest to `position`, per spec's
    /// "clamp position to the room's closest point".
    pub fn closest_point(&self, position: Vec3) -> Vec3 {
        Vec3::new(
            position.x.clamp(self.min.x, self.max.x),
            position.y.clamp(self.min.y, self.max.y),
            position.z.clamp(self.min.z, self.max.z),
        )
    }
}

/// Doppler factor from entity/listener velocities and the configured speed
/// of sound: `(speed + listener-closing-speed) / (speed + source-closing-speed)`,
/// where a positive closing speed is movement towards the other party.
///
/// `sound_speed` must be positive; callers pass a sane default (343 m/s for
/// air) when unconfigured.
pub fn doppler_factor(entity: &EntityState, listener: &ListenerState, sound_speed: f32) -> f32 {
    let to_listener = listener.location - entity.location;
    if to_listener.length_squared() < 1e-12 {
        return 1.0;
    }
    let direction = to_listener.normalize();

    let listener_closing = -listener.velocity.dot(direction);
    let source_closing = entity.velocity.dot(direction);

    let numerator = sound_speed + listener_closing;
    let denominator = sound_speed + source_closing;
    if denominator.abs() < 1e-6 {
        return 1.0;
    }
    (numerator / denominator).max(0.0)
}

/// Per-room gain: inverse-square falloff from the closest point in the
/// room to `position`, with a `+1` unit-shift so a position inside the
/// room (distance 0) still yields `base_gain` instead of a singularity.
pub fn room_gain(room: &RoomState, position: Vec3) -> f32 {
    let closest = room.closest_point(position);
    let distance = (position - closest).length();
    room.base_gain / (1.0 + distance * distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doppler_is_identity_when_nothing_moves() {
        let entity = EntityState { location: Vec3::new(1.0, 0.0, 0.0), velocity: Vec3::ZERO };
        let listener = ListenerState::default();
        assert!((doppler_factor(&entity, &listener, 343.0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn doppler_rises_when_source_approaches_listener() {
        let entity = EntityState { location: Vec3::new(10.0, 0.0, 0.0), velocity: Vec3::new(-5.0, 0.0, 0.0) };
        let listener = ListenerState::default();
        let factor = doppler_factor(&entity, &listener, 343.0);
        assert!(factor > 1.0, "approaching source should raise pitch, got {factor}");
    }

    #[test]
    fn room_gain_is_full_inside_room() {
        let room = RoomState { min: Vec3::new(-5.0, -5.0, -5.0), max: Vec3::new(5.0, 5.0, 5.0), base_gain: 0.8 };
        assert!((room_gain(&room, Vec3::ZERO) - 0.8).abs() < 1e-5);
    }

    #[test]
    fn room_gain_falls_off_with_distance_outside_room() {
        let room = RoomState { min: Vec3::new(-1.0, -1.0, -1.0), max: Vec3::new(1.0, 1.0, 1.0), base_gain: 1.0 };
        let near = room_gain(&room, Vec3::new(2.0, 0.0, 0.0));
        let far = room_gain(&room, Vec3::new(10.0, 0.0, 0.0));
        assert!(near > far);
        assert!(far > 0.0 && far < near);
    }
}

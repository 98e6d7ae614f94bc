//! Id-keyed registries the control API reads and writes: entities,
//! listeners, rooms, RTPC values and switch states. Kept as plain
//! `HashMap`s behind one mutex each rather than per-entry locks, since
//! registration/update traffic is application-thread work, not the mix
//! thread's RT path (spec §5: only the mixer/per-layer locks are on the
//! RT path).

use std::collections::HashMap;

use parking_lot::RwLock;

use resonant_channel::spatial::{EntityState, ListenerState, RoomState};
use resonant_core::ids::{EntityId, EnvironmentId, EventId, ListenerId, RoomId, RtpcId, SoundId, SwitchId, SwitchStateId};

#[derive(Default)]
pub struct Registry {
    entities: RwLock<HashMap<EntityId, EntityState>>,
    listeners: RwLock<HashMap<ListenerId, ListenerState>>,
    rooms: RwLock<HashMap<RoomId, RoomState>>,
    environments: RwLock<HashMap<EnvironmentId, f32>>,
    rtpc: RwLock<HashMap<RtpcId, f32>>,
    switch_state: RwLock<HashMap<SwitchId, SwitchStateId>>,
    /// Named events bound to the sound they trigger (spec's "event trigger"
    /// control API entry; the spec gives events an id/name but no further
    /// structure beyond "triggers", so a direct event-to-sound binding is
    /// the simplest thing that exercises the surface).
    events: RwLock<HashMap<EventId, SoundId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entity(&self, id: EntityId, state: EntityState) {
        self.entities.write().insert(id, state);
    }

    pub fn entity(&self, id: EntityId) -> Option<EntityState> {
        self.entities.read().get(&id).copied()
    }

    pub fn remove_entity(&self, id: EntityId) {
        self.entities.write().remove(&id);
    }

    pub fn set_listener(&self, id: ListenerId, state: ListenerState) {
        self.listeners.write().insert(id, state);
    }

    pub fn listener(&self, id: ListenerId) -> Option<ListenerState> {
        self.listeners.read().get(&id).copied()
    }

    pub fn set_room(&self, id: RoomId, state: RoomState) {
        self.rooms.write().insert(id, state);
    }

    pub fn room(&self, id: RoomId) -> Option<RoomState> {
        self.rooms.read().get(&id).copied()
    }

    /// Environment "factor" (spec's `EnvironmentEffect` node input): how
    /// strongly an entity inside this environment is affected by its
    /// effect instance, `0..1`.
    pub fn set_environment_factor(&self, id: EnvironmentId, factor: f32) {
        self.environments.write().insert(id, factor);
    }

    pub fn environment_factor(&self, id: EnvironmentId) -> Option<f32> {
        self.environments.read().get(&id).copied()
    }

    pub fn set_rtpc(&self, id: RtpcId, value: f32) {
        self.rtpc.write().insert(id, value);
    }

    pub fn rtpc(&self, id: RtpcId) -> Option<f32> {
        self.rtpc.read().get(&id).copied()
    }

    /// Updates the current state for `switch` and returns the previous
    /// state, if any, so the caller can diff a bound `SwitchContainer`.
    pub fn set_switch_state(&self, switch: SwitchId, state: SwitchStateId) -> Option<SwitchStateId> {
        self.switch_state.write().insert(switch, state)
    }

    pub fn switch_state(&self, switch: SwitchId) -> Option<SwitchStateId> {
        self.switch_state.read().get(&switch).copied()
    }

    pub fn bind_event(&self, event: EventId, sound: SoundId) {
        self.events.write().insert(event, sound);
    }

    pub fn event_sound(&self, event: EventId) -> Option<SoundId> {
        self.events.read().get(&event).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::math::Vec3;

    #[test]
    fn entity_registration_round_trips() {
        let registry = Registry::new();
        let state = EntityState { location: Vec3::new(1.0, 2.0, 3.0), velocity: Vec3::ZERO };
        registry.set_entity(EntityId(1), state);
        assert_eq!(registry.entity(EntityId(1)), Some(state));
        registry.remove_entity(EntityId(1));
        assert_eq!(registry.entity(EntityId(1)), None);
    }

    #[test]
    fn event_binding_round_trips() {
        let registry = Registry::new();
        assert_eq!(registry.event_sound(EventId(1)), None);
        registry.bind_event(EventId(1), SoundId(42));
        assert_eq!(registry.event_sound(EventId(1)), Some(SoundId(42)));
    }

    #[test]
    fn switch_state_update_returns_previous_value() {
        let registry = Registry::new();
        assert_eq!(registry.set_switch_state(SwitchId(1), SwitchStateId(10)), None);
        assert_eq!(registry.set_switch_state(SwitchId(1), SwitchStateId(20)), Some(SwitchStateId(10)));
        assert_eq!(registry.switch_state(SwitchId(1)), Some(SwitchStateId(20)));
    }
}

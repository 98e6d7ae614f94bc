//! Spatial math shared by the pipeline, channel and mixer crates.
//!
//! Mirrors the vector/quaternion usage already found in `resonance-cxx` and
//! `resonance-audio-engine` (both depend on `glam`) rather than rolling a
//! bespoke `[f32; 3]` type.

pub use glam::{Quat, Vec3};

/// Converts a right-handed, Y-up listener-space direction into the
/// azimuth/elevation pair used by the ambisonic encoder.
///
/// `azimuth` is measured counter-clockwise from the +Z axis in the XZ
/// plane; `elevation` is measured from the XZ plane towards +Y. Matches the
/// convention used by `Ambisonics/AmbisonicEntity.cpp` in the original
/// source (`GetAzimuth`/`GetElevation` on a normalized direction vector).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AzimuthElevation {
    pub azimuth: f32,
    pub elevation: f32,
}

pub fn direction_to_azimuth_elevation(direction: Vec3) -> AzimuthElevation {
    let d = if direction.length_squared() > 1e-12 {
        direction.normalize()
    } else {
        Vec3::Z
    };

    AzimuthElevation {
        azimuth: d.x.atan2(d.z),
        elevation: d.y.asin(),
    }
}

/// Forward/backward coordinate round-trip used by the §8 round-trip law:
/// `Backward(Forward(v)) == v`. "Forward" reinterprets a vector from the
/// engine's right-handed Y-up space into azimuth/elevation/distance polar
/// form; "Backward" reconstructs the original vector.
pub fn forward(v: Vec3) -> (AzimuthElevation, f32) {
    let distance = v.length();
    if distance <= 1e-12 {
        return (AzimuthElevation { azimuth: 0.0, elevation: 0.0 }, 0.0);
    }
    (direction_to_azimuth_elevation(v), distance)
}

pub fn backward(polar: (AzimuthElevation, f32)) -> Vec3 {
    let (ae, distance) = polar;
    let x = distance * ae.azimuth.sin() * ae.elevation.cos();
    let y = distance * ae.elevation.sin();
    let z = distance * ae.azimuth.cos() * ae.elevation.cos();
    Vec3::new(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_backward_round_trips() {
        let cases = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(3.0, -2.0, 5.0),
            Vec3::new(-1.0, -1.0, -1.0),
        ];
        for v in cases {
            let round = backward(forward(v));
            assert!((round - v).length() < 1e-4, "{v:?} -> {round:?}");
        }
    }

    #[test]
    fn zero_vector_round_trips_to_zero() {
        let round = backward(forward(Vec3::ZERO));
        assert!(round.length() < 1e-6);
    }
}

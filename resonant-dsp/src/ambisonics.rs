//! ACN-ordered, SN3D-normalized B-format coefficient math for orders 0-3,
//! ported from `Ambisonics/AmbisonicEntity.cpp::Refresh()`. The original
//! computes one coefficient per spherical harmonic from azimuth/elevation
//! trig terms; this keeps the same derivation but returns a plain `Vec<f32>`
//! indexed by ACN channel instead of mutating a pooled `AmAudioSample`
//! buffer in place.

use resonant_core::math::AzimuthElevation;

/// Number of B-format channels for a given ambisonic order (`(order+1)^2`).
pub fn channel_count(order: u8) -> usize {
    (order as usize + 1).pow(2)
}

/// Encodes a single point source at `position` into ACN/SN3D B-format
/// coefficients, scaled by `gain`.
pub fn encode(order: u8, position: AzimuthElevation, gain: f32) -> Vec<f32> {
    let n = channel_count(order);
    let mut c = vec![0.0f32; n];

    let cos_azim = position.azimuth.cos();
    let sin_azim = position.azimuth.sin();
    let cos_elev = position.elevation.cos();
    let sin_elev = position.elevation.sin();

    let cos_2azim = (2.0 * position.azimuth).cos();
    let sin_2azim = (2.0 * position.azimuth).sin();
    let sin_2elev = (2.0 * position.elevation).sin();

    // ACN channel order: W(0), Y(1), Z(2), X(3), V(4), T(5), R(6), S(7), U(8),
    // Q(9), O(10), M(11), K(12), L(13), N(14), P(15).
    c[0] = 1.0;

    if order >= 1 {
        c[1] = sin_azim * cos_elev; // Y
        c[2] = sin_elev; // Z
        c[3] = cos_azim * cos_elev; // X
    }

    if order >= 2 {
        let sqrt32 = 3f32.sqrt() / 2.0;
        c[4] = sqrt32 * (sin_2azim * cos_elev.powi(2)); // V
        c[5] = sqrt32 * (sin_azim * sin_2elev); // T
        c[6] = 1.5 * sin_elev.powi(2) - 0.5; // R
        c[7] = sqrt32 * (cos_azim * sin_2elev); // S
        c[8] = sqrt32 * (cos_2azim * cos_elev.powi(2)); // U
    }

    if order >= 3 {
        let sqrt58 = (5f32 / 8.0).sqrt();
        let sqrt152 = 15f32.sqrt() / 2.0;
        let sqrt38 = (3f32 / 8.0).sqrt();
        let azim3 = 3.0 * position.azimuth;
        c[9] = sqrt58 * (azim3.sin() * cos_elev.powi(3)); // Q
        c[10] = sqrt152 * (sin_2azim * sin_elev * cos_elev.powi(2)); // O
        c[11] = sqrt38 * (sin_azim * cos_elev * (5.0 * sin_elev.powi(2) - 1.0)); // M
        c[12] = sin_elev * (5.0 * sin_elev.powi(2) - 3.0) * 0.5; // K
        c[13] = sqrt38 * (cos_azim * cos_elev * (5.0 * sin_elev.powi(2) - 1.0)); // L
        c[14] = sqrt152 * (cos_2azim * sin_elev * cos_elev.powi(2)); // N
        c[15] = sqrt58 * (azim3.cos() * cos_elev.powi(3)); // P
    }

    for v in c.iter_mut() {
        *v *= gain;
    }
    c
}

/// Rotates a B-format signal by re-encoding its dominant direction after
/// rotating the azimuth/elevation pair. This is a practical approximation
/// of a full spherical-harmonics rotation matrix, adequate for a single
/// point-source-derived B-format signal (the only kind this pipeline
/// produces) rather than an arbitrary captured soundfield.
pub fn rotate_azimuth_elevation(position: AzimuthElevation, yaw: f32, pitch: f32) -> AzimuthElevation {
    AzimuthElevation {
        azimuth: position.azimuth + yaw,
        elevation: (position.elevation + pitch).clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_counts_match_orders() {
        assert_eq!(channel_count(0), 1);
        assert_eq!(channel_count(1), 4);
        assert_eq!(channel_count(2), 9);
        assert_eq!(channel_count(3), 16);
    }

    #[test]
    fn omni_channel_is_always_unit_gain() {
        let pos = AzimuthElevation { azimuth: 0.7, elevation: -0.3 };
        let c = encode(3, pos, 1.0);
        assert!((c[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn gain_scales_every_channel() {
        let pos = AzimuthElevation { azimuth: 0.4, elevation: 0.1 };
        let unity = encode(2, pos, 1.0);
        let half = encode(2, pos, 0.5);
        for (u, h) in unity.iter().zip(half.iter()) {
            assert!((u * 0.5 - h).abs() < 1e-6);
        }
    }
}

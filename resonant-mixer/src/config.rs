//! Mixer-wide tunables. `PLAY_SPEED_SMOOTHING` resolves Open Question 1
//! (spec §9): the original's bare `0.75` one-pole coefficient becomes a
//! named, overridable constant instead of a hardcoded magic number.

/// Fixed pool size, `N = 2^12` per spec §4.C.
pub const LAYER_COUNT_BITS: u32 = 12;
pub const LAYER_COUNT: usize = 1 << LAYER_COUNT_BITS;
pub const LAYER_INDEX_MASK: u64 = (LAYER_COUNT as u64) - 1;

/// Retention coefficient of the per-tick one-pole play-speed smoother:
/// `play_speed += (target - play_speed) * (1.0 - PLAY_SPEED_SMOOTHING)`.
/// The original hardcodes this as `0.75`; kept as the default here but
/// exposed on `MixerConfig` so a caller can retune attack/release feel.
pub const PLAY_SPEED_SMOOTHING: f32 = 0.75;

#[derive(Debug, Clone, Copy)]
pub struct MixerConfig {
    pub play_speed_smoothing: f32,
    pub master_gain: f32,
    pub output_sample_rate: u32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self { play_speed_smoothing: PLAY_SPEED_SMOOTHING, master_gain: 1.0, output_sample_rate: 48_000 }
    }
}

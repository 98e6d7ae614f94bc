//! A resolved, about-to-play sound: the output of any of the three
//! resolvers plus the gain/pitch multiplier carried by the originating
//! collection entry or switch-container item.

use resonant_core::ids::SoundId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundInstance {
    pub sound: SoundId,
    pub gain: f32,
    pub pitch: f32,
}

impl SoundInstance {
    pub fn new(sound: SoundId) -> Self {
        Self { sound, gain: 1.0, pitch: 1.0 }
    }

    pub fn with_multipliers(sound: SoundId, gain: f32, pitch: f32) -> Self {
        Self { sound, gain, pitch }
    }
}

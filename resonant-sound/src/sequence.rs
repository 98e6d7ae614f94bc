//! Cyclic sequence scheduler. The original source delegates `PlayAll` vs
//! `PlayOne` vs `LoopAll` tie-breaking to the channel at end-of-sound; this
//! scheduler only owns the cyclic cursor itself.

use resonant_core::ids::SoundId;
use resonant_core::{Error, Result};

pub struct SequenceScheduler {
    sounds: Vec<SoundId>,
    cursor: usize,
}

impl SequenceScheduler {
    pub fn new(sounds: Vec<SoundId>) -> Self {
        Self { sounds, cursor: 0 }
    }

    pub fn is_valid(&self) -> bool {
        !self.sounds.is_empty()
    }

    /// Advances and returns the next sound in cyclic order.
    pub fn next(&mut self) -> Result<SoundId> {
        if !self.is_valid() {
            return Err(Error::InvalidConfiguration("sequence scheduler has no sounds".into()));
        }
        let sound = self.sounds[self.cursor];
        self.cursor = (self.cursor + 1) % self.sounds.len();
        Ok(sound)
    }

    /// True once `next()` has wrapped back to the first entry, i.e. a full
    /// cycle completed on the call that just returned `sound`.
    pub fn at_cycle_start(&self) -> bool {
        self.cursor == 0
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

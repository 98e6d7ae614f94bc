//! Weighted random scheduler, ported from
//! `Sound/Schedulers/RandomScheduler.cpp::Select`. The original spins on a
//! `goto Pick` when a candidate is rejected (skip list, avoid-repeat
//! window); here that becomes a bounded retry loop so a fully-rejected pool
//! can't spin forever.

use rand::Rng;

use resonant_core::ids::SoundId;
use resonant_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct WeightedEntry {
    pub sound: SoundId,
    pub weight: f32,
}

pub struct RandomSchedulerConfig {
    pub avoid_repeat: bool,
    pub repeat_count: usize,
}

impl Default for RandomSchedulerConfig {
    fn default() -> Self {
        Self { avoid_repeat: false, repeat_count: 1 }
    }
}

/// Weighted-random pick across a pool, with an avoid-repeat FIFO window.
pub struct RandomScheduler {
    entries: Vec<WeightedEntry>,
    probabilities_sum: f32,
    config: RandomSchedulerConfig,
    avoid_repeat_fifo: Vec<SoundId>,
}

impl RandomScheduler {
    pub fn new(entries: Vec<WeightedEntry>, config: RandomSchedulerConfig) -> Self {
        let probabilities_sum = entries.iter().map(|e| e.weight).sum();
        Self { entries, probabilities_sum, config, avoid_repeat_fifo: Vec::new() }
    }

    pub fn is_valid(&self) -> bool {
        !self.entries.is_empty() && self.probabilities_sum > 0.0
    }

    fn pick_once(&self, rng: &mut impl Rng) -> Option<SoundId> {
        let mut selection = rng.gen::<f32>() * self.probabilities_sum;
        for entry in &self.entries {
            selection -= entry.weight;
            if selection <= 0.0 {
                return Some(entry.sound);
            }
        }
        None
    }

    /// One bounded pass of pick attempts against the pool as it currently
    /// stands (skip list plus whatever's in the avoid-repeat window).
    fn try_pick(&mut self, to_skip: &[SoundId], rng: &mut impl Rng, max_attempts: usize) -> Option<SoundId> {
        for _ in 0..max_attempts {
            let Some(candidate) = self.pick_once(rng) else {
                continue;
            };
            if to_skip.contains(&candidate) {
                continue;
            }
            if self.config.avoid_repeat && self.avoid_repeat_fifo.contains(&candidate) {
                continue;
            }

            if self.config.avoid_repeat {
                if self.avoid_repeat_fifo.len() >= self.config.repeat_count.max(1) {
                    self.avoid_repeat_fifo.remove(0);
                }
                self.avoid_repeat_fifo.push(candidate);
            }
            return Some(candidate);
        }
        None
    }

    /// Selects a sound, skipping anything in `to_skip` and, if
    /// `avoid_repeat` is set, anything currently in the repeat-avoidance
    /// window. Retries up to `entries.len() * 4` times; if the whole pool is
    /// rejected purely by the avoid-repeat window, clears it and retries the
    /// same bounded number of attempts once more before giving up,
    /// mirroring the original's "rare, bounded by pool size" fallback.
    pub fn select(&mut self, to_skip: &[SoundId], rng: &mut impl Rng) -> Result<SoundId> {
        if !self.is_valid() {
            return Err(Error::InvalidConfiguration("random scheduler has no candidates".into()));
        }

        let max_attempts = self.entries.len() * 4 + 1;
        if let Some(candidate) = self.try_pick(to_skip, rng, max_attempts) {
            return Ok(candidate);
        }

        self.avoid_repeat_fifo.clear();
        if let Some(candidate) = self.try_pick(to_skip, rng, max_attempts) {
            return Ok(candidate);
        }

        Err(Error::InvalidConfiguration("random scheduler exhausted retries; all candidates rejected".into()))
    }

    pub fn reset(&mut self) {
        self.avoid_repeat_fifo.clear();
    }
}

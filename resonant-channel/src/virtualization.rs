//! Priority virtualisation (spec §4.D): only the top-K `Playing` channels
//! by `priority = staticPriority * currentGain` hold a real mixer layer;
//! the rest are devirtualised and keep advancing in simulated time.
//!
//! Grounded on `audio-system`'s `start_playback` voice-stealing logic
//! (lowest-priority, oldest-order candidate loses its slot when
//! `max_voices` is exceeded) generalised from a single steal-on-insert
//! decision into a full per-frame re-ranking.

use resonant_mixer::LayerIndex;

/// One candidate's ranking input. `order` is a monotonic insertion
/// counter used to break exact priority ties in favour of the older
/// channel, matching `audio-system`'s oldest-steal tie-break.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub index: usize,
    pub priority: u8,
    pub gain: f32,
    pub order: u64,
}

impl Candidate {
    fn rank_key(&self) -> (f32, std::cmp::Reverse<u64>) {
        (self.priority as f32 * self.gain.max(0.0), std::cmp::Reverse(self.order))
    }
}

/// Ranks every playing candidate and returns the indices (into the input
/// slice's `Candidate::index`) chosen to occupy the `capacity` real layers,
/// highest priority first.
pub fn rank_top_k(candidates: &[Candidate], capacity: usize) -> Vec<usize> {
    let mut sorted: Vec<&Candidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| b.rank_key().partial_cmp(&a.rank_key()).unwrap_or(std::cmp::Ordering::Equal));
    sorted.into_iter().take(capacity).map(|c| c.index).collect()
}

/// The result of diffing a new top-K selection against the previous one:
/// which candidate indices need a fresh real layer, and which previously
/// real layers must be released.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VirtualizationDiff {
    pub promoted: Vec<usize>,
    pub demoted: Vec<usize>,
}

/// Assignment table: candidate index -> real layer, for everything
/// currently real.
pub fn diff_assignment(previous_real: &[usize], new_real: &[usize]) -> VirtualizationDiff {
    let mut diff = VirtualizationDiff::default();
    for &idx in new_real {
        if !previous_real.contains(&idx) {
            diff.promoted.push(idx);
        }
    }
    for &idx in previous_real {
        if !new_real.contains(&idx) {
            diff.demoted.push(idx);
        }
    }
    diff
}

/// Advances a devirtualised channel's simulated read position. Since it
/// holds no real mixer layer its cursor can't advance via the mix tick, so
/// the engine steps it directly by elapsed output frames so that, once
/// re-promoted, `resonant_mixer::Mixer::set_cursor` can resume at the
/// correct sample position instead of restarting from zero.
pub fn advance_simulated_cursor(cursor: usize, elapsed_seconds: f32, sample_rate: u32, end: usize, looping: bool) -> usize {
    let advanced = cursor + (elapsed_seconds.max(0.0) * sample_rate as f32) as usize;
    if end == 0 {
        return advanced;
    }
    if advanced >= end {
        if looping { advanced % end } else { end }
    } else {
        advanced
    }
}

/// Placeholder the engine fills with a real layer index once a channel is
/// promoted; `None` while virtual.
pub type RealLayer = Option<LayerIndex>;

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(index: usize, priority: u8, gain: f32, order: u64) -> Candidate {
        Candidate { index, priority, gain, order }
    }

    #[test]
    fn higher_priority_times_gain_wins_top_slot() {
        let candidates = [candidate(0, 50, 1.0, 0), candidate(1, 100, 1.0, 1)];
        let top = rank_top_k(&candidates, 1);
        assert_eq!(top, vec![1]);
    }

    #[test]
    fn ties_favour_the_older_candidate() {
        let candidates = [candidate(0, 50, 1.0, 5), candidate(1, 50, 1.0, 2)];
        let top = rank_top_k(&candidates, 1);
        assert_eq!(top, vec![1]);
    }

    #[test]
    fn diff_reports_promotions_and_demotions() {
        let diff = diff_assignment(&[0, 1], &[1, 2]);
        assert_eq!(diff.promoted, vec![2]);
        assert_eq!(diff.demoted, vec![0]);
    }

    #[test]
    fn simulated_cursor_wraps_when_looping() {
        let cursor = advance_simulated_cursor(90, 1.0, 100, 100, true);
        assert_eq!(cursor, 90);
    }

    #[test]
    fn simulated_cursor_clamps_to_end_when_not_looping() {
        let cursor = advance_simulated_cursor(90, 1.0, 100, 100, false);
        assert_eq!(cursor, 100);
    }
}

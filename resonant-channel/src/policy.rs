//! End-of-sound policy (spec §4.D): what a channel does when its current
//! sound instance reaches its natural end depends on whether it is playing
//! a standalone sound, a switch-container pick, or a collection member.

use std::collections::HashSet;

use resonant_core::ids::SoundId;

/// How a `Collection` cycles through its members; the tie-break the
/// original delegates from the scheduler to the channel
/// (`SequenceScheduler`'s doc comment: "PlayAll vs PlayOne vs LoopAll is
/// delegated to the channel on end-of-sound").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPlayMode {
    PlayAll,
    LoopAll,
    PlayOne,
    LoopOne,
}

impl CollectionPlayMode {
    fn plays_every_member(self) -> bool {
        matches!(self, CollectionPlayMode::PlayAll | CollectionPlayMode::LoopAll)
    }

    fn repeats(self) -> bool {
        matches!(self, CollectionPlayMode::LoopAll | CollectionPlayMode::LoopOne)
    }
}

/// What kind of object this channel's current sound was resolved from.
#[derive(Debug, Clone)]
pub enum EndOfSoundPolicy {
    Standalone,
    Switched,
    Contained { play_mode: CollectionPlayMode, total_sounds: usize },
}

/// What the channel should do in response to `on_ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfSoundOutcome {
    /// Halt and destroy the instance.
    Destroy,
    /// Halt only; the played set was exhausted on a non-repeating mode.
    Halt,
    /// Ask the collection's scheduler for the next pick and re-invoke play
    /// on this channel.
    NeedsNextPick,
}

/// Tracks which sounds in a `PlayAll`/`LoopAll` collection have already
/// been heard this cycle.
#[derive(Debug, Default)]
pub struct PlayedSet {
    played: HashSet<SoundId>,
}

impl PlayedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.played.clear();
    }

    pub fn mark(&mut self, sound: SoundId) {
        self.played.insert(sound);
    }

    pub fn is_exhausted(&self, total_sounds: usize) -> bool {
        self.played.len() >= total_sounds
    }
}

/// Decides the outcome for a sound reaching its natural end, per spec
/// §4.D's end-of-sound bullet points.
pub fn on_ended(policy: &EndOfSoundPolicy, just_played: SoundId, played: &mut PlayedSet) -> EndOfSoundOutcome {
    match policy {
        EndOfSoundPolicy::Standalone | EndOfSoundPolicy::Switched => EndOfSoundOutcome::Destroy,
        EndOfSoundPolicy::Contained { play_mode, total_sounds } => {
            if play_mode.plays_every_member() {
                played.mark(just_played);
                if played.is_exhausted(*total_sounds) {
                    played.clear();
                    if play_mode.repeats() {
                        EndOfSoundOutcome::NeedsNextPick
                    } else {
                        EndOfSoundOutcome::Halt
                    }
                } else {
                    EndOfSoundOutcome::NeedsNextPick
                }
            } else {
                // PlayOne / LoopOne: a single pick per `Play()` call, always
                // halts regardless of how many members the collection has.
                EndOfSoundOutcome::Halt
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_and_switched_always_destroy() {
        let mut played = PlayedSet::new();
        assert_eq!(on_ended(&EndOfSoundPolicy::Standalone, SoundId(1), &mut played), EndOfSoundOutcome::Destroy);
        assert_eq!(on_ended(&EndOfSoundPolicy::Switched, SoundId(1), &mut played), EndOfSoundOutcome::Destroy);
    }

    #[test]
    fn play_one_halts_unconditionally() {
        let policy = EndOfSoundPolicy::Contained { play_mode: CollectionPlayMode::PlayOne, total_sounds: 4 };
        let mut played = PlayedSet::new();
        assert_eq!(on_ended(&policy, SoundId(1), &mut played), EndOfSoundOutcome::Halt);
    }

    #[test]
    fn play_all_needs_next_pick_until_exhausted_then_halts() {
        let policy = EndOfSoundPolicy::Contained { play_mode: CollectionPlayMode::PlayAll, total_sounds: 2 };
        let mut played = PlayedSet::new();
        assert_eq!(on_ended(&policy, SoundId(1), &mut played), EndOfSoundOutcome::NeedsNextPick);
        assert_eq!(on_ended(&policy, SoundId(2), &mut played), EndOfSoundOutcome::Halt);
        assert!(played.played.is_empty(), "played set clears once exhausted");
    }

    #[test]
    fn loop_all_needs_next_pick_forever() {
        let policy = EndOfSoundPolicy::Contained { play_mode: CollectionPlayMode::LoopAll, total_sounds: 2 };
        let mut played = PlayedSet::new();
        assert_eq!(on_ended(&policy, SoundId(1), &mut played), EndOfSoundOutcome::NeedsNextPick);
        assert_eq!(on_ended(&policy, SoundId(2), &mut played), EndOfSoundOutcome::NeedsNextPick);
    }
}

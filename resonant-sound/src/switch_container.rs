//! Switch-container resolver (spec §4.B): maps the current `SwitchState` to
//! a set of `SwitchContainerItem`s and diffs the set on state change so the
//! channel layer can fade out items that disappeared and fade in items that
//! newly appeared, leaving `continue_between_states` items untouched.

use std::collections::{HashMap, HashSet};

use resonant_core::ids::{SoundId, SwitchStateId};

#[derive(Debug, Clone)]
pub struct SwitchContainerItem {
    pub sound: SoundId,
    pub continue_between_states: bool,
    pub fade_in_duration: f32,
    pub fade_out_duration: f32,
    pub gain: f32,
    pub pitch: f32,
}

#[derive(Default)]
pub struct SwitchContainer {
    states: HashMap<SwitchStateId, Vec<SwitchContainerItem>>,
    current_state: Option<SwitchStateId>,
}

/// Result of a state transition: which sounds should fade in, fade out, or
/// are continuing untouched.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub fade_in: Vec<SoundId>,
    pub fade_out: Vec<SoundId>,
    pub unchanged: Vec<SoundId>,
}

impl SwitchContainer {
    pub fn new(states: HashMap<SwitchStateId, Vec<SwitchContainerItem>>) -> Self {
        Self { states, current_state: None }
    }

    pub fn items_for(&self, state: SwitchStateId) -> &[SwitchContainerItem] {
        self.states.get(&state).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Transitions to `new_state`, returning the fade-in/fade-out/unchanged
    /// sound-id sets. `continue_between_states` items present in both the
    /// old and new state's item lists always land in `unchanged`.
    pub fn transition(&mut self, new_state: SwitchStateId) -> StateDiff {
        let old_items = self.current_state.map(|s| self.items_for(s).to_vec()).unwrap_or_default();
        let new_items = self.items_for(new_state).to_vec();

        let old_ids: HashSet<SoundId> = old_items.iter().map(|i| i.sound).collect();
        let new_ids: HashSet<SoundId> = new_items.iter().map(|i| i.sound).collect();

        let mut diff = StateDiff::default();
        for item in &new_items {
            if !old_ids.contains(&item.sound) {
                diff.fade_in.push(item.sound);
            } else if item.continue_between_states {
                diff.unchanged.push(item.sound);
            } else {
                // Present in both but not flagged to continue: restart it,
                // fading the old instance out and a fresh one in rather than
                // leaving the old instance playing untouched.
                diff.fade_in.push(item.sound);
            }
        }
        for item in &old_items {
            if !new_ids.contains(&item.sound) {
                diff.fade_out.push(item.sound);
            } else if !item.continue_between_states {
                diff.fade_out.push(item.sound);
            }
        }

        self.current_state = Some(new_state);
        diff
    }

    pub fn current_state(&self) -> Option<SwitchStateId> {
        self.current_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, continue_between: bool) -> SwitchContainerItem {
        SwitchContainerItem {
            sound: SoundId(id),
            continue_between_states: continue_between,
            fade_in_duration: 0.1,
            fade_out_duration: 0.1,
            gain: 1.0,
            pitch: 1.0,
        }
    }

    #[test]
    fn first_transition_fades_in_everything() {
        let mut states = HashMap::new();
        states.insert(SwitchStateId(1), vec![item(1, false), item(2, false)]);
        let mut container = SwitchContainer::new(states);

        let diff = container.transition(SwitchStateId(1));
        assert_eq!(diff.fade_out, Vec::<SoundId>::new());
        assert_eq!(diff.fade_in.len(), 2);
    }

    #[test]
    fn continuing_item_is_left_unchanged_across_states() {
        let mut states = HashMap::new();
        states.insert(SwitchStateId(1), vec![item(1, true), item(2, false)]);
        states.insert(SwitchStateId(2), vec![item(1, true), item(3, false)]);
        let mut container = SwitchContainer::new(states);

        container.transition(SwitchStateId(1));
        let diff = container.transition(SwitchStateId(2));

        assert_eq!(diff.unchanged, vec![SoundId(1)]);
        assert_eq!(diff.fade_in, vec![SoundId(3)]);
        assert_eq!(diff.fade_out, vec![SoundId(2)]);
    }

    #[test]
    fn non_continuing_item_present_in_both_states_restarts() {
        let mut states = HashMap::new();
        states.insert(SwitchStateId(1), vec![item(1, false)]);
        states.insert(SwitchStateId(2), vec![item(1, false)]);
        let mut container = SwitchContainer::new(states);

        container.transition(SwitchStateId(1));
        let diff = container.transition(SwitchStateId(2));

        assert_eq!(diff.fade_in, vec![SoundId(1)]);
        assert_eq!(diff.fade_out, vec![SoundId(1)]);
        assert!(diff.unchanged.is_empty());
    }
}

//! A single mix layer: the atomic fields the mix thread reads lock-free,
//! plus a mutex-guarded block of the non-atomic state (source, pipeline
//! instance, resample phase) per spec §4.C's field split between the two.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;

use resonant_dsp::PipelineInstance;

use crate::source::LayerSource;

/// Per-layer play-state machine (spec §4.C). Ordered so `flag > Halt` is a
/// single comparison selecting the two "actively mixing" states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlayState {
    Min = 0,
    Stop = 1,
    Halt = 2,
    Play = 3,
    Loop = 4,
}

impl PlayState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PlayState::Min,
            1 => PlayState::Stop,
            2 => PlayState::Halt,
            3 => PlayState::Play,
            _ => PlayState::Loop,
        }
    }
}

/// A lock-free `f32` built on `AtomicU32`'s bit pattern, since `std` has no
/// atomic float type. Every field the mix thread touches without the
/// per-layer mutex uses this.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    pub fn store(&self, v: f32, order: Ordering) {
        self.0.store(v.to_bits(), order)
    }
}

/// Non-atomic fields mutated only while holding a layer's mutex (spec:
/// "API threads take both the mixer mutex and the per-layer mutex before
/// mutating non-atomic layer fields").
pub(crate) struct LayerState {
    pub source: Option<Box<dyn LayerSource>>,
    pub pipeline: Option<PipelineInstance>,
    /// Logical end-of-sound boundary in source frames; `usize::MAX` for an
    /// unbounded streaming source.
    pub end: usize,
    /// Remaining loop budget; `0` means infinite, matching the original's
    /// `loopCount == 0` convention.
    pub loop_budget: u32,
    pub loops_done: u32,
    /// Fractional read position carried across ticks so the per-tick
    /// variable-rate resample doesn't introduce a click at block
    /// boundaries.
    pub read_phase: f64,
}

impl Default for LayerState {
    fn default() -> Self {
        Self { source: None, pipeline: None, end: 0, loop_budget: 0, loops_done: 0, read_phase: 0.0 }
    }
}

pub struct AmplimixLayer {
    pub id: AtomicU64,
    flag: AtomicU8,
    pub cursor: AtomicUsize,
    pub gain: AtomicF32,
    pub pan: AtomicF32,
    pub pitch: AtomicF32,
    pub obstruction: AtomicF32,
    pub occlusion: AtomicF32,
    pub user_play_speed: AtomicF32,
    pub play_speed: AtomicF32,
    pub sample_rate_ratio: AtomicF32,
    pub(crate) state: Mutex<LayerState>,
}

impl Default for AmplimixLayer {
    fn default() -> Self {
        Self {
            id: AtomicU64::new(0),
            flag: AtomicU8::new(PlayState::Min as u8),
            cursor: AtomicUsize::new(0),
            gain: AtomicF32::new(1.0),
            pan: AtomicF32::new(0.0),
            pitch: AtomicF32::new(1.0),
            obstruction: AtomicF32::new(0.0),
            occlusion: AtomicF32::new(0.0),
            user_play_speed: AtomicF32::new(1.0),
            play_speed: AtomicF32::new(1.0),
            sample_rate_ratio: AtomicF32::new(1.0),
            state: Mutex::new(LayerState::default()),
        }
    }
}

impl AmplimixLayer {
    pub fn flag(&self) -> PlayState {
        PlayState::from_u8(self.flag.load(Ordering::Acquire))
    }

    pub fn is_free(&self) -> bool {
        self.flag() == PlayState::Min
    }

    fn set_flag(&self, state: PlayState) {
        self.flag.store(state as u8, Ordering::Release);
    }

    /// Installs a new sound instance into a free (or forcibly reclaimed)
    /// layer. Caller already holds whatever external bookkeeping lock is
    /// needed; this only guards the layer's own fields.
    pub fn install(
        &self,
        id: u64,
        source: Box<dyn LayerSource>,
        end: usize,
        loop_budget: u32,
        pipeline: PipelineInstance,
        gain: f32,
        pan: f32,
        pitch: f32,
        looping: bool,
    ) {
        let mut guard = self.state.lock();
        *guard = LayerState { source: Some(source), pipeline: Some(pipeline), end, loop_budget, loops_done: 0, read_phase: 0.0 };
        drop(guard);

        self.id.store(id, Ordering::Release);
        self.cursor.store(0, Ordering::Release);
        self.gain.store(gain, Ordering::Release);
        self.pan.store(pan, Ordering::Release);
        self.pitch.store(pitch, Ordering::Release);
        self.obstruction.store(0.0, Ordering::Release);
        self.occlusion.store(0.0, Ordering::Release);
        self.user_play_speed.store(1.0, Ordering::Release);
        self.play_speed.store(pitch, Ordering::Release);
        self.sample_rate_ratio.store(1.0, Ordering::Release);
        self.set_flag(if looping { PlayState::Loop } else { PlayState::Play });
    }

    /// Legal transitions only (spec §4.C): returns `false` and leaves the
    /// flag untouched for anything not explicitly listed there.
    pub fn try_transition(&self, to: PlayState) -> bool {
        loop {
            let current = self.flag();
            let allowed = match (current, to) {
                (PlayState::Play, PlayState::Halt) | (PlayState::Loop, PlayState::Halt) => true,
                (PlayState::Halt, PlayState::Play) | (PlayState::Halt, PlayState::Loop) => true,
                (_, PlayState::Stop) if current != PlayState::Min => true,
                (PlayState::Stop, PlayState::Min) => true,
                (PlayState::Play, PlayState::Min) | (PlayState::Loop, PlayState::Min) => true,
                _ => false,
            };
            if !allowed {
                return false;
            }
            match self.flag.compare_exchange(current as u8, to as u8, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Tears the layer down and marks it free. Called by the mix tick on
    /// `Stop` cleanup and on natural end-of-sound.
    pub(crate) fn release(&self) {
        let mut guard = self.state.lock();
        *guard = LayerState::default();
        drop(guard);
        self.set_flag(PlayState::Min);
    }

    pub(crate) fn force_set_flag(&self, state: PlayState) {
        self.set_flag(state);
    }
}

pub type LayerIndex = u32;

pub fn index_for_request(request_id: u64) -> LayerIndex {
    (request_id & crate::config::LAYER_INDEX_MASK) as LayerIndex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_succeed_and_illegal_ones_are_rejected() {
        let layer = AmplimixLayer::default();
        assert_eq!(layer.flag(), PlayState::Min);
        assert!(!layer.try_transition(PlayState::Halt));

        layer.force_set_flag(PlayState::Play);
        assert!(layer.try_transition(PlayState::Halt));
        assert_eq!(layer.flag(), PlayState::Halt);
        assert!(!layer.try_transition(PlayState::Loop));
        assert!(layer.try_transition(PlayState::Play));
        assert!(layer.try_transition(PlayState::Stop));
        assert!(layer.try_transition(PlayState::Min));
    }

    #[test]
    fn atomic_f32_round_trips_bit_pattern() {
        let f = AtomicF32::new(1.5);
        assert_eq!(f.load(Ordering::Acquire), 1.5);
        f.store(-2.25, Ordering::Release);
        assert_eq!(f.load(Ordering::Acquire), -2.25);
    }

    #[test]
    fn index_for_request_masks_to_pool_size() {
        let idx = index_for_request((crate::config::LAYER_COUNT as u64) + 5);
        assert_eq!(idx, 5);
    }
}

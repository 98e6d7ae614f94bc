//! `ChannelInternalState` equivalent: a pool of channel slots, each a
//! fade-aware play-state machine that is either backed by a real mixer
//! layer or devirtualised and advancing in simulated time.
//!
//! Grounded on `Core/Playback/ChannelInternalState.cpp`'s `Play`/`Halt`/
//! `Pause`/`Resume`/`FadeIn`/`FadeOut` dispatch, generalised from a single
//! real channel per slot into the promote/demote cycle described in spec
//! §4.D.

use std::sync::Arc;

use resonant_core::fader::Fader;
use resonant_core::ids::SoundId;
use resonant_mixer::{LayerIndex, Mixer, PlayParams};

use crate::fade::{FadeMachine, PlaybackState};
use crate::handle::{next_generation, ChannelHandle};
use crate::policy::{on_ended, EndOfSoundOutcome, EndOfSoundPolicy, PlayedSet};
use crate::virtualization::{diff_assignment, rank_top_k, Candidate};

/// Supplies the `PlayParams` (decoded source plus pipeline) for a sound id
/// when a channel is promoted to a real mixer layer. Kept as a trait so
/// this crate never needs to know about asset loading; the engine supplies
/// the concrete implementation.
pub trait SoundSourceFactory: Send + Sync {
    fn create(&self, sound: SoundId, gain: f32, pan: f32, pitch: f32, looping: bool) -> Option<PlayParams>;
}

struct ChannelSlot {
    generation: u64,
    in_use: bool,
    sound: Option<SoundId>,
    policy: EndOfSoundPolicy,
    played: PlayedSet,
    fade: FadeMachine,
    priority: u8,
    pan: f32,
    pitch: f32,
    looping: bool,
    real_layer: Option<LayerIndex>,
    cursor: usize,
    order: u64,
    listener: Option<ChannelEventListener>,
}

impl ChannelSlot {
    fn vacant(generation: u64) -> Self {
        Self {
            generation,
            in_use: false,
            sound: None,
            policy: EndOfSoundPolicy::Standalone,
            played: PlayedSet::new(),
            fade: FadeMachine::new(1.0),
            priority: 0,
            pan: 0.0,
            pitch: 1.0,
            looping: false,
            real_layer: None,
            cursor: 0,
            order: 0,
            listener: None,
        }
    }

    fn fire(&self, event: ChannelEvent) {
        if let Some(listener) = &self.listener {
            listener(event);
        }
    }
}

/// What a just-ended sound should do next, surfaced to the caller of
/// [`ChannelPool::notify_ended`] so the engine can re-resolve a collection
/// pick without this crate needing to know about schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndedAction {
    Destroyed,
    Halted,
    NeedsNextPick,
}

/// A transition out of a playing state, delivered to whoever subscribed on
/// the channel with [`PlayRequest::listener`]. Mirrors `resonant_mixer`'s
/// `MixEvent` kinds but at channel granularity: `Begin` fires as soon as the
/// channel starts playing (real layer or not), `Loop`/`End` only happen on a
/// promoted real layer and are forwarded by the caller from drained mixer
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Begin,
    Pause,
    Resume,
    Loop,
    End,
    Stop,
}

pub type ChannelEventListener = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// Parameters for starting a new sound on a freshly acquired channel.
pub struct PlayRequest {
    pub sound: SoundId,
    pub policy: EndOfSoundPolicy,
    pub priority: u8,
    pub gain: f32,
    pub pan: f32,
    pub pitch: f32,
    pub looping: bool,
    /// Subscriber for this channel's state-transition callbacks, if any.
    pub listener: Option<ChannelEventListener>,
}

pub struct ChannelPool {
    slots: Vec<ChannelSlot>,
    free: Vec<usize>,
    mixer: Arc<Mixer>,
    order_counter: u64,
    real_capacity: usize,
}

impl ChannelPool {
    pub fn new(mixer: Arc<Mixer>, real_capacity: usize) -> Self {
        Self { slots: Vec::new(), free: Vec::new(), mixer, order_counter: 0, real_capacity }
    }

    fn validate(&self, handle: ChannelHandle) -> Option<usize> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.in_use && slot.generation == handle.generation).then_some(handle.index as usize)
    }

    /// Acquires a slot and marks it `Playing`; does not assign a real
    /// layer yet, that happens on the next [`ChannelPool::update`] call so
    /// virtualisation always reasons about the full candidate set at once.
    pub fn play(&mut self, request: PlayRequest) -> ChannelHandle {
        let (index, generation) = self.acquire_slot(request);
        self.slots[index].fade.begin_playing();
        self.slots[index].fire(ChannelEvent::Begin);
        ChannelHandle::new(index as u32, generation)
    }

    /// Like [`Self::play`] but the new channel starts at zero gain and
    /// fades up to its requested gain over `duration` seconds, for
    /// switch-container items that just appeared (spec §4.D step 3).
    pub fn play_fading_in(&mut self, request: PlayRequest, duration: f32, fader: Arc<dyn Fader>) -> ChannelHandle {
        let (index, generation) = self.acquire_slot(request);
        self.slots[index].fade.begin_playing_faded_in(duration, fader);
        self.slots[index].fire(ChannelEvent::Begin);
        ChannelHandle::new(index as u32, generation)
    }

    fn acquire_slot(&mut self, request: PlayRequest) -> (usize, u64) {
        let index = self.free.pop().unwrap_or_else(|| {
            self.slots.push(ChannelSlot::vacant(0));
            self.slots.len() - 1
        });

        let generation = next_generation();
        self.order_counter += 1;
        let slot = &mut self.slots[index];
        *slot = ChannelSlot::vacant(generation);
        slot.in_use = true;
        slot.sound = Some(request.sound);
        slot.policy = request.policy;
        slot.priority = request.priority;
        slot.pan = request.pan;
        slot.pitch = request.pitch;
        slot.looping = request.looping;
        slot.order = self.order_counter;
        slot.fade = FadeMachine::new(request.gain);
        slot.listener = request.listener;

        (index, generation)
    }

    /// Replaces the event-transition subscriber for an already-playing
    /// channel. Dropped silently if `handle` is stale.
    pub fn set_event_listener(&mut self, handle: ChannelHandle, listener: ChannelEventListener) {
        if let Some(i) = self.validate(handle) {
            self.slots[i].listener = Some(listener);
        }
    }

    /// Forwards a mixer-observed `MixEvent::Loop` for `handle`'s real layer
    /// to its subscriber. Purely informational, no state change.
    pub fn notify_looped(&self, handle: ChannelHandle) {
        if let Some(i) = self.validate(handle) {
            self.slots[i].fire(ChannelEvent::Loop);
        }
    }

    pub fn is_valid(&self, handle: ChannelHandle) -> bool {
        self.validate(handle).is_some()
    }

    pub fn playback_state(&self, handle: ChannelHandle) -> Option<PlaybackState> {
        self.validate(handle).map(|i| self.slots[i].fade.state())
    }

    /// Reverse lookup from a real mixer layer back to the channel handle
    /// currently holding it, for turning a `MixEvent::End(layer)` into a
    /// [`Self::notify_ended`] call. `O(capacity)`, fine off the mix thread.
    pub fn handle_for_real_layer(&self, layer: LayerIndex) -> Option<ChannelHandle> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, s)| s.in_use && s.real_layer == Some(layer))
            .map(|(i, s)| ChannelHandle::new(i as u32, s.generation))
    }

    pub fn stop(&mut self, handle: ChannelHandle, duration: f32, fader: Arc<dyn Fader>) {
        if let Some(i) = self.validate(handle) {
            if self.slots[i].fade.stop(duration, fader) {
                self.slots[i].fire(ChannelEvent::Stop);
                self.release(i);
            }
        }
    }

    pub fn pause(&mut self, handle: ChannelHandle, duration: f32, fader: Arc<dyn Fader>) {
        if let Some(i) = self.validate(handle) {
            let slot = &mut self.slots[i];
            if slot.fade.pause(duration, fader) {
                if let Some(layer) = slot.real_layer {
                    self.mixer.pause(layer);
                }
                slot.fire(ChannelEvent::Pause);
            }
        }
    }

    pub fn resume(&mut self, handle: ChannelHandle, duration: f32, fader: Arc<dyn Fader>) {
        if let Some(i) = self.validate(handle) {
            let slot = &mut self.slots[i];
            if slot.fade.state() != PlaybackState::Playing {
                slot.fade.resume(duration, fader);
                if let Some(layer) = slot.real_layer {
                    self.mixer.resume(layer, slot.looping);
                }
                slot.fire(ChannelEvent::Resume);
            }
        }
    }

    pub fn set_gain(&mut self, handle: ChannelHandle, gain: f32) {
        if let Some(i) = self.validate(handle) {
            self.slots[i].fade.set_stored_gain(gain);
        }
    }

    fn release(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if let Some(layer) = slot.real_layer.take() {
            self.mixer.stop(layer);
        }
        slot.in_use = false;
        self.free.push(index);
    }

    /// Call once per mix tick (or engine frame): advances every active
    /// fader, reaps channels whose fade-out just completed, re-ranks the
    /// remaining `Playing` channels against `real_capacity`, and
    /// promotes/demotes real mixer layers accordingly.
    pub fn update(&mut self, delta_time: f32, factory: &dyn SoundSourceFactory) {
        let mut to_release = Vec::new();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.in_use {
                continue;
            }
            if slot.fade.advance(delta_time) {
                match slot.fade.state() {
                    PlaybackState::Stopped => {
                        slot.fire(ChannelEvent::Stop);
                        to_release.push(i);
                    }
                    PlaybackState::Paused => {
                        if let Some(layer) = slot.real_layer {
                            self.mixer.pause(layer);
                        }
                        slot.fire(ChannelEvent::Pause);
                    }
                    _ => {}
                }
            }
        }
        for i in to_release {
            self.release(i);
        }

        let previous_real: Vec<usize> =
            self.slots.iter().enumerate().filter(|(_, s)| s.in_use && s.real_layer.is_some()).map(|(i, _)| i).collect();

        let candidates: Vec<Candidate> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.in_use && matches!(s.fade.state(), PlaybackState::Playing | PlaybackState::FadingIn | PlaybackState::FadingOut))
            .map(|(i, s)| Candidate { index: i, priority: s.priority, gain: s.fade.current_gain(), order: s.order })
            .collect();

        let new_real = rank_top_k(&candidates, self.real_capacity);
        let diff = diff_assignment(&previous_real, &new_real);

        for i in diff.demoted {
            let slot = &mut self.slots[i];
            if let Some(layer) = slot.real_layer.take() {
                slot.cursor = self.mixer.get_cursor(layer);
                self.mixer.stop(layer);
            }
        }

        for i in diff.promoted {
            let (sound, gain, pan, pitch, looping, cursor) = {
                let slot = &self.slots[i];
                (slot.sound, slot.fade.current_gain(), slot.pan, slot.pitch, slot.looping, slot.cursor)
            };
            let Some(sound) = sound else { continue };
            let Some(params) = factory.create(sound, gain, pan, pitch, looping) else { continue };
            let request_id = ((i as u64) << 32) | self.slots[i].generation;
            let layer = self.mixer.play(request_id, params);
            if cursor > 0 {
                self.mixer.set_cursor(layer, cursor);
            }
            self.slots[i].real_layer = Some(layer);
        }

        for slot in self.slots.iter().filter(|s| s.in_use && s.real_layer.is_some()) {
            if let Some(layer) = slot.real_layer {
                self.mixer.set_gain_pan(layer, slot.fade.current_gain(), slot.pan);
            }
        }
    }

    /// Tells the pool that `handle`'s sound reached its natural end (the
    /// mixer emitted `MixEvent::End` for its real layer). Consults the
    /// channel's [`EndOfSoundPolicy`] and acts on the outcome; returns
    /// `None` if the handle was already stale.
    pub fn notify_ended(&mut self, handle: ChannelHandle) -> Option<EndedAction> {
        let i = self.validate(handle)?;
        let sound = self.slots[i].sound?;
        let outcome = {
            let slot = &mut self.slots[i];
            on_ended(&slot.policy, sound, &mut slot.played)
        };
        self.slots[i].fire(ChannelEvent::End);
        match outcome {
            EndOfSoundOutcome::Destroy => {
                self.release(i);
                Some(EndedAction::Destroyed)
            }
            EndOfSoundOutcome::Halt => {
                self.halt(i);
                Some(EndedAction::Halted)
            }
            EndOfSoundOutcome::NeedsNextPick => Some(EndedAction::NeedsNextPick),
        }
    }

    /// Swaps the sound a contained channel is currently playing, keeping
    /// the channel (and its handle) alive across the re-pick that a
    /// `NeedsNextPick` outcome asked for.
    pub fn retarget(&mut self, handle: ChannelHandle, sound: SoundId) {
        if let Some(i) = self.validate(handle) {
            self.slots[i].sound = Some(sound);
            self.slots[i].cursor = 0;
        }
    }

    fn halt(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.fade.stop(0.0, Arc::new(resonant_core::fader::LinearFader));
        if let Some(layer) = slot.real_layer.take() {
            self.mixer.stop(layer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::fader::LinearFader;
    use resonant_dsp::nodes::StereoPanningNode;
    use resonant_dsp::{node::INPUT_NODE_ID, node::OUTPUT_NODE_ID, PipelineBuilder};
    use resonant_mixer::{MixerConfig, PreloadedSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SilentFactory;

    fn stereo_pipeline() -> Arc<resonant_dsp::Pipeline> {
        let mut builder = PipelineBuilder::new();
        let pan = builder.add_node(|| Box::new(StereoPanningNode::default()));
        builder.connect(pan, INPUT_NODE_ID).unwrap();
        builder.connect(OUTPUT_NODE_ID, pan).unwrap();
        Arc::new(builder.build().unwrap())
    }

    impl SoundSourceFactory for SilentFactory {
        fn create(&self, _sound: SoundId, gain: f32, pan: f32, pitch: f32, looping: bool) -> Option<PlayParams> {
            let channel = std::sync::Arc::<[f32]>::from(vec![0.1f32; 64]);
            Some(PlayParams {
                source: Box::new(PreloadedSource::new(vec![channel], 48_000)),
                pipeline: stereo_pipeline(),
                end: None,
                looping,
                loop_budget: 0,
                gain,
                pan,
                pitch,
                spatial: Default::default(),
            })
        }
    }

    fn pool_with_capacity(n: usize) -> ChannelPool {
        let mixer = Arc::new(Mixer::new(MixerConfig::default()));
        ChannelPool::new(mixer, n)
    }

    fn request(sound: u64, priority: u8) -> PlayRequest {
        PlayRequest {
            sound: SoundId(sound),
            policy: EndOfSoundPolicy::Standalone,
            priority,
            gain: 1.0,
            pan: 0.0,
            pitch: 1.0,
            looping: false,
            listener: None,
        }
    }

    #[test]
    fn stale_handle_is_rejected_after_release() {
        let mut pool = pool_with_capacity(4);
        let handle = pool.play(request(1, 50));
        pool.update(0.0, &SilentFactory);
        pool.stop(handle, 0.0, Arc::new(LinearFader));
        assert!(!pool.is_valid(handle));
    }

    #[test]
    fn only_top_priority_channels_get_real_layers() {
        let mut pool = pool_with_capacity(1);
        let low = pool.play(request(1, 10));
        let high = pool.play(request(2, 90));
        pool.update(0.0, &SilentFactory);

        assert!(pool.slots[pool.validate(high).unwrap()].real_layer.is_some());
        assert!(pool.slots[pool.validate(low).unwrap()].real_layer.is_none());
    }

    #[test]
    fn promotion_follows_a_priority_change() {
        let mut pool = pool_with_capacity(1);
        let a = pool.play(request(1, 10));
        let b = pool.play(request(2, 20));
        pool.update(0.0, &SilentFactory);
        assert!(pool.slots[pool.validate(b).unwrap()].real_layer.is_some());

        pool.set_gain(a, 100.0);
        pool.update(0.0, &SilentFactory);
        assert!(pool.slots[pool.validate(a).unwrap()].real_layer.is_some());
        assert!(pool.slots[pool.validate(b).unwrap()].real_layer.is_none());
    }

    #[test]
    fn notify_ended_on_contained_play_all_requests_next_pick() {
        let mut pool = pool_with_capacity(4);
        let policy = EndOfSoundPolicy::Contained { play_mode: crate::policy::CollectionPlayMode::PlayAll, total_sounds: 2 };
        let handle = pool.play(PlayRequest { policy, ..request(1, 50) });
        pool.update(0.0, &SilentFactory);

        let action = pool.notify_ended(handle).unwrap();
        assert_eq!(action, EndedAction::NeedsNextPick);
        assert!(pool.is_valid(handle), "channel survives a next-pick outcome");
    }

    #[test]
    fn generation_counter_never_reuses_a_stale_handle() {
        let used = AtomicUsize::new(0);
        let mut pool = pool_with_capacity(4);
        let first = pool.play(request(1, 50));
        pool.stop(first, 0.0, Arc::new(LinearFader));
        let second = pool.play(request(2, 50));
        used.fetch_add(1, Ordering::Relaxed);

        assert_eq!(first.index(), second.index(), "slot is reused");
        assert_ne!(first.generation(), second.generation());
        assert!(!pool.is_valid(first));
        assert!(pool.is_valid(second));
    }

    #[test]
    fn event_listener_observes_begin_and_end() {
        let mut pool = pool_with_capacity(4);
        let seen: Arc<std::sync::Mutex<Vec<ChannelEvent>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let listener: ChannelEventListener = Arc::new(move |event| recorder.lock().unwrap().push(event));

        let policy = EndOfSoundPolicy::Standalone;
        let handle = pool.play(PlayRequest { policy, listener: Some(listener), ..request(1, 50) });
        pool.update(0.0, &SilentFactory);
        pool.notify_ended(handle);

        let events = seen.lock().unwrap();
        assert_eq!(*events, vec![ChannelEvent::Begin, ChannelEvent::End]);
    }

    #[test]
    fn event_listener_observes_explicit_stop() {
        let mut pool = pool_with_capacity(4);
        let seen: Arc<std::sync::Mutex<Vec<ChannelEvent>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let listener: ChannelEventListener = Arc::new(move |event| recorder.lock().unwrap().push(event));

        let handle = pool.play(PlayRequest { listener: Some(listener), ..request(1, 50) });
        pool.stop(handle, 0.0, Arc::new(LinearFader));

        assert_eq!(*seen.lock().unwrap(), vec![ChannelEvent::Begin, ChannelEvent::Stop]);
    }
}

//! The top-level context (spec §6): owns the mixer, the channel pool, the
//! sound bank and the spatial registries, and exposes the pull API
//! (`mix`/`update_device`/`set_after_mix_callback`) plus the control API
//! (play/pause/resume/stop, entity/listener/room/environment, RTPC,
//! switch state, event trigger).
//!
//! Grounded on `audio-backend`'s pull-callback shape (a `RenderFn` the
//! driver calls with a raw output slice) and `engine-core::plugin`'s
//! "one context struct owns everything, handed out as `Arc`" idiom.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use resonant_buffer::AudioBuffer;
use resonant_channel::{
    ChannelEventListener, ChannelHandle, ChannelPool, EndOfSoundPolicy, EndedAction, PlayRequest,
};
use resonant_core::fader::{EaseInFader, EaseOutFader};
use resonant_core::ids::{EntityId, EnvironmentId, ListenerId, RoomId, RtpcId, SoundId, SwitchContainerId, SwitchId, SwitchStateId};
use resonant_core::{Error, Result};
use resonant_mixer::{Mixer, MixerConfig};
use resonant_sound::{StateDiff, SwitchContainer};

use crate::config::EngineConfig;
use crate::registry::Registry;
use crate::sounds::SoundBank;

/// Which kind of object resolved the sound a `play()` call is starting;
/// determines the [`EndOfSoundPolicy`] consulted when it ends.
#[derive(Debug, Clone)]
pub enum PlaySource {
    Standalone,
    Switched,
    Contained { play_mode: resonant_channel::CollectionPlayMode, total_sounds: usize },
}

pub struct PlayOptions {
    pub priority: u8,
    pub gain: f32,
    pub pan: f32,
    pub pitch: f32,
    pub looping: bool,
    pub source: PlaySource,
    /// Receives this channel's Begin/Pause/Resume/Loop/End/Stop transitions
    /// (spec §4.C: "every transition out of a playing state fires a
    /// callback... delivered to the owning channel").
    pub listener: Option<ChannelEventListener>,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self { priority: 50, gain: 1.0, pan: 0.0, pitch: 1.0, looping: false, source: PlaySource::Standalone, listener: None }
    }
}

fn to_policy(source: PlaySource) -> EndOfSoundPolicy {
    match source {
        PlaySource::Standalone => EndOfSoundPolicy::Standalone,
        PlaySource::Switched => EndOfSoundPolicy::Switched,
        PlaySource::Contained { play_mode, total_sounds } => EndOfSoundPolicy::Contained { play_mode, total_sounds },
    }
}

/// Engine-wide mutable state that isn't already its own lock-protected
/// collaborator (mixer, channel pool, registries each guard themselves).
struct SwitchContainers {
    containers: HashMap<SwitchContainerId, SwitchContainer>,
    /// Which channel currently plays which `(container, sound)` pair, so a
    /// later `fade_out` can find the handle to stop.
    active: HashMap<(SwitchContainerId, SoundId), ChannelHandle>,
}

pub struct Engine {
    config: RwLock<EngineConfig>,
    mixer: Arc<Mixer>,
    channels: Mutex<ChannelPool>,
    sounds: Arc<SoundBank>,
    registry: Registry,
    switch_containers: Mutex<SwitchContainers>,
    device_paused: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mixer_config = MixerConfig {
            play_speed_smoothing: config.play_speed_smoothing,
            master_gain: config.master_gain,
            output_sample_rate: config.output.frequency,
        };
        let mixer = Arc::new(Mixer::new(mixer_config));
        let channels = Mutex::new(ChannelPool::new(Arc::clone(&mixer), config.max_real_channels));
        Self {
            config: RwLock::new(config),
            mixer,
            channels,
            sounds: Arc::new(SoundBank::new()),
            registry: Registry::new(),
            switch_containers: Mutex::new(SwitchContainers { containers: HashMap::new(), active: HashMap::new() }),
            device_paused: AtomicBool::new(false),
        }
    }

    pub fn sounds(&self) -> &SoundBank {
        &self.sounds
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ---- Pull API ----

    /// Advances the channel pool by one buffer's worth of time and mixes
    /// `frame_count` frames into `output`. Returns the number of frames
    /// actually rendered, `0` if the device is paused for reconfiguration.
    pub fn mix(&self, frame_count: usize, output: &mut AudioBuffer) -> Result<usize> {
        if self.device_paused.load(Ordering::Acquire) {
            output.clear();
            return Ok(0);
        }

        let delta_time = frame_count as f32 / self.config.read().output.frequency.max(1) as f32;
        {
            let mut channels = self.channels.lock();
            channels.update(delta_time, &*self.sounds);
        }

        self.mixer.mix(frame_count, output)?;

        // `Begin`/`Pause`/`Resume`/`Stop` are already fired at the channel
        // level by `ChannelPool` itself, since those transitions always
        // happen as a direct consequence of a `ChannelPool` call into the
        // mixer. Only `Loop` and `End` originate purely from the mix tick's
        // own bookkeeping and need forwarding here.
        for event in self.mixer.drain_events() {
            match event {
                resonant_mixer::MixEvent::End(layer) => self.handle_layer_ended(layer),
                resonant_mixer::MixEvent::Loop(layer) => self.handle_layer_looped(layer),
                _ => {}
            }
        }

        Ok(frame_count)
    }

    fn handle_layer_ended(&self, layer: resonant_mixer::LayerIndex) {
        let mut channels = self.channels.lock();
        let Some(handle) = channels.handle_for_real_layer(layer) else { return };
        if let Some(EndedAction::NeedsNextPick) = channels.notify_ended(handle) {
            tracing::debug!(?layer, "channel needs next collection pick; caller must re-resolve and retarget");
        }
    }

    fn handle_layer_looped(&self, layer: resonant_mixer::LayerIndex) {
        let channels = self.channels.lock();
        if let Some(handle) = channels.handle_for_real_layer(layer) {
            channels.notify_looped(handle);
        }
    }

    /// Reconfigures the output assumption. Must be called while the mixer
    /// is paused (spec §6); returns `InvalidConfiguration` otherwise.
    pub fn update_device(&self, sample_rate: u32, channels: crate::config::OutputChannels) -> Result<()> {
        if !self.device_paused.load(Ordering::Acquire) {
            return Err(Error::InvalidConfiguration("update_device requires the mixer to be paused first".into()));
        }
        let mut config = self.config.write();
        config.output.frequency = sample_rate;
        config.output.channels = channels;
        Ok(())
    }

    pub fn pause_device(&self) {
        self.device_paused.store(true, Ordering::Release);
    }

    pub fn resume_device(&self) {
        self.device_paused.store(false, Ordering::Release);
    }

    pub fn set_after_mix_callback(&self, callback: Arc<dyn Fn() + Send + Sync>) {
        self.mixer.set_after_mix_callback(callback);
    }

    // ---- Control API ----

    pub fn play(&self, sound: SoundId, options: PlayOptions) -> ChannelHandle {
        let request = PlayRequest {
            sound,
            policy: to_policy(options.source),
            priority: options.priority,
            gain: options.gain,
            pan: options.pan,
            pitch: options.pitch,
            looping: options.looping,
            listener: options.listener,
        };
        self.channels.lock().play(request)
    }

    pub fn stop(&self, handle: ChannelHandle, duration: f32) {
        self.channels.lock().stop(handle, duration, Arc::new(EaseOutFader));
    }

    pub fn pause(&self, handle: ChannelHandle, duration: f32) {
        self.channels.lock().pause(handle, duration, Arc::new(EaseOutFader));
    }

    pub fn resume(&self, handle: ChannelHandle, duration: f32) {
        self.channels.lock().resume(handle, duration, Arc::new(EaseInFader));
    }

    pub fn is_playing(&self, handle: ChannelHandle) -> bool {
        matches!(self.channels.lock().playback_state(handle), Some(resonant_channel::PlaybackState::Playing | resonant_channel::PlaybackState::FadingIn))
    }

    pub fn set_entity(&self, id: EntityId, state: resonant_channel::EntityState) {
        self.registry.set_entity(id, state);
    }

    pub fn set_listener(&self, id: ListenerId, state: resonant_channel::ListenerState) {
        self.registry.set_listener(id, state);
    }

    pub fn set_room(&self, id: RoomId, state: resonant_channel::RoomState) {
        self.registry.set_room(id, state);
    }

    pub fn set_environment_factor(&self, id: EnvironmentId, factor: f32) {
        self.registry.set_environment_factor(id, factor);
    }

    pub fn set_rtpc(&self, id: RtpcId, value: f32) {
        self.registry.set_rtpc(id, value);
    }

    pub fn bind_event(&self, event: resonant_core::ids::EventId, sound: SoundId) {
        self.registry.bind_event(event, sound);
    }

    /// Plays the sound bound to `event` as a standalone sound (spec's
    /// "event trigger" control API entry). Returns `None` if no sound is
    /// bound, leaving resolution of that as a `ResourceNotFound` to the
    /// caller.
    pub fn trigger_event(&self, event: resonant_core::ids::EventId, options: PlayOptions) -> Option<ChannelHandle> {
        let sound = self.registry.event_sound(event)?;
        Some(self.play(sound, options))
    }

    pub fn register_switch_container(&self, id: SwitchContainerId, container: SwitchContainer) {
        self.switch_containers.lock().containers.insert(id, container);
    }

    /// Moves `switch` to `new_state` and, for every switch container bound
    /// to it, fades out items that disappeared and fades in items that
    /// newly appeared (spec §4.D step 3), as `Switched`-policy channels.
    pub fn set_switch_state(&self, switch: SwitchId, new_state: SwitchStateId, container_id: SwitchContainerId, fade_priority: u8) -> Option<StateDiff> {
        self.registry.set_switch_state(switch, new_state);

        let mut containers = self.switch_containers.lock();
        let diff = {
            let container = containers.containers.get_mut(&container_id)?;
            container.transition(new_state)
        };

        for &sound in &diff.fade_out {
            if let Some(handle) = containers.active.remove(&(container_id, sound)) {
                self.channels.lock().stop(handle, 0.25, Arc::new(EaseOutFader));
            }
        }
        for &sound in &diff.fade_in {
            let request = PlayRequest {
                sound,
                policy: EndOfSoundPolicy::Switched,
                priority: fade_priority,
                gain: 1.0,
                pan: 0.0,
                pitch: 1.0,
                looping: false,
                listener: None,
            };
            let handle = self.channels.lock().play_fading_in(request, 0.25, Arc::new(EaseInFader));
            containers.active.insert((container_id, sound), handle);
        }

        Some(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::{SampleType, SoundFormat};

    fn engine_with_sound(id: u64) -> Engine {
        let engine = Engine::new(EngineConfig::default());
        let channel: Arc<[f32]> = Arc::from(vec![0.05f32; 256]);
        engine.sounds().register(
            SoundId(id),
            resonant_assets::DecodedAsset { format: SoundFormat::new(48_000, 1, SampleType::Float32, 256), channels: vec![channel] },
        );
        engine
    }

    #[test]
    fn mix_with_no_channels_produces_silence_without_error() {
        let engine = Engine::new(EngineConfig::default());
        let mut output = AudioBuffer::new(128, 2).unwrap();
        let rendered = engine.mix(128, &mut output).unwrap();
        assert_eq!(rendered, 128);
    }

    #[test]
    fn paused_device_renders_nothing() {
        let engine = Engine::new(EngineConfig::default());
        engine.pause_device();
        let mut output = AudioBuffer::new(128, 2).unwrap();
        let rendered = engine.mix(128, &mut output).unwrap();
        assert_eq!(rendered, 0);
    }

    #[test]
    fn update_device_requires_pause_first() {
        let engine = Engine::new(EngineConfig::default());
        assert!(engine.update_device(44_100, crate::config::OutputChannels::Stereo).is_err());
        engine.pause_device();
        assert!(engine.update_device(44_100, crate::config::OutputChannels::Stereo).is_ok());
    }

    #[test]
    fn playing_a_registered_sound_produces_nonzero_output() {
        let engine = engine_with_sound(1);
        let handle = engine.play(SoundId(1), PlayOptions { gain: 1.0, ..Default::default() });
        assert!(engine.is_playing(handle));

        let mut output = AudioBuffer::new(256, 2).unwrap();
        engine.mix(256, &mut output).unwrap();
        let energy: f32 = output.channel(0).iter().map(|s| s.abs()).sum();
        assert!(energy > 0.0);
    }

    #[test]
    fn triggering_an_unbound_event_does_nothing() {
        let engine = Engine::new(EngineConfig::default());
        let handle = engine.trigger_event(resonant_core::ids::EventId(1), PlayOptions::default());
        assert!(handle.is_none());
    }

    #[test]
    fn triggering_a_bound_event_plays_its_sound() {
        let engine = engine_with_sound(7);
        engine.bind_event(resonant_core::ids::EventId(1), SoundId(7));
        let handle = engine.trigger_event(resonant_core::ids::EventId(1), PlayOptions::default()).unwrap();
        assert!(engine.is_playing(handle));
    }

    #[test]
    fn a_one_shot_sound_fires_begin_then_end_on_its_listener() {
        let engine = engine_with_sound(3);
        let seen: Arc<parking_lot::Mutex<Vec<resonant_channel::ChannelEvent>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let listener: resonant_channel::ChannelEventListener = Arc::new(move |event| recorder.lock().push(event));

        engine.play(SoundId(3), PlayOptions { listener: Some(listener), ..Default::default() });

        let mut output = AudioBuffer::new(256, 2).unwrap();
        engine.mix(256, &mut output).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![resonant_channel::ChannelEvent::Begin, resonant_channel::ChannelEvent::End]
        );
    }
}

//! The mixer itself (spec §4.C): a fixed `N = 2^12` layer pool, the
//! `Mix()` tick, and the play/pause/resume/stop/set-* control surface.
//! Grounded on `audio-system::AudioSystem`/`MixerQueue` for the
//! lock-guarded-inner-state-plus-deferred-event-queue shape, and on the
//! original `Mixer/Amplimix.{h,cpp}` for the per-layer algorithm itself.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use resonant_buffer::AudioBuffer;
use resonant_core::Result;
use resonant_dsp::{LayerParams, Pipeline, PipelineInstance};

use crate::command::{EventQueue, MixEvent};
use crate::config::{MixerConfig, LAYER_COUNT};
use crate::layer::{index_for_request, AmplimixLayer, AtomicF32, LayerIndex, PlayState};
use crate::source::LayerSource;

/// Everything needed to install a new sound instance into a layer.
pub struct PlayParams {
    pub source: Box<dyn LayerSource>,
    /// Must terminate in a node that writes 2 channels to its output
    /// (`StereoPanningNode`, `StereoMixerNode`, `AmbisonicBinauralDecoderNode`,
    /// ...) since `Mixer::mix` always allocates a stereo scratch buffer for
    /// the per-layer pipeline run.
    pub pipeline: Arc<Pipeline>,
    /// Logical end-of-sound boundary in source frames. Defaults to the
    /// source's own length when known, or unbounded for a streaming
    /// source with no declared length.
    pub end: Option<usize>,
    pub looping: bool,
    /// `0` means loop forever, matching the original's `loopCount == 0`.
    pub loop_budget: u32,
    pub gain: f32,
    pub pan: f32,
    pub pitch: f32,
    pub spatial: LayerParams,
}

pub struct Mixer {
    layers: Box<[AmplimixLayer]>,
    spatial: Box<[Mutex<LayerParams>]>,
    events: EventQueue,
    master_gain: AtomicF32,
    tick_mutex: Mutex<()>,
    after_mix_callback: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    config: MixerConfig,
}

impl Mixer {
    pub fn new(config: MixerConfig) -> Self {
        let layers = (0..LAYER_COUNT).map(|_| AmplimixLayer::default()).collect::<Vec<_>>().into_boxed_slice();
        let spatial = (0..LAYER_COUNT).map(|_| Mutex::new(LayerParams::default())).collect::<Vec<_>>().into_boxed_slice();
        Self {
            layers,
            spatial,
            events: EventQueue::new(LAYER_COUNT),
            master_gain: AtomicF32::new(config.master_gain),
            tick_mutex: Mutex::new(()),
            after_mix_callback: Mutex::new(None),
            config,
        }
    }

    pub fn set_after_mix_callback(&self, callback: Arc<dyn Fn() + Send + Sync>) {
        *self.after_mix_callback.lock() = Some(callback);
    }

    pub fn set_master_gain(&self, gain: f32) {
        self.master_gain.store(gain, Ordering::Release);
    }

    /// Installs `params` into the layer `request_id & (N-1)` maps to. If
    /// that slot is occupied, the prior occupant is freed first (Open
    /// Question 2: a logged, documented eviction rather than a silent
    /// overwrite of a live layer).
    pub fn play(&self, request_id: u64, params: PlayParams) -> LayerIndex {
        let idx = index_for_request(request_id);
        let layer = &self.layers[idx as usize];
        if !layer.is_free() {
            tracing::warn!(layer = idx, request_id, "layer slot collision, evicting prior occupant");
            layer.release();
        }

        let end = params.end.unwrap_or_else(|| params.source.len().unwrap_or(usize::MAX));
        let instance = params.pipeline.instantiate();
        layer.install(request_id, params.source, end, params.loop_budget, instance, params.gain, params.pan, params.pitch, params.looping);
        *self.spatial[idx as usize].lock() = params.spatial;
        self.events.push(MixEvent::Begin(idx));
        idx
    }

    pub fn pause(&self, idx: LayerIndex) -> bool {
        let transitioned = self.layers[idx as usize].try_transition(PlayState::Halt);
        if transitioned {
            self.events.push(MixEvent::Pause(idx));
        }
        transitioned
    }

    pub fn resume(&self, idx: LayerIndex, looping: bool) -> bool {
        let target = if looping { PlayState::Loop } else { PlayState::Play };
        let transitioned = self.layers[idx as usize].try_transition(target);
        if transitioned {
            self.events.push(MixEvent::Resume(idx));
        }
        transitioned
    }

    pub fn stop(&self, idx: LayerIndex) -> bool {
        self.layers[idx as usize].try_transition(PlayState::Stop)
    }

    pub fn set_gain_pan(&self, idx: LayerIndex, gain: f32, pan: f32) {
        let layer = &self.layers[idx as usize];
        layer.gain.store(gain, Ordering::Release);
        layer.pan.store(pan, Ordering::Release);
    }

    pub fn set_pitch(&self, idx: LayerIndex, pitch: f32) {
        self.layers[idx as usize].pitch.store(pitch, Ordering::Release);
    }

    pub fn set_obstruction(&self, idx: LayerIndex, amount: f32) {
        self.layers[idx as usize].obstruction.store(amount, Ordering::Release);
    }

    pub fn set_occlusion(&self, idx: LayerIndex, amount: f32) {
        self.layers[idx as usize].occlusion.store(amount, Ordering::Release);
    }

    pub fn set_play_speed(&self, idx: LayerIndex, user_play_speed: f32) {
        self.layers[idx as usize].user_play_speed.store(user_play_speed, Ordering::Release);
    }

    pub fn set_cursor(&self, idx: LayerIndex, cursor: usize) {
        let layer = &self.layers[idx as usize];
        let mut guard = layer.state.lock();
        guard.read_phase = 0.0;
        layer.cursor.store(cursor.min(guard.end), Ordering::Release);
    }

    pub fn set_spatial(&self, idx: LayerIndex, params: LayerParams) {
        *self.spatial[idx as usize].lock() = params;
    }

    pub fn get_play_state(&self, idx: LayerIndex) -> PlayState {
        self.layers[idx as usize].flag()
    }

    /// Current read position in source frames, read back before a layer is
    /// released so a devirtualised channel can resume at the right
    /// position once re-promoted.
    pub fn get_cursor(&self, idx: LayerIndex) -> usize {
        self.layers[idx as usize].cursor.load(Ordering::Acquire)
    }

    pub fn stop_all(&self) {
        for layer in self.layers.iter() {
            if layer.flag() != PlayState::Min {
                layer.try_transition(PlayState::Stop);
            }
        }
    }

    pub fn halt_all(&self) {
        for layer in self.layers.iter() {
            if matches!(layer.flag(), PlayState::Play | PlayState::Loop) {
                layer.try_transition(PlayState::Halt);
            }
        }
    }

    pub fn play_all(&self) {
        for layer in self.layers.iter() {
            if layer.flag() == PlayState::Halt {
                // Without stored per-layer looping intent we resume as
                // one-shot; callers wanting looped resume should track it
                // and call `resume` directly instead of the bulk API.
                layer.try_transition(PlayState::Play);
            }
        }
    }

    /// Drains transition callbacks accumulated since the last drain
    /// (Begin/Pause/Resume/Loop/End/Stop), to be dispatched by the owning
    /// channel layer.
    pub fn drain_events(&self) -> Vec<MixEvent> {
        let mut out = Vec::new();
        self.events.drain_into(&mut out);
        out
    }

    /// The mix tick (spec §4.C). Accumulates every active layer's
    /// contribution into `output` (already the caller's scratch stereo
    /// buffer, cleared here) and returns once the mixer mutex is released
    /// and the optional after-mix callback has run.
    pub fn mix(&self, frame_count: usize, output: &mut AudioBuffer) -> Result<()> {
        let _tick_guard = self.tick_mutex.lock();
        output.clear();

        let mut any_contributed = false;

        for idx in 0..self.layers.len() {
            let layer = &self.layers[idx];
            let flag = layer.flag();

            if flag == PlayState::Stop {
                layer.release();
                self.events.push(MixEvent::Stop(idx as u32));
                continue;
            }
            if flag <= PlayState::Halt {
                continue;
            }

            let mut guard = layer.state.lock();
            let end = guard.end;
            let loop_budget = guard.loop_budget;
            let mut loops_done = guard.loops_done;
            let phase_start = guard.read_phase;

            let (src_rate, channel_count, total_len) = match guard.source.as_ref() {
                Some(source) => (source.sample_rate() as f64, source.channel_count().max(1), source.len()),
                None => {
                    drop(guard);
                    continue;
                }
            };

            let pitch = layer.pitch.load(Ordering::Acquire);
            let user_speed = layer.user_play_speed.load(Ordering::Acquire);
            let target_speed = pitch * user_speed;
            let mut play_speed = layer.play_speed.load(Ordering::Acquire);
            play_speed += (target_speed - play_speed) * (1.0 - self.config.play_speed_smoothing);
            layer.play_speed.store(play_speed, Ordering::Release);

            let ratio = play_speed as f64 * (src_rate / self.config.output_sample_rate as f64);
            layer.sample_rate_ratio.store(ratio as f32, Ordering::Release);

            let needed = ((frame_count as f64) * ratio).ceil() as usize + 2;
            let cursor = layer.cursor.load(Ordering::Acquire);

            let mut raw: Vec<Vec<f32>> = vec![Vec::new(); channel_count];
            let produced = {
                let source = guard.source.as_mut().unwrap();
                source.read(cursor, needed, &mut raw)
            };

            let mono: Vec<f32> = if produced == 0 {
                Vec::new()
            } else {
                (0..produced)
                    .map(|i| raw.iter().map(|c| c.get(i).copied().unwrap_or(0.0)).sum::<f32>() / channel_count as f32)
                    .collect()
            };

            let mut mono_buf = AudioBuffer::new(frame_count, 1)?;
            let mut phase = phase_start;
            {
                let chan = mono_buf.channel_mut(0);
                for sample in chan.iter_mut().take(frame_count) {
                    let base = phase.floor() as usize;
                    let frac = (phase - base as f64) as f32;
                    let s0 = mono.get(base).copied().unwrap_or(0.0);
                    let s1 = mono.get(base + 1).copied().unwrap_or(s0);
                    *sample = s0 + (s1 - s0) * frac;
                    phase += ratio;
                }
            }
            let consumed = phase.floor() as usize;
            let phase_remainder = phase - consumed as f64;

            let mut spatial_params = *self.spatial[idx].lock();
            spatial_params.sample_rate = self.config.output_sample_rate;
            spatial_params.occlusion = layer.occlusion.load(Ordering::Acquire);
            spatial_params.obstruction = layer.obstruction.load(Ordering::Acquire);

            let mut stereo = AudioBuffer::new(frame_count, 2)?;
            {
                let pipeline_instance: &mut PipelineInstance = guard.pipeline.as_mut().unwrap();
                pipeline_instance.execute(&spatial_params, &mono_buf, &mut stereo)?;
            }

            let final_gain = self.master_gain.load(Ordering::Acquire) * layer.gain.load(Ordering::Acquire);
            let out_channels = output.channel_count().min(stereo.channel_count());
            for ch in 0..out_channels {
                let src = stereo.channel(ch);
                let dst = output.channel_mut(ch);
                for i in 0..frame_count {
                    dst[i] = src[i].mul_add(final_gain, dst[i]);
                }
            }
            if produced > 0 {
                any_contributed = true;
            }

            let new_cursor = cursor + consumed;
            let unbounded_dry = total_len.is_none() && produced == 0;
            let reached_end = new_cursor >= end || unbounded_dry;

            if reached_end {
                let should_loop = flag == PlayState::Loop && (loop_budget == 0 || loops_done + 1 < loop_budget);
                if should_loop {
                    if loop_budget != 0 {
                        loops_done += 1;
                    }
                    guard.loops_done = loops_done;
                    guard.read_phase = 0.0;
                    drop(guard);
                    layer.cursor.store(0, Ordering::Release);
                    self.events.push(MixEvent::Loop(idx as u32));
                } else {
                    drop(guard);
                    layer.release();
                    self.events.push(MixEvent::End(idx as u32));
                }
            } else {
                guard.read_phase = phase_remainder;
                drop(guard);
                layer.cursor.store(new_cursor, Ordering::Release);
            }
        }

        drop(_tick_guard);

        if any_contributed {
            if let Some(callback) = self.after_mix_callback.lock().as_ref() {
                callback();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PreloadedSource;
    use resonant_dsp::{nodes::StereoPanningNode, PipelineBuilder};

    /// Every pipeline handed to a layer must end in a stereo-producing
    /// node, since `Mixer::mix` always allocates a 2-channel scratch
    /// buffer for the per-layer output; `StereoPanningNode` is the
    /// simplest one that qualifies.
    fn stereo_pipeline() -> Arc<Pipeline> {
        let mut b = PipelineBuilder::new();
        let pan = b.add_node(|| Box::new(StereoPanningNode));
        b.connect(pan, resonant_dsp::INPUT_NODE_ID).unwrap();
        b.connect(resonant_dsp::OUTPUT_NODE_ID, pan).unwrap();
        Arc::new(b.build().unwrap())
    }

    fn mono_source(samples: Vec<f32>, sample_rate: u32) -> Box<dyn LayerSource> {
        let chan: Arc<[f32]> = Arc::from(samples);
        Box::new(PreloadedSource::new(vec![chan], sample_rate))
    }

    #[test]
    fn play_installs_into_masked_layer_and_mixes_nonzero_output() {
        let mixer = Mixer::new(MixerConfig { output_sample_rate: 48_000, ..Default::default() });
        let source = mono_source(vec![1.0; 64], 48_000);
        let idx = mixer.play(
            7,
            PlayParams {
                source,
                pipeline: stereo_pipeline(),
                end: Some(64),
                looping: true,
                loop_budget: 0,
                gain: 1.0,
                pan: 0.0,
                pitch: 1.0,
                spatial: LayerParams::default(),
            },
        );
        assert_eq!(idx, 7);
        assert_eq!(mixer.get_play_state(idx), PlayState::Loop);

        let mut out = AudioBuffer::new(16, 2).unwrap();
        mixer.mix(16, &mut out).unwrap();
        assert!(out.channel(0).iter().any(|&s| s.abs() > 1e-6));
    }

    #[test]
    fn one_shot_layer_frees_itself_at_end_of_sound() {
        let mixer = Mixer::new(MixerConfig::default());
        let source = mono_source(vec![1.0; 4], 48_000);
        let idx = mixer.play(
            1,
            PlayParams {
                source,
                pipeline: stereo_pipeline(),
                end: Some(4),
                looping: false,
                loop_budget: 0,
                gain: 1.0,
                pan: 0.0,
                pitch: 1.0,
                spatial: LayerParams::default(),
            },
        );

        let mut out = AudioBuffer::new(32, 2).unwrap();
        mixer.mix(32, &mut out).unwrap();

        assert_eq!(mixer.get_play_state(idx), PlayState::Min);
        let events = mixer.drain_events();
        assert!(events.contains(&MixEvent::End(idx)));
    }

    #[test]
    fn layer_slot_collision_evicts_prior_occupant_with_warning() {
        let mixer = Mixer::new(MixerConfig::default());
        let first = mono_source(vec![0.5; 8], 48_000);
        let idx_a = mixer.play(
            3,
            PlayParams {
                source: first,
                pipeline: stereo_pipeline(),
                end: Some(8),
                looping: true,
                loop_budget: 0,
                gain: 1.0,
                pan: 0.0,
                pitch: 1.0,
                spatial: LayerParams::default(),
            },
        );
        let second = mono_source(vec![0.25; 8], 48_000);
        let idx_b = mixer.play(
            3 + crate::config::LAYER_COUNT as u64,
            PlayParams {
                source: second,
                pipeline: stereo_pipeline(),
                end: Some(8),
                looping: true,
                loop_budget: 0,
                gain: 1.0,
                pan: 0.0,
                pitch: 1.0,
                spatial: LayerParams::default(),
            },
        );
        assert_eq!(idx_a, idx_b);
        assert_eq!(mixer.get_play_state(idx_a), PlayState::Loop);
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let mixer = Mixer::new(MixerConfig::default());
        let source = mono_source(vec![1.0; 8], 48_000);
        let idx = mixer.play(
            2,
            PlayParams {
                source,
                pipeline: stereo_pipeline(),
                end: Some(8),
                looping: true,
                loop_budget: 0,
                gain: 1.0,
                pan: 0.0,
                pitch: 1.0,
                spatial: LayerParams::default(),
            },
        );
        assert!(mixer.pause(idx));
        assert_eq!(mixer.get_play_state(idx), PlayState::Halt);
        assert!(mixer.resume(idx, true));
        assert_eq!(mixer.get_play_state(idx), PlayState::Loop);

        let events = mixer.drain_events();
        assert!(events.contains(&MixEvent::Pause(idx)));
        assert!(events.contains(&MixEvent::Resume(idx)));
    }

    #[test]
    fn master_gain_scales_mixed_output() {
        let mixer = Mixer::new(MixerConfig::default());
        mixer.set_master_gain(0.1);
        let source = mono_source(vec![1.0; 64], 48_000);
        mixer.play(
            9,
            PlayParams {
                source,
                pipeline: stereo_pipeline(),
                end: Some(64),
                looping: true,
                loop_budget: 0,
                gain: 1.0,
                pan: 0.0,
                pitch: 1.0,
                spatial: LayerParams::default(),
            },
        );
        let mut out = AudioBuffer::new(16, 2).unwrap();
        mixer.mix(16, &mut out).unwrap();
        assert!(out.channel(0).iter().all(|&s| s.abs() < 0.5));
    }
}

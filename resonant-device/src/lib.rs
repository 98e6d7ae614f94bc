//! The single non-core surface that knows a physical output device
//! exists: a cpal-backed worker thread pulling frames from
//! `resonant_engine::Engine::mix` and writing interleaved samples into
//! cpal's callback buffer.
//!
//! Grounded on `audio-backend::cpal_backend`'s shape: the device/stream
//! live on a dedicated worker thread (cpal's `Stream` isn't `Send` on every
//! platform) and the handle callers keep is a thin, `Send` control handle
//! that shuts the worker down on drop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use crossbeam_channel::{unbounded, Receiver, Sender};

use resonant_buffer::AudioBuffer;
use resonant_engine::{Engine, OutputChannels};

#[derive(Debug)]
pub enum DeviceError {
    NoOutputDevice,
    UnsupportedFormat(String),
    StreamBuildFailed(String),
    StreamPlayFailed(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::NoOutputDevice => write!(f, "no default output device"),
            DeviceError::UnsupportedFormat(s) => write!(f, "unsupported output format: {s}"),
            DeviceError::StreamBuildFailed(s) => write!(f, "failed to build output stream: {s}"),
            DeviceError::StreamPlayFailed(s) => write!(f, "failed to start output stream: {s}"),
        }
    }
}

impl std::error::Error for DeviceError {}

enum CtrlMsg {
    Shutdown,
}

/// A live cpal output stream driving an [`Engine`]. Dropping it stops the
/// stream and joins the worker thread.
pub struct CpalDriver {
    ctrl_tx: Sender<CtrlMsg>,
    worker: Option<JoinHandle<()>>,
}

/// Picks a default output device/config, reconfigures `engine` to match it
/// (spec §6: `UpdateDevice` must be called with the mixer paused), and
/// starts pulling frames from `engine.mix()` on a dedicated worker thread.
pub fn start(engine: Arc<Engine>) -> Result<CpalDriver, DeviceError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(DeviceError::NoOutputDevice)?;

    let mut configs = device
        .supported_output_configs()
        .map_err(|e| DeviceError::UnsupportedFormat(e.to_string()))?
        .collect::<Vec<_>>();
    if configs.is_empty() {
        return Err(DeviceError::UnsupportedFormat("no supported output configs".into()));
    }
    let chosen = configs
        .iter()
        .rev()
        .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        .cloned()
        .unwrap_or_else(|| configs.pop().unwrap());
    let config = chosen.with_max_sample_rate().config();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    engine.pause_device();
    let reconfigured = engine.update_device(
        sample_rate,
        if channels >= 2 { OutputChannels::Stereo } else { OutputChannels::Mono },
    );
    engine.resume_device();
    reconfigured.map_err(|e| DeviceError::UnsupportedFormat(e.to_string()))?;

    let (ctrl_tx, ctrl_rx) = unbounded();
    let worker = thread::spawn(move || worker_loop(device, config, channels, engine, ctrl_rx));

    Ok(CpalDriver { ctrl_tx, worker: Some(worker) })
}

fn worker_loop(
    device: cpal::Device,
    config: cpal::StreamConfig,
    channels: usize,
    engine: Arc<Engine>,
    ctrl_rx: Receiver<CtrlMsg>,
) {
    let mut scratch = match AudioBuffer::new(config.buffer_size_hint(), channels) {
        Ok(buf) => buf,
        Err(err) => {
            tracing::error!(%err, "failed to allocate device scratch buffer");
            return;
        }
    };
    let mut scratch_frames = scratch.frame_count();

    let data_cb = move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
        let frame_count = data.len() / channels.max(1);
        if frame_count != scratch_frames {
            scratch = match AudioBuffer::new(frame_count, channels) {
                Ok(buf) => buf,
                Err(_) => {
                    data.iter_mut().for_each(|s| *s = 0.0);
                    return;
                }
            };
            scratch_frames = frame_count;
        }

        if engine.mix(frame_count, &mut scratch).is_err() {
            data.iter_mut().for_each(|s| *s = 0.0);
            return;
        }

        let out_channels = scratch.channel_count();
        for frame in 0..frame_count {
            for ch in 0..channels {
                let source_channel = ch.min(out_channels.saturating_sub(1));
                data[frame * channels + ch] = scratch.channel(source_channel)[frame];
            }
        }
    };
    let err_cb = |err| tracing::warn!(%err, "cpal output stream error");

    let stream = match device.build_output_stream(&config, data_cb, err_cb, None) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(%err, "failed to build cpal output stream");
            return;
        }
    };
    if let Err(err) = stream.play() {
        tracing::error!(%err, "failed to start cpal output stream");
        return;
    }

    // Parking here keeps `stream` (and the device it owns) alive on this
    // thread until told to shut down; cpal tears the stream down on drop.
    let _ = ctrl_rx.recv();
}

trait BufferSizeHint {
    fn buffer_size_hint(&self) -> usize;
}

impl BufferSizeHint for cpal::StreamConfig {
    fn buffer_size_hint(&self) -> usize {
        match self.buffer_size {
            cpal::BufferSize::Fixed(n) => n as usize,
            cpal::BufferSize::Default => 1024,
        }
    }
}

impl Drop for CpalDriver {
    fn drop(&mut self) {
        let _ = self.ctrl_tx.send(CtrlMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

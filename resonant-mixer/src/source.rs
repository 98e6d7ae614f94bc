//! The two ways a layer can supply decoded samples: a fully preloaded
//! `Arc<[f32]>` chunk per channel (shared with other instances of the same
//! asset, per Open Question 4) or a caller-supplied streaming callback.
//! Both sit behind [`LayerSource`] so `Mixer::mix` doesn't care which one a
//! given layer owns.

use std::sync::Arc;

/// A source of planar decoded audio for one mixer layer.
pub trait LayerSource: Send {
    fn sample_rate(&self) -> u32;
    fn channel_count(&self) -> usize;

    /// Total frames available, or `None` for an open-ended streaming source.
    fn len(&self) -> Option<usize>;

    /// Fills `out` (one `Vec` per channel, already sized by the caller) with
    /// up to `frames` frames starting at `start_frame`. Preloaded sources
    /// wrap modulo their length; streaming sources advance their own
    /// internal cursor and ignore `start_frame`. Returns the number of
    /// frames actually produced — less than requested means a streaming
    /// source ran dry.
    fn read(&mut self, start_frame: usize, frames: usize, out: &mut [Vec<f32>]) -> usize;
}

/// A fully decoded, possibly `Arc`-shared chunk (spec §9 Open Question 4).
pub struct PreloadedSource {
    channels: Vec<Arc<[f32]>>,
    sample_rate: u32,
}

impl PreloadedSource {
    pub fn new(channels: Vec<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self { channels, sample_rate }
    }

    pub fn frame_len(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }
}

impl LayerSource for PreloadedSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn len(&self) -> Option<usize> {
        Some(self.frame_len())
    }

    fn read(&mut self, start_frame: usize, frames: usize, out: &mut [Vec<f32>]) -> usize {
        let total = self.frame_len();
        if total == 0 || self.channels.is_empty() {
            for dst in out.iter_mut() {
                dst.clear();
            }
            return 0;
        }
        for (ch, dst) in out.iter_mut().enumerate() {
            let src = &self.channels[ch.min(self.channels.len() - 1)];
            dst.clear();
            dst.reserve(frames);
            for i in 0..frames {
                dst.push(src[(start_frame + i) % total]);
            }
        }
        frames
    }
}

/// An externally driven source, e.g. a decompressor feeding chunks in on
/// demand. The callback receives channel-count-sized `Vec`s to fill and
/// returns how many frames it actually produced.
pub struct StreamingSource {
    sample_rate: u32,
    channel_count: usize,
    callback: Box<dyn FnMut(&mut [Vec<f32>]) -> usize + Send>,
}

impl StreamingSource {
    pub fn new(sample_rate: u32, channel_count: usize, callback: Box<dyn FnMut(&mut [Vec<f32>]) -> usize + Send>) -> Self {
        Self { sample_rate, channel_count, callback }
    }
}

impl LayerSource for StreamingSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn len(&self) -> Option<usize> {
        None
    }

    fn read(&mut self, _start_frame: usize, frames: usize, out: &mut [Vec<f32>]) -> usize {
        for dst in out.iter_mut() {
            dst.clear();
            dst.resize(frames, 0.0);
        }
        (self.callback)(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preloaded_source_wraps_on_read() {
        let chan: Arc<[f32]> = Arc::from(vec![1.0, 2.0, 3.0, 4.0]);
        let mut src = PreloadedSource::new(vec![chan], 48_000);
        let mut out = vec![Vec::new()];
        let produced = src.read(2, 4, &mut out);
        assert_eq!(produced, 4);
        assert_eq!(out[0], vec![3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn streaming_source_reports_short_reads() {
        let mut calls = 0;
        let mut src = StreamingSource::new(44_100, 1, Box::new(move |bufs| {
            calls += 1;
            bufs[0][0] = 0.5;
            1
        }));
        let mut out = vec![Vec::new()];
        let produced = src.read(0, 4, &mut out);
        assert_eq!(produced, 1);
        assert_eq!(out[0][0], 0.5);
    }
}

//! Sample-rate conversion, grounded on
//! `asset-manager::sfx_loader::resample_interleaved`'s use of `rubato`'s
//! `SincFixedIn`, adapted to return `Result` instead of `.expect()`-panicking
//! and to operate on planar channel buffers directly (the shape the mixer
//! and pipeline already use) instead of round-tripping through interleaved
//! `Vec<f32>`.

use rubato::{Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use resonant_core::{Error, Result};

/// Nearest-neighbor resampling used for very short clips where spinning up
/// a sinc resampler costs more than it's worth, mirroring the teacher's
/// `frames < 16` fast path.
fn nearest_neighbor(planar: &[Vec<f32>], ratio: f64) -> Vec<Vec<f32>> {
    let channels = planar.len();
    let frames = planar.first().map(|c| c.len()).unwrap_or(0);
    let out_frames = ((frames as f64) * ratio).ceil().max(1.0) as usize;
    let mut out = vec![Vec::with_capacity(out_frames); channels];
    for f in 0..out_frames {
        let src_f = ((f as f64) / ratio).floor() as usize;
        let src_f = src_f.min(frames.saturating_sub(1));
        for ch in 0..channels {
            out[ch].push(planar[ch].get(src_f).copied().unwrap_or(0.0));
        }
    }
    out
}

/// Resamples planar `from_rate` audio to `to_rate`, returning one `Vec<f32>`
/// per channel.
pub fn resample_planar(planar: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>> {
    if from_rate == to_rate || planar.iter().all(|c| c.is_empty()) {
        return Ok(planar.to_vec());
    }

    let channels = planar.len();
    let frames = planar[0].len();
    let ratio = to_rate as f64 / from_rate as f64;

    if frames < 16 {
        return Ok(nearest_neighbor(planar, ratio));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 32,
        window: WindowFunction::BlackmanHarris2,
    };
    let chunk_size = frames.max(1024);
    let max_ratio = ratio.max(1.0);

    let mut resampler = SincFixedIn::<f32>::new(max_ratio, 2.0, params, chunk_size, channels)
        .map_err(|e| Error::InvalidConfiguration(format!("resampler init: {e}")))?;

    let input_refs: Vec<&[f32]> = planar.iter().map(|v| v.as_slice()).collect();
    resampler
        .process(&input_refs, None)
        .map_err(|e| Error::Unsupported(format!("resample failed: {e}")))
}

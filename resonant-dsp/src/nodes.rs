//! Canonical pipeline node implementations (spec §4.E). Each one mirrors a
//! node class under `Mixer/Nodes/` in the original source: `InputNode`,
//! `OutputNode`, `AttenuationNode`, `OcclusionNode`, `ObstructionNode`,
//! `EnvironmentEffectNode`, panning/clamp/clip/mixer nodes, and the
//! ambisonic family backed by [`crate::ambisonics`].

use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use resonant_assets::Sampler;
use resonant_buffer::AudioBuffer;
use resonant_core::math::direction_to_azimuth_elevation;
use resonant_core::Result;

use crate::ambisonics;
use crate::node::{LayerParams, NodeInstance};

/// Copies the layer's raw input through unchanged; exists purely as the
/// graph's single source so every other node has something to connect to.
pub struct InputNode;

impl NodeInstance for InputNode {
    fn max_producers(&self) -> usize {
        0
    }

    fn min_producers(&self) -> usize {
        0
    }

    fn process(&mut self, _params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        if let Some(input) = inputs.first() {
            AudioBuffer::copy(input, 0, out, 0, frame_count);
        }
        Ok(())
    }
}

/// Terminal sink; whatever reaches here is what `PipelineInstance::execute`
/// copies into the caller's output buffer.
pub struct OutputNode;

impl NodeInstance for OutputNode {
    fn process(&mut self, _params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        if let Some(input) = inputs.first() {
            AudioBuffer::copy(input, 0, out, 0, frame_count);
        }
        Ok(())
    }
}

/// Scales every sample by the layer's current gain (distance attenuation,
/// RTPC-driven volume, etc. are all folded into `LayerParams::gain` by the
/// channel before the tick runs).
#[derive(Default)]
pub struct AttenuationNode;

impl NodeInstance for AttenuationNode {
    fn process(&mut self, params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        if let Some(input) = inputs.first() {
            AudioBuffer::copy(input, 0, out, 0, frame_count);
        }
        out.mul_assign_scalar(params.gain);
        Ok(())
    }
}

fn lowpass_for_amount(sample_rate: f32, amount: f32) -> Option<Coefficients<f32>> {
    if amount <= 0.0 {
        return None;
    }
    // amount in [0, 1]; 0 = no filtering (cutoff at Nyquist), 1 = heavily
    // muffled (cutoff near 200 Hz). Matches the occlusion/obstruction
    // "low-pass filter strength" framing in spec §4.E.
    let min_cutoff = 200.0f32;
    let max_cutoff = sample_rate * 0.49;
    let cutoff = max_cutoff * (1.0 - amount) + min_cutoff * amount;
    Coefficients::<f32>::from_params(Type::LowPass, sample_rate.hz(), cutoff.hz(), biquad::Q_BUTTERWORTH_F32).ok()
}

/// Low-pass filters the signal based on how occluded the sound source is
/// (direct path blocked), grounded on `gecko_dsp::eq`'s biquad usage and on
/// `Mixer/Nodes/OcclusionNode.h`'s framing of occlusion as a low-pass.
pub struct OcclusionNode {
    sample_rate: f32,
    filters: Vec<DirectForm2Transposed<f32>>,
}

impl OcclusionNode {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate, filters: Vec::new() }
    }
}

impl NodeInstance for OcclusionNode {
    fn process(&mut self, params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        if let Some(input) = inputs.first() {
            AudioBuffer::copy(input, 0, out, 0, frame_count);
        }

        let Some(coeffs) = lowpass_for_amount(self.sample_rate, params.occlusion) else {
            return Ok(());
        };

        if self.filters.len() != out.channel_count() {
            self.filters = (0..out.channel_count()).map(|_| DirectForm2Transposed::<f32>::new(coeffs)).collect();
        }
        for (ch, filter) in self.filters.iter_mut().enumerate() {
            filter.update_coefficients(coeffs);
            for s in out.channel_mut(ch) {
                *s = filter.run(*s);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        for f in &mut self.filters {
            f.reset_state();
        }
    }
}

/// Same shape as [`OcclusionNode`] but driven by `LayerParams::obstruction`
/// (indirect-path partial blocking rather than full direct-path blocking).
pub struct ObstructionNode {
    sample_rate: f32,
    filters: Vec<DirectForm2Transposed<f32>>,
}

impl ObstructionNode {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate, filters: Vec::new() }
    }
}

impl NodeInstance for ObstructionNode {
    fn process(&mut self, params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        if let Some(input) = inputs.first() {
            AudioBuffer::copy(input, 0, out, 0, frame_count);
        }

        let Some(coeffs) = lowpass_for_amount(self.sample_rate, params.obstruction) else {
            return Ok(());
        };

        if self.filters.len() != out.channel_count() {
            self.filters = (0..out.channel_count()).map(|_| DirectForm2Transposed::<f32>::new(coeffs)).collect();
        }
        for (ch, filter) in self.filters.iter_mut().enumerate() {
            filter.update_coefficients(coeffs);
            for s in out.channel_mut(ch) {
                *s = filter.run(*s);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        for f in &mut self.filters {
            f.reset_state();
        }
    }
}

/// Applies a room/environment send gain, modeling reverb-bus sends as a
/// pass-through scaled by `LayerParams::room_gain` rather than an actual
/// convolution reverb (out of scope per spec §2).
#[derive(Default)]
pub struct EnvironmentEffectNode;

impl NodeInstance for EnvironmentEffectNode {
    fn process(&mut self, params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        if let Some(input) = inputs.first() {
            AudioBuffer::copy(input, 0, out, 0, frame_count);
        }
        out.mul_assign_scalar(params.room_gain);
        Ok(())
    }
}

/// Equal-power stereo pan derived from the source's azimuth, for non-
/// ambisonic (stereo-only) pipelines.
#[derive(Default)]
pub struct StereoPanningNode;

impl NodeInstance for StereoPanningNode {
    fn output_channels(&self, _params: &LayerParams, _input_channels: usize) -> usize {
        2
    }

    fn process(&mut self, params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        let ae = direction_to_azimuth_elevation(params.direction);
        // Map azimuth [-pi, pi] to pan [-1, 1] (left .. right), then to
        // equal-power gains.
        let pan = (ae.azimuth / std::f32::consts::PI).clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4; // 0..pi/2
        let (left_gain, right_gain) = (angle.cos(), angle.sin());

        let mono: Vec<f32> = match inputs.first() {
            Some(input) if input.channel_count() >= 2 => {
                (0..frame_count).map(|i| 0.5 * (input.channel(0)[i] + input.channel(1)[i])).collect()
            }
            Some(input) => input.channel(0)[..frame_count].to_vec(),
            None => vec![0.0; frame_count],
        };

        for (i, &s) in mono.iter().enumerate() {
            out.channel_mut(0)[i] = s * left_gain;
            out.channel_mut(1)[i] = s * right_gain;
        }
        Ok(())
    }
}

/// Clamps every sample into `[-1, 1]` without the hard discontinuity a bare
/// `clamp` leaves at the boundary isn't attempted here — this is the
/// "soft ceiling" the spec calls `Clamp`, as distinct from `Clip`'s hard cut.
#[derive(Default)]
pub struct ClampNode;

impl NodeInstance for ClampNode {
    fn process(&mut self, _params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        if let Some(input) = inputs.first() {
            AudioBuffer::copy(input, 0, out, 0, frame_count);
        }
        for ch in 0..out.channel_count() {
            for s in &mut out.channel_mut(ch)[..frame_count] {
                *s = s.clamp(-1.0, 1.0);
            }
        }
        Ok(())
    }
}

/// Hard-clips samples outside `[-1, 1]`, logging when clipping actually
/// occurs so a caller can notice persistent overs.
#[derive(Default)]
pub struct ClipNode;

impl NodeInstance for ClipNode {
    fn process(&mut self, _params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        if let Some(input) = inputs.first() {
            AudioBuffer::copy(input, 0, out, 0, frame_count);
        }
        let mut clipped = false;
        for ch in 0..out.channel_count() {
            for s in &mut out.channel_mut(ch)[..frame_count] {
                if *s > 1.0 || *s < -1.0 {
                    clipped = true;
                    *s = s.clamp(-1.0, 1.0);
                }
            }
        }
        if clipped {
            tracing::debug!("clip node hard-clipped one or more samples");
        }
        Ok(())
    }
}

/// Sums any number of stereo producer buffers, for pipelines where multiple
/// sources converge before `OutputNode`.
#[derive(Default)]
pub struct StereoMixerNode;

impl NodeInstance for StereoMixerNode {
    fn max_producers(&self) -> usize {
        usize::MAX
    }

    fn output_channels(&self, _params: &LayerParams, _input_channels: usize) -> usize {
        2
    }

    fn process(&mut self, _params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        out.clear();
        for input in inputs {
            out.add_assign(input);
        }
        let _ = frame_count;
        Ok(())
    }
}

/// Encodes a mono/stereo-downmixed source into ACN/SN3D B-format using
/// [`ambisonics::encode`].
#[derive(Default)]
pub struct AmbisonicPanningNode;

impl NodeInstance for AmbisonicPanningNode {
    fn output_channels(&self, params: &LayerParams, _input_channels: usize) -> usize {
        ambisonics::channel_count(params.ambisonic_order)
    }

    fn process(&mut self, params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        let ae = direction_to_azimuth_elevation(params.direction);
        let coeffs = ambisonics::encode(params.ambisonic_order, ae, 1.0);

        let mono: Vec<f32> = match inputs.first() {
            Some(input) if input.channel_count() >= 2 => {
                (0..frame_count).map(|i| 0.5 * (input.channel(0)[i] + input.channel(1)[i])).collect()
            }
            Some(input) => input.channel(0)[..frame_count].to_vec(),
            None => vec![0.0; frame_count],
        };

        for (ch, &coeff) in coeffs.iter().enumerate() {
            for (i, &s) in mono.iter().enumerate() {
                out.channel_mut(ch)[i] = s * coeff;
            }
        }
        Ok(())
    }
}

/// Rotates an already-encoded B-format signal to account for listener
/// orientation, by re-deriving the encode direction with yaw/pitch applied
/// (see [`ambisonics::rotate_azimuth_elevation`] for the caveat this isn't a
/// full spherical-harmonics rotation matrix).
#[derive(Default)]
pub struct AmbisonicRotatorNode;

impl NodeInstance for AmbisonicRotatorNode {
    fn output_channels(&self, _params: &LayerParams, input_channels: usize) -> usize {
        input_channels
    }

    fn process(&mut self, params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        let Some(input) = inputs.first() else {
            return Ok(());
        };
        AudioBuffer::copy(input, 0, out, 0, frame_count);

        if params.listener_yaw == 0.0 && params.listener_pitch == 0.0 {
            return Ok(());
        }

        let ae = direction_to_azimuth_elevation(params.direction);
        let rotated = ambisonics::rotate_azimuth_elevation(ae, params.listener_yaw, params.listener_pitch);
        let original = ambisonics::encode(params.ambisonic_order, ae, 1.0);
        let target = ambisonics::encode(params.ambisonic_order, rotated, 1.0);

        // Re-weight each channel's trajectory from `original` towards
        // `target` in proportion to the W channel, preserving the signal's
        // amplitude envelope while steering its apparent direction.
        for ch in 0..out.channel_count().min(target.len()) {
            let from = original.get(ch).copied().unwrap_or(0.0);
            let to = target.get(ch).copied().unwrap_or(0.0);
            if from.abs() > 1e-6 {
                let scale = to / from;
                for s in out.channel_mut(ch) {
                    *s *= scale;
                }
            }
        }
        Ok(())
    }
}

/// Sums multiple B-format producer buffers into one soundfield, for
/// pipelines that must combine several ambisonic sources before decoding.
#[derive(Default)]
pub struct AmbisonicMixerNode;

impl NodeInstance for AmbisonicMixerNode {
    fn max_producers(&self) -> usize {
        usize::MAX
    }

    fn output_channels(&self, params: &LayerParams, _input_channels: usize) -> usize {
        ambisonics::channel_count(params.ambisonic_order)
    }

    fn process(&mut self, _params: &LayerParams, inputs: &[&AudioBuffer], _frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        out.clear();
        for input in inputs {
            out.add_assign(input);
        }
        Ok(())
    }
}

/// Decodes a B-format signal to stereo by convolving each ear's HRIR
/// against the soundfield's dominant direction, per spec §4.E
/// ("convolves against HRIR pairs sampled on a triangulated sphere").
pub struct AmbisonicBinauralDecoderNode {
    sampler: Arc<dyn Sampler>,
}

impl AmbisonicBinauralDecoderNode {
    pub fn new(sampler: Arc<dyn Sampler>) -> Self {
        Self { sampler }
    }

    fn convolve(signal: &[f32], ir: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0f32; signal.len()];
        for (i, &s) in signal.iter().enumerate() {
            if s == 0.0 {
                continue;
            }
            for (k, &h) in ir.iter().enumerate() {
                if i + k < out.len() {
                    out[i + k] += s * h;
                }
            }
        }
        out
    }
}

impl NodeInstance for AmbisonicBinauralDecoderNode {
    fn output_channels(&self, _params: &LayerParams, _input_channels: usize) -> usize {
        2
    }

    fn process(&mut self, params: &LayerParams, inputs: &[&AudioBuffer], frame_count: usize, out: &mut AudioBuffer) -> Result<()> {
        let Some(input) = inputs.first() else {
            return Ok(());
        };
        let w = &input.channel(0)[..frame_count];
        let (left_ir, right_ir, _left_delay, _right_delay) = self.sampler.sample(params.direction);

        let left = Self::convolve(w, &left_ir);
        let right = Self::convolve(w, &right_ir);
        out.channel_mut(0)[..frame_count].copy_from_slice(&left[..frame_count.min(left.len())]);
        out.channel_mut(1)[..frame_count].copy_from_slice(&right[..frame_count.min(right.len())]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_scales_by_gain() {
        let mut node = AttenuationNode;
        let mut input = AudioBuffer::new(4, 1).unwrap();
        input.channel_mut(0).fill(1.0);
        let mut out = AudioBuffer::new(4, 1).unwrap();
        let params = LayerParams { gain: 0.25, ..Default::default() };
        node.process(&params, &[&input], 4, &mut out).unwrap();
        assert!(out.channel(0).iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn clip_node_hard_limits() {
        let mut node = ClipNode;
        let mut input = AudioBuffer::new(2, 1).unwrap();
        input.channel_mut(0).copy_from_slice(&[2.0, -2.0]);
        let mut out = AudioBuffer::new(2, 1).unwrap();
        node.process(&LayerParams::default(), &[&input], 2, &mut out).unwrap();
        assert_eq!(out.channel(0), [1.0, -1.0]);
    }

    #[test]
    fn ambisonic_panning_produces_expected_channel_count() {
        let mut node = AmbisonicPanningNode;
        let mut input = AudioBuffer::new(4, 1).unwrap();
        input.channel_mut(0).fill(1.0);
        let params = LayerParams { ambisonic_order: 1, ..Default::default() };
        let mut out = AudioBuffer::new(4, ambisonics::channel_count(1)).unwrap();
        node.process(&params, &[&input], 4, &mut out).unwrap();
        assert!((out.channel(0)[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn occlusion_is_no_op_at_zero_amount() {
        let mut node = OcclusionNode::new(48_000.0);
        let mut input = AudioBuffer::new(8, 1).unwrap();
        input.channel_mut(0).copy_from_slice(&[1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
        let mut out = AudioBuffer::new(8, 1).unwrap();
        node.process(&LayerParams::default(), &[&input], 8, &mut out).unwrap();
        assert_eq!(out.channel(0), input.channel(0));
    }
}

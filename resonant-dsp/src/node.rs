//! Node identifiers and the per-tick parameters every node reads from the
//! owning mixer layer, mirroring how `Mixer/Pipeline.cpp::Execute` assigns
//! `node.second->_layer = layer` before pulling the output node.

use resonant_core::math::Vec3;

pub type NodeId = u32;

/// Reserved node ids, matching `Pipeline::Pipeline()` wiring the input node
/// at id 1 and output node at id 2 before any processor is appended. We
/// start at 0/1 since Rust has no pool-allocator id counter to share.
pub const INPUT_NODE_ID: NodeId = 0;
pub const OUTPUT_NODE_ID: NodeId = 1;

/// Read-only per-tick parameters a node instance consults while processing.
/// Owned by the calling layer/channel, not by the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct LayerParams {
    pub sample_rate: u32,
    pub gain: f32,
    pub distance: f32,
    pub occlusion: f32,
    pub obstruction: f32,
    pub room_gain: f32,
    /// Source direction relative to the listener, already in listener space.
    pub direction: Vec3,
    /// Listener yaw/pitch applied by `AmbisonicRotator`.
    pub listener_yaw: f32,
    pub listener_pitch: f32,
    pub ambisonic_order: u8,
}

impl Default for LayerParams {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            gain: 1.0,
            distance: 1.0,
            occlusion: 0.0,
            obstruction: 0.0,
            room_gain: 1.0,
            direction: Vec3::Z,
            listener_yaw: 0.0,
            listener_pitch: 0.0,
            ambisonic_order: 1,
        }
    }
}

/// A single DSP pipeline node's behavior and private state, instantiated
/// once per layer (spec's "per-layer instance with caching and `Reset()`").
pub trait NodeInstance: Send {
    /// Number of channels this node writes into its output buffer. Most
    /// nodes pass their input's channel count through; ambisonic nodes
    /// derive it from `LayerParams::ambisonic_order`.
    fn output_channels(&self, params: &LayerParams, input_channels: usize) -> usize {
        let _ = params;
        input_channels
    }

    /// Upper bound on how many producer edges this node accepts.
    /// `Output`/processors default to one; mixer-style nodes override this.
    fn max_producers(&self) -> usize {
        1
    }

    /// Lower bound on how many producer edges this node requires.
    /// Every node needs at least one upstream source except `InputNode`,
    /// which is the graph's own source and overrides this to `0`.
    fn min_producers(&self) -> usize {
        1
    }

    fn process(
        &mut self,
        params: &LayerParams,
        inputs: &[&resonant_buffer::AudioBuffer],
        frame_count: usize,
        out: &mut resonant_buffer::AudioBuffer,
    ) -> resonant_core::Result<()>;

    /// Clears internal filter/convolution state (fader crossfades, biquad
    /// delay lines, ...). Called when a layer is recycled for a new sound.
    fn reset(&mut self) {}
}

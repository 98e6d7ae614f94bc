//! The built-in default pipeline shape used when no `pipeline.file` is
//! configured: `Input -> Attenuation -> StereoPanning -> Clip -> Output`,
//! a minimal but complete spatial chain exercising the distance-gain,
//! stereo-pan and safety-clip nodes from spec §4.E's table.

use std::sync::Arc;

use resonant_dsp::node::{INPUT_NODE_ID, OUTPUT_NODE_ID};
use resonant_dsp::nodes::{AttenuationNode, ClipNode, StereoPanningNode};
use resonant_dsp::{Pipeline, PipelineBuilder};

pub fn default_stereo_pipeline() -> Arc<Pipeline> {
    let mut builder = PipelineBuilder::new();
    let attenuation = builder.add_node(|| Box::new(AttenuationNode));
    let pan = builder.add_node(|| Box::new(StereoPanningNode));
    let clip = builder.add_node(|| Box::new(ClipNode));

    builder.connect(attenuation, INPUT_NODE_ID).expect("input -> attenuation");
    builder.connect(pan, attenuation).expect("attenuation -> pan");
    builder.connect(clip, pan).expect("pan -> clip");
    builder.connect(OUTPUT_NODE_ID, clip).expect("clip -> output");

    Arc::new(builder.build().expect("default pipeline topology is valid"))
}

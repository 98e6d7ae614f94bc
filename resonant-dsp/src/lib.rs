//! The DSP pipeline graph (spec §4.E): a small DAG of nodes pulled once per
//! mixer tick, instantiated per layer so filter/convolution state never
//! leaks between unrelated sounds sharing the same pipeline shape.

pub mod ambisonics;
pub mod graph;
pub mod node;
pub mod nodes;

pub use graph::{Pipeline, PipelineBuilder, PipelineInstance};
pub use node::{LayerParams, NodeId, NodeInstance, INPUT_NODE_ID, OUTPUT_NODE_ID};

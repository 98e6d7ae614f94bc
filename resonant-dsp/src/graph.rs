//! The pipeline graph itself: topology validation and per-layer
//! instantiation/execution. Grounded on `Mixer/Pipeline.cpp`'s node map plus
//! `Connect()`-built producer edges, but evaluated via a precomputed
//! topological order instead of the original's output-node-pulls-its-
//! producer recursion — equivalent result, without the aliasing problems a
//! literal recursive walk over `Box<dyn NodeInstance>` trait objects would
//! hit in Rust.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use resonant_buffer::AudioBuffer;
use resonant_core::{Error, Result};

use crate::node::{LayerParams, NodeInstance, INPUT_NODE_ID, OUTPUT_NODE_ID};

type Factory = dyn Fn() -> Box<dyn NodeInstance> + Send + Sync;

/// BFS over `edges` (node id -> adjacent node ids) starting at `start`,
/// returning every node id visited. Used in both directions: forward over
/// `dependents` for "reachable from input", backward over `producers` for
/// "reaches the output".
fn reachable(
    start: crate::node::NodeId,
    edges: &HashMap<crate::node::NodeId, Vec<crate::node::NodeId>>,
) -> HashSet<crate::node::NodeId> {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(neighbors) = edges.get(&id) {
            stack.extend(neighbors.iter().copied());
        }
    }
    visited
}

struct NodeSlot {
    factory: Box<Factory>,
    producers: Vec<crate::node::NodeId>,
}

/// Shared, immutable graph topology. Cheap to clone (wrap in `Arc`) across
/// every layer that plays through the same pipeline shape.
pub struct Pipeline {
    nodes: HashMap<crate::node::NodeId, NodeSlot>,
    topo_order: Vec<crate::node::NodeId>,
}

pub struct PipelineBuilder {
    nodes: HashMap<crate::node::NodeId, NodeSlot>,
    next_id: crate::node::NodeId,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            INPUT_NODE_ID,
            NodeSlot { factory: Box::new(|| Box::new(crate::nodes::InputNode) as Box<dyn NodeInstance>), producers: Vec::new() },
        );
        nodes.insert(
            OUTPUT_NODE_ID,
            NodeSlot { factory: Box::new(|| Box::new(crate::nodes::OutputNode) as Box<dyn NodeInstance>), producers: Vec::new() },
        );
        Self { nodes, next_id: 2 }
    }

    /// Registers a new processor node and returns its id, unconnected.
    pub fn add_node(&mut self, factory: impl Fn() -> Box<dyn NodeInstance> + Send + Sync + 'static) -> crate::node::NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, NodeSlot { factory: Box::new(factory), producers: Vec::new() });
        id
    }

    /// Connects `producer` as a data source for `consumer` (spec: `Connect`).
    pub fn connect(&mut self, consumer: crate::node::NodeId, producer: crate::node::NodeId) -> Result<()> {
        let max = {
            let slot = self.nodes.get(&consumer).ok_or_else(|| Error::InvalidParameter(format!("unknown node {consumer}")))?;
            (slot.factory)().max_producers()
        };
        let slot = self.nodes.get_mut(&consumer).unwrap();
        if slot.producers.len() >= max {
            return Err(Error::InvalidConfiguration(format!(
                "node {consumer} already has {} producer(s), max is {max}",
                slot.producers.len()
            )));
        }
        slot.producers.push(producer);
        Ok(())
    }

    /// Validates acyclicity and input→output reachability, then freezes the
    /// topology into an executable [`Pipeline`].
    pub fn build(self) -> Result<Pipeline> {
        // Kahn's algorithm over the consumer -> producers edges (an edge
        // here means "consumer depends on producer", so in-degree is the
        // producer count and we peel off nodes with all producers resolved).
        let mut in_degree: HashMap<_, _> = self.nodes.iter().map(|(id, slot)| (*id, slot.producers.len())).collect();
        let mut dependents: HashMap<crate::node::NodeId, Vec<crate::node::NodeId>> = HashMap::new();
        for (id, slot) in &self.nodes {
            for p in &slot.producers {
                dependents.entry(*p).or_default().push(*id);
            }
        }

        let mut ready: Vec<_> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(id, _)| *id).collect();
        ready.sort_unstable();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop() {
            order.push(id);
            if let Some(deps) = dependents.get(&id) {
                for d in deps {
                    let deg = in_degree.get_mut(d).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(*d);
                    }
                }
            }
            ready.sort_unstable();
        }

        if order.len() != self.nodes.len() {
            return Err(Error::InvalidConfiguration("pipeline graph contains a cycle".into()));
        }

        for (id, slot) in &self.nodes {
            let instance = (slot.factory)();
            let count = slot.producers.len();
            if count < instance.min_producers() || count > instance.max_producers() {
                return Err(Error::InvalidConfiguration(format!(
                    "node {id} has {count} producer(s), expected {}..={}",
                    instance.min_producers(),
                    instance.max_producers()
                )));
            }
        }

        let reachable_from_input = reachable(INPUT_NODE_ID, &dependents);
        let mut producers: HashMap<crate::node::NodeId, Vec<crate::node::NodeId>> = HashMap::new();
        for (id, slot) in &self.nodes {
            producers.insert(*id, slot.producers.clone());
        }
        let reaches_output = reachable(OUTPUT_NODE_ID, &producers);

        for id in self.nodes.keys() {
            if !reachable_from_input.contains(id) {
                return Err(Error::InvalidConfiguration(format!("node {id} is unreachable from the input node")));
            }
            if !reaches_output.contains(id) {
                return Err(Error::InvalidConfiguration(format!("node {id} does not reach the output node")));
            }
        }

        Ok(Pipeline { nodes: self.nodes, topo_order: order })
    }
}

impl Pipeline {
    pub fn instantiate(self: &Arc<Self>) -> PipelineInstance {
        let instances = self.nodes.iter().map(|(id, slot)| (*id, (slot.factory)())).collect();
        PipelineInstance { pipeline: Arc::clone(self), instances, buffers: HashMap::new() }
    }
}

/// Per-layer pipeline state: owns each node's private `NodeInstance` and a
/// cache of per-node output buffers reused across ticks.
pub struct PipelineInstance {
    pipeline: Arc<Pipeline>,
    instances: HashMap<crate::node::NodeId, Box<dyn NodeInstance>>,
    buffers: HashMap<crate::node::NodeId, AudioBuffer>,
}

impl PipelineInstance {
    pub fn execute(&mut self, params: &LayerParams, input: &AudioBuffer, output: &mut AudioBuffer) -> Result<()> {
        let frame_count = input.frame_count();

        for &id in &self.pipeline.topo_order {
            if id == INPUT_NODE_ID {
                let needs_realloc = match self.buffers.get(&id) {
                    Some(b) => b.frame_count() != frame_count || b.channel_count() != input.channel_count(),
                    None => true,
                };
                if needs_realloc {
                    self.buffers.insert(id, AudioBuffer::new(frame_count, input.channel_count())?);
                }
                let buf = self.buffers.get_mut(&id).unwrap();
                AudioBuffer::copy(input, 0, buf, 0, frame_count);
                continue;
            }

            let slot = &self.pipeline.nodes[&id];
            let producer_channels = slot
                .producers
                .first()
                .and_then(|p| self.buffers.get(p))
                .map(|b| b.channel_count())
                .unwrap_or_else(|| input.channel_count());
            let out_channels = self.instances[&id].output_channels(params, producer_channels);

            let mut scratch = AudioBuffer::new(frame_count, out_channels)?;
            {
                let producer_bufs: Vec<&AudioBuffer> = slot.producers.iter().map(|p| &self.buffers[p]).collect();
                let node = self.instances.get_mut(&id).unwrap();
                node.process(params, &producer_bufs, frame_count, &mut scratch)?;
            }
            self.buffers.insert(id, scratch);
        }

        let out_buf = self.buffers.get(&OUTPUT_NODE_ID).expect("output node always runs");
        AudioBuffer::copy(out_buf, 0, output, 0, frame_count.min(output.frame_count()));
        Ok(())
    }

    /// Clears every node's private state, e.g. when a layer starts a new
    /// sound instance after being recycled (spec's per-layer `Reset()`).
    pub fn reset(&mut self) {
        for node in self.instances.values_mut() {
            node.reset();
        }
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{AttenuationNode, OcclusionNode};

    fn linear_pipeline() -> Arc<Pipeline> {
        let mut b = PipelineBuilder::new();
        let atten = b.add_node(|| Box::new(AttenuationNode::default()));
        let occl = b.add_node(|| Box::new(OcclusionNode::new(48_000.0)));
        b.connect(atten, INPUT_NODE_ID).unwrap();
        b.connect(occl, atten).unwrap();
        b.connect(OUTPUT_NODE_ID, occl).unwrap();
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn executes_input_to_output_through_chain() {
        let pipeline = linear_pipeline();
        let mut instance = pipeline.instantiate();
        let mut input = AudioBuffer::new(16, 2).unwrap();
        input.channel_mut(0).fill(1.0);
        input.channel_mut(1).fill(1.0);
        let mut output = AudioBuffer::new(16, 2).unwrap();

        let params = LayerParams { gain: 0.5, occlusion: 0.0, ..Default::default() };
        instance.execute(&params, &input, &mut output).unwrap();

        assert!(output.channel(0).iter().all(|&s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn rejects_cyclic_graphs() {
        let mut b = PipelineBuilder::new();
        let a = b.add_node(|| Box::new(AttenuationNode::default()));
        let c = b.add_node(|| Box::new(AttenuationNode::default()));
        b.connect(a, INPUT_NODE_ID).unwrap();
        b.connect(c, a).unwrap();
        b.connect(a, c).unwrap();
        assert!(b.build().is_err());
    }

    #[test]
    fn rejects_unreachable_output() {
        let b = PipelineBuilder::new();
        assert!(b.build().is_err());
    }

    #[test]
    fn rejects_a_node_with_no_producers() {
        let mut b = PipelineBuilder::new();
        // A valid input-to-output chain, plus an orphan node nothing feeds
        // and that feeds nothing: previously `build()` accepted this since
        // only the output node's producer count was checked.
        let atten = b.add_node(|| Box::new(AttenuationNode::default()));
        b.connect(atten, INPUT_NODE_ID).unwrap();
        b.connect(OUTPUT_NODE_ID, atten).unwrap();
        b.add_node(|| Box::new(AttenuationNode::default()));

        assert!(b.build().is_err());
    }
}

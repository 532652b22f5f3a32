//! In-memory pipeline graph representation
//!
//! The graph owns heterogeneous nodes behind the `PipelineNode` trait and a
//! flat edge list. Edges connect a producer's tagged output to a consumer
//! node. Replacing a node is atomic: either every edge touching the old node
//! is repointed to the replacement, or the graph is left untouched.

pub mod node;
pub mod nodes;

pub use node::{NodeId, OutputHandle, PipelineNode};
pub use nodes::{FieldTransform, OpaqueSink, RecordSource};

use std::collections::BTreeMap;

use log::debug;

use crate::core::error::{GraphError, PipelineResult};

/// A directed edge from a producer output to a consumer node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: OutputHandle,
    pub to: NodeId,
}

/// The pipeline graph under construction.
#[derive(Debug, Default)]
pub struct PipelineGraph {
    nodes: BTreeMap<NodeId, Box<dyn PipelineNode>>,
    edges: Vec<Edge>,
    next_id: u64,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            next_id: 0,
        }
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_node(&mut self, node: Box<dyn PipelineNode>) -> NodeId {
        let id = self.alloc_id();
        self.nodes.insert(id, node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn PipelineNode> {
        self.nodes.get(&id).map(|node| &**node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Connect a producer output to a consumer node. Both endpoints must
    /// exist and the producer must declare the tag.
    pub fn connect(&mut self, from: OutputHandle, to: NodeId) -> PipelineResult<()> {
        let producer = self
            .nodes
            .get(&from.node)
            .ok_or(GraphError::NodeNotFound(from.node))?;
        if !producer.output_tags().iter().any(|t| *t == from.tag) {
            return Err(GraphError::UnknownOutputTag {
                node: producer.name().to_string(),
                tag: from.tag.clone(),
            }
            .into());
        }
        if !self.nodes.contains_key(&to) {
            return Err(GraphError::NodeNotFound(to).into());
        }
        self.edges.push(Edge { from, to });
        Ok(())
    }

    /// Consumers reading one producer output, each with the ordinal of the
    /// edge among all edges into that consumer (its input index).
    pub fn consumers_of(&self, output: &OutputHandle) -> Vec<(NodeId, usize)> {
        let mut input_counts: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut consumers = Vec::new();
        for edge in &self.edges {
            let index = {
                let count = input_counts.entry(edge.to).or_insert(0);
                let current = *count;
                *count += 1;
                current
            };
            if edge.from == *output {
                consumers.push((edge.to, index));
            }
        }
        consumers
    }

    /// The upstream outputs a node reads, in connection order.
    pub fn inputs_of(&self, id: NodeId) -> Vec<OutputHandle> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from.clone())
            .collect()
    }

    /// Replace a node with a drop-in substitute under a fresh id.
    ///
    /// Every edge leaving any output of `old` is repointed to the
    /// replacement's same-tagged output, and every edge entering `old` is
    /// repointed into the replacement. Tag parity is validated before any
    /// mutation, so a failure leaves the graph unchanged.
    pub fn replace_node(
        &mut self,
        old: NodeId,
        replacement: Box<dyn PipelineNode>,
    ) -> PipelineResult<NodeId> {
        let old_node = self.nodes.get(&old).ok_or(GraphError::NodeNotFound(old))?;
        let old_name = old_node.name().to_string();
        let old_tags = old_node.output_tags();
        let new_tags = replacement.output_tags();
        for tag in old_tags {
            if !new_tags.iter().any(|t| *t == tag) {
                return Err(GraphError::ReplacementOutputMismatch {
                    node: old_name,
                    tag,
                }
                .into());
            }
        }
        let new_id = self.alloc_id();
        debug!(
            "replacing node {} '{}' with '{}' as {}",
            old,
            old_name,
            replacement.name(),
            new_id
        );
        for edge in &mut self.edges {
            if edge.from.node == old {
                edge.from.node = new_id;
            }
            if edge.to == old {
                edge.to = new_id;
            }
        }
        self.nodes.remove(&old);
        self.nodes.insert(new_id, replacement);
        Ok(new_id)
    }

    /// Check full connectivity: every edge references live nodes and a
    /// declared output tag.
    pub fn validate(&self) -> PipelineResult<()> {
        for edge in &self.edges {
            let producer = self
                .nodes
                .get(&edge.from.node)
                .ok_or(GraphError::DanglingEdge(edge.from.node))?;
            if !producer.output_tags().iter().any(|t| *t == edge.from.tag) {
                return Err(GraphError::UnknownOutputTag {
                    node: producer.name().to_string(),
                    tag: edge.from.tag.clone(),
                }
                .into());
            }
            if !self.nodes.contains_key(&edge.to) {
                return Err(GraphError::DanglingEdge(edge.to).into());
            }
        }
        Ok(())
    }
}

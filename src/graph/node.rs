//! Node identity and the pipeline node abstraction
//!
//! Every node owns one or more tagged outputs. Downstream edges address a
//! producer output through an `OutputHandle`; the tag is the externally
//! stable part of the handle, while the `NodeId` changes when a node is
//! replaced during optimization (identity is never reused).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::schema::Schema;
use crate::optimizer::field_access::FieldAccessDescriptor;
use crate::optimizer::producer::ProjectionProducer;

/// Opaque node identity within one pipeline graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Addresses one tagged output of one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputHandle {
    pub node: NodeId,
    pub tag: String,
}

impl OutputHandle {
    pub fn new(node: NodeId, tag: impl Into<String>) -> Self {
        Self {
            node,
            tag: tag.into(),
        }
    }
}

impl fmt::Display for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.tag)
    }
}

/// A node in the pipeline graph.
///
/// The optimizer operates only against this trait and the
/// `ProjectionProducer` capability trait layered on top of it; concrete node
/// kinds stay opaque to the pass.
pub trait PipelineNode: fmt::Debug {
    /// Human-readable node name, used in diagnostics.
    fn name(&self) -> &str;

    /// Tags of the outputs this node declares, in declaration order.
    fn output_tags(&self) -> Vec<String>;

    /// Declared schema of one output, if the tag exists.
    fn output_schema(&self, tag: &str) -> Option<&Schema>;

    /// Which fields this node reads from its input at `input_index` (the
    /// ordinal of the incoming edge, in connection order). `None` means the
    /// requirement cannot be statically determined and the optimizer must
    /// assume all fields.
    fn required_fields(&self, input_index: usize) -> Option<FieldAccessDescriptor> {
        let _ = input_index;
        None
    }

    /// Downcast hook for the projection pushdown capability.
    fn as_projection_producer(&self) -> Option<&dyn ProjectionProducer> {
        None
    }
}

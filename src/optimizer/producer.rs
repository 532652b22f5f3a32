//! The projection pushdown capability contract
//!
//! Implemented by any node kind that owns access to raw underlying data and
//! can configure a narrower read plan. The optimizer operates only against
//! this trait; concrete producer kinds stay opaque to it.

use crate::core::error::PushdownError;
use crate::graph::node::PipelineNode;
use crate::optimizer::capability::ProjectSupportSet;
use crate::optimizer::field_access::FieldAccessDescriptor;

pub trait ProjectionProducer: PipelineNode {
    /// What kinds of projection support this node offers.
    ///
    /// Pure and side-effect-free; must return a stable answer for a given
    /// node configuration. An empty set is a valid, common answer meaning
    /// the node can only ever produce a fixed set of fields.
    fn supports_projection_pushdown(&self) -> ProjectSupportSet;

    /// Actuate a projection pushdown on one output.
    ///
    /// `output_id` must name one of this node's outputs and `fields` must be
    /// satisfiable under the advertised capability set; violating either is
    /// an error, never silently ignored. The returned node is a drop-in
    /// replacement for `self`: identical in every observable behavior except
    /// the narrowed field set on the targeted output. `self` is not mutated;
    /// callers discard it and use only the replacement.
    fn actuate_projection_pushdown(
        &self,
        output_id: &str,
        fields: &FieldAccessDescriptor,
    ) -> Result<Box<dyn PipelineNode>, PushdownError>;
}

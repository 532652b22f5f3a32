//! Concrete pipeline node kinds
//!
//! `RecordSource` is the schema-aware producer the pushdown pass targets;
//! `FieldTransform` and `OpaqueSink` are the downstream consumer kinds used
//! to aggregate field requirements. Execution of these nodes lives outside
//! this crate; here they carry only the structure the optimizer inspects.

use indexmap::IndexMap;
use log::debug;

use crate::core::error::PushdownError;
use crate::core::schema::Schema;
use crate::graph::node::PipelineNode;
use crate::optimizer::capability::{ProjectSupport, ProjectSupportSet};
use crate::optimizer::field_access::FieldAccessDescriptor;
use crate::optimizer::producer::ProjectionProducer;

/// One tagged output of a `RecordSource`: a dataset with its declared
/// schema and, after actuation, the projection applied to it.
#[derive(Debug, Clone)]
struct SourceOutput {
    dataset: String,
    schema: Schema,
    projection: Option<FieldAccessDescriptor>,
}

/// A schema-aware producer reading named datasets, one per output tag.
///
/// Implements `ProjectionProducer`: actuation yields a new `RecordSource`
/// whose targeted output carries the narrowed schema and remembers the
/// applied projection; every other output is untouched.
#[derive(Debug, Clone)]
pub struct RecordSource {
    name: String,
    support: ProjectSupportSet,
    outputs: IndexMap<String, SourceOutput>,
}

impl RecordSource {
    pub fn new(name: impl Into<String>, support: ProjectSupportSet) -> Self {
        Self {
            name: name.into(),
            support,
            outputs: IndexMap::new(),
        }
    }

    pub fn with_output(
        mut self,
        tag: impl Into<String>,
        dataset: impl Into<String>,
        schema: Schema,
    ) -> Self {
        self.outputs.insert(
            tag.into(),
            SourceOutput {
                dataset: dataset.into(),
                schema,
                projection: None,
            },
        );
        self
    }

    pub fn dataset(&self, tag: &str) -> Option<&str> {
        self.outputs.get(tag).map(|o| o.dataset.as_str())
    }

    /// The projection applied to one output by a previous actuation, if any.
    pub fn projection(&self, tag: &str) -> Option<&FieldAccessDescriptor> {
        self.outputs.get(tag).and_then(|o| o.projection.as_ref())
    }
}

impl PipelineNode for RecordSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_tags(&self) -> Vec<String> {
        self.outputs.keys().cloned().collect()
    }

    fn output_schema(&self, tag: &str) -> Option<&Schema> {
        self.outputs.get(tag).map(|o| &o.schema)
    }

    fn as_projection_producer(&self) -> Option<&dyn ProjectionProducer> {
        Some(self)
    }
}

impl ProjectionProducer for RecordSource {
    fn supports_projection_pushdown(&self) -> ProjectSupportSet {
        self.support
    }

    fn actuate_projection_pushdown(
        &self,
        output_id: &str,
        fields: &FieldAccessDescriptor,
    ) -> Result<Box<dyn PipelineNode>, PushdownError> {
        let output = self
            .outputs
            .get(output_id)
            .ok_or_else(|| PushdownError::UnknownOutput {
                node: self.name.clone(),
                output_id: output_id.to_string(),
            })?;

        // Identity pushdown: nothing to narrow, the replacement is
        // observably equivalent to the original.
        if fields.is_all_fields() {
            return Ok(Box::new(self.clone()));
        }

        fields.validate(&output.schema)?;

        let native = output.schema.field_names();
        let reordered = !fields.preserves_order(&native);
        let required = if reordered {
            ProjectSupport::WithFieldReordering
        } else {
            ProjectSupport::WithoutFieldReordering
        };
        if !self.support.satisfies(required) {
            return Err(PushdownError::CapabilityMismatch {
                node: self.name.clone(),
                output_id: output_id.to_string(),
                required,
            });
        }

        let narrowed = if reordered {
            output.schema.project_reordered(fields)?
        } else {
            output.schema.project(fields)?
        };
        debug!(
            "source '{}' narrowing output '{}' of dataset '{}' to [{}]",
            self.name, output_id, output.dataset, fields
        );

        let mut replacement = self.clone();
        if let Some(slot) = replacement.outputs.get_mut(output_id) {
            slot.schema = narrowed;
            slot.projection = Some(fields.clone());
        }
        Ok(Box::new(replacement))
    }
}

/// A consumer/producer that reads a statically known set of fields from its
/// single input and emits records under its own declared schema.
#[derive(Debug, Clone)]
pub struct FieldTransform {
    name: String,
    reads: FieldAccessDescriptor,
    output_schema: Schema,
}

impl FieldTransform {
    pub fn new(
        name: impl Into<String>,
        reads: FieldAccessDescriptor,
        output_schema: Schema,
    ) -> Self {
        Self {
            name: name.into(),
            reads,
            output_schema,
        }
    }

    pub fn reads(&self) -> &FieldAccessDescriptor {
        &self.reads
    }
}

impl PipelineNode for FieldTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_tags(&self) -> Vec<String> {
        vec!["out".to_string()]
    }

    fn output_schema(&self, tag: &str) -> Option<&Schema> {
        (tag == "out").then_some(&self.output_schema)
    }

    fn required_fields(&self, _input_index: usize) -> Option<FieldAccessDescriptor> {
        Some(self.reads.clone())
    }
}

/// A consumer whose field requirements cannot be statically determined.
/// The optimizer must assume it reads every field of its inputs.
#[derive(Debug, Clone)]
pub struct OpaqueSink {
    name: String,
}

impl OpaqueSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl PipelineNode for OpaqueSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn output_schema(&self, _tag: &str) -> Option<&Schema> {
        None
    }
}

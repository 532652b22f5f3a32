//! Core value types shared across the crate

pub mod error;
pub mod schema;

pub use error::{GraphError, PipelineError, PipelineResult, PushdownError, SchemaError};
pub use schema::{Field, FieldKind, Schema};

//! Projection pushdown negotiation and actuation

pub mod capability;
pub mod field_access;
pub mod producer;
pub mod pushdown;

pub use capability::{ProjectSupport, ProjectSupportSet};
pub use field_access::{FieldAccessDescriptor, FieldPath};
pub use producer::ProjectionProducer;
pub use pushdown::{PassReport, ProjectionPushdownPass};

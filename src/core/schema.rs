//! Schema surface consumed by the pushdown protocol
//!
//! The crate does not own the type system; it only needs enough structure to
//! validate field paths (including nested and repeated fields) and to expose
//! the native field order of a producer output. A path step into a `List`
//! addresses the element type, so `items.price` is well-formed when `items`
//! is a repeated struct.

use serde::{Deserialize, Serialize};

use crate::core::error::SchemaError;
use crate::optimizer::field_access::{FieldAccessDescriptor, FieldPath};

/// Declared schema of one producer output: an ordered list of named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

/// A single named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// Field type, with just enough structure for path resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    Int64,
    Float64,
    String,
    Bytes,
    Struct(Schema),
    List(Box<FieldKind>),
}

impl FieldKind {
    /// Unwrap repeated layers; `List<List<Struct>>` resolves to the struct.
    fn element(&self) -> &FieldKind {
        let mut kind = self;
        while let FieldKind::List(inner) = kind {
            kind = inner;
        }
        kind
    }
}

impl Schema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in native (declaration) order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check that `path` resolves against this schema, descending through
    /// nested structs and repeated fields.
    pub fn check_path(&self, path: &FieldPath) -> Result<(), SchemaError> {
        let segments = path.segments();
        let mut schema = self;
        for (i, segment) in segments.iter().enumerate() {
            let field = schema.field(segment).ok_or_else(|| SchemaError::NoSuchField {
                path: path.to_string(),
            })?;
            if i + 1 == segments.len() {
                return Ok(());
            }
            match field.kind.element() {
                FieldKind::Struct(nested) => schema = nested,
                _ => {
                    return Err(SchemaError::NotNested {
                        path: path.to_string(),
                        field: field.name.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Narrow this schema to the fields a descriptor requires, keeping the
    /// native field order among retained fields.
    pub fn project(&self, fields: &FieldAccessDescriptor) -> Result<Schema, SchemaError> {
        if fields.is_all_fields() {
            return Ok(self.clone());
        }
        let mut projected = Schema::new();
        for field in &self.fields {
            if let Some(narrowed) = project_field(field, fields)? {
                projected.fields.push(narrowed);
            }
        }
        Ok(projected)
    }

    /// Narrow this schema to the fields a descriptor requires, ordering the
    /// retained top-level fields by the descriptor's own path order.
    pub fn project_reordered(&self, fields: &FieldAccessDescriptor) -> Result<Schema, SchemaError> {
        if fields.is_all_fields() {
            return Ok(self.clone());
        }
        let mut projected = Schema::new();
        for name in fields.top_level_fields() {
            let field = self.field(name).ok_or_else(|| SchemaError::NoSuchField {
                path: name.to_string(),
            })?;
            if let Some(narrowed) = project_field(field, fields)? {
                projected.fields.push(narrowed);
            }
        }
        Ok(projected)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

/// Narrow one field. Returns `None` when the descriptor does not require it.
/// A path naming the field alone keeps the whole subtree; deeper paths narrow
/// the nested struct recursively, through repeated layers.
fn project_field(
    field: &Field,
    fields: &FieldAccessDescriptor,
) -> Result<Option<Field>, SchemaError> {
    let mut whole = false;
    let mut tails = Vec::new();
    for path in fields.paths() {
        if path.first() != Some(field.name.as_str()) {
            continue;
        }
        match path.tail() {
            None => whole = true,
            Some(tail) => tails.push(tail),
        }
    }
    if whole {
        return Ok(Some(field.clone()));
    }
    if tails.is_empty() {
        return Ok(None);
    }
    let sub = FieldAccessDescriptor::with_paths(tails);
    let kind = project_kind(&field.kind, &field.name, &sub)?;
    Ok(Some(Field {
        name: field.name.clone(),
        kind,
    }))
}

fn project_kind(
    kind: &FieldKind,
    field_name: &str,
    sub: &FieldAccessDescriptor,
) -> Result<FieldKind, SchemaError> {
    match kind {
        FieldKind::Struct(nested) => Ok(FieldKind::Struct(nested.project(sub)?)),
        FieldKind::List(inner) => Ok(FieldKind::List(Box::new(project_kind(
            inner, field_name, sub,
        )?))),
        _ => Err(SchemaError::NotNested {
            path: sub
                .paths()
                .next()
                .map(|p| format!("{}.{}", field_name, p))
                .unwrap_or_else(|| field_name.to_string()),
            field: field_name.to_string(),
        }),
    }
}

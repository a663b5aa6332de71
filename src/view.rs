//! View definitions: the accessor surface a schema implies for the
//! instances wrapped with it.
//!
//! Definitions are cached per schema content, so every structurally equal
//! schema hands out the very same [`ViewDefinition`].

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use crate::error::Error;
use crate::schema::Schema;
use crate::types::Shape;

/// Capability flag and accessor names derived from one schema.
#[derive(Debug)]
pub struct ViewDefinition {
    schema_id: String,
    shape: Shape,
    accessors: BTreeSet<String>,
    bound_name: OnceLock<String>,
}

impl ViewDefinition {
    fn build(schema: &Schema) -> Result<Self, Error> {
        let shape = if schema.describes_object()? {
            Shape::Object
        } else if schema.describes_array()? {
            Shape::Array
        } else {
            Shape::Scalar
        };
        let accessors = if shape.is_object() {
            schema.described_object_property_names()?.as_ref().clone()
        } else {
            BTreeSet::new()
        };
        Ok(ViewDefinition {
            schema_id: schema.schema_id().to_string(),
            shape,
            accessors,
            bound_name: OnceLock::new(),
        })
    }

    /// Identifier of the schema this definition was first built for.
    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    /// Whether instances are treated as objects, arrays, or neither.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn accessors(&self) -> impl Iterator<Item = &str> {
        self.accessors.iter().map(String::as_str)
    }

    pub fn has_accessor(&self, name: &str) -> bool {
        self.accessors.contains(name)
    }

    /// Attach a display name. Only the first binding takes effect; returns
    /// whether this call was it.
    pub fn bind_name(&self, name: impl Into<String>) -> bool {
        self.bound_name.set(name.into()).is_ok()
    }

    /// The bound display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.bound_name.get().map(String::as_str)
    }

    /// The bound name, falling back to the schema identifier.
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or(&self.schema_id)
    }

    /// Serializable snapshot including the bound name.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "schema_id": self.schema_id,
            "shape": self.shape,
            "accessors": self.accessors,
            "name": self.name(),
        })
    }
}

/// The view definition for `schema`, built on first request.
///
/// Returns the identical definition for every schema equal to `schema`.
///
/// # Errors
///
/// Returns the error raised while inferring the schema's shape or property
/// names; nothing is cached in that case.
pub fn view_for(schema: &Schema) -> Result<Arc<ViewDefinition>, Error> {
    schema
        .context()
        .views
        .get_or_try_insert(schema.key().clone(), || {
            let definition = ViewDefinition::build(schema)?;
            tracing::debug!(
                schema = %definition.schema_id,
                shape = ?definition.shape,
                accessors = definition.accessors.len(),
                "built view definition"
            );
            Ok(Arc::new(definition))
        })
}

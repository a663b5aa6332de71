//! The validation collaborator.
//!
//! Validation itself is delegated: schemas hand their whole document, the
//! pointer of the subschema to apply, and a plain instance value to a
//! [`Validator`]. [`JsonSchemaValidator`] is the default implementation,
//! backed by the `jsonschema` crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jsonschema::{Draft, Resource};
use serde_json::{json, Value};

use crate::document::{Document, Fingerprint};
use crate::error::{Error, SchemaError};
use crate::pointer::Pointer;
use crate::types::declared_id;

/// Base URI under which schema documents are registered for fragment lookup.
const DOCUMENT_URI: &str = "urn:schema-view:document";

/// Validates instances against a fragment of a schema document.
pub trait Validator: Send + Sync {
    /// Every message the schema at `fragment` reports for `instance`, in order.
    /// An empty list means the instance is valid.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validator` if the schema document cannot be compiled.
    fn fully_validate(
        &self,
        schema: &Document,
        fragment: &Pointer,
        instance: &Value,
    ) -> Result<Vec<SchemaError>, Error>;

    /// Whether `instance` satisfies the schema at `fragment`.
    fn validate(
        &self,
        schema: &Document,
        fragment: &Pointer,
        instance: &Value,
    ) -> Result<bool, Error> {
        Ok(self.fully_validate(schema, fragment, instance)?.is_empty())
    }

    /// Succeeds only if `instance` satisfies the schema at `fragment`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValidationFailure` carrying every message otherwise.
    fn ensure_valid(
        &self,
        schema: &Document,
        fragment: &Pointer,
        instance: &Value,
    ) -> Result<(), Error> {
        let errors = self.fully_validate(schema, fragment, instance)?;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ValidationFailure { errors })
        }
    }
}

/// [`Validator`] backed by the `jsonschema` crate.
///
/// Compiled validators are kept per (document content, fragment), so
/// repeatedly validating against the same schema compiles it once.
pub struct JsonSchemaValidator {
    draft: Draft,
    compiled: Mutex<HashMap<(Fingerprint, Pointer), Arc<jsonschema::Validator>>>,
}

impl JsonSchemaValidator {
    /// Validator for the given draft.
    ///
    /// Draft 4 matches the `id`/`additionalItems` keyword family the view
    /// layer resolves; later drafts are available for documents written
    /// against them.
    pub fn new(draft: Draft) -> Self {
        Self {
            draft,
            compiled: Mutex::new(HashMap::new()),
        }
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// Drop every compiled validator.
    pub fn clear(&self) {
        if let Ok(mut compiled) = self.compiled.lock() {
            compiled.clear();
        }
    }

    fn compiled(
        &self,
        schema: &Document,
        fragment: &Pointer,
    ) -> Result<Arc<jsonschema::Validator>, Error> {
        let key = (*schema.fingerprint(), fragment.clone());
        if let Some(found) = self.lock().get(&key) {
            return Ok(Arc::clone(found));
        }

        tracing::debug!(
            document = %schema.digest_hex(),
            fragment = %fragment.fragment(),
            "compiling validator"
        );
        let validator = self.build(schema, fragment)?;
        let validator = Arc::new(validator);
        Ok(Arc::clone(self.lock().entry(key).or_insert(validator)))
    }

    fn build(&self, schema: &Document, fragment: &Pointer) -> Result<jsonschema::Validator, Error> {
        let to_error = |message: String| Error::Validator {
            pointer: fragment.fragment(),
            message,
        };

        if fragment.is_root() {
            return jsonschema::options()
                .with_draft(self.draft)
                .build(schema.value())
                .map_err(|e| to_error(e.to_string()));
        }

        // Subschemas are validated through a reference into the registered
        // document so that internal `$ref`s keep resolving against it.
        let base = document_base(schema.value());
        let resource: Resource = self.draft.create_resource(schema.value().clone());
        let entry = json!({ "$ref": format!("{}{}", base, fragment.fragment()) });
        jsonschema::options()
            .with_draft(self.draft)
            .with_resource(base, resource)
            .build(&entry)
            .map_err(|e| to_error(e.to_string()))
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(Fingerprint, Pointer), Arc<jsonschema::Validator>>>
    {
        // A poisoned map only ever holds fully built validators.
        self.compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// URI a document is registered under: its own absolute `$id`/`id` without
/// fragment, or a fixed URN for anonymous documents.
fn document_base(document: &Value) -> &str {
    declared_id(document)
        .map(|id| id.split('#').next().unwrap_or(id))
        .filter(|base| base.contains(':'))
        .unwrap_or(DOCUMENT_URI)
}

impl Default for JsonSchemaValidator {
    fn default() -> Self {
        Self::new(Draft::Draft4)
    }
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("draft", &self.draft)
            .finish_non_exhaustive()
    }
}

impl Validator for JsonSchemaValidator {
    fn fully_validate(
        &self,
        schema: &Document,
        fragment: &Pointer,
        instance: &Value,
    ) -> Result<Vec<SchemaError>, Error> {
        let validator = self.compiled(schema, fragment)?;
        Ok(validator
            .iter_errors(instance)
            .map(|e| SchemaError {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect())
    }

    fn validate(
        &self,
        schema: &Document,
        fragment: &Pointer,
        instance: &Value,
    ) -> Result<bool, Error> {
        Ok(self.compiled(schema, fragment)?.is_valid(instance))
    }
}

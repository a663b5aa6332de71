//! Schema View
//!
//! Typed, schema-guided views over plain JSON documents.
//!
//! A JSON Schema describes the shape of some data; this library lets callers
//! navigate that data *through* the schema. Every property read resolves the
//! subschema governing the property (following `properties`,
//! `patternProperties`, `additionalProperties`, `items` and `$ref`), matches
//! it against the value actually present (`oneOf`/`anyOf`), and wraps the
//! child with it.
//!
//! # Example
//!
//! ```
//! use schema_view::{Element, Instance, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::new(json!({
//!     "type": "object",
//!     "properties": {
//!         "owner": {
//!             "type": "object",
//!             "properties": { "email": { "type": "string" } }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let mut pet = Instance::new(json!({ "owner": { "email": "a@b" } }), schema).unwrap();
//! let owner = pet.get("owner").unwrap().unwrap();
//! assert_eq!(owner.as_instance().unwrap().schema().fragment(), "#/properties/owner");
//!
//! // Writes are copy-on-write: `owner` still sees the old document.
//! pet.set("owner", json!({ "email": "c@d" })).unwrap();
//! let email = owner.as_instance().unwrap().get("email").unwrap();
//! assert_eq!(email, Some(Element::Value(json!("a@b"))));
//! ```
//!
//! # Identity
//!
//! | Type | Equal when |
//! |------|------------|
//! | `Node` | same pointer into documents of equal content |
//! | `Schema` | same kind and pointer into documents of equal content |
//! | `Instance` | equal plain values, whatever the schema |
//!
//! View definitions are cached per schema identity, so equal schemas share
//! one [`ViewDefinition`].

mod context;
mod document;
mod error;
mod instance;
mod linter;
mod loader;
mod pattern;
mod plain;
mod pointer;
mod reference;
mod schema;
mod types;
mod validator;
mod view;

pub use context::Context;
pub use document::{fingerprint, Document, Fingerprint, Node};
pub use error::{Error, LoadError, SchemaError};
pub use instance::{Element, Instance};
pub use linter::{check, CheckResult, Diagnostic, Severity};
pub use loader::{is_url, load_document, load_document_auto, load_document_str, load_yaml_str};
pub use pattern::translate as translate_pattern;
pub use plain::{normalize_keys, AsPlain, Datum};
pub use pointer::{Pointer, Token};
pub use reference::ref_of;
pub use schema::{Schema, SchemaKey, SchemaKind};
pub use types::{json_type_name, Shape};
pub use validator::{JsonSchemaValidator, Validator};
pub use view::{view_for, ViewDefinition};

pub use jsonschema::Draft;

#[cfg(feature = "remote")]
pub use loader::load_document_url;

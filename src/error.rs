//! Error types for schema-guided document views.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while navigating, resolving, wrapping or validating.
#[derive(Debug, Error)]
pub enum Error {
    #[error("type mismatch at {pointer}: expected {expected}, got {actual}")]
    TypeMismatch {
        pointer: String,
        expected: String,
        actual: String,
    },

    #[error("cannot index {actual} at {pointer} with {token}")]
    NotIndexable {
        pointer: String,
        token: String,
        actual: String,
    },

    #[error("cannot assign {token} on {actual} at {pointer}")]
    NotAssignable {
        pointer: String,
        token: String,
        actual: String,
    },

    #[error("invalid instance: {message}")]
    InvalidInstance { message: String },

    #[error("no value at {pointer}")]
    PointerNotFound { pointer: String },

    #[error("schema {schema_id} declares no accessor \"{name}\"")]
    NoSuchAccessor { schema_id: String, name: String },

    #[error("validation failed with {} error(s)", errors.len())]
    ValidationFailure { errors: Vec<SchemaError> },

    #[error("configuration error at {pointer}: {message}")]
    Configuration { pointer: String, message: String },

    #[error("validator rejected schema at {pointer}: {message}")]
    Validator { pointer: String, message: String },
}

impl Error {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ValidationFailure { .. } => 1,
            _ => 2,
        }
    }
}

/// Errors while ingesting a document from a file, string or URL.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Normalize(#[from] Error),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Single validation message with the instance location it concerns.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid value within the instance.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

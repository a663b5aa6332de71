//! Document loading from various sources.
//!
//! Handles loading schema and instance documents from files, strings, and
//! HTTP URLs. YAML sources have their mapping keys normalized to strings.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;
use crate::plain::normalize_keys;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a document from a file path.
///
/// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else as
/// JSON.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, or a parse
/// error if the content isn't valid for its format.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    if is_yaml_path(path) {
        load_yaml_str(&content)
    } else {
        load_document_str(&content)
    }
}

/// Load a document from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a document from a YAML string, stringifying scalar mapping keys.
///
/// # Errors
///
/// Returns `LoadError::InvalidYaml` if the string isn't valid YAML, or
/// `LoadError::Normalize` for keys that cannot become strings.
pub fn load_yaml_str(content: &str) -> Result<Value, LoadError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })?;
    Ok(normalize_keys(value)?)
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    tracing::debug!(url, "fetching document");
    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

/// Load a document from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
/// URL loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_document_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn load_document_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "object"}}"#).unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc["type"], "object");
    }

    #[test]
    fn load_document_file_not_found() {
        let result = load_document(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_document_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_document(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_document_yaml_by_extension() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "type: object\nproperties:\n  200:\n    type: string").unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc["type"], "object");
        assert_eq!(doc["properties"]["200"]["type"], "string");
    }

    #[test]
    fn load_document_invalid_yaml() {
        let mut file = Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "a: [unclosed").unwrap();

        let result = load_document(file.path());
        assert!(matches!(result, Err(LoadError::InvalidYaml { .. })));
    }

    #[test]
    fn load_yaml_str_rejects_collection_keys() {
        let result = load_yaml_str("? [a, b]\n: value\n");
        assert!(matches!(result, Err(LoadError::Normalize(_))));
    }

    #[test]
    fn load_document_str_valid() {
        let doc = load_document_str(r#"{"type": "object"}"#).unwrap();
        assert_eq!(doc["type"], "object");
    }

    #[test]
    fn load_document_str_invalid() {
        let result = load_document_str("not json");
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn is_url_https() {
        assert!(is_url("https://example.com/pets/rex.json"));
    }

    #[test]
    fn is_url_http() {
        assert!(is_url("http://example.com/pet.yaml"));
    }

    #[test]
    fn is_url_file_path() {
        assert!(!is_url("/data/pets/rex.yaml"));
        assert!(!is_url("./rex.json"));
        assert!(!is_url("rex.json"));
    }

    #[test]
    fn load_document_auto_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "string"}}"#).unwrap();

        let doc = load_document_auto(file.path().to_str().unwrap()).unwrap();
        assert_eq!(doc["type"], "string");
    }

    #[test]
    fn io_errors_exit_with_three() {
        let err = load_document(Path::new("/nonexistent/path.json")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(load_document_str("{").unwrap_err().exit_code(), 2);
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_document_url_invalid_host() {
            let result =
                load_document_url("https://this-domain-does-not-exist-12345.invalid/schema.json");
            assert!(matches!(result, Err(LoadError::NetworkError { .. })));
        }
    }
}

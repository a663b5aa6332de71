//! Schema checking - static analysis of a schema document.
//!
//! Walks every subschema reachable through the schema keywords and reports:
//! - patterns the regex engine cannot compile
//! - `$ref`s pointing at nothing in the document, and `$ref` cycles
//! - cyclic `allOf` graphs
//! - non-schema values where a schema is expected

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::document::Node;
use crate::pattern;
use crate::pointer::Pointer;
use crate::reference::{ref_of, resolve_once};
use crate::types::{json_type_name, SCHEMA_ARRAY_KEYWORDS, SCHEMA_KEYWORDS, SCHEMA_MAP_KEYWORDS};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from checking.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Fragment of the offending node (e.g., "#/properties/id/pattern")
    pub path: String,
    pub message: String,
}

/// Result of checking one schema document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckResult {
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckResult {
    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    /// Returns true if there are no errors, nor warnings when `strict`.
    pub fn passes(&self, strict: bool) -> bool {
        self.is_ok() && !(strict && self.warnings > 0)
    }

    fn push(&mut self, severity: Severity, code: &str, pointer: &Pointer, message: String) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            path: pointer.fragment(),
            message,
        });
    }
}

/// Check a schema document.
pub fn check(document: &Value) -> CheckResult {
    let mut result = CheckResult::default();
    let root = Node::new(document.clone());
    match root.value() {
        Value::Object(_) => check_schema(&root, &mut result),
        Value::Bool(_) => {}
        other => result.push(
            Severity::Error,
            "E000",
            root.pointer(),
            format!("schema document must be an object or boolean, got {}", json_type_name(other)),
        ),
    }
    tracing::debug!(
        errors = result.errors,
        warnings = result.warnings,
        "checked schema document"
    );
    result
}

/// Check one schema body, then every subschema below it.
fn check_schema(node: &Node, result: &mut CheckResult) {
    check_ref(node, result);
    check_patterns(node, result);
    if node.get("allOf").is_some() && all_of_returns_to(node) {
        result.push(
            Severity::Error,
            "E004",
            node.pointer(),
            "cyclic allOf: schema includes itself".to_string(),
        );
    }

    for &keyword in SCHEMA_KEYWORDS {
        let Some(child) = node.get(keyword) else {
            continue;
        };
        // Positional `items` is handled with the array keywords.
        if keyword == "items" && child.is_array() {
            continue;
        }
        check_subschema(&child, keyword, result);
    }

    for &keyword in SCHEMA_MAP_KEYWORDS {
        let Some(map) = node.get(keyword) else {
            continue;
        };
        if !map.is_object() {
            not_a_schema(&map, keyword, "an object of schemas", result);
            continue;
        }
        for name in map.keys() {
            if let Some(child) = map.get(name.as_str()) {
                check_subschema(&child, keyword, result);
            }
        }
    }

    for &keyword in SCHEMA_ARRAY_KEYWORDS {
        let Some(list) = node.get(keyword) else {
            continue;
        };
        if !list.is_array() {
            if keyword != "items" {
                not_a_schema(&list, keyword, "an array of schemas", result);
            }
            continue;
        }
        for i in 0..list.len().unwrap_or(0) {
            if let Some(child) = list.get(i) {
                check_subschema(&child, keyword, result);
            }
        }
    }
}

fn check_subschema(node: &Node, keyword: &str, result: &mut CheckResult) {
    match node.value() {
        Value::Object(_) => check_schema(node, result),
        Value::Bool(_) => {}
        _ => not_a_schema(node, keyword, "a schema", result),
    }
}

fn not_a_schema(node: &Node, keyword: &str, expected: &str, result: &mut CheckResult) {
    result.push(
        Severity::Warning,
        "W001",
        node.pointer(),
        format!(
            "{} expects {}, got {}",
            keyword,
            expected,
            json_type_name(node.value())
        ),
    );
}

fn check_ref(node: &Node, result: &mut CheckResult) {
    let Some(reference) = ref_of(node.value()) else {
        return;
    };
    if resolve_once(node).is_err() {
        result.push(
            Severity::Error,
            "E002",
            node.pointer(),
            format!("$ref \"{}\" points at nothing in this document", reference),
        );
        return;
    }
    if let Err(e) = node.deref() {
        result.push(Severity::Error, "E003", node.pointer(), e.to_string());
    }
}

fn check_patterns(node: &Node, result: &mut CheckResult) {
    if let Some(Value::String(pattern)) = node.value().get("pattern") {
        if let Err(e) = pattern::compile(pattern) {
            result.push(
                Severity::Error,
                "E001",
                &node.pointer().child("pattern"),
                format!("invalid pattern \"{}\": {}", pattern, e),
            );
        }
    }
    if let Some(Value::Object(patterns)) = node.value().get("patternProperties") {
        for pattern in patterns.keys() {
            if let Err(e) = pattern::compile(pattern) {
                result.push(
                    Severity::Error,
                    "E001",
                    &node.pointer().child("patternProperties").child(pattern.as_str()),
                    format!("invalid pattern \"{}\": {}", pattern, e),
                );
            }
        }
    }
}

/// Whether following `allOf` branches (through `$ref`) from `start` leads
/// back to `start`.
fn all_of_returns_to(start: &Node) -> bool {
    let Ok(start) = start.deref() else {
        return false;
    };
    let mut seen = HashSet::new();
    let mut pending = all_of_targets(&start);
    while let Some(next) = pending.pop() {
        if next.pointer() == start.pointer() {
            return true;
        }
        if seen.insert(next.pointer().clone()) {
            pending.extend(all_of_targets(&next));
        }
    }
    false
}

fn all_of_targets(node: &Node) -> Vec<Node> {
    let Some(branches) = node.get("allOf") else {
        return Vec::new();
    };
    (0..branches.len().unwrap_or(0))
        .filter_map(|i| branches.get(i))
        .filter(Node::is_object)
        .filter_map(|branch| branch.deref().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(result: &CheckResult) -> Vec<&str> {
        result.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn check_valid_schema() {
        let result = check(&json!({
            "id": "https://example.com/pet",
            "type": "object",
            "definitions": { "name": { "type": "string", "pattern": "^\\w+$" } },
            "properties": {
                "name": { "$ref": "#/definitions/name" },
                "tags": { "type": "array", "items": { "type": "string" } }
            },
            "patternProperties": { "^x-": {} },
            "additionalProperties": false
        }));
        assert!(result.is_ok());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn check_bad_patterns() {
        let result = check(&json!({
            "properties": { "a": { "pattern": "(" } },
            "patternProperties": { "[": {} }
        }));
        assert_eq!(codes(&result), vec!["E001", "E001"]);
        assert_eq!(result.diagnostics[0].path, "#/patternProperties/[");
        assert_eq!(result.diagnostics[1].path, "#/properties/a/pattern");
    }

    #[test]
    fn check_broken_ref() {
        let result = check(&json!({
            "properties": { "data": { "$ref": "#/definitions/missing" } }
        }));
        assert!(!result.is_ok());
        assert_eq!(codes(&result), vec!["E002"]);
        assert_eq!(result.diagnostics[0].path, "#/properties/data");
    }

    #[test]
    fn check_external_ref_is_not_an_error() {
        let result = check(&json!({ "items": { "$ref": "other.json#/a" } }));
        assert!(result.is_ok());
    }

    #[test]
    fn check_ref_cycle() {
        let result = check(&json!({
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "$ref": "#/definitions/a" }
            }
        }));
        assert_eq!(codes(&result), vec!["E003", "E003"]);
    }

    #[test]
    fn check_cyclic_all_of() {
        let result = check(&json!({
            "definitions": {
                "a": { "allOf": [{ "$ref": "#/definitions/b" }] },
                "b": { "allOf": [{ "$ref": "#/definitions/a" }] }
            },
            "allOf": [{ "$ref": "#/definitions/a" }]
        }));
        let cyclic: Vec<&str> = result
            .diagnostics
            .iter()
            .filter(|d| d.code == "E004")
            .map(|d| d.path.as_str())
            .collect();
        assert_eq!(cyclic, vec!["#/definitions/a", "#/definitions/b"]);
    }

    #[test]
    fn check_non_schema_values() {
        let result = check(&json!({
            "properties": { "a": 5 },
            "allOf": {},
            "items": "string",
            "not": true
        }));
        assert!(result.is_ok());
        assert_eq!(result.warnings, 3);
        assert!(result.passes(false));
        assert!(!result.passes(true));
        assert!(codes(&result).iter().all(|c| *c == "W001"));
    }

    #[test]
    fn check_non_schema_document() {
        let result = check(&json!([1, 2]));
        assert!(!result.is_ok());
        assert!(check(&json!(true)).is_ok());
    }
}

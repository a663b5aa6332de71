//! `$ref` resolution within a single schema document.

use std::collections::HashSet;

use serde_json::Value;

use crate::document::Node;
use crate::error::Error;
use crate::pointer::{Pointer, Token};
use crate::types::declared_id;

impl Node {
    /// Follow `$ref` from this node until reaching a node without one.
    ///
    /// References that cannot be located in this document are left as they
    /// are, and the referring node is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for a `$ref` cycle or for a fragment
    /// that points at nothing.
    pub fn deref(&self) -> Result<Node, Error> {
        let mut current = self.clone();
        let mut seen: HashSet<Pointer> = HashSet::new();
        seen.insert(current.pointer().clone());

        while let Some(target) = resolve_once(&current)? {
            if !seen.insert(target.pointer().clone()) {
                return Err(Error::Configuration {
                    pointer: self.fragment(),
                    message: format!("$ref cycle through {}", target.fragment()),
                });
            }
            current = target;
        }
        Ok(current)
    }
}

/// The `$ref` string of a schema body, if any.
pub fn ref_of(value: &Value) -> Option<&str> {
    value.as_object()?.get("$ref")?.as_str()
}

/// Resolve one `$ref` hop. `None` when the node has no resolvable `$ref`.
pub(crate) fn resolve_once(node: &Node) -> Result<Option<Node>, Error> {
    let Some(reference) = ref_of(node.value()) else {
        return Ok(None);
    };
    let root = node.root_node();

    let (base, fragment) = match reference.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (reference, None),
    };

    let anchor = if base.is_empty() {
        Some(root.clone())
    } else {
        find_by_id(&root, base)
    };
    let Some(anchor) = anchor else {
        tracing::debug!(
            at = %node.fragment(),
            reference,
            "leaving $ref outside this document unresolved"
        );
        return Ok(None);
    };

    match fragment {
        None | Some("") => Ok(Some(anchor)),
        Some(fragment) if fragment.starts_with('/') => {
            let relative = Pointer::parse(fragment).ok_or_else(|| broken(node, reference))?;
            let pointer = anchor.pointer().join(&relative);
            Node::at(std::sync::Arc::clone(anchor.document()), pointer)
                .map(Some)
                .map_err(|_| broken(node, reference))
        }
        // Plain-name fragment: a draft-4 style `"id": "#name"` anchor.
        Some(name) => match find_by_id(&root, &format!("#{}", name)) {
            Some(found) => Ok(Some(found)),
            None => Err(broken(node, reference)),
        },
    }
}

fn broken(node: &Node, reference: &str) -> Error {
    Error::Configuration {
        pointer: node.fragment(),
        message: format!("$ref \"{}\" points at nothing in this document", reference),
    }
}

/// First node (document order, depth first) declaring `id`.
///
/// A trailing empty fragment is ignored on both sides.
fn find_by_id(node: &Node, id: &str) -> Option<Node> {
    let wanted = id.strip_suffix('#').unwrap_or(id);
    if let Some(declared) = declared_id(node.value()) {
        if declared.strip_suffix('#').unwrap_or(declared) == wanted {
            return Some(node.clone());
        }
    }
    match node.value() {
        Value::Object(map) => map
            .keys()
            .filter_map(|key| node.get(Token::Key(key.clone())))
            .find_map(|child| find_by_id(&child, id)),
        Value::Array(items) => (0..items.len())
            .filter_map(|i| node.get(i))
            .find_map(|child| find_by_id(&child, id)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(node: &Node, pointer: &str) -> Node {
        Node::at(
            std::sync::Arc::clone(node.document()),
            Pointer::parse(pointer).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn fragment_ref() {
        let root = Node::new(json!({
            "definitions": { "a": { "type": "string" } },
            "properties": { "x": { "$ref": "#/definitions/a" } }
        }));
        let target = at(&root, "/properties/x").deref().unwrap();
        assert_eq!(target.pointer().to_string(), "/definitions/a");
    }

    #[test]
    fn chained_refs() {
        let root = Node::new(json!({
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "type": "integer" }
            },
            "items": { "$ref": "#/definitions/a" }
        }));
        let target = at(&root, "/items").deref().unwrap();
        assert_eq!(target.value(), &json!({ "type": "integer" }));
    }

    #[test]
    fn self_root_ref() {
        let root = Node::new(json!({ "items": { "$ref": "#" } }));
        assert_eq!(at(&root, "/items").deref().unwrap(), root);
    }

    #[test]
    fn ref_by_document_id() {
        let root = Node::new(json!({
            "id": "https://example.com/root.json#",
            "definitions": { "a": { "type": "string" } },
            "items": { "$ref": "https://example.com/root.json#/definitions/a" }
        }));
        let target = at(&root, "/items").deref().unwrap();
        assert_eq!(target.pointer().to_string(), "/definitions/a");
    }

    #[test]
    fn ref_by_embedded_id() {
        let root = Node::new(json!({
            "schemas": {
                "Pet": { "id": "Pet", "type": "object" }
            },
            "items": { "$ref": "Pet" }
        }));
        let target = at(&root, "/items").deref().unwrap();
        assert_eq!(target.pointer().to_string(), "/schemas/Pet");
    }

    #[test]
    fn plain_name_anchor() {
        let root = Node::new(json!({
            "definitions": { "a": { "id": "#item", "type": "string" } },
            "items": { "$ref": "#item" }
        }));
        let target = at(&root, "/items").deref().unwrap();
        assert_eq!(target.pointer().to_string(), "/definitions/a");
    }

    #[test]
    fn external_ref_is_left_alone() {
        let root = Node::new(json!({ "items": { "$ref": "other.json#/a" } }));
        let items = at(&root, "/items");
        assert_eq!(items.deref().unwrap(), items);
    }

    #[test]
    fn missing_fragment_is_an_error() {
        let root = Node::new(json!({ "items": { "$ref": "#/definitions/nope" } }));
        assert!(matches!(
            at(&root, "/items").deref(),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn cycle_is_an_error() {
        let root = Node::new(json!({
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "$ref": "#/definitions/a" }
            }
        }));
        let err = at(&root, "/definitions/a").deref().unwrap_err();
        assert!(err.to_string().contains("$ref cycle"));
    }
}

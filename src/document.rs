//! Addressable nodes over immutable, shared documents.
//!
//! A [`Document`] owns one plain JSON value and never changes after
//! construction. A [`Node`] is a document plus a [`Pointer`] into it; nodes are
//! built on demand as callers descend, and every structural change produces a
//! new document while the old one (and every node over it) stays valid.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::pointer::{Pointer, Token};
use crate::types::{json_type_name, Shape};

static NULL: Value = Value::Null;

/// SHA-256 of a value's canonical (key-sorted) JSON serialization.
pub type Fingerprint = [u8; 32];

/// Computes the content fingerprint of a plain value.
///
/// Object keys are hashed in sorted order so that documents that compare
/// equal always share a fingerprint, whatever their key insertion order.
pub fn fingerprint(value: &Value) -> Fingerprint {
    let mut hasher = Sha256::new();
    feed(&mut hasher, value);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn feed(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => hasher.update(if *b { b"t" } else { b"f" }),
        Value::Number(n) => {
            hasher.update(b"#");
            hasher.update(n.to_string().as_bytes());
            hasher.update(b";");
        }
        Value::String(s) => feed_str(hasher, s),
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                feed(hasher, item);
            }
            hasher.update(b"]");
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            hasher.update(b"{");
            for (key, child) in entries {
                feed_str(hasher, key);
                feed(hasher, child);
            }
            hasher.update(b"}");
        }
    }
}

fn feed_str(hasher: &mut Sha256, s: &str) {
    hasher.update(b"\"");
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// The complete underlying value shared by every node derived from it.
pub struct Document {
    value: Value,
    fingerprint: OnceLock<Fingerprint>,
}

impl Document {
    pub fn new(value: Value) -> Arc<Self> {
        Arc::new(Document {
            value,
            fingerprint: OnceLock::new(),
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Content fingerprint, computed on first use.
    pub fn fingerprint(&self) -> &Fingerprint {
        self.fingerprint.get_or_init(|| fingerprint(&self.value))
    }

    /// Short hex form of the fingerprint, for identifiers and logs.
    pub fn digest_hex(&self) -> String {
        hex::encode(&self.fingerprint()[..16])
    }

    /// Whether two documents hold equal content.
    pub fn same_content(a: &Arc<Document>, b: &Arc<Document>) -> bool {
        Arc::ptr_eq(a, b) || a.fingerprint() == b.fingerprint()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("value", &self.value)
            .finish()
    }
}

/// One location in one document.
///
/// The parent relation is derived from the pointer, so a node never holds its
/// parent or children alive. Nodes are only constructed over locations that
/// exist in their document.
#[derive(Clone)]
pub struct Node {
    document: Arc<Document>,
    pointer: Pointer,
}

impl Node {
    /// Root node over a fresh document.
    pub fn new(value: Value) -> Self {
        Node {
            document: Document::new(value),
            pointer: Pointer::root(),
        }
    }

    /// Node at `pointer` within `document`.
    ///
    /// # Errors
    ///
    /// Returns `Error::PointerNotFound` if nothing exists at `pointer`.
    pub fn at(document: Arc<Document>, pointer: Pointer) -> Result<Self, Error> {
        let pointer = pointer
            .canonical_in(document.value())
            .ok_or_else(|| Error::PointerNotFound {
                pointer: pointer.fragment(),
            })?;
        Ok(Node { document, pointer })
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn fragment(&self) -> String {
        self.pointer.fragment()
    }

    /// The raw value at this node's location.
    pub fn value(&self) -> &Value {
        // Construction guarantees the location exists.
        self.pointer
            .evaluate(self.document.value())
            .unwrap_or(&NULL)
    }

    pub fn shape(&self) -> Shape {
        Shape::of(self.value())
    }

    pub fn is_object(&self) -> bool {
        self.value().is_object()
    }

    pub fn is_array(&self) -> bool {
        self.value().is_array()
    }

    /// Keys of an object node, in document order; empty otherwise.
    pub fn keys(&self) -> Vec<String> {
        self.value()
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of entries of an object or array node; `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self.value() {
            Value::Object(map) => Some(map.len()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Child node at `pointer + [token]`.
    ///
    /// String tokens require an object, integer tokens an array.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotIndexable` if the value has the wrong shape, or
    /// `Error::PointerNotFound` if the key or index is absent.
    pub fn child(&self, token: impl Into<Token>) -> Result<Node, Error> {
        let token = token.into();
        let value = self.value();
        let present = match (&token, value) {
            (Token::Key(key), Value::Object(map)) => map.contains_key(key),
            (Token::Index(i), Value::Array(items)) => *i < items.len(),
            _ => {
                return Err(Error::NotIndexable {
                    pointer: self.fragment(),
                    token: token.to_string(),
                    actual: json_type_name(value).to_string(),
                })
            }
        };
        let pointer = self.pointer.child(token);
        if !present {
            return Err(Error::PointerNotFound {
                pointer: pointer.fragment(),
            });
        }
        Ok(Node {
            document: Arc::clone(&self.document),
            pointer,
        })
    }

    /// Child node for `token` if it exists, without shape errors.
    pub fn get(&self, token: impl Into<Token>) -> Option<Node> {
        self.child(token).ok()
    }

    /// Enclosing node, or `None` at the document root.
    pub fn parent(&self) -> Option<Node> {
        self.pointer.parent().map(|pointer| Node {
            document: Arc::clone(&self.document),
            pointer,
        })
    }

    /// Node at the empty pointer of the same document.
    pub fn root_node(&self) -> Node {
        Node {
            document: Arc::clone(&self.document),
            pointer: Pointer::root(),
        }
    }

    /// New document equal to this one except that the value here is
    /// replaced by `modifier(current)`; returns the node at the same pointer
    /// in that new document.
    ///
    /// If the modifier leaves the value unchanged the original document is
    /// reused.
    ///
    /// # Errors
    ///
    /// Returns `Error::PointerNotFound` if the location cannot be written,
    /// which only happens for nodes whose document was mutated externally.
    pub fn with_value_at_pointer<F>(&self, modifier: F) -> Result<Node, Error>
    where
        F: FnOnce(Value) -> Value,
    {
        let current = self.value().clone();
        let replacement = modifier(current);
        if &replacement == self.value() {
            return Ok(self.clone());
        }

        let mut root = self.document.value().clone();
        let slot =
            self.pointer
                .evaluate_mut(&mut root)
                .ok_or_else(|| Error::PointerNotFound {
                    pointer: self.fragment(),
                })?;
        *slot = replacement;

        Ok(Node {
            document: Document::new(root),
            pointer: self.pointer.clone(),
        })
    }

    /// Alias of [`Node::with_value_at_pointer`].
    pub fn modified_copy<F>(&self, modifier: F) -> Result<Node, Error>
    where
        F: FnOnce(Value) -> Value,
    {
        self.with_value_at_pointer(modifier)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.pointer == other.pointer && Document::same_content(&self.document, &other.document)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.document.fingerprint().hash(state);
        self.pointer.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({} {})", self.fragment(), self.value())
    }
}

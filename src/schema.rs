//! Schemas: nodes whose value is a schema body, and the resolution of
//! subschemas, identifiers and polymorphic branches over them.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use serde_json::{json, Map, Value};

use crate::context::Context;
use crate::document::{Document, Fingerprint, Node};
use crate::error::{Error, SchemaError};
use crate::pattern;
use crate::plain::{AsPlain, Datum};
use crate::pointer::{Pointer, Token};
use crate::types::{
    declared_id, json_type_name, SCHEMA_ARRAY_KEYWORDS, SCHEMA_MAP_KEYWORDS,
};
use crate::view::ViewDefinition;

/// How a schema came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    /// An object schema body found in a document.
    Body,
    /// A boolean schema, normalized to `{}` (`true`) or `{"not": {}}` (`false`).
    Boolean(bool),
}

/// Content identity of a schema: its kind, its location, and the full
/// content of its document.
///
/// Structurally identical schema bodies at the same pointer of equal
/// documents share a key, whatever their allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    kind: SchemaKind,
    pointer: Pointer,
    document: Fingerprint,
}

impl SchemaKey {
    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }
}

/// Context-free part of a schema, shared by clones and kept in memo tables.
pub(crate) struct SchemaCore {
    node: Node,
    /// Object form of a boolean schema; `node` keeps its location.
    normalized: Option<Node>,
    key: SchemaKey,
    id: OnceLock<String>,
}

impl SchemaCore {
    fn new(node: Node, kind: SchemaKind) -> Arc<Self> {
        let normalized = match kind {
            SchemaKind::Body => None,
            SchemaKind::Boolean(true) => Some(Node::new(json!({}))),
            SchemaKind::Boolean(false) => Some(Node::new(json!({ "not": {} }))),
        };
        let key = SchemaKey {
            kind,
            pointer: node.pointer().clone(),
            document: *node.document().fingerprint(),
        };
        Arc::new(SchemaCore {
            node,
            normalized,
            key,
            id: OnceLock::new(),
        })
    }

    /// The node handed to the validator.
    fn validated(&self) -> &Node {
        self.normalized.as_ref().unwrap_or(&self.node)
    }
}

/// A schema body within its document.
#[derive(Clone)]
pub struct Schema {
    core: Arc<SchemaCore>,
    context: Arc<Context>,
}

impl Schema {
    /// Build a schema in the process-wide context.
    ///
    /// Idempotent: a `Schema` is returned as it is. Booleans are normalized
    /// and objects wrapped; an instance can serve as a schema when its value
    /// is an object or boolean.
    ///
    /// # Errors
    ///
    /// Returns `Error::TypeMismatch` for anything that cannot be a schema body.
    pub fn new(source: impl Into<Datum>) -> Result<Self, Error> {
        Self::new_in(Context::global(), source)
    }

    /// Build a schema in the given context. See [`Schema::new`].
    pub fn new_in(context: Arc<Context>, source: impl Into<Datum>) -> Result<Self, Error> {
        match source.into() {
            Datum::Schema(schema) => Ok(schema),
            Datum::Value(value) => Self::from_node(context, Node::new(value)),
            Datum::Node(node) => Self::from_node(context, node),
            Datum::Instance(instance) => Self::from_node(context, instance.node().clone()),
        }
    }

    fn from_node(context: Arc<Context>, node: Node) -> Result<Self, Error> {
        let kind = match node.value() {
            Value::Object(_) => SchemaKind::Body,
            Value::Bool(b) => SchemaKind::Boolean(*b),
            other => {
                return Err(Error::TypeMismatch {
                    pointer: node.fragment(),
                    expected: "schema (object or boolean)".to_string(),
                    actual: json_type_name(other).to_string(),
                })
            }
        };
        Ok(Schema {
            core: SchemaCore::new(node, kind),
            context,
        })
    }

    fn with_core(&self, core: Arc<SchemaCore>) -> Self {
        Schema {
            core,
            context: Arc::clone(&self.context),
        }
    }

    /// Schema for the node at a schema keyword, `$ref` resolved first.
    fn subschema_at(&self, node: Node) -> Result<Arc<SchemaCore>, Error> {
        let node = node.deref()?;
        Ok(Self::from_node(Arc::clone(&self.context), node)?.core)
    }

    pub fn node(&self) -> &Node {
        &self.core.node
    }

    pub fn pointer(&self) -> &Pointer {
        self.core.node.pointer()
    }

    pub fn document(&self) -> &Arc<Document> {
        self.core.node.document()
    }

    pub fn fragment(&self) -> String {
        self.core.node.fragment()
    }

    pub fn kind(&self) -> SchemaKind {
        self.core.key.kind
    }

    pub fn key(&self) -> &SchemaKey {
        &self.core.key
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// The node keyword lookups read: this schema's node with `$ref`
    /// followed, or the object form of a boolean schema.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for broken or cyclic references.
    pub fn body(&self) -> Result<Node, Error> {
        match &self.core.normalized {
            Some(body) => Ok(body.clone()),
            None => self.core.node.deref(),
        }
    }

    /// The `$id`/`id` this schema body declares itself.
    pub fn id(&self) -> Result<Option<String>, Error> {
        Ok(declared_id(self.body()?.value()).map(str::to_string))
    }

    /// The body's `default` keyword.
    pub fn default_value(&self) -> Result<Option<Value>, Error> {
        Ok(self.body()?.value().get("default").cloned())
    }

    /// Absolute identifier of this schema.
    ///
    /// The nearest enclosing node declaring an `$id`/`id` (this node
    /// included) supplies the base; without one, a URN derived from the
    /// document content does. The pointer from that node down to this one is
    /// appended to the base's fragment.
    pub fn schema_id(&self) -> &str {
        self.core.id.get_or_init(|| compute_schema_id(&self.core.node))
    }

    /// Subschema applying to the property `name` of a described object.
    ///
    /// Looks in `properties`, then the first matching `patternProperties`
    /// entry, then an object-valued `additionalProperties`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for a pattern that does not compile or
    /// for a broken `$ref`.
    pub fn subschema_for_property(&self, name: &str) -> Result<Option<Schema>, Error> {
        let key = (self.core.key.clone(), name.to_string());
        let found = self
            .context
            .property_subschemas
            .get_or_try_insert(key, || self.resolve_property(name))?;
        Ok(found.map(|core| self.with_core(core)))
    }

    fn resolve_property(&self, name: &str) -> Result<Option<Arc<SchemaCore>>, Error> {
        let body = self.body()?;

        if let Some(node) = body
            .get("properties")
            .and_then(|properties| properties.get(name))
            .filter(is_schema_node)
        {
            return self.subschema_at(node).map(Some);
        }

        if let Some(patterns) = body.get("patternProperties") {
            for pattern in patterns.keys() {
                let regex = self.compiled_pattern(&patterns, &pattern)?;
                if regex.is_match(name) {
                    let node = patterns.child(pattern.as_str())?;
                    if is_schema_node(&node) {
                        return self.subschema_at(node).map(Some);
                    }
                }
            }
        }

        match body.get("additionalProperties") {
            Some(node) if node.is_object() => self.subschema_at(node).map(Some),
            _ => Ok(None),
        }
    }

    fn compiled_pattern(&self, patterns: &Node, pattern: &str) -> Result<regex::Regex, Error> {
        self.context
            .patterns
            .get_or_try_insert(pattern.to_string(), || pattern::compile(pattern))
            .map_err(|e| Error::Configuration {
                pointer: patterns.pointer().child(pattern).fragment(),
                message: format!("invalid pattern \"{}\": {}", pattern, e),
            })
    }

    /// Subschema applying to index `index` of a described array.
    ///
    /// A sequence of `items` applies positionally, falling back to
    /// `additionalItems`; a single `items` schema applies to every index.
    pub fn subschema_for_index(&self, index: usize) -> Result<Option<Schema>, Error> {
        let key = (self.core.key.clone(), index);
        let found = self
            .context
            .index_subschemas
            .get_or_try_insert(key, || self.resolve_index(index))?;
        Ok(found.map(|core| self.with_core(core)))
    }

    fn resolve_index(&self, index: usize) -> Result<Option<Arc<SchemaCore>>, Error> {
        let body = self.body()?;
        let Some(items) = body.get("items") else {
            return Ok(None);
        };

        if items.is_array() {
            if let Some(node) = items.get(index).filter(is_schema_node) {
                return self.subschema_at(node).map(Some);
            }
            return match body.get("additionalItems").filter(is_schema_node) {
                Some(node) if items.len().map_or(false, |len| index >= len) => {
                    self.subschema_at(node).map(Some)
                }
                _ => Ok(None),
            };
        }

        if is_schema_node(&items) {
            return self.subschema_at(items).map(Some);
        }
        Ok(None)
    }

    /// The most specific `oneOf`/`anyOf` branch `instance` satisfies.
    ///
    /// Branches are tried in order, `oneOf` before `anyOf`, and a matching
    /// branch is itself matched recursively. Without a match the schema
    /// itself is returned.
    pub fn match_to_instance(&self, instance: &impl AsPlain) -> Result<Schema, Error> {
        let value = instance.as_plain();
        self.match_value(&value)
    }

    fn match_value(&self, value: &Value) -> Result<Schema, Error> {
        let body = self.body()?;
        for keyword in ["oneOf", "anyOf"] {
            let Some(branches) = body.get(keyword).filter(Node::is_array) else {
                continue;
            };
            for i in 0..branches.len().unwrap_or(0) {
                let branch = branches.child(i)?;
                if !is_schema_node(&branch) {
                    continue;
                }
                let branch = self.with_core(self.subschema_at(branch)?);
                if branch.validate_value(value)? {
                    tracing::trace!(
                        schema = %self.fragment(),
                        branch = %branch.fragment(),
                        keyword,
                        "matched instance to branch"
                    );
                    return branch.match_value(value);
                }
            }
        }
        Ok(self.clone())
    }

    /// Property names this schema declares an object may carry: keys of
    /// `properties`, entries of `required`, and the same for every `allOf`
    /// branch.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the `allOf` graph is cyclic.
    pub fn described_object_property_names(&self) -> Result<Arc<BTreeSet<String>>, Error> {
        self.property_names_guarded(&mut Vec::new())
    }

    fn property_names_guarded(
        &self,
        visiting: &mut Vec<SchemaKey>,
    ) -> Result<Arc<BTreeSet<String>>, Error> {
        if visiting.contains(&self.core.key) {
            return Err(Error::Configuration {
                pointer: self.fragment(),
                message: "cyclic allOf: schema includes itself".to_string(),
            });
        }
        self.context
            .property_names
            .get_or_try_insert(self.core.key.clone(), || {
                visiting.push(self.core.key.clone());
                let names = self.collect_property_names(visiting)?;
                visiting.pop();
                Ok(Arc::new(names))
            })
    }

    fn collect_property_names(
        &self,
        visiting: &mut Vec<SchemaKey>,
    ) -> Result<BTreeSet<String>, Error> {
        let body = self.body()?;
        let value = body.value();
        let mut names = BTreeSet::new();

        if let Some(properties) = value.get("properties").and_then(Value::as_object) {
            names.extend(properties.keys().cloned());
        }
        if let Some(required) = value.get("required").and_then(Value::as_array) {
            names.extend(required.iter().filter_map(Value::as_str).map(str::to_string));
        }
        if let Some(branches) = body.get("allOf").filter(Node::is_array) {
            for i in 0..branches.len().unwrap_or(0) {
                let branch = branches.child(i)?;
                if !branch.is_object() {
                    continue;
                }
                let branch = self.with_core(self.subschema_at(branch)?);
                names.extend(branch.property_names_guarded(visiting)?.iter().cloned());
            }
        }
        Ok(names)
    }

    /// Whether the schema describes objects: by `type`, or by carrying
    /// object keywords, or when every `oneOf`/`anyOf` branch does.
    pub fn describes_object(&self) -> Result<bool, Error> {
        self.describes("object", OBJECT_KEYWORDS, &mut Vec::new())
    }

    /// Whether the schema describes arrays, inferred like
    /// [`Schema::describes_object`].
    pub fn describes_array(&self) -> Result<bool, Error> {
        self.describes("array", ARRAY_KEYWORDS, &mut Vec::new())
    }

    fn describes(
        &self,
        type_name: &str,
        keywords: &[&str],
        visiting: &mut Vec<SchemaKey>,
    ) -> Result<bool, Error> {
        if visiting.contains(&self.core.key) {
            return Ok(false);
        }
        let body = self.body()?;
        let Some(map) = body.value().as_object() else {
            return Ok(false);
        };

        match map.get("type") {
            Some(Value::String(t)) => return Ok(t == type_name),
            Some(Value::Array(types)) => {
                return Ok(types.iter().any(|t| t.as_str() == Some(type_name)))
            }
            _ => {}
        }

        if keywords.iter().any(|k| implies_shape(map, k)) {
            return Ok(true);
        }

        visiting.push(self.core.key.clone());
        for keyword in ["oneOf", "anyOf"] {
            let Some(branches) = body.get(keyword).filter(|b| b.len().map_or(false, |n| n > 0))
            else {
                continue;
            };
            if !branches.is_array() {
                continue;
            }
            let mut all = true;
            for i in 0..branches.len().unwrap_or(0) {
                let branch = branches.child(i)?;
                if !is_schema_node(&branch) {
                    all = false;
                    break;
                }
                let branch = self.with_core(self.subschema_at(branch)?);
                if !branch.describes(type_name, keywords, visiting)? {
                    all = false;
                    break;
                }
            }
            if all {
                visiting.pop();
                return Ok(true);
            }
        }
        visiting.pop();
        Ok(false)
    }

    /// The cached view definition for this schema.
    pub fn view(&self) -> Result<Arc<ViewDefinition>, Error> {
        crate::view::view_for(self)
    }

    /// Whether `instance` satisfies this schema.
    pub fn validate_instance(&self, instance: &impl AsPlain) -> Result<bool, Error> {
        self.validate_value(&instance.as_plain())
    }

    /// Every message this schema reports for `instance`.
    pub fn fully_validate_instance(
        &self,
        instance: &impl AsPlain,
    ) -> Result<Vec<SchemaError>, Error> {
        let target = self.core.validated();
        self.context
            .validator()
            .fully_validate(target.document(), target.pointer(), &instance.as_plain())
    }

    /// Succeeds only if `instance` satisfies this schema.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValidationFailure` carrying every message otherwise.
    pub fn ensure_valid_instance(&self, instance: &impl AsPlain) -> Result<(), Error> {
        let target = self.core.validated();
        self.context
            .validator()
            .ensure_valid(target.document(), target.pointer(), &instance.as_plain())
    }

    fn validate_value(&self, value: &Value) -> Result<bool, Error> {
        let target = self.core.validated();
        self.context
            .validator()
            .validate(target.document(), target.pointer(), value)
    }
}

const OBJECT_KEYWORDS: &[&str] = &[
    "properties",
    "patternProperties",
    "additionalProperties",
    "required",
    "minProperties",
    "maxProperties",
    "dependencies",
];

const ARRAY_KEYWORDS: &[&str] = &[
    "items",
    "additionalItems",
    "minItems",
    "maxItems",
    "uniqueItems",
];

/// Whether `keyword` in a schema body implies a container shape.
///
/// `additionalProperties`/`additionalItems` only count when they are schemas
/// of their own; the boolean forms are routinely set on any schema.
fn implies_shape(map: &Map<String, Value>, keyword: &str) -> bool {
    match (keyword, map.get(keyword)) {
        (_, None) => false,
        ("additionalProperties" | "additionalItems", Some(v)) => v.is_object(),
        _ => true,
    }
}

fn is_schema_node(node: &Node) -> bool {
    matches!(node.value(), Value::Object(_) | Value::Bool(_))
}

/// What a location in a schema document holds, judged from the keywords
/// leading to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Schema,
    /// A map or array of subschemas, such as the value of `properties`.
    Container,
    /// Instance data, such as the value of `default`.
    Data,
}

const DATA_KEYWORDS: &[&str] = &["default", "enum", "const", "examples", "required", "type"];

impl Position {
    fn step(self, token: &Token, value: &Value) -> Self {
        match (self, token) {
            (Position::Data, _) => Position::Data,
            (Position::Container, _) => Position::Schema,
            (Position::Schema, Token::Key(key)) => {
                let key = key.as_str();
                if SCHEMA_MAP_KEYWORDS.contains(&key)
                    || (SCHEMA_ARRAY_KEYWORDS.contains(&key) && value.is_array())
                {
                    Position::Container
                } else if DATA_KEYWORDS.contains(&key) {
                    Position::Data
                } else {
                    Position::Schema
                }
            }
            (Position::Schema, Token::Index(_)) => Position::Data,
        }
    }
}

fn compute_schema_id(node: &Node) -> String {
    let tokens = node.pointer().tokens();
    let mut value = node.document().value();
    let mut position = Position::Schema;
    let mut base: Option<String> = None;
    let mut base_depth = 0;

    for depth in 0..=tokens.len() {
        if depth > 0 {
            let token = &tokens[depth - 1];
            let Some(next) = Pointer::new([token.clone()]).evaluate(value) else {
                break;
            };
            position = position.step(token, next);
            value = next;
        }
        // The schema's own node always counts; ancestors only as schema bodies.
        if position != Position::Schema && depth < tokens.len() {
            continue;
        }
        // Plain-name anchors (`#item`) name a schema but do not rebase it.
        if let Some(id) = declared_id(value).filter(|id| !id.starts_with('#')) {
            base = Some(resolve_id(base.as_deref(), id));
            base_depth = depth;
        }
    }

    let base =
        base.unwrap_or_else(|| format!("urn:schema-view:{}", node.document().digest_hex()));
    let descended = Pointer::new(tokens[base_depth..].iter().cloned());
    let (uri, fragment) = base.split_once('#').unwrap_or((base.as_str(), ""));
    format!("{}#{}{}", uri, fragment, descended)
}

/// Resolve a declared id against the enclosing base, as a relative URI.
fn resolve_id(base: Option<&str>, id: &str) -> String {
    if url::Url::parse(id).is_ok() {
        return id.to_string();
    }
    base.and_then(|base| url::Url::parse(base).ok())
        .and_then(|base| base.join(id).ok())
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|| id.to_string())
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.core.key == other.core.key
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.key.hash(state);
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema({})", self.schema_id())
    }
}

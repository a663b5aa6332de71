//! Instances: plain data viewed through a schema.
//!
//! Reading a property resolves the property's subschema, matches it to the
//! child value, and wraps the child with it. Writing replaces the wrapper's
//! node with one over a new document; wrappers over the old document keep
//! seeing the old data.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;

use crate::document::{fingerprint, Node};
use crate::error::{Error, SchemaError};
use crate::plain::{AsPlain, Datum};
use crate::pointer::Token;
use crate::schema::Schema;
use crate::types::json_type_name;
use crate::view::ViewDefinition;

/// What a read returns: containers with a subschema come back wrapped,
/// everything else as a plain value.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Instance(Instance),
    Value(Value),
}

impl Element {
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Element::Instance(instance) => Some(instance),
            Element::Value(_) => None,
        }
    }

    pub fn into_instance(self) -> Option<Instance> {
        match self {
            Element::Instance(instance) => Some(instance),
            Element::Value(_) => None,
        }
    }

    pub fn is_instance(&self) -> bool {
        matches!(self, Element::Instance(_))
    }
}

/// A node bound to a schema and that schema's view definition.
#[derive(Clone)]
pub struct Instance {
    node: Node,
    schema: Schema,
    view: Arc<ViewDefinition>,
}

impl Instance {
    /// Wrap plain data (a value or a node) with `schema`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInstance` when `data` is a schema or already an
    /// instance, and any error raised building the schema's view.
    pub fn new(data: impl Into<Datum>, schema: Schema) -> Result<Self, Error> {
        let node = match data.into() {
            Datum::Value(value) => Node::new(value),
            Datum::Node(node) => node,
            Datum::Schema(s) => {
                return Err(Error::InvalidInstance {
                    message: format!("{:?} cannot be wrapped as instance data", s),
                })
            }
            Datum::Instance(i) => {
                return Err(Error::InvalidInstance {
                    message: format!(
                        "{} is already an instance of {}",
                        i.fragment(),
                        i.schema.schema_id()
                    ),
                })
            }
        };
        Self::bind(node, schema)
    }

    fn bind(node: Node, schema: Schema) -> Result<Self, Error> {
        let view = schema.view()?;
        Ok(Instance { node, schema, view })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn view(&self) -> &Arc<ViewDefinition> {
        &self.view
    }

    pub fn value(&self) -> &Value {
        self.node.value()
    }

    pub fn fragment(&self) -> String {
        self.node.fragment()
    }

    /// Keys of an object instance, in document order.
    pub fn keys(&self) -> Vec<String> {
        self.node.keys()
    }

    pub fn len(&self) -> Option<usize> {
        self.node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len().map_or(true, |n| n == 0)
    }

    /// Read property `name`.
    ///
    /// An absent property falls back to its subschema's `default`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotIndexable` unless the instance is an object, and
    /// any error raised resolving the property's subschema.
    pub fn get(&self, name: &str) -> Result<Option<Element>, Error> {
        if !self.node.is_object() {
            return Err(self.not_indexable(Token::from(name)));
        }
        let subschema = self.schema.subschema_for_property(name)?;

        match (self.node.get(name), subschema) {
            (Some(child), Some(subschema)) => self.wrap(child, &subschema).map(Some),
            (Some(child), None) => Ok(Some(Element::Value(child.value().clone()))),
            (None, Some(subschema)) => match subschema.default_value()? {
                Some(default) => self.wrap(Node::new(default), &subschema).map(Some),
                None => Ok(None),
            },
            (None, None) => Ok(None),
        }
    }

    /// Read property `name` through the view definition's accessor table.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoSuchAccessor` when the schema does not declare
    /// `name`, otherwise as [`Instance::get`].
    pub fn accessor(&self, name: &str) -> Result<Option<Element>, Error> {
        if !self.view.has_accessor(name) {
            return Err(Error::NoSuchAccessor {
                schema_id: self.view.display_name().to_string(),
                name: name.to_string(),
            });
        }
        self.get(name)
    }

    /// Read element `index` of an array instance.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotIndexable` unless the instance is an array.
    pub fn index(&self, index: usize) -> Result<Option<Element>, Error> {
        if !self.node.is_array() {
            return Err(self.not_indexable(Token::Index(index)));
        }
        let Some(child) = self.node.get(index) else {
            return Ok(None);
        };
        match self.schema.subschema_for_index(index)? {
            Some(subschema) => self.wrap(child, &subschema).map(Some),
            None => Ok(Some(Element::Value(child.value().clone()))),
        }
    }

    /// Every property of an object instance, read as by [`Instance::get`].
    pub fn entries(&self) -> Result<Vec<(String, Element)>, Error> {
        let mut entries = Vec::new();
        for key in self.keys() {
            if let Some(element) = self.get(&key)? {
                entries.push((key, element));
            }
        }
        Ok(entries)
    }

    /// Every element of an array instance, read as by [`Instance::index`].
    pub fn elements(&self) -> Result<Vec<Element>, Error> {
        if !self.node.is_array() {
            return Err(self.not_indexable(Token::Index(0)));
        }
        let mut elements = Vec::new();
        for i in 0..self.len().unwrap_or(0) {
            if let Some(element) = self.index(i)? {
                elements.push(element);
            }
        }
        Ok(elements)
    }

    fn wrap(&self, child: Node, subschema: &Schema) -> Result<Element, Error> {
        if !(child.is_object() || child.is_array()) {
            return Ok(Element::Value(child.value().clone()));
        }
        let matched = subschema.match_to_instance(&child)?;
        Self::bind(child, matched).map(Element::Instance)
    }

    /// Replace property `name` with the plain content of `value`.
    ///
    /// Only this wrapper moves to the new document.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAssignable` unless the instance is an object.
    pub fn set(&mut self, name: &str, value: impl AsPlain) -> Result<(), Error> {
        let Value::Object(_) = self.node.value() else {
            return Err(self.not_assignable(Token::from(name)));
        };
        let value = value.as_plain();
        self.node = self.node.with_value_at_pointer(|mut current| {
            if let Value::Object(map) = &mut current {
                map.insert(name.to_string(), value);
            }
            current
        })?;
        tracing::trace!(at = %self.fragment(), property = name, "replaced property");
        Ok(())
    }

    /// Replace element `index`; `index == len` appends.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAssignable` unless the instance is an array and
    /// `index` is at most its length.
    pub fn set_index(&mut self, index: usize, value: impl AsPlain) -> Result<(), Error> {
        let len = match self.node.value() {
            Value::Array(items) => items.len(),
            _ => return Err(self.not_assignable(Token::Index(index))),
        };
        if index > len {
            return Err(Error::NotAssignable {
                pointer: self.fragment(),
                token: Token::Index(index).to_string(),
                actual: format!("array of length {}", len),
            });
        }
        let value = value.as_plain();
        self.node = self.node.with_value_at_pointer(|mut current| {
            if let Value::Array(items) = &mut current {
                if index == items.len() {
                    items.push(value);
                } else {
                    items[index] = value;
                }
            }
            current
        })?;
        Ok(())
    }

    /// A new instance over `transform` applied to this instance's plain
    /// value, with the same schema. `self` is unchanged.
    pub fn modified_copy<F>(&self, transform: F) -> Result<Instance, Error>
    where
        F: FnOnce(Value) -> Value,
    {
        let node = Node::new(transform(self.value().clone()));
        Self::bind(node, self.schema.clone())
    }

    pub fn validate(&self) -> Result<bool, Error> {
        self.schema.validate_instance(self)
    }

    pub fn fully_validate(&self) -> Result<Vec<SchemaError>, Error> {
        self.schema.fully_validate_instance(self)
    }

    /// # Errors
    ///
    /// Returns `Error::ValidationFailure` if the instance does not satisfy
    /// its schema.
    pub fn ensure_valid(&self) -> Result<(), Error> {
        self.schema.ensure_valid_instance(self)
    }

    fn not_indexable(&self, token: Token) -> Error {
        Error::NotIndexable {
            pointer: self.fragment(),
            token: token.to_string(),
            actual: json_type_name(self.value()).to_string(),
        }
    }

    fn not_assignable(&self, token: Token) -> Error {
        Error::NotAssignable {
            pointer: self.fragment(),
            token: token.to_string(),
            actual: json_type_name(self.value()).to_string(),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fingerprint(self.value()).hash(state);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({} {})", self.schema.schema_id(), self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::validator::JsonSchemaValidator;
    use serde_json::json;

    fn schema(value: Value) -> Schema {
        Schema::new_in(Context::new(JsonSchemaValidator::default()), value).unwrap()
    }

    fn pet_schema() -> Schema {
        schema(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "tags": { "type": "array", "items": { "type": "object" } },
                "owner": {
                    "type": "object",
                    "properties": { "email": { "type": "string" } }
                },
                "status": { "type": "string", "default": "available" },
                "meta": { "type": "object", "default": { "source": "import" } }
            },
            "required": ["name"]
        }))
    }

    #[test]
    fn refuses_to_wrap_schemas_and_instances() {
        let s = pet_schema();
        assert!(matches!(
            Instance::new(s.clone(), s.clone()),
            Err(Error::InvalidInstance { .. })
        ));
        let instance = Instance::new(json!({}), s.clone()).unwrap();
        assert!(matches!(
            Instance::new(instance, s),
            Err(Error::InvalidInstance { .. })
        ));
    }

    #[test]
    fn get_wraps_containers_and_returns_scalars() {
        let pet = Instance::new(
            json!({ "name": "Rex", "owner": { "email": "a@b" }, "extra": [1] }),
            pet_schema(),
        )
        .unwrap();

        assert_eq!(pet.get("name").unwrap(), Some(Element::Value(json!("Rex"))));

        let owner = pet.get("owner").unwrap().unwrap().into_instance().unwrap();
        assert_eq!(owner.fragment(), "#/owner");
        assert_eq!(owner.schema().pointer().to_string(), "/properties/owner");
        assert_eq!(owner.get("email").unwrap(), Some(Element::Value(json!("a@b"))));

        // No subschema: plain value.
        assert_eq!(pet.get("extra").unwrap(), Some(Element::Value(json!([1]))));
        assert_eq!(pet.get("missing").unwrap(), None);
    }

    #[test]
    fn get_on_non_object_is_not_indexable() {
        let list = Instance::new(json!([1, 2]), schema(json!({ "items": {} }))).unwrap();
        assert!(matches!(list.get("a"), Err(Error::NotIndexable { .. })));
    }

    #[test]
    fn absent_properties_fall_back_to_defaults() {
        let pet = Instance::new(json!({ "name": "Rex" }), pet_schema()).unwrap();
        assert_eq!(
            pet.get("status").unwrap(),
            Some(Element::Value(json!("available")))
        );
        let meta = pet.get("meta").unwrap().unwrap();
        assert!(meta.is_instance());
        assert_eq!(meta.as_plain(), json!({ "source": "import" }));
        // Defaults never land in the data.
        assert_eq!(pet.value(), &json!({ "name": "Rex" }));
    }

    #[test]
    fn accessor_dispatch_uses_the_view() {
        let pet = Instance::new(json!({ "name": "Rex", "other": 1 }), pet_schema()).unwrap();
        assert_eq!(
            pet.accessor("name").unwrap(),
            Some(Element::Value(json!("Rex")))
        );
        assert!(matches!(
            pet.accessor("other"),
            Err(Error::NoSuchAccessor { ref name, .. }) if name == "other"
        ));
    }

    #[test]
    fn index_access_resolves_items() {
        let pet = Instance::new(
            json!({ "name": "Rex", "tags": [{ "k": "v" }, "loose"] }),
            pet_schema(),
        )
        .unwrap();
        let tags = pet.get("tags").unwrap().unwrap().into_instance().unwrap();
        let first = tags.index(0).unwrap().unwrap();
        assert_eq!(
            first.as_instance().unwrap().schema().pointer().to_string(),
            "/properties/tags/items"
        );
        assert_eq!(tags.index(1).unwrap(), Some(Element::Value(json!("loose"))));
        assert_eq!(tags.index(2).unwrap(), None);
        assert_eq!(tags.elements().unwrap().len(), 2);
        assert!(matches!(pet.index(0), Err(Error::NotIndexable { .. })));
    }

    #[test]
    fn set_is_copy_on_write() {
        let s = pet_schema();
        let mut writer = Instance::new(json!({ "name": "Rex" }), s.clone()).unwrap();
        let reader = writer.clone();

        writer.set("name", json!("Max")).unwrap();
        assert_eq!(writer.get("name").unwrap(), Some(Element::Value(json!("Max"))));
        assert_eq!(reader.get("name").unwrap(), Some(Element::Value(json!("Rex"))));
    }

    #[test]
    fn set_accepts_wrapped_values() {
        let s = pet_schema();
        let source = Instance::new(json!({ "owner": { "email": "x@y" } }), s.clone()).unwrap();
        let owner = source.get("owner").unwrap().unwrap();

        let mut target = Instance::new(json!({}), s).unwrap();
        target.set("owner", &owner).unwrap();
        assert_eq!(target.value(), &json!({ "owner": { "email": "x@y" } }));
    }

    #[test]
    fn set_on_array_is_not_assignable() {
        let mut list = Instance::new(json!([]), schema(json!({ "items": {} }))).unwrap();
        assert!(matches!(
            list.set("a", json!(1)),
            Err(Error::NotAssignable { .. })
        ));
    }

    #[test]
    fn set_index_replaces_and_appends() {
        let mut list = Instance::new(json!([1]), schema(json!({ "items": {} }))).unwrap();
        list.set_index(0, json!(5)).unwrap();
        list.set_index(1, json!(6)).unwrap();
        assert_eq!(list.value(), &json!([5, 6]));
        assert!(matches!(
            list.set_index(5, json!(0)),
            Err(Error::NotAssignable { .. })
        ));
    }

    #[test]
    fn nested_set_keeps_its_pointer() {
        let pet = Instance::new(json!({ "owner": { "email": "a" } }), pet_schema()).unwrap();
        let mut owner = pet.get("owner").unwrap().unwrap().into_instance().unwrap();
        owner.set("email", json!("b")).unwrap();
        assert_eq!(owner.fragment(), "#/owner");
        assert_eq!(owner.node().root_node().value(), &json!({ "owner": { "email": "b" } }));
        assert_eq!(pet.value(), &json!({ "owner": { "email": "a" } }));
    }

    #[test]
    fn modified_copy_leaves_original() {
        let pet = Instance::new(json!({ "name": "Rex" }), pet_schema()).unwrap();
        let copy = pet
            .modified_copy(|mut v| {
                v["name"] = json!("Max");
                v
            })
            .unwrap();
        assert_eq!(copy.value(), &json!({ "name": "Max" }));
        assert_eq!(pet.value(), &json!({ "name": "Rex" }));
        assert_eq!(copy.schema(), pet.schema());
    }

    #[test]
    fn equality_ignores_schema() {
        let a = Instance::new(json!({ "x": 1 }), schema(json!({ "type": "object" }))).unwrap();
        let b = Instance::new(json!({ "x": 1 }), schema(json!({}))).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Instance::new(json!({ "x": 2 }), schema(json!({}))).unwrap());
    }

    #[test]
    fn validation_delegates_to_schema() {
        let valid = Instance::new(json!({ "name": "Rex" }), pet_schema()).unwrap();
        assert!(valid.validate().unwrap());
        valid.ensure_valid().unwrap();

        let invalid = Instance::new(json!({ "name": 5 }), pet_schema()).unwrap();
        assert!(!invalid.validate().unwrap());
        let errors = invalid.fully_validate().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/name");
        assert!(matches!(
            invalid.ensure_valid(),
            Err(Error::ValidationFailure { .. })
        ));
    }

    #[test]
    fn nested_instances_validate_against_their_subschema() {
        let pet = Instance::new(json!({ "owner": { "email": 1 } }), pet_schema()).unwrap();
        let owner = pet.get("owner").unwrap().unwrap().into_instance().unwrap();
        let errors = owner.fully_validate().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/email");
    }
}

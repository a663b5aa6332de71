//! Plain JSON values: projection out of wrappers, and key normalization for
//! documents from sources that allow non-string keys.

use serde_json::{Map, Number, Value};

use crate::document::Node;
use crate::error::Error;
use crate::instance::{Element, Instance};
use crate::pointer::Pointer;
use crate::schema::Schema;

/// Anything handed to a schema or instance constructor.
///
/// Constructors decide which variants they accept: schemas take any of
/// them, instances reject `Schema` and `Instance`.
#[derive(Debug, Clone)]
pub enum Datum {
    Value(Value),
    Node(Node),
    Schema(Schema),
    Instance(Instance),
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Value(value)
    }
}

impl From<Node> for Datum {
    fn from(node: Node) -> Self {
        Datum::Node(node)
    }
}

impl From<Schema> for Datum {
    fn from(schema: Schema) -> Self {
        Datum::Schema(schema)
    }
}

impl From<Instance> for Datum {
    fn from(instance: Instance) -> Self {
        Datum::Instance(instance)
    }
}

/// Projection to a plain JSON value, free of any wrapper.
pub trait AsPlain {
    fn as_plain(&self) -> Value;
}

impl AsPlain for Value {
    fn as_plain(&self) -> Value {
        self.clone()
    }
}

impl AsPlain for Node {
    fn as_plain(&self) -> Value {
        self.value().clone()
    }
}

impl AsPlain for Schema {
    fn as_plain(&self) -> Value {
        self.node().value().clone()
    }
}

impl AsPlain for Instance {
    fn as_plain(&self) -> Value {
        self.value().clone()
    }
}

impl AsPlain for Element {
    fn as_plain(&self) -> Value {
        match self {
            Element::Instance(instance) => instance.as_plain(),
            Element::Value(value) => value.clone(),
        }
    }
}

impl AsPlain for Datum {
    fn as_plain(&self) -> Value {
        match self {
            Datum::Value(value) => value.clone(),
            Datum::Node(node) => node.as_plain(),
            Datum::Schema(schema) => schema.as_plain(),
            Datum::Instance(instance) => instance.as_plain(),
        }
    }
}

impl<T: AsPlain + ?Sized> AsPlain for &T {
    fn as_plain(&self) -> Value {
        (**self).as_plain()
    }
}

/// Convert a YAML value into JSON, turning every scalar mapping key into a
/// string (`1` → `"1"`, `true` → `"true"`, `~` → `"null"`). Tags are dropped.
///
/// # Errors
///
/// Returns `Error::TypeMismatch` for sequence or mapping keys, and for
/// numbers JSON cannot represent.
pub fn normalize_keys(value: serde_yaml::Value) -> Result<Value, Error> {
    normalize(value, &Pointer::root())
}

fn normalize(value: serde_yaml::Value, at: &Pointer) -> Result<Value, Error> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => Value::Number(json_number(&n, at)?),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| normalize(item, &at.child(i)))
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, item) in mapping {
                let key = key_string(key, at)?;
                let item = normalize(item, &at.child(key.as_str()))?;
                map.insert(key, item);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => normalize(tagged.value, at)?,
    })
}

fn key_string(key: serde_yaml::Value, at: &Pointer) -> Result<String, Error> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => key_string(tagged.value, at),
        Yaml::Sequence(_) | Yaml::Mapping(_) => Err(Error::TypeMismatch {
            pointer: at.fragment(),
            expected: "scalar mapping key".to_string(),
            actual: "collection".to_string(),
        }),
    }
}

fn json_number(n: &serde_yaml::Number, at: &Pointer) -> Result<Number, Error> {
    if let Some(i) = n.as_i64() {
        return Ok(Number::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Number::from(u));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .ok_or_else(|| Error::TypeMismatch {
            pointer: at.fragment(),
            expected: "finite number".to_string(),
            actual: n.to_string(),
        })
}

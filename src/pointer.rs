//! JSON Pointers (RFC 6901) as immutable token sequences.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// One step of a pointer: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    Key(String),
    Index(usize),
}

impl Token {
    /// Reference-token text, unescaped.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Token::Key(key) => std::borrow::Cow::Borrowed(key.as_str()),
            Token::Index(i) => std::borrow::Cow::Owned(i.to_string()),
        }
    }

    /// Array position this token addresses, if any.
    fn as_index(&self) -> Option<usize> {
        match self {
            Token::Index(i) => Some(*i),
            Token::Key(key) => parse_index(key),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Key(key) => write!(f, "{:?}", key),
            Token::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Token {
    fn from(key: &str) -> Self {
        Token::Key(key.to_string())
    }
}

impl From<String> for Token {
    fn from(key: String) -> Self {
        Token::Key(key)
    }
}

impl From<usize> for Token {
    fn from(index: usize) -> Self {
        Token::Index(index)
    }
}

/// Location within a document, from its root.
///
/// Cloning is cheap; extending a pointer allocates a new token list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pointer(Arc<[Token]>);

impl Pointer {
    /// The empty pointer, denoting the document root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        Pointer(tokens.into_iter().collect())
    }

    /// Parse an RFC 6901 string such as `/properties/a~1b/0`.
    ///
    /// Segments made only of digits become index tokens.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return Some(Self::root());
        }
        let rest = text.strip_prefix('/')?;
        Some(Pointer::new(rest.split('/').map(|part| {
            let key = part.replace("~1", "/").replace("~0", "~");
            match parse_index(&key) {
                Some(i) => Token::Index(i),
                None => Token::Key(key),
            }
        })))
    }

    /// Parse a URI fragment such as `#/definitions/a`.
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        Self::parse(fragment.strip_prefix('#').unwrap_or(fragment))
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Token> {
        self.0.last()
    }

    /// Pointer with `token` appended.
    pub fn child(&self, token: impl Into<Token>) -> Self {
        let mut tokens = self.0.to_vec();
        tokens.push(token.into());
        Pointer(tokens.into())
    }

    /// Pointer to the enclosing container, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Pointer(init.into()))
    }

    /// Pointer with every token of `other` appended.
    pub fn join(&self, other: &Pointer) -> Self {
        Pointer::new(self.0.iter().chain(other.0.iter()).cloned())
    }

    pub fn starts_with(&self, prefix: &Pointer) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Tokens of `self` after `prefix`, if `prefix` is an ancestor.
    pub fn relative_to(&self, prefix: &Pointer) -> Option<Self> {
        self.0
            .strip_prefix(&prefix.0[..])
            .map(|rest| Pointer(rest.into()))
    }

    /// URI fragment form: `#` followed by the pointer string.
    pub fn fragment(&self) -> String {
        format!("#{}", self)
    }

    /// Value this pointer addresses within `document`.
    pub fn evaluate<'v>(&self, document: &'v Value) -> Option<&'v Value> {
        self.0
            .iter()
            .try_fold(document, |current, token| step(current, token))
    }

    /// This pointer with each token retyped by the container it steps into:
    /// keys for objects, indices for arrays. `None` if nothing is addressed.
    ///
    /// Two pointers addressing the same location of a document compare equal
    /// once canonicalized against it.
    pub fn canonical_in(&self, document: &Value) -> Option<Self> {
        let mut current = document;
        let mut tokens = Vec::with_capacity(self.0.len());
        for token in self.0.iter() {
            let canonical = match current {
                Value::Object(_) => Token::Key(token.as_text().into_owned()),
                Value::Array(_) => Token::Index(token.as_index()?),
                _ => return None,
            };
            current = step(current, &canonical)?;
            tokens.push(canonical);
        }
        Some(Pointer(tokens.into()))
    }

    /// Mutable value this pointer addresses within `document`.
    pub fn evaluate_mut<'v>(&self, document: &'v mut Value) -> Option<&'v mut Value> {
        let mut current = document;
        for token in self.0.iter() {
            current = match current {
                Value::Object(map) => map.get_mut(token.as_text().as_ref())?,
                Value::Array(items) => items.get_mut(token.as_index()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl Default for Pointer {
    fn default() -> Self {
        Pointer(Arc::from(Vec::new()))
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in self.0.iter() {
            let text = token.as_text();
            write!(f, "/{}", text.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromIterator<Token> for Pointer {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Pointer::new(iter)
    }
}

fn step<'v>(current: &'v Value, token: &Token) -> Option<&'v Value> {
    match current {
        Value::Object(map) => map.get(token.as_text().as_ref()),
        Value::Array(items) => items.get(token.as_index()?),
        _ => None,
    }
}

/// Decimal array index per RFC 6901: no sign, no leading zeros.
fn parse_index(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.len() > 1 && text.starts_with('0') {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_and_display() {
        let ptr = Pointer::parse("/properties/a~1b/items/0").unwrap();
        assert_eq!(
            ptr.tokens(),
            &[
                Token::from("properties"),
                Token::from("a/b"),
                Token::from("items"),
                Token::Index(0),
            ]
        );
        assert_eq!(ptr.to_string(), "/properties/a~1b/items/0");
        assert_eq!(ptr.fragment(), "#/properties/a~1b/items/0");
    }

    #[test]
    fn parse_rejects_relative() {
        assert!(Pointer::parse("properties").is_none());
        assert_eq!(Pointer::parse(""), Some(Pointer::root()));
        assert_eq!(Pointer::from_fragment("#"), Some(Pointer::root()));
    }

    #[test]
    fn leading_zero_is_a_key() {
        let ptr = Pointer::parse("/01").unwrap();
        assert_eq!(ptr.tokens(), &[Token::from("01")]);
    }

    #[test]
    fn child_and_parent() {
        let ptr = Pointer::root().child("a").child(2usize);
        assert_eq!(ptr.last(), Some(&Token::Index(2)));
        assert_eq!(ptr.parent(), Some(Pointer::root().child("a")));
        assert_eq!(Pointer::root().parent(), None);
    }

    #[test]
    fn relative_to_ancestor() {
        let base = Pointer::parse("/definitions/a").unwrap();
        let ptr = Pointer::parse("/definitions/a/properties/b").unwrap();
        assert!(ptr.starts_with(&base));
        assert_eq!(
            ptr.relative_to(&base),
            Some(Pointer::parse("/properties/b").unwrap())
        );
        assert_eq!(base.relative_to(&ptr), None);
    }

    #[test]
    fn evaluate_mixed_tokens() {
        let doc = json!({"a": [{"0": "key"}, "b"], "1": "one"});
        assert_eq!(
            Pointer::parse("/a/1").unwrap().evaluate(&doc),
            Some(&json!("b"))
        );
        // Index tokens address numeric keys of objects.
        assert_eq!(
            Pointer::parse("/1").unwrap().evaluate(&doc),
            Some(&json!("one"))
        );
        assert_eq!(
            Pointer::parse("/a/0/0").unwrap().evaluate(&doc),
            Some(&json!("key"))
        );
        assert_eq!(Pointer::parse("/a/5").unwrap().evaluate(&doc), None);
        assert_eq!(Pointer::parse("/a/1/x").unwrap().evaluate(&doc), None);
    }

    #[test]
    fn evaluate_mut_replaces() {
        let mut doc = json!({"a": {"b": 1}});
        *Pointer::parse("/a/b").unwrap().evaluate_mut(&mut doc).unwrap() = json!(2);
        assert_eq!(doc, json!({"a": {"b": 2}}));
    }
}

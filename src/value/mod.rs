//! Defines the [`Value`] enum and the [`Context`] used to bind variables.

mod from;
#[cfg(feature = "serde")]
mod ser;

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::mem;

#[cfg(feature = "serde")]
pub use crate::value::ser::to_value;

/// Data that can be bound to a variable, represented as a recursive enum.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// The binding context: a mapping from variable name to [`Value`].
///
/// Assembled by the caller from control block output and any per-driver or
/// per-restaurant facts, then read during evaluation and rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    bindings: BTreeMap<String, Value>,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(s), Self::Bool(o)) => s == o,
            (Self::Integer(s), Self::Integer(o)) => s == o,
            (Self::Float(s), Self::Float(o)) => s == o,
            (Self::String(s), Self::String(o)) => s == o,
            (Self::List(s), Self::List(o)) => s == o,
            (Self::Map(s), Self::Map(o)) => s == o,
            _ => mem::discriminant(self) == mem::discriminant(other),
        }
    }
}

impl Eq for Value {}

impl Value {
    /// Returns whether a conditional testing this value passes.
    ///
    /// `None` and `false` are falsy, numbers are truthy when non-zero and
    /// strings, lists and maps when non-empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
        }
    }

    pub(crate) fn human(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl Context {
    /// Construct an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from a serializable struct or map, one binding per
    /// field.
    ///
    /// # Examples
    ///
    /// ```
    /// #[derive(serde::Serialize)]
    /// struct Driver { name: String, is_split: bool }
    ///
    /// let driver = Driver { name: "Alice".into(), is_split: true };
    /// let ctx = mealdrive::Context::from_serialize(&driver)?;
    /// assert_eq!(ctx.get("name"), Some(&mealdrive::Value::from("Alice")));
    /// # Ok::<(), mealdrive::Error>(())
    /// ```
    #[cfg(feature = "serde")]
    pub fn from_serialize<T>(value: T) -> crate::Result<Self>
    where
        T: serde::Serialize,
    {
        match to_value(value)? {
            Value::Map(bindings) => Ok(Self { bindings }),
            value => Err(crate::Error::new(
                crate::ErrorKind::Serialize,
                format!(
                    "a binding context must be built from a struct or map, not a {}",
                    value.human()
                ),
            )),
        }
    }

    /// Binds a variable, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.bindings.insert(name.into(), value.into())
    }

    /// Looks up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates over the bindings in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.bindings.iter()
    }

    /// Adds every binding from `other`, overwriting existing names.
    pub fn merge(&mut self, other: Context) {
        self.bindings.extend(other.bindings);
    }
}

impl<K, V> FromIterator<(K, V)> for Context
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            bindings: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K, V> Extend<(K, V)> for Context
where
    K: Into<String>,
    V: Into<Value>,
{
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.bindings
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(Value::from(true).is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(Value::from(-3).is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
        assert!(Value::from(vec!["a"]).is_truthy());
    }

    #[test]
    fn context_merge_overwrites() {
        let mut a: Context = [("X", 1), ("Y", 2)].into_iter().collect();
        let b: Context = [("Y", 3)].into_iter().collect();
        a.merge(b);
        assert_eq!(a.get("X"), Some(&Value::Integer(1)));
        assert_eq!(a.get("Y"), Some(&Value::Integer(3)));
        assert_eq!(a.len(), 2);
    }
}

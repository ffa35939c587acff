//! Dynamic values and the per-invocation context namespace.
//!
//! Handlers exchange [`Value`]s: they receive them as resolved arguments and
//! return one as their result. [`Context`] is the mutable namespace a single
//! invocation owns.

use crate::error::{Error, Result};
use crate::node::TreeNode;
use crate::tree::Element;
use indexmap::IndexMap;
use indexmap::map::Entry;

#[derive(Debug, Clone, PartialEq)]
pub enum Value<N = Element> {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value<N>>),
    Map(IndexMap<String, Value<N>>),
    Node(N),
}

impl<N> Default for Value<N> {
    fn default() -> Self {
        Value::None
    }
}

impl<N: TreeNode> Value<N> {
    /// Name of the variant, used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "a bool",
            Value::Int(_) => "an int",
            Value::Float(_) => "a float",
            Value::Str(_) => "a string",
            Value::List(_) => "a list",
            Value::Map(_) => "a map",
            Value::Node(_) => "a node",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value<N>]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value<N>>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value<N>>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&N> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn into_node(self) -> Option<N> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Truthiness: empty containers, zero and none are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Node(_) => true,
        }
    }

    /// Text form used when joining or comparing values as strings. Nodes
    /// contribute their full text.
    pub fn to_text(&self) -> String {
        match self {
            Value::None => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items.iter().map(Value::to_text).collect::<Vec<_>>().join(""),
            Value::Map(_) => String::new(),
            Value::Node(node) => node.full_text(),
        }
    }

    /// Clone that also deep-copies contained nodes.
    pub fn deep_clone(&self) -> Self {
        match self {
            Value::List(items) => Value::List(items.iter().map(Value::deep_clone).collect()),
            Value::Map(map) => Value::Map(map.iter().map(|(k, v)| (k.clone(), v.deep_clone())).collect()),
            Value::Node(node) => Value::Node(node.deep_copy()),
            other => other.clone(),
        }
    }
}

impl<N> From<bool> for Value<N> {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<N> From<i64> for Value<N> {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl<N> From<i32> for Value<N> {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl<N> From<usize> for Value<N> {
    fn from(value: usize) -> Self {
        Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl<N> From<f64> for Value<N> {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl<N> From<&str> for Value<N> {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl<N> From<String> for Value<N> {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl<N> From<Option<String>> for Value<N> {
    fn from(value: Option<String>) -> Self {
        value.map_or(Value::None, Value::Str)
    }
}

impl<N> From<Vec<Value<N>>> for Value<N> {
    fn from(value: Vec<Value<N>>) -> Self {
        Value::List(value)
    }
}

impl<N> From<()> for Value<N> {
    fn from(_: ()) -> Self {
        Value::None
    }
}

/// The mutable per-invocation namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Context<N = Element> {
    values: IndexMap<String, Value<N>>,
}

impl<N> Default for Context<N> {
    fn default() -> Self {
        Context { values: IndexMap::new() }
    }
}

impl<N: TreeNode> Context<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context holding deep clones of `initial`, so no node is shared with
    /// the configuration it came from.
    pub(crate) fn seeded(initial: &Context<N>) -> Self {
        Context { values: initial.values.iter().map(|(k, v)| (k.clone(), v.deep_clone())).collect() }
    }

    pub fn get(&self, name: &str) -> Option<&Value<N>> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value<N>> {
        self.values.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value<N>>) -> Option<Value<N>> {
        self.values.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value<N>> {
        self.values.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Pushes onto the list stored as `name`, creating it when absent.
    pub fn append(&mut self, name: &str, value: impl Into<Value<N>>) -> Result<()> {
        match self.values.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Value::List(vec![value.into()]));
                Ok(())
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::List(items) => {
                    items.push(value.into());
                    Ok(())
                }
                other => Err(Error::TypeMismatch { symbol: name.to_string(), expected: "a list", found: other.kind() }),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value<N>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<N: TreeNode, K: Into<String>, V: Into<Value<N>>> FromIterator<(K, V)> for Context<N> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Context { values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl<N> From<Context<N>> for Value<N> {
    fn from(context: Context<N>) -> Self {
        Value::Map(context.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn append_creates_and_extends_lists() {
        let mut context: Context = Context::new();
        context.append("items", "a").unwrap();
        context.append("items", 2i64).unwrap();

        assert_eq!(context.get("items"), Some(&Value::List(vec![Value::from("a"), Value::Int(2)])));
    }

    #[test]
    fn append_to_non_list_is_a_type_mismatch() {
        let mut context: Context = Context::new();
        context.insert("count", 1i64);

        let err = context.append("count", 2i64).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref symbol, found: "an int", .. } if symbol == "count"));
    }

    #[test]
    fn seeded_context_does_not_share_nodes() {
        let node = Element::new("n");
        let mut initial: Context = Context::new();
        initial.insert("node", Value::Node(node.clone()));
        initial.insert("list", Value::List(vec![Value::Node(node.clone())]));

        let seeded = Context::seeded(&initial);

        let copied = seeded.get("node").and_then(Value::as_node).unwrap();
        assert_ne!(copied, &node);
        assert_eq!(copied.local_name(), "n");
        assert_ne!(seeded.get("list").and_then(Value::as_list).unwrap()[0], Value::Node(node));
    }

    #[test]
    fn truthiness() {
        let values: Vec<Value> = vec![Value::None, 0i64.into(), "".into(), Value::List(vec![]), false.into()];
        assert!(values.iter().all(|v| !v.is_truthy()));
        assert!(Value::<Element>::from("x").is_truthy());
    }
}

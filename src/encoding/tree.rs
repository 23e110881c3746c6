//! Encoder input: a closed tree of maps, arrays and leaf values.
//!
//! Trees are assembled with explicit per-kind builders, so there is no
//! runtime inspection of what a value "looks like". In particular a numeric
//! block only exists when it was built from floats with [`Tree::numeric`].

use super::value::ValueNode;
use std::collections::BTreeMap;

/// A value tree ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    Leaf(ValueNode),
    Array(Vec<Tree>),
    /// Ordered so encoded output is deterministic.
    Map(BTreeMap<String, Tree>),
}

impl Tree {
    pub fn null() -> Self {
        Tree::Leaf(ValueNode::Null)
    }

    pub fn bool(value: bool) -> Self {
        Tree::Leaf(ValueNode::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Tree::Leaf(ValueNode::Int64(value))
    }

    pub fn float(value: f64) -> Self {
        Tree::Leaf(ValueNode::Float64(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Tree::Leaf(ValueNode::String(value.into()))
    }

    pub fn bytes(value: Vec<u8>) -> Self {
        Tree::Leaf(ValueNode::RawBytes(value))
    }

    /// A series of floats travelling as a single frame.
    pub fn numeric(values: Vec<f64>) -> Self {
        Tree::Leaf(ValueNode::NumericBlock(values))
    }

    pub fn array(items: impl IntoIterator<Item = Tree>) -> Self {
        Tree::Array(items.into_iter().collect())
    }

    /// An array of integers, e.g. `[remaining, total]`.
    pub fn int_array(items: impl IntoIterator<Item = i64>) -> Self {
        Tree::Array(items.into_iter().map(Tree::int).collect())
    }

    /// An empty map. Encodes as an object marker until entries are added.
    pub fn map() -> Self {
        Tree::Map(BTreeMap::new())
    }

    /// Builder-style insert. Non-map trees are returned unchanged.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Tree>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert into a map. Returns `false` if this tree is not a map.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Tree>) -> bool {
        match self {
            Tree::Map(map) => {
                map.insert(key.into(), value.into());
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Tree> {
        match self {
            Tree::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&ValueNode> {
        match self {
            Tree::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// A map with a single entry.
    pub fn keyed(key: impl Into<String>, value: Tree) -> Self {
        Tree::map().with(key, value)
    }
}

impl From<ValueNode> for Tree {
    fn from(value: ValueNode) -> Self {
        Tree::Leaf(value)
    }
}

impl From<bool> for Tree {
    fn from(value: bool) -> Self {
        Tree::bool(value)
    }
}

impl From<i64> for Tree {
    fn from(value: i64) -> Self {
        Tree::int(value)
    }
}

impl From<f64> for Tree {
    fn from(value: f64) -> Self {
        Tree::float(value)
    }
}

impl From<&str> for Tree {
    fn from(value: &str) -> Self {
        Tree::string(value)
    }
}

impl From<String> for Tree {
    fn from(value: String) -> Self {
        Tree::string(value)
    }
}

impl<T: Into<Tree>> From<Option<T>> for Tree {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(Tree::null)
    }
}

impl From<serde_json::Value> for Tree {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Tree::null(),
            Value::Bool(b) => Tree::bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Tree::int(i),
                None => Tree::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Tree::string(s),
            Value::Array(items) => Tree::array(items.into_iter().map(Tree::from)),
            Value::Object(entries) => {
                Tree::Map(entries.into_iter().map(|(k, v)| (k, Tree::from(v))).collect())
            }
        }
    }
}

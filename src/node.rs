//! The node capability set consumed by the engine.
//!
//! The engine never looks at a concrete tree type. Everything it needs from a
//! document (names, attributes, navigation, query evaluation and copying) is
//! expressed by [`TreeNode`]. Handlers that rewrite documents additionally use
//! [`TreeNodeMut`]; the engine core itself never mutates nodes.
//!
//! Nodes are *handles*: cloning one yields another reference to the same node
//! and `PartialEq` compares identity, not structure. This mirrors how the
//! engine uses them, e.g. "is this node part of the query result" or "is this
//! node the invocation root".
//!
//! [`crate::tree::Element`] is the implementation shipped with the crate.

use indexmap::IndexMap;
use std::fmt;

/// A query or selector expression failed to parse or evaluate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{expression}`: {message}")]
pub struct QueryError {
    pub expression: String,
    pub message: String,
}

impl QueryError {
    pub fn new(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self { expression: expression.into(), message: message.into() }
    }
}

/// Read access to a node of a hierarchical document.
pub trait TreeNode: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The node's name without any namespace prefix.
    fn local_name(&self) -> String;

    /// The namespace URI, if the node is in one.
    fn namespace(&self) -> Option<String>;

    /// All attributes in document order.
    fn attributes(&self) -> IndexMap<String, String>;

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes().swap_remove(name)
    }

    /// Element children in document order.
    fn children(&self) -> Vec<Self>;

    fn parent(&self) -> Option<Self>;

    fn previous_sibling(&self) -> Option<Self>;

    fn next_sibling(&self) -> Option<Self>;

    /// Text before the first child.
    fn text(&self) -> Option<String>;

    /// Text following the node, up to its next sibling.
    fn tail(&self) -> Option<String>;

    /// Concatenated text of the node and all its descendants.
    fn full_text(&self) -> String;

    /// Evaluates a raw query-language expression with `self` as context node.
    fn query(&self, expression: &str) -> Result<Vec<Self>, QueryError>;

    /// Evaluates a structural selector against `self` and its descendants.
    fn select(&self, selector: &str) -> Result<Vec<Self>, QueryError>;

    /// Whether `expression` is valid in the structural selector grammar.
    fn is_selector(expression: &str) -> bool;

    /// A detached deep copy of the node and its subtree.
    fn deep_copy(&self) -> Self;
}

/// In-place modifications, used by handlers that rewrite documents.
pub trait TreeNodeMut: TreeNode {
    fn set_local_name(&self, name: &str);

    fn set_text(&self, text: Option<&str>);

    fn set_tail(&self, tail: Option<&str>);

    fn set_attribute(&self, name: &str, value: &str);

    fn remove_attribute(&self, name: &str) -> Option<String>;

    fn clear_attributes(&self);

    /// Appends `child` as last child, detaching it from its previous parent.
    fn append_child(&self, child: Self);

    /// Removes the node from its parent. The node's tail text stays in the
    /// document.
    fn detach(&self);
}

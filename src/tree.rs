//! A small XML element tree implementing [`TreeNode`](crate::TreeNode).
//!
//! The engine works with any node type; this one exists so documents can be
//! parsed, queried, transformed and serialized without further dependencies
//! beyond `quick-xml`.
//!
//! ```
//! use trellis::tree::Element;
//! use trellis::TreeNode;
//!
//! let root = Element::parse("<list><item>a</item><item>b</item></list>").unwrap();
//! let items = root.select("item").unwrap();
//! assert_eq!(items.len(), 2);
//! assert_eq!(root.to_xml(), "<list><item>a</item><item>b</item></list>");
//! ```

#[path = "tree/element.rs"]
mod element;
#[path = "tree/parse.rs"]
mod parse;
#[path = "tree/query.rs"]
mod query;

pub use element::Element;
pub use parse::ParseError;

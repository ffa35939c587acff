//! Declarative tree transformations.
//!
//! A [`Transformation`] is an ordered pipeline of steps run against a document
//! tree. Steps are plain [`Handler`]s, [`Rule`]s (conditions plus handlers,
//! applied to every node a traversal visits) or nested transformations.
//! Handlers declare the names of the values they need and get them injected
//! from the current node, the previous result, the context or the
//! configuration.
//!
//! ```
//! use trellis::{Element, Transformation, Value};
//! use trellis::handlers::{append, get_attribute};
//!
//! let links: Transformation = Transformation::builder()
//!     .rule(["a"], [get_attribute("href"), append("links")])
//!     .result_object("context.links")
//!     .build()
//!     .unwrap();
//!
//! let doc = Element::parse(r#"<p><a href="x">x</a> and <a href="y">y</a></p>"#).unwrap();
//! assert_eq!(links.invoke(&doc).unwrap(), Value::List(vec!["x".into(), "y".into()]));
//! ```
//!
//! Errors raised by handlers arrive wrapped in [`Error::Handler`], which names
//! the handler, the step and the node. The original error is kept:
//!
//! ```
//! use std::num::ParseIntError;
//! use trellis::{Element, Handler, Transformation, Value};
//!
//! let parse: Handler = Handler::new("parse", &[], |_| {
//!     "x".parse::<u32>()?;
//!     Ok(Value::default())
//! });
//! let transformation: Transformation = Transformation::builder().step(parse).build().unwrap();
//!
//! let err = transformation.invoke(&Element::new("r")).unwrap_err();
//! assert!(err.handler_source().is_some_and(|e| e.downcast_ref::<ParseIntError>().is_some()));
//! ```
//!
//! The engine is generic over [`TreeNode`]; [`tree::Element`] is the bundled
//! implementation.

extern crate self as trellis;

#[macro_use]
mod macros;
mod api;
pub mod contrib;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod node;
pub mod tree;
pub mod value;

pub use api::{Overrides, transform_str, transform_to_string};
pub use engine::{
    AttributeMatcher, Condition, Flow, Handler, Invocation, PlanCache, Rule, Run, RunMetrics, Step, Transformation,
    TraversalOrder, Traverse,
};
pub use error::{Error, Result};
pub use node::{QueryError, TreeNode, TreeNodeMut};
pub use tree::Element;
pub use value::{Context, Value};

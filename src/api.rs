use crate::engine::Transformation;
use crate::error::{Error, Result};
use crate::node::TreeNode;
use crate::tree::Element;
use crate::value::Value;
use indexmap::IndexMap;

/// Call-time settings for one invocation.
///
/// Values are written into the fresh context after the configured initial
/// context, so they win over it. `copy` overrides the configured copy flag.
///
/// # Example
/// ```
/// use trellis::{Element, Overrides, Transformation, handler};
///
/// let greet: Transformation = Transformation::builder()
///     .step(handler!("greet", [greeting], |args| Ok(args.take("greeting"))))
///     .discard_result()
///     .build()
///     .unwrap();
///
/// let root = Element::new("doc");
/// let overrides = Overrides::new().set("greeting", "hi").copy(false);
/// assert!(greet.invoke_with(&root, overrides).unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Overrides<N: TreeNode = Element> {
    pub(crate) values: IndexMap<String, Value<N>>,
    pub(crate) copy: Option<bool>,
}

impl<N: TreeNode> Default for Overrides<N> {
    fn default() -> Self {
        Overrides { values: IndexMap::new(), copy: None }
    }
}

impl<N: TreeNode> Overrides<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value<N>>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn copy(mut self, copy: bool) -> Self {
        self.copy = Some(copy);
        self
    }
}

/// Parses `xml` and runs `transformation` on its root element.
///
/// The parsed tree is private to the call, so it is never copied.
pub fn transform_str(transformation: &Transformation, xml: &str) -> Result<Value> {
    let root = Element::parse(xml)?;
    transformation.invoke_with(&root, Overrides::new().copy(false))
}

/// Like [`transform_str`], serializing the resulting node.
///
/// # Example
/// ```
/// use trellis::{Transformation, transform_to_string};
/// use trellis::handlers::set_localname;
///
/// let rename: Transformation = Transformation::builder().rule(["b"], [set_localname("strong")]).build().unwrap();
/// assert_eq!(transform_to_string(&rename, "<p><b>x</b></p>").unwrap(), "<p><strong>x</strong></p>");
/// ```
pub fn transform_to_string(transformation: &Transformation, xml: &str) -> Result<String> {
    match transform_str(transformation, xml)? {
        Value::Node(node) => Ok(node.to_xml()),
        other => Err(Error::TypeMismatch { symbol: "result".to_string(), expected: "a node", found: other.kind() }),
    }
}

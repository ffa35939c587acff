use super::symbols::{Arguments, Signature};
use crate::error::BoxError;
use crate::node::TreeNode;
use crate::tree::Element;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Why a handler did not return a value.
///
/// The first three variants steer the engine, `Error` fails the invocation.
/// Any `std::error::Error` converts into `Flow::Error`, so `?` works inside
/// handlers.
#[derive(Debug)]
pub enum Flow {
    /// Skip the remaining handlers for the current node.
    SkipToNextNode,
    /// Stop the current rule's traversal.
    AbortRule,
    /// Skip all remaining steps; the result is still computed.
    AbortTransformation,
    Error(BoxError),
}

impl Flow {
    pub fn error(message: impl Into<String>) -> Self {
        Flow::Error(message.into().into())
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Flow {
    fn from(error: E) -> Self {
        Flow::Error(Box::new(error))
    }
}

type HandlerFn<N> = dyn Fn(&mut Arguments<'_, N>) -> Result<Value<N>, Flow> + Send + Sync;

/// A named callable with declared parameter names.
///
/// The declared names drive symbol resolution: each one is bound to a reserved
/// value, a context attribute or a configuration attribute before the call.
pub struct Handler<N: TreeNode = Element> {
    name: Arc<str>,
    signature: Signature,
    f: Arc<HandlerFn<N>>,
}

impl<N: TreeNode> Handler<N> {
    pub fn new<F>(name: impl AsRef<str>, parameters: &[&str], f: F) -> Self
    where
        F: Fn(&mut Arguments<'_, N>) -> Result<Value<N>, Flow> + Send + Sync + 'static,
    {
        Self::with_signature(name, Signature::new(parameters), f)
    }

    pub fn with_signature<F>(name: impl AsRef<str>, signature: Signature, f: F) -> Self
    where
        F: Fn(&mut Arguments<'_, N>) -> Result<Value<N>, Flow> + Send + Sync + 'static,
    {
        Handler { name: Arc::from(name.as_ref()), signature, f: Arc::new(f) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn call(&self, arguments: &mut Arguments<'_, N>) -> Result<Value<N>, Flow> {
        (self.f)(arguments)
    }
}

impl<N: TreeNode> Clone for Handler<N> {
    fn clone(&self) -> Self {
        Handler { name: Arc::clone(&self.name), signature: self.signature.clone(), f: Arc::clone(&self.f) }
    }
}

impl<N: TreeNode> fmt::Debug for Handler<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.name, self.signature)
    }
}

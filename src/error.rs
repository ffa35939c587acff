use crate::engine::Traverse;
use crate::node::QueryError;
use crate::tree::ParseError;

/// Boxed error produced by user code (handlers, predicates).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can abort a transformation.
///
/// `step` fields are zero-based indexes into the flattened step list of the
/// transformation that failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot resolve `{symbol}` for handler `{handler}` (step {step}): not in context or config")]
    UnresolvedSymbol { symbol: String, handler: String, step: usize },

    #[error("condition `{condition}` failed to evaluate (step {step})")]
    ConditionEvaluation {
        condition: String,
        step: usize,
        #[source]
        source: QueryError,
    },

    /// A handler returned an error. The engine wraps it rather than passing it
    /// through bare: the handler's own error stays reachable as
    /// [`source()`](std::error::Error::source) and through
    /// [`Error::handler_source`], ready for `downcast_ref`.
    #[error("handler `{handler}` failed (step {step}{})", at_node(.node))]
    Handler {
        handler: String,
        step: usize,
        node: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error("result selector `{selector}`: {reason}")]
    InvalidResultSelector { selector: String, reason: String },

    #[error("invalid traversal order {0:?}: {1}")]
    InvalidTraversalOrder(Traverse, &'static str),

    #[error("invalid step: {0}")]
    InvalidStep(String),

    #[error("`{symbol}` is {found}, expected {expected}")]
    TypeMismatch { symbol: String, expected: &'static str, found: &'static str },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

fn at_node(node: &Option<String>) -> String {
    node.as_deref().map(|n| format!(", at {n}")).unwrap_or_default()
}

impl Error {
    /// The error a handler returned, if this is a handler failure.
    pub fn handler_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Handler { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

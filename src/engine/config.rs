//! Invocation-independent settings of a transformation.

use super::traversal::TraversalOrder;
use crate::error::{Error, Result};
use crate::node::TreeNode;
use crate::tree::Element;
use crate::value::{Context, Value};
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// Read-only configuration shared by all invocations of a transformation.
#[derive(Debug, Clone)]
pub struct Config<N: TreeNode = Element> {
    pub(crate) name: Option<String>,
    pub(crate) context: Context<N>,
    pub(crate) result_object: ResultSelector,
    pub(crate) copy: bool,
    pub(crate) traversal_order: TraversalOrder,
    pub(crate) values: IndexMap<String, Value<N>>,
}

impl<N: TreeNode> Default for Config<N> {
    fn default() -> Self {
        Config {
            name: None,
            context: Context::new(),
            result_object: ResultSelector::Root,
            copy: true,
            traversal_order: TraversalOrder::default(),
            values: IndexMap::new(),
        }
    }
}

impl<N: TreeNode> Config<N> {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The context every invocation starts from.
    pub fn context(&self) -> &Context<N> {
        &self.context
    }

    pub fn result_object(&self) -> &ResultSelector {
        &self.result_object
    }

    pub fn copy(&self) -> bool {
        self.copy
    }

    pub fn traversal_order(&self) -> TraversalOrder {
        self.traversal_order
    }

    /// A configuration attribute by name. Besides the free-form attributes,
    /// `name`, `copy` and `result_object` are exposed as values.
    pub fn get(&self, name: &str) -> Option<Value<N>> {
        match name {
            "name" => self.name.clone().map(Value::Str),
            "copy" => Some(Value::Bool(self.copy)),
            "result_object" => Some(Value::Str(self.result_object.to_string())),
            _ => self.values.get(name).cloned(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value<N>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every attribute [`Config::get`] answers for, as one map.
    pub fn to_map(&self) -> IndexMap<String, Value<N>> {
        let mut map: IndexMap<String, Value<N>> =
            ["name", "copy", "result_object"].into_iter().filter_map(|k| Some((k.to_string(), self.get(k)?))).collect();
        map.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        map
    }
}

// --- Result selector ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorBase {
    Context,
    Config,
    Root,
}

/// What an invocation returns.
///
/// Written as a dotted path: `root` (the default), `context.persons`,
/// `config.name`, `root.id`. Segments walk map keys, list indexes and node
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResultSelector {
    #[default]
    Root,
    /// The invocation returns [`Value::None`].
    Nothing,
    Path {
        base: SelectorBase,
        segments: Vec<String>,
    },
}

impl FromStr for ResultSelector {
    type Err = Error;

    fn from_str(selector: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidResultSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = selector.trim().split('.');
        let base = match parts.next() {
            Some("root") => SelectorBase::Root,
            Some("context") => SelectorBase::Context,
            Some("config") => SelectorBase::Config,
            _ => return Err(invalid("must start with `root`, `context` or `config`")),
        };

        let segments: Vec<String> = parts.map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        match (base, segments.is_empty()) {
            (SelectorBase::Root, true) => Ok(ResultSelector::Root),
            (base, _) => Ok(ResultSelector::Path { base, segments }),
        }
    }
}

impl fmt::Display for ResultSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultSelector::Root => write!(f, "root"),
            ResultSelector::Nothing => write!(f, "none"),
            ResultSelector::Path { base, segments } => {
                let base = match base {
                    SelectorBase::Context => "context",
                    SelectorBase::Config => "config",
                    SelectorBase::Root => "root",
                };
                if segments.is_empty() { f.write_str(base) } else { write!(f, "{base}.{}", segments.join(".")) }
            }
        }
    }
}

impl ResultSelector {
    pub(crate) fn resolve<N: TreeNode>(&self, root: &N, context: &Context<N>, config: &Config<N>) -> Result<Value<N>> {
        let (base, segments) = match self {
            ResultSelector::Root => return Ok(Value::Node(root.clone())),
            ResultSelector::Nothing => return Ok(Value::None),
            ResultSelector::Path { base, segments } => (base, segments.as_slice()),
        };
        let unresolved = |reason: String| Error::InvalidResultSelector { selector: self.to_string(), reason };

        let (mut current, rest) = match (base, segments) {
            (SelectorBase::Root, _) => (Value::Node(root.clone()), segments),
            (SelectorBase::Context, [first, rest @ ..]) => {
                let value = context.get(first).cloned().ok_or_else(|| unresolved(format!("`{first}` is not set")))?;
                (value, rest)
            }
            (SelectorBase::Config, [first, rest @ ..]) => {
                let value = config.get(first).ok_or_else(|| unresolved(format!("`{first}` is not configured")))?;
                (value, rest)
            }
            (SelectorBase::Context, []) => (context.clone().into(), segments),
            (SelectorBase::Config, []) => (Value::Map(config.to_map()), segments),
        };

        for segment in rest {
            current = step_into(current, segment).map_err(unresolved)?;
        }
        Ok(current)
    }
}

fn step_into<N: TreeNode>(value: Value<N>, segment: &str) -> std::result::Result<Value<N>, String> {
    match value {
        Value::Map(mut map) => map.swap_remove(segment).ok_or_else(|| format!("no key `{segment}`")),
        Value::List(mut items) => {
            let index: usize = segment.parse().map_err(|_| format!("`{segment}` is not a list index"))?;
            if index < items.len() {
                Ok(items.swap_remove(index))
            } else {
                Err(format!("index {index} out of range for a list of {}", items.len()))
            }
        }
        Value::Node(node) => {
            node.attribute(segment).map(Value::Str).ok_or_else(|| format!("no attribute `{segment}`"))
        }
        other => Err(format!("cannot look up `{segment}` in {}", other.kind())),
    }
}

//! Rule conditions.
//!
//! Conditions are usually written as string shortcuts and classified once, when
//! the rule is built:
//!
//! | shortcut                    | condition                                   |
//! |-----------------------------|---------------------------------------------|
//! | `/`                         | the node is the transformation root         |
//! | `*`                         | every node                                  |
//! | contains `://`              | the node's namespace equals the string      |
//! | only alphabetic characters  | the node's local name equals the string     |
//! | a valid selector            | the node is selected by it, from the root   |
//! | anything else               | the node is in the query result of the root |
//!
//! Attribute constraints, boolean combinators and plain predicates complete the
//! set. Predicates receive the node and the running [`Invocation`]; they are
//! called directly, without symbol resolution.

use super::transformation::Invocation;
use crate::node::{QueryError, TreeNode};
use crate::tree::Element;
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

type PredicateFn<N> = dyn Fn(&N, &Invocation<'_, N>) -> bool + Send + Sync;
type QueryFn<N> = dyn Fn(&Invocation<'_, N>) -> String + Send + Sync;
type AttributesFn<N> = dyn Fn(&Invocation<'_, N>) -> AttributeMatcher + Send + Sync;

/// Classification of a string condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortcut {
    RootOnly,
    Wildcard,
    Namespace(String),
    LocalName(String),
    Selector(String),
    RawQuery(String),
}

impl Shortcut {
    /// Classifies `expression`; the first matching form wins.
    pub fn classify<N: TreeNode>(expression: &str) -> Self {
        if expression == "/" {
            Shortcut::RootOnly
        } else if expression == "*" {
            Shortcut::Wildcard
        } else if expression.contains("://") {
            Shortcut::Namespace(expression.to_string())
        } else if regex!(r"^\p{Alphabetic}+$").is_match(expression) {
            Shortcut::LocalName(expression.to_string())
        } else if N::is_selector(expression) {
            Shortcut::Selector(expression.to_string())
        } else {
            Shortcut::RawQuery(expression.to_string())
        }
    }
}

/// A predicate over a node.
pub enum Condition<N: TreeNode = Element> {
    RootOnly,
    Wildcard,
    Namespace(String),
    LocalName(String),
    Selector(String),
    Query(String),
    /// A query computed per evaluation from the running invocation.
    DynamicQuery(Arc<QueryFn<N>>),
    Attributes(AttributeMatcher),
    /// Attribute constraints computed per evaluation.
    DynamicAttributes(Arc<AttributesFn<N>>),
    /// At least one holds.
    Any(Vec<Condition<N>>),
    /// Exactly one holds.
    OneOf(Vec<Condition<N>>),
    /// None holds.
    Not(Vec<Condition<N>>),
    Predicate(Arc<PredicateFn<N>>),
}

/// A condition whose query could not be evaluated.
#[derive(Debug)]
pub(crate) struct ConditionFailure {
    pub condition: String,
    pub source: QueryError,
}

impl<N: TreeNode> Condition<N> {
    pub fn any(conditions: impl IntoIterator<Item = impl Into<Condition<N>>>) -> Self {
        Condition::Any(conditions.into_iter().map(Into::into).collect())
    }

    pub fn one_of(conditions: impl IntoIterator<Item = impl Into<Condition<N>>>) -> Self {
        Condition::OneOf(conditions.into_iter().map(Into::into).collect())
    }

    pub fn not(condition: impl Into<Condition<N>>) -> Self {
        Condition::Not(vec![condition.into()])
    }

    /// True when none of `conditions` holds.
    pub fn none_of(conditions: impl IntoIterator<Item = impl Into<Condition<N>>>) -> Self {
        Condition::Not(conditions.into_iter().map(Into::into).collect())
    }

    pub fn predicate(f: impl Fn(&N, &Invocation<'_, N>) -> bool + Send + Sync + 'static) -> Self {
        Condition::Predicate(Arc::new(f))
    }

    pub fn dynamic_query(f: impl Fn(&Invocation<'_, N>) -> String + Send + Sync + 'static) -> Self {
        Condition::DynamicQuery(Arc::new(f))
    }

    pub fn dynamic_attributes(f: impl Fn(&Invocation<'_, N>) -> AttributeMatcher + Send + Sync + 'static) -> Self {
        Condition::DynamicAttributes(Arc::new(f))
    }

    pub(crate) fn is_root_only(&self) -> bool {
        matches!(self, Condition::RootOnly)
    }

    pub(crate) fn evaluate(&self, node: &N, invocation: &Invocation<'_, N>) -> Result<bool, ConditionFailure> {
        Ok(match self {
            Condition::RootOnly => node == invocation.root(),
            Condition::Wildcard => true,
            Condition::Namespace(uri) => node.namespace().as_deref() == Some(uri.as_str()),
            Condition::LocalName(name) => node.local_name() == *name,
            Condition::Selector(selector) => {
                invocation.root().select(selector).map_err(|e| self.failure(e))?.contains(node)
            }
            Condition::Query(expression) => {
                invocation.root().query(expression).map_err(|e| self.failure(e))?.contains(node)
            }
            Condition::DynamicQuery(f) => {
                let expression = f(invocation);
                log::debug!("resolved dynamic query `{expression}`");
                invocation
                    .root()
                    .query(&expression)
                    .map_err(|source| ConditionFailure { condition: expression.clone(), source })?
                    .contains(node)
            }
            Condition::Attributes(matcher) => matcher.matches(&node.attributes()),
            Condition::DynamicAttributes(f) => f(invocation).matches(&node.attributes()),
            Condition::Any(conditions) => {
                for condition in conditions {
                    if condition.evaluate(node, invocation)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::OneOf(conditions) => {
                let mut holding = 0;
                for condition in conditions {
                    if condition.evaluate(node, invocation)? {
                        holding += 1;
                    }
                }
                holding == 1
            }
            Condition::Not(conditions) => {
                for condition in conditions {
                    if condition.evaluate(node, invocation)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Predicate(f) => f(node, invocation),
        })
    }

    fn failure(&self, source: QueryError) -> ConditionFailure {
        ConditionFailure { condition: self.to_string(), source }
    }
}

impl<N: TreeNode> From<Shortcut> for Condition<N> {
    fn from(shortcut: Shortcut) -> Self {
        match shortcut {
            Shortcut::RootOnly => Condition::RootOnly,
            Shortcut::Wildcard => Condition::Wildcard,
            Shortcut::Namespace(uri) => Condition::Namespace(uri),
            Shortcut::LocalName(name) => Condition::LocalName(name),
            Shortcut::Selector(selector) => Condition::Selector(selector),
            Shortcut::RawQuery(expression) => Condition::Query(expression),
        }
    }
}

impl<N: TreeNode> From<&str> for Condition<N> {
    fn from(expression: &str) -> Self {
        let shortcut = Shortcut::classify::<N>(expression);
        log::debug!("condition `{expression}` classified as {shortcut:?}");
        shortcut.into()
    }
}

impl<N: TreeNode> From<String> for Condition<N> {
    fn from(expression: String) -> Self {
        expression.as_str().into()
    }
}

impl<N: TreeNode> From<AttributeMatcher> for Condition<N> {
    fn from(matcher: AttributeMatcher) -> Self {
        Condition::Attributes(matcher)
    }
}

impl<N: TreeNode> Clone for Condition<N> {
    fn clone(&self) -> Self {
        match self {
            Condition::RootOnly => Condition::RootOnly,
            Condition::Wildcard => Condition::Wildcard,
            Condition::Namespace(s) => Condition::Namespace(s.clone()),
            Condition::LocalName(s) => Condition::LocalName(s.clone()),
            Condition::Selector(s) => Condition::Selector(s.clone()),
            Condition::Query(s) => Condition::Query(s.clone()),
            Condition::DynamicQuery(f) => Condition::DynamicQuery(Arc::clone(f)),
            Condition::Attributes(m) => Condition::Attributes(m.clone()),
            Condition::DynamicAttributes(f) => Condition::DynamicAttributes(Arc::clone(f)),
            Condition::Any(c) => Condition::Any(c.clone()),
            Condition::OneOf(c) => Condition::OneOf(c.clone()),
            Condition::Not(c) => Condition::Not(c.clone()),
            Condition::Predicate(f) => Condition::Predicate(Arc::clone(f)),
        }
    }
}

fn write_list<N: TreeNode>(f: &mut fmt::Formatter<'_>, name: &str, conditions: &[Condition<N>]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{condition}")?;
    }
    write!(f, ")")
}

impl<N: TreeNode> fmt::Display for Condition<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::RootOnly => write!(f, "/"),
            Condition::Wildcard => write!(f, "*"),
            Condition::Namespace(s) | Condition::LocalName(s) | Condition::Selector(s) | Condition::Query(s) => {
                write!(f, "{s}")
            }
            Condition::DynamicQuery(_) => write!(f, "<dynamic query>"),
            Condition::Attributes(m) => write!(f, "{m}"),
            Condition::DynamicAttributes(_) => write!(f, "<dynamic attributes>"),
            Condition::Any(c) => write_list(f, "any", c),
            Condition::OneOf(c) => write_list(f, "one_of", c),
            Condition::Not(c) => write_list(f, "not", c),
            Condition::Predicate(_) => write!(f, "<predicate>"),
        }
    }
}

impl<N: TreeNode> fmt::Debug for Condition<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition({self})")
    }
}

// --- Attribute constraints ---------------------------------------------------

/// Matches attribute names, either literally or by a regular expression
/// anchored at the start of the name.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    Name(String),
    Regex(Regex),
}

/// Constrains an attribute value. `Any` only requires presence.
#[derive(Debug, Clone)]
pub enum ValuePattern {
    Any,
    Exact(String),
    Regex(Regex),
}

fn matches_at_start(regex: &Regex, s: &str) -> bool {
    regex.find(s).is_some_and(|m| m.start() == 0)
}

impl ValuePattern {
    fn matches(&self, value: &str) -> bool {
        match self {
            ValuePattern::Any => true,
            ValuePattern::Exact(expected) => value == expected,
            ValuePattern::Regex(regex) => matches_at_start(regex, value),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(name: &str) -> Self {
        KeyPattern::Name(name.to_string())
    }
}

impl From<Regex> for KeyPattern {
    fn from(regex: Regex) -> Self {
        KeyPattern::Regex(regex)
    }
}

impl From<&Regex> for KeyPattern {
    fn from(regex: &Regex) -> Self {
        KeyPattern::Regex(regex.clone())
    }
}

impl From<&str> for ValuePattern {
    fn from(value: &str) -> Self {
        ValuePattern::Exact(value.to_string())
    }
}

impl From<Option<&str>> for ValuePattern {
    fn from(value: Option<&str>) -> Self {
        value.map_or(ValuePattern::Any, Into::into)
    }
}

impl From<Regex> for ValuePattern {
    fn from(regex: Regex) -> Self {
        ValuePattern::Regex(regex)
    }
}

impl From<&Regex> for ValuePattern {
    fn from(regex: &Regex) -> Self {
        ValuePattern::Regex(regex.clone())
    }
}

/// A set of attribute constraints that must all hold.
///
/// A literal key must be present and its value must match. A regex key with
/// [`ValuePattern::Any`] requires at least one matching attribute; with any
/// other value pattern, every matching attribute's value must match (and no
/// matching attribute is fine). Any constraint fails on a node without
/// attributes.
#[derive(Debug, Clone, Default)]
pub struct AttributeMatcher {
    constraints: Vec<(KeyPattern, ValuePattern)>,
}

impl AttributeMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<KeyPattern>, value: impl Into<ValuePattern>) -> Self {
        self.constraints.push((key.into(), value.into()));
        self
    }

    /// Requires presence only.
    pub fn has(self, key: impl Into<KeyPattern>) -> Self {
        self.with(key, ValuePattern::Any)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, attributes: &IndexMap<String, String>) -> bool {
        if self.constraints.is_empty() {
            return true;
        }
        if attributes.is_empty() {
            return false;
        }

        self.constraints.iter().all(|(key, value)| match key {
            KeyPattern::Name(name) => attributes.get(name).is_some_and(|v| value.matches(v)),
            KeyPattern::Regex(regex) => {
                let mut matching = attributes.iter().filter(|(k, _)| matches_at_start(regex, k)).peekable();
                match value {
                    ValuePattern::Any => matching.peek().is_some(),
                    _ => matching.all(|(_, v)| value.matches(v)),
                }
            }
        })
    }
}

impl fmt::Display for AttributeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.constraints.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match key {
                KeyPattern::Name(name) => write!(f, "{name}")?,
                KeyPattern::Regex(regex) => write!(f, "/{regex}/")?,
            }
            match value {
                ValuePattern::Any => {}
                ValuePattern::Exact(v) => write!(f, ": {v:?}")?,
                ValuePattern::Regex(regex) => write!(f, ": /{regex}/")?,
            }
        }
        write!(f, "}}")
    }
}

use super::condition::Condition;
use super::handler::{Flow, Handler};
use super::transformation::Step;
use super::traversal::TraversalOrder;
use crate::node::TreeNode;
use crate::tree::Element;
use std::fmt;

/// Conditions paired with the handlers applied to every node that meets all of
/// them.
///
/// A `/` condition makes the rule visit the transformation root only; it is
/// dropped from the condition list since the traversal already guarantees it.
pub struct Rule<N: TreeNode = Element> {
    name: Option<String>,
    conditions: Vec<Condition<N>>,
    handlers: Vec<Step<N>>,
    traversal_order: Option<TraversalOrder>,
    root_only: bool,
}

impl<N: TreeNode> Rule<N> {
    pub fn new<C, H>(conditions: C, handlers: H) -> Self
    where
        C: IntoIterator,
        C::Item: Into<Condition<N>>,
        H: IntoIterator,
        H::Item: Into<Step<N>>,
    {
        let mut handlers_flat = Vec::new();
        for handler in handlers {
            flatten(handler.into(), &mut handlers_flat);
        }

        let mut rule = Rule {
            name: None,
            conditions: Vec::new(),
            handlers: handlers_flat,
            traversal_order: None,
            root_only: false,
        };
        rule.add_conditions(conditions.into_iter().map(Into::into), false);
        rule
    }

    /// A rule that stops after handling its first matching node.
    pub fn once<C, H>(conditions: C, handlers: H) -> Self
    where
        C: IntoIterator,
        C::Item: Into<Condition<N>>,
        H: IntoIterator,
        H::Item: Into<Step<N>>,
    {
        let mut rule = Self::new(conditions, handlers);
        rule.handlers.push(Step::Handler(Handler::new("abort_rule", &[], |_| Err(Flow::AbortRule))));
        rule
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_traversal_order(mut self, order: TraversalOrder) -> Self {
        self.traversal_order = Some(order);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn conditions(&self) -> &[Condition<N>] {
        &self.conditions
    }

    pub fn handlers(&self) -> &[Step<N>] {
        &self.handlers
    }

    /// The order this rule walks the tree in, `default` unless overridden.
    pub fn traversal_order(&self, default: TraversalOrder) -> TraversalOrder {
        if self.root_only { TraversalOrder::root_only() } else { self.traversal_order.unwrap_or(default) }
    }

    pub fn is_root_only(&self) -> bool {
        self.root_only
    }

    /// Prepends the transformation-wide conditions.
    pub(crate) fn with_common_conditions(mut self, common: &[Condition<N>]) -> Self {
        if !common.is_empty() {
            self.add_conditions(common.iter().cloned(), true);
        }
        self
    }

    fn add_conditions(&mut self, conditions: impl Iterator<Item = Condition<N>>, front: bool) {
        let mut kept = Vec::new();
        for condition in conditions {
            if condition.is_root_only() {
                self.root_only = true;
            } else {
                kept.push(condition);
            }
        }
        if front {
            kept.append(&mut self.conditions);
            self.conditions = kept;
        } else {
            self.conditions.append(&mut kept);
        }
    }
}

fn flatten<N: TreeNode>(step: Step<N>, out: &mut Vec<Step<N>>) {
    match step {
        Step::Sequence(steps) => steps.into_iter().for_each(|s| flatten(s, out)),
        other => out.push(other),
    }
}

impl<N: TreeNode> Clone for Rule<N> {
    fn clone(&self) -> Self {
        Rule {
            name: self.name.clone(),
            conditions: self.conditions.clone(),
            handlers: self.handlers.clone(),
            traversal_order: self.traversal_order,
            root_only: self.root_only,
        }
    }
}

impl<N: TreeNode> fmt::Display for Rule<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return write!(f, "{name}");
        }
        write!(f, "rule(")?;
        if self.root_only {
            write!(f, "/")?;
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 || self.root_only {
                write!(f, " & ")?;
            }
            write!(f, "{condition}")?;
        }
        write!(f, ")")
    }
}

impl<N: TreeNode> fmt::Debug for Rule<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("conditions", &self.conditions)
            .field("handlers", &self.handlers)
            .field("traversal_order", &self.traversal_order)
            .field("root_only", &self.root_only)
            .finish()
    }
}

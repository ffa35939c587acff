//! The step pipeline.
//!
//! A [`Transformation`] is an immutable list of steps plus a [`Config`]. Every
//! invocation gets its own [`Invocation`] state (copied root, fresh context,
//! previous result) and runs the steps in order:
//!
//! ```text
//! invoke(root, overrides)
//!   ├─ copy root (config/overrides)
//!   ├─ seed context: config.context (deep clone) + overrides
//!   ├─ for each step
//!   │    handler         resolve arguments, call once
//!   │    rule            traverse, match conditions, call handlers per node
//!   │    transformation  invoke recursively on the current node or root
//!   └─ select result (root, context.x, config.x, ...)
//! ```
//!
//! The result of a step is the previous result of the next one. Within a rule,
//! each handler sees the result of the handler before it for the same node;
//! the rule itself yields no result.

use super::condition::Condition;
use super::config::{Config, ResultSelector};
use super::handler::{Flow, Handler};
use super::metrics::{Run, RunMetrics, StepKind, StepMetrics};
use super::rule::Rule;
use super::symbols::{Arguments, PlanCache, Scope};
use super::traversal::{TraversalOrder, Traverse};
use crate::api::Overrides;
use crate::error::{BoxError, Error, Result};
use crate::node::TreeNode;
use crate::tree::Element;
use crate::value::{Context, Value};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

// --- Steps -------------------------------------------------------------------

/// A unit of pipeline work.
pub enum Step<N: TreeNode = Element> {
    Handler(Handler<N>),
    Rule(Rule<N>),
    Transformation(Subtransformation<N>),
    /// Flattened into the surrounding list when the pipeline is built.
    Sequence(Vec<Step<N>>),
}

/// A transformation used as a step or rule handler. It runs on the current
/// node (or the root outside of rules) and shares its nodes unless `copy` is
/// set.
pub struct Subtransformation<N: TreeNode = Element> {
    pub transformation: Arc<Transformation<N>>,
    pub copy: bool,
}

impl<N: TreeNode> Step<N> {
    /// A nested transformation that works on a copy of its input.
    pub fn copying(transformation: impl Into<Arc<Transformation<N>>>) -> Self {
        Step::Transformation(Subtransformation { transformation: transformation.into(), copy: true })
    }

    pub fn kind(&self) -> Option<StepKind> {
        match self {
            Step::Handler(_) => Some(StepKind::Handler),
            Step::Rule(_) => Some(StepKind::Rule),
            Step::Transformation(_) => Some(StepKind::Transformation),
            Step::Sequence(_) => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Step::Handler(handler) => handler.name().to_string(),
            Step::Rule(rule) => rule.to_string(),
            Step::Transformation(sub) => sub.transformation.label(),
            Step::Sequence(steps) => format!("sequence of {}", steps.len()),
        }
    }
}

impl<N: TreeNode> From<Handler<N>> for Step<N> {
    fn from(handler: Handler<N>) -> Self {
        Step::Handler(handler)
    }
}

impl<N: TreeNode> From<Rule<N>> for Step<N> {
    fn from(rule: Rule<N>) -> Self {
        Step::Rule(rule)
    }
}

impl<N: TreeNode> From<Transformation<N>> for Step<N> {
    fn from(transformation: Transformation<N>) -> Self {
        Arc::new(transformation).into()
    }
}

impl<N: TreeNode> From<Arc<Transformation<N>>> for Step<N> {
    fn from(transformation: Arc<Transformation<N>>) -> Self {
        Step::Transformation(Subtransformation { transformation, copy: false })
    }
}

impl<N: TreeNode> From<Vec<Step<N>>> for Step<N> {
    fn from(steps: Vec<Step<N>>) -> Self {
        Step::Sequence(steps)
    }
}

impl<N: TreeNode> Clone for Step<N> {
    fn clone(&self) -> Self {
        match self {
            Step::Handler(h) => Step::Handler(h.clone()),
            Step::Rule(r) => Step::Rule(r.clone()),
            Step::Transformation(sub) => Step::Transformation(Subtransformation {
                transformation: Arc::clone(&sub.transformation),
                copy: sub.copy,
            }),
            Step::Sequence(steps) => Step::Sequence(steps.clone()),
        }
    }
}

impl<N: TreeNode> fmt::Debug for Step<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Handler(h) => write!(f, "Handler({h:?})"),
            Step::Rule(r) => write!(f, "Rule({r})"),
            Step::Transformation(sub) => {
                write!(f, "Transformation({}, copy: {})", sub.transformation.label(), sub.copy)
            }
            Step::Sequence(steps) => f.debug_list().entries(steps).finish(),
        }
    }
}

// --- Transformation ----------------------------------------------------------

/// A reusable, immutable pipeline.
///
/// Invocations never share state besides the configuration and the resolution
/// plan cache, so one transformation can be invoked from several threads at
/// once.
pub struct Transformation<N: TreeNode = Element> {
    steps: Vec<Step<N>>,
    config: Config<N>,
    plans: Arc<PlanCache>,
}

impl<N: TreeNode> Transformation<N> {
    pub fn builder() -> TransformationBuilder<N> {
        TransformationBuilder::default()
    }

    pub fn steps(&self) -> &[Step<N>] {
        &self.steps
    }

    pub fn config(&self) -> &Config<N> {
        &self.config
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name()
    }

    pub fn plan_cache(&self) -> &Arc<PlanCache> {
        &self.plans
    }

    fn label(&self) -> String {
        self.config.name().map_or_else(|| format!("transformation of {} steps", self.steps.len()), str::to_string)
    }

    /// Runs the pipeline on `root` with the configured defaults.
    pub fn invoke(&self, root: &N) -> Result<Value<N>> {
        self.invoke_with(root, Overrides::default())
    }

    /// Runs the pipeline with call-time context values and copy flag.
    pub fn invoke_with(&self, root: &N, overrides: Overrides<N>) -> Result<Value<N>> {
        self.run(root, overrides, None)
    }

    /// Like [`Transformation::invoke_with`], also timing every step.
    pub fn invoke_with_metrics(&self, root: &N, overrides: Overrides<N>) -> Result<Run<Value<N>>> {
        let mut metrics = RunMetrics { transformation: self.config.name.clone(), ..RunMetrics::default() };
        let started = Instant::now();
        let result = self.run(root, overrides, Some(&mut metrics))?;
        metrics.total = started.elapsed();
        Ok(Run { result, metrics })
    }

    fn run(&self, root: &N, overrides: Overrides<N>, mut metrics: Option<&mut RunMetrics>) -> Result<Value<N>> {
        let copy = overrides.copy.unwrap_or(self.config.copy);
        let root = if copy { root.deep_copy() } else { root.clone() };

        let mut context = Context::seeded(&self.config.context);
        for (name, value) in overrides.values {
            context.insert(name, value);
        }

        log::debug!("invoking {} on {root:?} (copy: {copy})", self.label());
        let mut invocation = Invocation {
            transformation: self,
            root,
            context,
            current_node: None,
            previous_result: Value::None,
            step: 0,
        };

        for (index, step) in self.steps.iter().enumerate() {
            invocation.step = index;
            let started = Instant::now();
            let mut tally = Tally::default();
            let outcome = invocation.run_step(step, &mut tally)?;

            if let Some(metrics) = metrics.as_deref_mut() {
                metrics.steps.push(StepMetrics {
                    index,
                    label: step.label(),
                    kind: step.kind().unwrap_or(StepKind::Handler),
                    duration: started.elapsed(),
                    visited: tally.visited,
                    matched: tally.matched,
                });
            }

            if outcome.is_break() {
                log::debug!("transformation aborted at step {index}");
                if let Some(metrics) = metrics.as_deref_mut() {
                    metrics.aborted = true;
                }
                break;
            }
        }

        let Invocation { root, context, .. } = invocation;
        self.config.result_object.resolve(&root, &context, &self.config)
    }
}

impl<N: TreeNode> fmt::Debug for Transformation<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformation").field("config", &self.config).field("steps", &self.steps).finish()
    }
}

// --- Builder -----------------------------------------------------------------

pub struct TransformationBuilder<N: TreeNode = Element> {
    steps: Vec<Step<N>>,
    config: Config<N>,
    result_object: Option<String>,
    discard_result: bool,
    traverse: Option<Traverse>,
    common_conditions: Vec<Condition<N>>,
    plans: Option<Arc<PlanCache>>,
}

impl<N: TreeNode> Default for TransformationBuilder<N> {
    fn default() -> Self {
        TransformationBuilder {
            steps: Vec::new(),
            config: Config::default(),
            result_object: None,
            discard_result: false,
            traverse: None,
            common_conditions: Vec::new(),
            plans: None,
        }
    }
}

impl<N: TreeNode> TransformationBuilder<N> {
    pub fn step(mut self, step: impl Into<Step<N>>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = impl Into<Step<N>>>) -> Self {
        self.steps.extend(steps.into_iter().map(Into::into));
        self
    }

    pub fn rule<C, H>(self, conditions: C, handlers: H) -> Self
    where
        C: IntoIterator,
        C::Item: Into<Condition<N>>,
        H: IntoIterator,
        H::Item: Into<Step<N>>,
    {
        self.step(Rule::new(conditions, handlers))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Initial context attribute, deep-cloned into every invocation.
    pub fn context(mut self, name: impl Into<String>, value: impl Into<Value<N>>) -> Self {
        self.config.context.insert(name, value);
        self
    }

    /// Free-form configuration attribute.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value<N>>) -> Self {
        self.config.values.insert(name.into(), value.into());
        self
    }

    /// Dotted result path, validated by [`TransformationBuilder::build`].
    pub fn result_object(mut self, selector: impl Into<String>) -> Self {
        self.result_object = Some(selector.into());
        self.discard_result = false;
        self
    }

    /// Invocations return [`Value::None`].
    pub fn discard_result(mut self) -> Self {
        self.discard_result = true;
        self
    }

    pub fn copy(mut self, copy: bool) -> Self {
        self.config.copy = copy;
        self
    }

    pub fn traversal_order(mut self, order: TraversalOrder) -> Self {
        self.config.traversal_order = order;
        self.traverse = None;
        self
    }

    /// Default traversal as flags; contradictions fail the build.
    pub fn traverse(mut self, flags: Traverse) -> Self {
        self.traverse = Some(flags);
        self
    }

    /// A condition prepended to every rule of this transformation.
    pub fn common_condition(mut self, condition: impl Into<Condition<N>>) -> Self {
        self.common_conditions.push(condition.into());
        self
    }

    /// Resolution plans come from `cache` instead of the process-wide one.
    pub fn plan_cache(mut self, cache: Arc<PlanCache>) -> Self {
        self.plans = Some(cache);
        self
    }

    pub fn build(self) -> Result<Transformation<N>> {
        let mut config = self.config;
        if let Some(flags) = self.traverse {
            config.traversal_order = TraversalOrder::try_from(flags)?;
        }
        config.result_object = match (self.discard_result, self.result_object) {
            (true, _) => ResultSelector::Nothing,
            (false, Some(selector)) => selector.parse()?,
            (false, None) => ResultSelector::Root,
        };

        let mut steps = Vec::new();
        for step in self.steps {
            flatten(step, &self.common_conditions, &mut steps)?;
        }

        Ok(Transformation { steps, config, plans: self.plans.unwrap_or_else(PlanCache::global) })
    }
}

fn flatten<N: TreeNode>(step: Step<N>, common: &[Condition<N>], out: &mut Vec<Step<N>>) -> Result<()> {
    match step {
        Step::Sequence(steps) => {
            for step in steps {
                flatten(step, common, out)?;
            }
        }
        Step::Rule(rule) => {
            if rule.handlers().is_empty() {
                return Err(Error::InvalidStep(format!("rule `{rule}` has no handlers")));
            }
            if rule.handlers().iter().any(|h| matches!(h, Step::Rule(_))) {
                return Err(Error::InvalidStep(format!("rule `{rule}` lists a rule among its handlers")));
            }
            out.push(Step::Rule(rule.with_common_conditions(common)));
        }
        other => out.push(other),
    }
    Ok(())
}

// --- Invocation --------------------------------------------------------------

/// The state of one running invocation, as seen by conditions.
pub struct Invocation<'t, N: TreeNode = Element> {
    transformation: &'t Transformation<N>,
    root: N,
    context: Context<N>,
    current_node: Option<N>,
    previous_result: Value<N>,
    step: usize,
}

#[derive(Debug, Default)]
struct Tally {
    visited: usize,
    matched: usize,
}

/// Handler outcomes that change control flow without failing.
enum Interrupt {
    SkipToNextNode,
    AbortRule,
    AbortTransformation,
}

impl<'t, N: TreeNode> Invocation<'t, N> {
    /// The (possibly copied) node the invocation was called with.
    pub fn root(&self) -> &N {
        &self.root
    }

    pub fn context(&self) -> &Context<N> {
        &self.context
    }

    pub fn config(&self) -> &'t Config<N> {
        &self.transformation.config
    }

    pub fn transformation(&self) -> &'t Transformation<N> {
        self.transformation
    }

    /// The node a rule is visiting; `None` in plain steps.
    pub fn current_node(&self) -> Option<&N> {
        self.current_node.as_ref()
    }

    pub fn previous_result(&self) -> &Value<N> {
        &self.previous_result
    }

    /// Index of the running step.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Resolves `name` the way a handler parameter would be resolved.
    /// `config` and `transformation` are not values; use the accessors.
    pub fn symbol(&self, name: &str) -> Option<Value<N>> {
        self.scope().symbol(name)
    }

    fn scope(&self) -> Scope<'_, N> {
        Scope {
            node: self.current_node.as_ref(),
            previous_result: &self.previous_result,
            root: &self.root,
            context: &self.context,
            config: &self.transformation.config,
        }
    }

    fn run_step(&mut self, step: &'t Step<N>, tally: &mut Tally) -> Result<ControlFlow<()>> {
        match step {
            Step::Handler(handler) => {
                log::debug!("step {}: handler `{}`", self.step, handler.name());
                self.current_node = None;
                match self.call(handler)? {
                    ControlFlow::Continue(value) => self.previous_result = value,
                    ControlFlow::Break(Interrupt::AbortTransformation) => return Ok(ControlFlow::Break(())),
                    ControlFlow::Break(_) => {
                        log::debug!("handler `{}` ended its step early", handler.name());
                        self.previous_result = Value::None;
                    }
                }
            }
            Step::Rule(rule) => {
                log::debug!("step {}: {rule}", self.step);
                let outcome = self.apply_rule(rule, tally)?;
                self.current_node = None;
                self.previous_result = Value::None;
                if outcome.is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }
            Step::Transformation(sub) => {
                log::debug!("step {}: {}", self.step, sub.transformation.label());
                self.current_node = None;
                self.previous_result = self.call_subtransformation(sub)?;
            }
            Step::Sequence(steps) => {
                for step in steps {
                    if self.run_step(step, tally)?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn apply_rule(&mut self, rule: &'t Rule<N>, tally: &mut Tally) -> Result<ControlFlow<()>> {
        let order = rule.traversal_order(self.transformation.config.traversal_order);
        let initial = std::mem::take(&mut self.previous_result);

        for node in order.traverse(&self.root) {
            tally.visited += 1;
            self.current_node = Some(node.clone());
            if !self.matches(rule, &node)? {
                continue;
            }
            tally.matched += 1;
            log::debug!("{rule} matched {node:?}");

            self.previous_result = initial.clone();
            match self.apply_handlers(rule.handlers())? {
                ControlFlow::Continue(()) | ControlFlow::Break(Interrupt::SkipToNextNode) => {}
                ControlFlow::Break(Interrupt::AbortRule) => {
                    log::debug!("{rule} aborted");
                    break;
                }
                ControlFlow::Break(Interrupt::AbortTransformation) => return Ok(ControlFlow::Break(())),
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn matches(&self, rule: &Rule<N>, node: &N) -> Result<bool> {
        for condition in rule.conditions() {
            let holds = condition.evaluate(node, self).map_err(|failure| Error::ConditionEvaluation {
                condition: failure.condition,
                step: self.step,
                source: failure.source,
            })?;
            if !holds {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn apply_handlers(&mut self, handlers: &'t [Step<N>]) -> Result<ControlFlow<Interrupt>> {
        for step in handlers {
            let value = match step {
                Step::Handler(handler) => match self.call(handler)? {
                    ControlFlow::Continue(value) => value,
                    ControlFlow::Break(interrupt) => return Ok(ControlFlow::Break(interrupt)),
                },
                Step::Transformation(sub) => self.call_subtransformation(sub)?,
                Step::Sequence(steps) => {
                    if let ControlFlow::Break(interrupt) = self.apply_handlers(steps)? {
                        return Ok(ControlFlow::Break(interrupt));
                    }
                    continue;
                }
                Step::Rule(rule) => {
                    return Err(Error::InvalidStep(format!("rule `{rule}` cannot be used as a handler")));
                }
            };
            self.previous_result = value;
        }
        Ok(ControlFlow::Continue(()))
    }

    fn call(&mut self, handler: &Handler<N>) -> Result<ControlFlow<Interrupt, Value<N>>> {
        let plan = self.transformation.plans.plan(handler.signature());
        let values = plan.resolve(&self.scope()).map_err(|symbol| Error::UnresolvedSymbol {
            symbol,
            handler: handler.name().to_string(),
            step: self.step,
        })?;

        let outcome = {
            let mut arguments = Arguments {
                handler: handler.name(),
                signature: handler.signature(),
                values,
                context: &mut self.context,
                config: &self.transformation.config,
                transformation: self.transformation,
            };
            handler.call(&mut arguments)
        };

        match outcome {
            Ok(value) => Ok(ControlFlow::Continue(value)),
            Err(Flow::SkipToNextNode) => Ok(ControlFlow::Break(Interrupt::SkipToNextNode)),
            Err(Flow::AbortRule) => Ok(ControlFlow::Break(Interrupt::AbortRule)),
            Err(Flow::AbortTransformation) => Ok(ControlFlow::Break(Interrupt::AbortTransformation)),
            Err(Flow::Error(source)) => Err(self.handler_failure(handler.name(), source)),
        }
    }

    fn call_subtransformation(&self, sub: &Subtransformation<N>) -> Result<Value<N>> {
        let input = self.current_node.as_ref().unwrap_or(&self.root);
        sub.transformation.invoke_with(input, Overrides::default().copy(sub.copy))
    }

    /// Errors of this crate raised inside a handler surface as they are.
    fn handler_failure(&self, handler: &str, source: BoxError) -> Error {
        match source.downcast::<Error>() {
            Ok(error) => *error,
            Err(source) => Error::Handler {
                handler: handler.to_string(),
                step: self.step,
                node: self.current_node.as_ref().map(|node| format!("{node:?}")),
                source,
            },
        }
    }
}

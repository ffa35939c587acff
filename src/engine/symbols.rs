//! Symbol resolution for handler arguments.
//!
//! A handler declares the names of the values it wants (its [`Signature`]).
//! Each name maps to a [`Source`]:
//!
//! 1. reserved names: `node`, `previous_result`, `root`, `context`, `config`
//!    and `transformation`;
//! 2. any other name is looked up in the context, then in the configuration.
//!
//! The mapping from a signature to its sources is a [`ResolutionPlan`]. Plans
//! only depend on the parameter names, so they are cached per signature in a
//! [`PlanCache`] and shared by every handler with the same names. Values are
//! read fresh on every call; nothing but the plan is cached.
//!
//! The process-wide cache is created on first use. Its capacity comes from the
//! `TRELLIS_PLAN_CACHE_SIZE` environment variable (unbounded when unset) and
//! can be changed later with [`PlanCache::set_capacity`]. Transformations can
//! also be given a private cache.

use super::config::Config;
use super::handler::Flow;
use super::transformation::Transformation;
use crate::node::TreeNode;
use crate::value::{Context, Value};
use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const RESERVED_SYMBOLS: [&str; 6] = ["node", "previous_result", "root", "context", "config", "transformation"];

/// The ordered parameter names of a handler.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature(Arc<[String]>);

impl Signature {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Signature(names.iter().map(|n| n.as_ref().to_string()).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Node,
    PreviousResult,
    Root,
    Context,
    Config,
    Transformation,
    /// Context attribute of that name, else configuration attribute.
    Namespace,
}

impl Source {
    fn for_name(name: &str) -> Self {
        match name {
            "node" => Source::Node,
            "previous_result" => Source::PreviousResult,
            "root" => Source::Root,
            "context" => Source::Context,
            "config" => Source::Config,
            "transformation" => Source::Transformation,
            _ => Source::Namespace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPlan {
    signature: Signature,
    sources: Vec<Source>,
}

impl ResolutionPlan {
    pub fn compute(signature: &Signature) -> Self {
        let sources = signature.names().iter().map(|n| Source::for_name(n)).collect();
        ResolutionPlan { signature: signature.clone(), sources }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Reads the values for one call. Slots of the object sources (`context`,
    /// `config`, `transformation`) stay empty; handlers reach those through
    /// [`Arguments`]. Fails with the first name that resolves nowhere.
    pub(crate) fn resolve<N: TreeNode>(&self, scope: &Scope<'_, N>) -> Result<Vec<Option<Value<N>>>, String> {
        self.signature
            .names()
            .iter()
            .zip(&self.sources)
            .map(|(name, source)| match source {
                Source::Node => Ok(Some(scope.node.cloned().map_or(Value::None, Value::Node))),
                Source::PreviousResult => Ok(Some(scope.previous_result.clone())),
                Source::Root => Ok(Some(Value::Node(scope.root.clone()))),
                Source::Context | Source::Config | Source::Transformation => Ok(None),
                Source::Namespace => scope.lookup(name).map(Some).ok_or_else(|| name.clone()),
            })
            .collect()
    }
}

/// The state a plan is resolved against.
pub(crate) struct Scope<'a, N: TreeNode> {
    pub node: Option<&'a N>,
    pub previous_result: &'a Value<N>,
    pub root: &'a N,
    pub context: &'a Context<N>,
    pub config: &'a Config<N>,
}

impl<N: TreeNode> Scope<'_, N> {
    /// A non-reserved name: context first, then configuration.
    pub(crate) fn lookup(&self, name: &str) -> Option<Value<N>> {
        self.context.get(name).cloned().or_else(|| self.config.get(name))
    }

    /// Any name, reserved ones included, as a value.
    pub(crate) fn symbol(&self, name: &str) -> Option<Value<N>> {
        match Source::for_name(name) {
            Source::Node => Some(self.node.cloned().map_or(Value::None, Value::Node)),
            Source::PreviousResult => Some(self.previous_result.clone()),
            Source::Root => Some(Value::Node(self.root.clone())),
            Source::Context => Some(self.context.clone().into()),
            Source::Config | Source::Transformation => None,
            Source::Namespace => self.lookup(name),
        }
    }
}

// --- Plan cache --------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    /// `None` when unbounded.
    pub capacity: Option<NonZeroUsize>,
}

/// LRU cache of resolution plans keyed by signature.
pub struct PlanCache {
    plans: Mutex<LruCache<Signature, Arc<ResolutionPlan>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

static GLOBAL: Lazy<Arc<PlanCache>> = Lazy::new(|| Arc::new(PlanCache::from_env()));

impl PlanCache {
    pub const CAPACITY_VARIABLE: &'static str = "TRELLIS_PLAN_CACHE_SIZE";

    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    pub fn with_capacity(capacity: Option<NonZeroUsize>) -> Self {
        let plans = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        PlanCache { plans: Mutex::new(plans), hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    /// A cache sized by `TRELLIS_PLAN_CACHE_SIZE`.
    pub fn from_env() -> Self {
        let value = std::env::var(Self::CAPACITY_VARIABLE).ok();
        Self::with_capacity(parse_capacity(value.as_deref()))
    }

    /// The process-wide cache.
    pub fn global() -> Arc<PlanCache> {
        Arc::clone(&GLOBAL)
    }

    /// Changes the bound; shrinking evicts least recently used plans.
    pub fn set_capacity(&self, capacity: Option<NonZeroUsize>) {
        self.plans.lock().resize(capacity.unwrap_or(NonZeroUsize::MAX));
    }

    pub fn capacity(&self) -> Option<NonZeroUsize> {
        let cap = self.plans.lock().cap();
        (cap != NonZeroUsize::MAX).then_some(cap)
    }

    /// The plan for `signature`, computed and inserted on a miss.
    pub fn plan(&self, signature: &Signature) -> Arc<ResolutionPlan> {
        let mut plans = self.plans.lock();
        if let Some(plan) = plans.get(signature) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(plan);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("computing resolution plan for {signature:?}");
        let plan = Arc::new(ResolutionPlan::compute(signature));
        plans.put(signature.clone(), Arc::clone(&plan));
        plan
    }

    /// Whether a plan is cached, without touching its recency.
    pub fn contains(&self, signature: &Signature) -> bool {
        self.plans.lock().contains(signature)
    }

    pub fn len(&self) -> usize {
        self.plans.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.plans.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity(),
        }
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanCache").field("stats", &self.stats()).finish()
    }
}

fn parse_capacity(value: Option<&str>) -> Option<NonZeroUsize> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<NonZeroUsize>() {
        Ok(capacity) => Some(capacity),
        Err(_) => {
            log::warn!("ignoring {}={value:?}: expected a positive integer", PlanCache::CAPACITY_VARIABLE);
            None
        }
    }
}

// --- Handler arguments -------------------------------------------------------

/// What a handler receives: its resolved values plus access to the running
/// invocation's context, configuration and transformation.
pub struct Arguments<'a, N: TreeNode> {
    pub(crate) handler: &'a str,
    pub(crate) signature: &'a Signature,
    pub(crate) values: Vec<Option<Value<N>>>,
    pub(crate) context: &'a mut Context<N>,
    pub(crate) config: &'a Config<N>,
    pub(crate) transformation: &'a Transformation<N>,
}

impl<'a, N: TreeNode> Arguments<'a, N> {
    pub fn handler_name(&self) -> &str {
        self.handler
    }

    pub fn signature(&self) -> &Signature {
        self.signature
    }

    /// The value resolved for `name`. `None` if the handler did not declare it
    /// or it names one of the object symbols.
    pub fn get(&self, name: &str) -> Option<&Value<N>> {
        self.values.get(self.signature.position(name)?)?.as_ref()
    }

    /// Moves the value resolved for `name` out, leaving `Value::None`.
    pub fn take(&mut self, name: &str) -> Value<N> {
        let Some(index) = self.signature.position(name) else {
            return Value::None;
        };
        self.values.get_mut(index).and_then(Option::take).unwrap_or_default()
    }

    /// Positional access, in declaration order.
    pub fn value(&self, index: usize) -> Option<&Value<N>> {
        self.values.get(index)?.as_ref()
    }

    /// The current node; an error outside of rules or if not declared.
    pub fn node(&self) -> Result<N, Flow> {
        self.get("node")
            .and_then(Value::as_node)
            .cloned()
            .ok_or_else(|| Flow::error(format!("handler `{}` needs a current node", self.handler)))
    }

    pub fn root(&self) -> Result<N, Flow> {
        self.get("root")
            .and_then(Value::as_node)
            .cloned()
            .ok_or_else(|| Flow::error(format!("handler `{}` did not declare `root`", self.handler)))
    }

    pub fn previous_result(&self) -> Option<&Value<N>> {
        self.get("previous_result")
    }

    pub fn context(&mut self) -> &mut Context<N> {
        self.context
    }

    pub fn config(&self) -> &Config<N> {
        self.config
    }

    pub fn transformation(&self) -> &Transformation<N> {
        self.transformation
    }
}

impl<N: TreeNode> fmt::Debug for Arguments<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.signature.names().iter().zip(&self.values) {
            match value {
                Some(value) => map.entry(name, value),
                None => map.entry(name, &format_args!("<{name}>")),
            };
        }
        map.finish()
    }
}

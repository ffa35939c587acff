//! Invocation metrics.
//!
//! `Transformation::invoke` is the normal entry point;
//! `Transformation::invoke_with_metrics` additionally times every step and
//! counts the nodes each rule visited and matched. Collection is opt-in, the
//! plain path only keeps the counters it needs for logging.

use std::fmt;
use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Name of the transformation, if configured.
    pub transformation: Option<String>,
    /// Total elapsed time of the invocation, result selection included.
    pub total: Duration,
    /// One entry per executed step, in execution order.
    pub steps: Vec<StepMetrics>,
    /// Whether a handler aborted the transformation.
    pub aborted: bool,
}

impl RunMetrics {
    pub fn visited(&self) -> usize {
        self.steps.iter().map(|s| s.visited).sum()
    }

    pub fn matched(&self) -> usize {
        self.steps.iter().map(|s| s.matched).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Handler,
    Rule,
    Transformation,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepKind::Handler => "handler",
            StepKind::Rule => "rule",
            StepKind::Transformation => "transformation",
        })
    }
}

/// Timing and node counts for a single step.
#[derive(Debug, Clone)]
pub struct StepMetrics {
    /// Index into the flattened step list.
    pub index: usize,
    pub label: String,
    pub kind: StepKind,
    pub duration: Duration,
    /// Nodes produced by the rule's traversal; 0 for other steps.
    pub visited: usize,
    /// Nodes that met all of the rule's conditions.
    pub matched: usize,
}

/// Invocation output bundled with its metrics.
#[derive(Debug, Clone)]
pub struct Run<T> {
    pub result: T,
    pub metrics: RunMetrics,
}

//! Rule-dispatch and traversal engine.
//!
//! The engine is split into focused submodules under `src/engine/`; the types
//! users need are re-exported here (and from the crate root).
//!
//! ## How the parts work together
//!
//! ```text
//! TransformationBuilder::build           (transformation.rs)
//!   - flatten step sequences
//!   - prepend common rule conditions      (rule.rs)
//!   - validate the result selector        (config.rs)
//!           │
//!           v
//! Transformation::invoke(root, overrides)
//!   - copy root, seed context
//!   - for each step:
//!       handler ── PlanCache::plan ── ResolutionPlan::resolve ── call
//!                  (symbols.rs)
//!       rule ───── TraversalOrder::traverse ── Condition::evaluate ── handlers
//!                  (traversal.rs)              (condition.rs)
//!       transformation ── recursive invoke on the current node
//!           │
//!           v
//!   ResultSelector::resolve ── Value
//! ```
//!
//! ## Responsibilities by module
//!
//! - `condition.rs`: string shortcut classification, attribute constraints,
//!   boolean combinators and predicates.
//! - `traversal.rs`: the traversal axes, their flag spelling and the lazy node
//!   sequences.
//! - `symbols.rs`: handler signatures, resolution plans and their LRU cache,
//!   and the [`Arguments`] handlers receive.
//! - `handler.rs`: [`Handler`] and the [`Flow`] signals handlers return.
//! - `rule.rs`: conditions bound to handlers.
//! - `config.rs`: per-transformation settings and the result selector.
//! - `transformation.rs`: the step pipeline and invocation state.
//! - `metrics.rs`: opt-in per-step timings and node counts.
//!
//! ## Debugging
//!
//! Every step, rule match and plan computation is logged at `debug` level via
//! the `log` facade; run with `RUST_LOG=trellis=debug` under `env_logger`.

#[path = "engine/condition.rs"]
mod condition;
#[path = "engine/config.rs"]
mod config;
#[path = "engine/handler.rs"]
mod handler;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/rule.rs"]
mod rule;
#[path = "engine/symbols.rs"]
mod symbols;
#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;
#[path = "engine/transformation.rs"]
mod transformation;
#[path = "engine/traversal.rs"]
mod traversal;

pub use condition::{AttributeMatcher, Condition, KeyPattern, Shortcut, ValuePattern};
pub use config::{Config, ResultSelector, SelectorBase};
pub use handler::{Flow, Handler};
pub use metrics::{Run, RunMetrics, StepKind, StepMetrics};
pub use rule::Rule;
pub use symbols::{Arguments, PlanCache, PlanCacheStats, RESERVED_SYMBOLS, ResolutionPlan, Signature, Source};
pub use transformation::{Invocation, Step, Subtransformation, Transformation, TransformationBuilder};
pub use traversal::{Breadth, Horizontal, Traversal, TraversalOrder, Traverse, Vertical};

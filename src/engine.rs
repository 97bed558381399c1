//! Compilation engine.
//!
//! The engine is split into focused submodules under `src/engine/`. Callers go
//! through [`crate::Compiler`]; the pieces are public mostly for testing and
//! for tools that want to run a single stage.
//!
//! ## How the parts work together
//!
//! ```text
//! rule source ── RuleTable::load            (rule_table.rs)
//!                  - synonyms, rules in intent → macro → command order
//!                  - anchor index over command rules
//!                               │
//! raw text ── normalize ────────┤           (normalize.rs)
//!                               v
//!                     match_rules            (matcher.rs)
//!                       - one regex match per rule, table order
//!                               │
//!                               v
//!                     resolve + set_path/push_path
//!                       (resolve.rs, document.rs)
//!                               │
//!                               v
//!                     analyze                (completeness.rs, trigger.rs)
//!                       - unmatched tokens
//!                       - implied vs fired anchors
//!                               │
//!                     incomplete? ── auto_fix / widened table  (relax.rs)
//!                               │
//!                               v
//!                     Compilation + RunMetrics (metrics.rs)
//! ```
//!
//! ## Invariants
//!
//! - Rule order is fixed at load time and is the only thing that decides which
//!   write wins when two rules target the same path.
//! - Matching never consumes text: every rule sees the whole normalized string.
//! - Nothing in here fails on input text. Bad rules are dropped at load with a
//!   [`LoadNote`]; bad captures resolve to defaults.
//!
//! ## Debugging
//!
//! All stages emit `tracing` events at `debug` level (target `tracklang`).

#[path = "engine/completeness.rs"]
mod completeness;
#[path = "engine/document.rs"]
mod document;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/normalize.rs"]
mod normalize;
#[path = "engine/relax.rs"]
mod relax;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/rule_table.rs"]
mod rule_table;
#[path = "engine/trigger.rs"]
mod trigger;

pub use completeness::Diagnostics;
pub use document::{get_path, push_path, set_path};
pub use metrics::{PassKind, PassMetrics, RunMetrics};
pub use normalize::normalize;
pub use relax::{Passes, auto_fix};
pub use resolve::resolve;
pub use rule_table::{AnchorIndex, AppliedWidening, LoadNote, RuleMeta, RuleTable, Synonym, Widened, Widening};

pub(crate) use relax::{Compilation, compile};
pub(crate) use rule_table::rewrite_patterns;

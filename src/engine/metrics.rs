//! Compile run metrics.
//!
//! Every compile records one `PassMetrics` per pass it actually ran, so a
//! caller can see whether relaxation kicked in and what it cost.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// The raw text as given.
    Initial,
    /// Raw text after the auto-fix rewrite.
    AutoFix,
    /// Same text, widened rule table.
    Widened,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PassKind::Initial => "initial",
            PassKind::AutoFix => "auto-fix",
            PassKind::Widened => "widened",
        })
    }
}

/// Timing and outcome of a single pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassMetrics {
    pub kind: PassKind,
    /// Elapsed time for the pass.
    pub duration: Duration,
    /// Number of rules that fired.
    pub fired: usize,
    /// Number of unmatched tokens left.
    pub unmatched: usize,
    pub complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    /// Total elapsed time for the compile.
    pub total: Duration,
    /// Passes in the order they ran.
    pub passes: Vec<PassMetrics>,
}

//! Error types for tracklang.
//!
//! Compilation itself never fails: bad rules are dropped at load time and bad
//! input degrades to unmatched tokens. Errors only come from the rule source
//! and from misuse of the shared rule table.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A reload or persist was requested while compiles hold the rule table.
    #[error("rule table is busy: a compile is in progress")]
    Busy,

    #[error("rule source is read-only: {0}")]
    ReadOnly(String),

    #[error("rule source error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

//! Rule-driven compiler from free-form track descriptions to a structured
//! generator document.
//!
//! ```text
//! raw text ── normalize ── match rules ── resolve + project ── analyze
//!                                                   │             │
//!                                            canonical doc   diagnostics
//! ```
//!
//! The public surface is [`Compiler`] (or the [`compile`] shortcut over the
//! built-in rule set). Rules are plain JSON documents supplied by a
//! [`RuleSource`].

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod source;

pub use api::{CompileOutput, Compiler, Options, compile};
pub use engine::{
    AnchorIndex, AppliedWidening, Diagnostics, LoadNote, PassKind, PassMetrics, Passes, RuleMeta, RuleTable, RunMetrics,
    Synonym, Widened, Widening, auto_fix, get_path, normalize, push_path, resolve, set_path,
};
pub use error::{Error, Result};
pub use source::{BuiltinSource, DirSource, MemorySource, RuleDocument, RuleSource};

// --- Rules -------------------------------------------------------------------

/// Rule class. The declaration order is the matching priority: intents lay
/// down base fields, macros and commands layer on top of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Intent,
    Macro,
    Command,
}

impl RuleKind {
    /// All kinds in matching order.
    pub const ALL: [RuleKind; 3] = [RuleKind::Intent, RuleKind::Macro, RuleKind::Command];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Intent => "intent",
            RuleKind::Macro => "macro",
            RuleKind::Command => "command",
        }
    }

    /// Rule document this kind is loaded from.
    pub fn document(self) -> RuleDocument {
        match self {
            RuleKind::Intent => RuleDocument::Intents,
            RuleKind::Macro => RuleDocument::Macros,
            RuleKind::Command => RuleDocument::Commands,
        }
    }
}

/// One effect of a fired rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write the resolved `template` at the dotted `path`.
    Set { path: String, template: String },
    /// Append an executable generator operation `{ "op": op, arg: value, .. }`
    /// to the document's action list.
    Emit { op: String, args: Vec<(String, String)> },
}

/// A loaded rule. Immutable once the table is built.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub kind: RuleKind,
    /// `None` when the record carried no (or an empty) regex; such rules never fire.
    pub pattern: Option<Regex>,
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn rule_ref(&self) -> RuleRef {
        RuleRef { name: self.name.clone(), kind: self.kind }
    }

    /// Lowercased words of the rule name (`set-size-by-width` -> set, size, by, width).
    pub(crate) fn name_words(&self) -> impl Iterator<Item = String> + '_ {
        self.name.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(str::to_lowercase)
    }
}

/// Reference to a fired rule, as reported in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RuleRef {
    pub name: String,
    pub kind: RuleKind,
}

// --- Values --------------------------------------------------------------------

/// A resolved leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Int(v) => Value::from(v),
            // Non-finite floats never come out of the resolver; `from` maps them to null anyway.
            Scalar::Float(v) => Value::from(v),
            Scalar::Bool(v) => Value::Bool(v),
            Scalar::Str(v) => Value::String(v),
        }
    }
}

/// Capture groups of a single rule match.
///
/// Index 0 is the whole match. Groups that did not participate are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    pub groups: Vec<Option<String>>,
    pub named: Vec<(String, String)>,
}

impl Captures {
    pub fn from_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Captures { groups: groups.into_iter().map(|g| Some(g.into())).collect(), named: Vec::new() }
    }

    /// Text of group `index`, empty when out of range or unmatched.
    pub fn get(&self, index: usize) -> &str {
        self.groups.get(index).and_then(|g| g.as_deref()).unwrap_or("")
    }

    /// Text of the named group `name`, empty when absent.
    pub fn name(&self, name: &str) -> &str {
        self.named.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str()).unwrap_or("")
    }
}

/// A rule that fired against the normalized text.
#[derive(Debug, Clone)]
pub(crate) struct MatchResult {
    /// Index into `RuleTable::rules`.
    pub rule: usize,
    pub captures: Captures,
}

// --- Tokens --------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    StopWord,
    Numeric,
    Content,
}

/// A word-like run of the normalized text. Used for diagnostics only, never
/// for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub class: TokenClass,
}

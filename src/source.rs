//! Rule sources.
//!
//! The compiler never touches storage directly. It asks a [`RuleSource`] for
//! the raw JSON of each [`RuleDocument`] on (re)load, and hands rewritten
//! documents back only when the caller explicitly persists widenings.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The named documents a rule source supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleDocument {
    Synonyms,
    Intents,
    Macros,
    Commands,
    /// Optional `(rule, from, to)` widening table.
    Widenings,
}

impl RuleDocument {
    pub const ALL: [RuleDocument; 5] = [
        RuleDocument::Synonyms,
        RuleDocument::Intents,
        RuleDocument::Macros,
        RuleDocument::Commands,
        RuleDocument::Widenings,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            RuleDocument::Synonyms => "synonyms.json",
            RuleDocument::Intents => "intents.json",
            RuleDocument::Macros => "macros.json",
            RuleDocument::Commands => "commands.json",
            RuleDocument::Widenings => "widenings.json",
        }
    }
}

impl fmt::Display for RuleDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Supplier of raw rule documents.
pub trait RuleSource: Send + Sync {
    /// Raw JSON text of `document`, or `None` when the source does not have it.
    fn read(&self, document: RuleDocument) -> Result<Option<String>>;

    /// Replace `document` with `contents`.
    fn write(&self, document: RuleDocument, _contents: &str) -> Result<()> {
        Err(Error::ReadOnly(format!("{} cannot store {document}", self.describe())))
    }

    /// Short human-readable name used in logs and load notes.
    fn describe(&self) -> String;
}

/// Shared sources, so a caller can keep a handle to a source it gave a compiler.
impl<S: RuleSource + ?Sized> RuleSource for Arc<S> {
    fn read(&self, document: RuleDocument) -> Result<Option<String>> {
        (**self).read(document)
    }

    fn write(&self, document: RuleDocument, contents: &str) -> Result<()> {
        (**self).write(document, contents)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// --- Built-in rules ----------------------------------------------------------

pub(crate) const BUILTIN_SYNONYMS: &str = include_str!("../rules/synonyms.json");
pub(crate) const BUILTIN_INTENTS: &str = include_str!("../rules/intents.json");
pub(crate) const BUILTIN_MACROS: &str = include_str!("../rules/macros.json");
pub(crate) const BUILTIN_COMMANDS: &str = include_str!("../rules/commands.json");
pub(crate) const BUILTIN_WIDENINGS: &str = include_str!("../rules/widenings.json");

/// The rule set compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl RuleSource for BuiltinSource {
    fn read(&self, document: RuleDocument) -> Result<Option<String>> {
        let text = match document {
            RuleDocument::Synonyms => BUILTIN_SYNONYMS,
            RuleDocument::Intents => BUILTIN_INTENTS,
            RuleDocument::Macros => BUILTIN_MACROS,
            RuleDocument::Commands => BUILTIN_COMMANDS,
            RuleDocument::Widenings => BUILTIN_WIDENINGS,
        };
        Ok(Some(text.to_string()))
    }

    fn describe(&self) -> String {
        "builtin rules".to_string()
    }
}

// --- Directory source --------------------------------------------------------

/// Reads `<root>/<document>.json` files. Missing files are reported as absent.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirSource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, document: RuleDocument) -> PathBuf {
        self.root.join(document.file_name())
    }
}

impl RuleSource for DirSource {
    fn read(&self, document: RuleDocument) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_of(document)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, document: RuleDocument, contents: &str) -> Result<()> {
        let path = self.path_of(document);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("rule directory {}", self.root.display())
    }
}

// --- In-memory source --------------------------------------------------------

/// Rule documents held in memory. Writable, mostly useful for tests and for
/// callers that fetch rules from elsewhere.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: Mutex<HashMap<RuleDocument, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, document: RuleDocument, contents: impl Into<String>) -> Self {
        self.documents.lock().insert(document, contents.into());
        self
    }

    pub fn set(&self, document: RuleDocument, contents: impl Into<String>) {
        self.documents.lock().insert(document, contents.into());
    }

    pub fn get(&self, document: RuleDocument) -> Option<String> {
        self.documents.lock().get(&document).cloned()
    }
}

impl RuleSource for MemorySource {
    fn read(&self, document: RuleDocument) -> Result<Option<String>> {
        Ok(self.get(document))
    }

    fn write(&self, document: RuleDocument, contents: &str) -> Result<()> {
        self.set(document, contents);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory rules".to_string()
    }
}

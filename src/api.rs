use crate::engine::{self, Diagnostics, Passes, RuleTable, RunMetrics};
use crate::error::{Error, Result};
use crate::source::{BuiltinSource, RuleSource};
use crate::{RuleKind, RuleRef};
use once_cell::sync::Lazy;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

static BUILTIN: Lazy<Compiler> = Lazy::new(Compiler::builtin);

/// Options that affect loading and compilation.
///
/// Every field has a default, so a partial JSON object (or `{}`) is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Rules whose name starts with this prefix never fire and have no anchor.
    /// An empty prefix disables the check.
    pub reserved_prefix: String,
    /// Document path that kernel actions are appended to.
    pub actions_path: String,
    /// Run the auto-fix pass on incomplete results.
    pub auto_fix: bool,
    /// Run the widened-rules pass on incomplete results.
    pub widen: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { reserved_prefix: "auto_".to_string(), actions_path: "actions".to_string(), auto_fix: true, widen: true }
    }
}

impl Options {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Result of [`compile`] and [`Compiler::compile`].
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The input text as given.
    pub text: String,
    /// Normalized text of the last pass that ran.
    pub normalized: String,
    /// The canonical document.
    pub document: Value,
    pub diagnostics: Diagnostics,
    pub complete: bool,
    /// Relaxation passes that ran.
    pub passes: Passes,
    /// Rules whose widened pattern produced this result.
    pub widened: Vec<String>,
    /// Version of the rule table used.
    pub rules_version: u64,
    pub metrics: RunMetrics,
}

impl CompileOutput {
    /// Compact JSON text of the document.
    pub fn document_json(&self) -> String {
        self.document.to_string()
    }

    pub fn matched(&self) -> &[RuleRef] {
        &self.diagnostics.matched
    }

    pub fn unmatched(&self) -> &[String] {
        &self.diagnostics.unmatched
    }

    pub fn elapsed(&self) -> Duration {
        self.metrics.total
    }

    /// The whole run as one JSON value: document, diagnostics and per-pass metrics.
    pub fn report(&self) -> Value {
        let passes: Vec<String> = self.passes.iter_names().map(|(name, _)| name.to_lowercase()).collect();
        json!({
            "text": self.text,
            "normalized": self.normalized,
            "complete": self.complete,
            "passes": passes,
            "widened": self.widened,
            "rulesVersion": self.rules_version,
            "document": self.document,
            "diagnostics": self.diagnostics,
            "metrics": self.metrics,
        })
    }
}

#[derive(Debug, Default)]
struct Cache {
    table: Option<RuleTable>,
    loads: u64,
}

/// A rule source plus the rule table loaded from it.
///
/// The table is loaded on first use and shared by every compile. `reload` and
/// `persist_widenings` need exclusive access and fail with [`Error::Busy`]
/// instead of waiting while a compile holds the table.
pub struct Compiler {
    source: Box<dyn RuleSource>,
    options: Options,
    cache: RwLock<Cache>,
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("source", &self.source.describe())
            .field("options", &self.options)
            .field("loads", &self.cache.try_read().map(|c| c.loads))
            .finish()
    }
}

impl Compiler {
    pub fn new(source: impl RuleSource + 'static) -> Self {
        Self::with_options(source, Options::default())
    }

    pub fn with_options(source: impl RuleSource + 'static, options: Options) -> Self {
        Self { source: Box::new(source), options, cache: RwLock::new(Cache::default()) }
    }

    /// Compiler over the rule set embedded in the crate.
    pub fn builtin() -> Self {
        Self::new(BuiltinSource)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn source(&self) -> &dyn RuleSource {
        self.source.as_ref()
    }

    /// Compile `text` into a canonical document.
    ///
    /// Never fails: an incomplete result is reported through
    /// [`CompileOutput::complete`] and the diagnostics.
    ///
    /// # Example
    /// ```
    /// let out = tracklang::compile("build 105m by 6m");
    /// assert!(out.complete);
    /// assert_eq!(out.document["trackTemplate"]["lengthUnits"], 105);
    /// ```
    pub fn compile(&self, text: &str) -> CompileOutput {
        let table = self.table();
        let run = engine::compile(&table, text, &self.options);

        CompileOutput {
            text: text.to_string(),
            normalized: run.normalized,
            document: run.document,
            complete: run.diagnostics.complete,
            diagnostics: run.diagnostics,
            passes: run.passes,
            widened: run.widened,
            rules_version: table.version(),
            metrics: run.metrics,
        }
    }

    /// Normalize `text` with the loaded synonym map, without matching.
    pub fn normalize(&self, text: &str) -> String {
        self.table().normalize(text)
    }

    /// Run `f` against the loaded rule table. A reload attempted from inside
    /// `f` reports [`Error::Busy`].
    pub fn with_table<R>(&self, f: impl FnOnce(&RuleTable) -> R) -> R {
        f(&self.table())
    }

    /// Re-read every rule document and rebuild the table. Returns the new
    /// table version.
    pub fn reload(&self) -> Result<u64> {
        let mut cache = self.cache.try_write().ok_or(Error::Busy)?;
        let table = self.load(&mut cache);
        let version = table.version();
        cache.table = Some(table);
        Ok(version)
    }

    /// Write every applicable widening back to the rule source and reload.
    ///
    /// Returns the names of the rules whose pattern was rewritten; empty when
    /// nothing applies.
    pub fn persist_widenings(&self) -> Result<Vec<String>> {
        let mut cache = self.cache.try_write().ok_or(Error::Busy)?;
        if cache.table.is_none() {
            let table = self.load(&mut cache);
            cache.table = Some(table);
        }
        let Some(widened) = cache.table.as_ref().and_then(RuleTable::widened) else {
            return Ok(Vec::new());
        };

        for kind in RuleKind::ALL {
            let applied: Vec<_> = widened.applied.iter().filter(|a| a.kind == kind).collect();
            if applied.is_empty() {
                continue;
            }
            if let Err(err) = self.rewrite_document(kind, &applied) {
                cache.table = None;
                return Err(err);
            }
        }

        let rules: Vec<String> = widened.applied.into_iter().map(|a| a.rule).collect();
        info!(source = %self.source.describe(), ?rules, "widenings persisted");
        let table = self.load(&mut cache);
        cache.table = Some(table);
        Ok(rules)
    }

    fn rewrite_document(&self, kind: RuleKind, applied: &[&engine::AppliedWidening]) -> Result<()> {
        let document = kind.document();
        let raw = self
            .source
            .read(document)?
            .ok_or_else(|| Error::Source(format!("{document} disappeared from {}", self.source.describe())))?;
        let mut doc: Value = serde_json::from_str(&raw)?;
        let changed = engine::rewrite_patterns(&mut doc, applied);
        if changed < applied.len() {
            warn!(%document, changed, expected = applied.len(), "some widened rules were not found in the document");
        }
        self.source.write(document, &serde_json::to_string_pretty(&doc)?)
    }

    fn load(&self, cache: &mut RwLockWriteGuard<'_, Cache>) -> RuleTable {
        cache.loads += 1;
        RuleTable::load(self.source.as_ref(), &self.options, cache.loads)
    }

    fn table(&self) -> MappedRwLockReadGuard<'_, RuleTable> {
        loop {
            match RwLockReadGuard::try_map(self.cache.read(), |cache| cache.table.as_ref()) {
                Ok(table) => return table,
                Err(guard) => drop(guard),
            }
            let mut cache = self.cache.write();
            if cache.table.is_none() {
                let table = self.load(&mut cache);
                cache.table = Some(table);
            }
            if let Ok(table) = RwLockReadGuard::try_map(RwLockWriteGuard::downgrade(cache), |c| c.table.as_ref()) {
                return table;
            }
        }
    }
}

/// Compile `text` with the built-in rule set and default [`Options`].
pub fn compile(text: &str) -> CompileOutput {
    BUILTIN.compile(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, RuleDocument};
    use serde_json::json;

    fn memory() -> MemorySource {
        MemorySource::new()
            .with(
                RuleDocument::Intents,
                r#"[{"name":"set-rows","regex":"(\\d+) rows","ops":[{"path":"track.rows","value":"$1:int"}]}]"#,
            )
            .with(
                RuleDocument::Commands,
                r#"[{"name":"curve-rows","regex":"curve rows (\\d+)-(\\d+)","kernel":{"op":"curve","args":{"from":"$1:int","to":"$2:int"}}}]"#,
            )
            .with(
                RuleDocument::Widenings,
                r#"[{"rule":"curve-rows","from":"curve rows (\\d+)-(\\d+)","to":"curve(?: rows?)? (\\d+)\\s*(?:-|to)\\s*(\\d+)"}]"#,
            )
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options = Options::from_json(r#"{"widen": false}"#).unwrap();
        assert_eq!(options, Options { widen: false, ..Options::default() });
        assert!(Options::from_json("[1]").is_err());
    }

    #[test]
    fn compile_loads_lazily_once() {
        let compiler = Compiler::new(memory());
        let first = compiler.compile("12 rows");
        let second = compiler.compile("12 rows");
        assert_eq!(first.rules_version, 1);
        assert_eq!(second.rules_version, 1);
        assert_eq!(first.document, json!({ "track": { "rows": 12 } }));
        assert!(first.complete);
    }

    #[test]
    fn reload_bumps_version_and_picks_up_changes() {
        let compiler = Compiler::new(memory());
        compiler.compile("12 rows");
        assert_eq!(compiler.reload().unwrap(), 2);
        assert_eq!(compiler.with_table(|t| t.version()), 2);
    }

    #[test]
    fn reload_while_compiling_is_busy() {
        let compiler = Compiler::new(memory());
        let result = compiler.with_table(|_| compiler.reload());
        assert!(matches!(result, Err(Error::Busy)));
        let result = compiler.with_table(|_| compiler.persist_widenings());
        assert!(matches!(result, Err(Error::Busy)));
        assert!(compiler.reload().is_ok());
    }

    #[test]
    fn persist_widenings_rewrites_source_and_is_idempotent() {
        let compiler = Compiler::new(memory());
        let before = compiler.compile("curve 1 to 4");
        assert!(before.complete);
        assert_eq!(before.passes, Passes::WIDENED);
        assert_eq!(before.widened, vec!["curve-rows"]);

        assert_eq!(compiler.persist_widenings().unwrap(), vec!["curve-rows"]);
        let out = compiler.compile("curve 1 to 4");
        assert!(out.complete);
        assert_eq!(out.passes, Passes::empty());
        assert_eq!(out.document, json!({ "actions": [ { "op": "curve", "from": 1, "to": 4 } ] }));

        assert!(compiler.persist_widenings().unwrap().is_empty());
    }

    #[test]
    fn persist_widenings_on_builtin_is_read_only() {
        let compiler = Compiler::builtin();
        assert!(matches!(compiler.persist_widenings(), Err(Error::ReadOnly(_))));
        assert!(compiler.compile("build 105m by 6m").complete);
    }

    #[test]
    fn builtin_shortcut_compiles() {
        let out = compile("build 105m by 6m");
        assert_eq!(out.normalized, "build 105 m by 6 m");
        assert!(out.complete);
        assert_eq!(out.document_json(), r#"{"trackTemplate":{"lengthUnits":105,"tileWidth":6}}"#);
    }

    #[test]
    fn report_carries_diagnostics_and_metrics() {
        let report = compile("build 105m by 6m").report();
        assert_eq!(report["complete"], json!(true));
        assert_eq!(report["passes"], json!([]));
        assert_eq!(report["diagnostics"]["matched"][0]["name"], json!("set-size-length-by-width"));
        assert_eq!(report["diagnostics"]["matched"][0]["kind"], json!("intent"));
        assert_eq!(report["metrics"]["passes"][0]["kind"], json!("initial"));
        assert_eq!(report["document"], json!({ "trackTemplate": { "lengthUnits": 105, "tileWidth": 6 } }));

        let relaxed = compile("105 x 6").report();
        assert_eq!(relaxed["passes"], json!(["auto_fix", "widened"]));
        assert_eq!(relaxed["metrics"]["passes"][2]["kind"], json!("widened"));
    }
}

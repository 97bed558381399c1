//! Rule loading and indexing.
//!
//! This module holds the *static* side of the engine: everything derived from
//! the rule documents once per (re)load.
//!
//! 1. **Load** (`RuleTable::load`): read the synonym map and the three rule
//!    documents from a [`RuleSource`], compile every pattern, and drop what
//!    does not compile with a [`LoadNote`].
//! 2. **Index** (`AnchorIndex`): derive one anchor word per command rule, the
//!    keyword the completeness check looks for in the input.
//! 3. **Widen** (`RuleTable::widened`): a pure transform producing a new table
//!    with known-brittle patterns relaxed.
//!
//! ## Invariants
//!
//! - `rules` is ordered intents, then macros, then commands; within a kind the
//!   document order is kept. Matching walks it front to back.
//! - `RuleId` is an index into `RuleTable::rules` and `RuleTable::metas`.
//!   Those vectors must stay aligned.
//! - Loading never fails. The worst case is an empty table full of notes.

use super::trigger::is_anchor_noise;
use crate::api::Options;
use crate::source::{BUILTIN_WIDENINGS, RuleDocument, RuleSource};
use crate::{Action, Rule, RuleKind};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Rule identifier (index into the rules vector).
pub(crate) type RuleId = usize;

// --- Records -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RuleRecord {
    name: String,
    #[serde(default)]
    regex: Option<String>,
    #[serde(default)]
    ops: Vec<OpRecord>,
    #[serde(default)]
    kernel: Option<OneOrMany<KernelRecord>>,
}

#[derive(Debug, Deserialize)]
struct OpRecord {
    #[serde(default = "default_verb")]
    op: String,
    path: String,
    value: Value,
}

fn default_verb() -> String {
    "set".to_string()
}

#[derive(Debug, Deserialize)]
struct KernelRecord {
    op: String,
    #[serde(default)]
    args: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// JSON scalars become their literal template text.
fn template_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// --- Public types ------------------------------------------------------------

/// A surface form and its canonical replacement.
#[derive(Debug, Clone)]
pub struct Synonym {
    pub from: String,
    pub to: String,
    pub(crate) matcher: Regex,
}

impl Synonym {
    /// Build a synonym matching `from` as a whole word. Both sides are
    /// lowercased. Returns `None` for an empty surface form.
    pub fn new(from: &str, to: &str) -> Option<Self> {
        let from = from.trim().to_lowercase();
        if from.is_empty() {
            return None;
        }
        let word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
        let lead = if word(from.chars().next()) { r"\b" } else { "" };
        let tail = if word(from.chars().last()) { r"\b" } else { "" };
        let matcher = RegexBuilder::new(&format!("{lead}{}{tail}", regex::escape(&from)))
            .case_insensitive(true)
            .build()
            .ok()?;
        Some(Synonym { from, to: to.trim().to_lowercase(), matcher })
    }
}

/// One entry of the widening table: replace `from` with `to` on rule `rule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widening {
    pub rule: String,
    pub from: String,
    pub to: String,
}

/// Something dropped or defaulted while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadNote {
    pub document: RuleDocument,
    pub rule: Option<String>,
    pub message: String,
}

impl fmt::Display for LoadNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "{}: rule '{}': {}", self.document, rule, self.message),
            None => write!(f, "{}: {}", self.document, self.message),
        }
    }
}

/// Metadata derived for a rule at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMeta {
    /// Anchor word, command rules only.
    pub anchor: Option<String>,
    /// Name starts with the reserved auto-generated prefix.
    pub reserved: bool,
}

/// Distinct anchors of all non-reserved command rules, in rule order.
#[derive(Debug, Clone, Default)]
pub struct AnchorIndex {
    words: Vec<String>,
}

impl AnchorIndex {
    fn build(metas: &[RuleMeta]) -> Self {
        let mut words: Vec<String> = Vec::new();
        for meta in metas.iter().filter(|m| !m.reserved) {
            if let Some(anchor) = &meta.anchor {
                if !words.contains(anchor) {
                    words.push(anchor.clone());
                }
            }
        }
        AnchorIndex { words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }
}

/// A widening that took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedWidening {
    pub rule: String,
    pub kind: RuleKind,
    /// Pattern the rule carried before widening.
    pub from: String,
    pub pattern: String,
}

/// Result of [`RuleTable::widened`].
#[derive(Debug, Clone)]
pub struct Widened {
    pub table: RuleTable,
    pub applied: Vec<AppliedWidening>,
}

/// Loaded, compiled, indexed rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    version: u64,
    synonyms: Vec<Synonym>,
    synonym_words: HashSet<String>,
    rules: Vec<Rule>,
    metas: Vec<RuleMeta>,
    anchors: AnchorIndex,
    widenings: Vec<Widening>,
    notes: Vec<LoadNote>,
}

impl RuleTable {
    /// Load every document from `source`.
    ///
    /// Notes:
    /// - A missing or unparsable document counts as empty and is noted.
    /// - A missing widening document falls back to the built-in widening table.
    pub fn load(source: &dyn RuleSource, options: &Options, version: u64) -> Self {
        let mut notes = Vec::new();

        let synonyms = read_document(source, RuleDocument::Synonyms, &mut notes)
            .map(|doc| load_synonyms(doc, &mut notes))
            .unwrap_or_default();

        let mut rules = Vec::new();
        for kind in RuleKind::ALL {
            if let Some(doc) = read_document(source, kind.document(), &mut notes) {
                load_rules(doc, kind, &mut rules, &mut notes);
            }
        }

        let widenings = match source.read(RuleDocument::Widenings) {
            Ok(Some(raw)) => parse_document(RuleDocument::Widenings, &raw, &mut notes),
            Ok(None) => parse_document(RuleDocument::Widenings, BUILTIN_WIDENINGS, &mut notes),
            Err(err) => {
                note(&mut notes, RuleDocument::Widenings, None, format!("read failed, treated as empty: {err}"));
                None
            }
        }
        .map(|doc| load_widenings(doc, &mut notes))
        .unwrap_or_default();

        let table = Self::assemble(version, synonyms, rules, widenings, notes, &options.reserved_prefix);
        info!(
            source = %source.describe(),
            version,
            rules = table.rules.len(),
            synonyms = table.synonyms.len(),
            dropped = table.notes.len(),
            "rule table loaded"
        );
        table
    }

    fn assemble(
        version: u64,
        synonyms: Vec<Synonym>,
        rules: Vec<Rule>,
        widenings: Vec<Widening>,
        notes: Vec<LoadNote>,
        reserved_prefix: &str,
    ) -> Self {
        let synonym_words = synonyms
            .iter()
            .flat_map(|s| s.from.split_whitespace().chain(s.to.split_whitespace()))
            .map(str::to_string)
            .collect();

        let metas: Vec<RuleMeta> = rules.iter().map(|rule| derive_meta(rule, reserved_prefix)).collect();
        let anchors = AnchorIndex::build(&metas);
        debug!(anchors = ?anchors.words(), "anchor index built");

        RuleTable { version, synonyms, synonym_words, rules, metas, anchors, widenings, notes }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn synonyms(&self) -> &[Synonym] {
        &self.synonyms
    }

    /// True if `word` appears in any synonym key or value.
    pub fn is_synonym_word(&self, word: &str) -> bool {
        self.synonym_words.contains(word)
    }

    /// All rules in matching order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn metas(&self) -> &[RuleMeta] {
        &self.metas
    }

    pub(crate) fn meta(&self, id: RuleId) -> &RuleMeta {
        &self.metas[id]
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Anchor of the first rule named `name`, if it has one.
    pub fn anchor_of(&self, name: &str) -> Option<&str> {
        let id = self.rules.iter().position(|r| r.name == name)?;
        self.metas[id].anchor.as_deref()
    }

    pub fn anchors(&self) -> &AnchorIndex {
        &self.anchors
    }

    pub fn count(&self, kind: RuleKind) -> usize {
        self.rules.iter().filter(|r| r.kind == kind).count()
    }

    pub fn widenings(&self) -> &[Widening] {
        &self.widenings
    }

    pub fn notes(&self) -> &[LoadNote] {
        &self.notes
    }

    /// Normalize `raw` with this table's synonym map.
    pub fn normalize(&self, raw: &str) -> String {
        super::normalize::normalize(raw, &self.synonyms)
    }

    /// Apply the widening table.
    ///
    /// A widening applies to every rule with the entry's name whose current
    /// pattern is exactly `from`. A rule already carrying `to` is left alone,
    /// so widening a widened table is a no-op and returns `None`.
    pub fn widened(&self) -> Option<Widened> {
        let mut table = self.clone();
        let mut applied = Vec::new();

        for widening in &self.widenings {
            for (id, rule) in table.rules.iter_mut().enumerate() {
                if rule.name != widening.rule {
                    continue;
                }
                let Some(current) = rule.pattern.as_ref() else { continue };
                if current.as_str() == widening.to {
                    continue;
                }
                if current.as_str() != widening.from {
                    debug!(rule = %rule.name, "widening skipped: pattern differs from the widening source");
                    continue;
                }
                match compile_pattern(&widening.to) {
                    Ok(pattern) => {
                        if rule.kind == RuleKind::Command {
                            table.metas[id].anchor = derive_anchor(&widening.to);
                        }
                        rule.pattern = Some(pattern);
                        applied.push(AppliedWidening {
                            rule: rule.name.clone(),
                            kind: rule.kind,
                            from: widening.from.clone(),
                            pattern: widening.to.clone(),
                        });
                    }
                    Err(err) => warn!(rule = %rule.name, error = %err, "widened pattern does not compile"),
                }
            }
        }

        if applied.is_empty() {
            return None;
        }
        table.anchors = AnchorIndex::build(&table.metas);
        Some(Widened { table, applied })
    }
}

// --- Loading helpers ---------------------------------------------------------

fn note(notes: &mut Vec<LoadNote>, document: RuleDocument, rule: Option<&str>, message: impl Into<String>) {
    let note = LoadNote { document, rule: rule.map(str::to_string), message: message.into() };
    warn!("{note}");
    notes.push(note);
}

fn read_document(source: &dyn RuleSource, document: RuleDocument, notes: &mut Vec<LoadNote>) -> Option<Value> {
    match source.read(document) {
        Ok(Some(raw)) => parse_document(document, &raw, notes),
        Ok(None) => {
            note(notes, document, None, "document missing, treated as empty");
            None
        }
        Err(err) => {
            note(notes, document, None, format!("read failed, treated as empty: {err}"));
            None
        }
    }
}

fn parse_document(document: RuleDocument, raw: &str, notes: &mut Vec<LoadNote>) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            note(notes, document, None, format!("invalid JSON, treated as empty: {err}"));
            None
        }
    }
}

fn load_synonyms(doc: Value, notes: &mut Vec<LoadNote>) -> Vec<Synonym> {
    let Value::Object(map) = doc else {
        note(notes, RuleDocument::Synonyms, None, "expected an object of surface -> canonical");
        return Vec::new();
    };

    let mut synonyms = Vec::with_capacity(map.len());
    for (from, to) in map {
        let Value::String(to) = to else {
            note(notes, RuleDocument::Synonyms, Some(&from), "canonical form must be a string");
            continue;
        };
        match Synonym::new(&from, &to) {
            Some(synonym) => synonyms.push(synonym),
            None => note(notes, RuleDocument::Synonyms, Some(&from), "empty surface form"),
        }
    }
    synonyms
}

fn load_rules(doc: Value, kind: RuleKind, rules: &mut Vec<Rule>, notes: &mut Vec<LoadNote>) {
    let document = kind.document();
    let Value::Array(items) = doc else {
        note(notes, document, None, "expected an array of rule records");
        return;
    };

    for item in items {
        let hint = item.get("name").and_then(Value::as_str).map(str::to_string);
        let record: RuleRecord = match serde_json::from_value(item) {
            Ok(record) => record,
            Err(err) => {
                note(notes, document, hint.as_deref(), format!("malformed record: {err}"));
                continue;
            }
        };
        match build_rule(record, kind) {
            Ok(rule) => rules.push(rule),
            Err((name, message)) => note(notes, document, Some(&name), message),
        }
    }
}

fn build_rule(record: RuleRecord, kind: RuleKind) -> Result<Rule, (String, String)> {
    let RuleRecord { name, regex, ops, kernel } = record;
    if name.trim().is_empty() {
        return Err((name, "empty rule name".to_string()));
    }

    let pattern = match regex.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(source) => match compile_pattern(source) {
            Ok(pattern) => Some(pattern),
            Err(err) => return Err((name, format!("invalid pattern: {err}"))),
        },
    };

    let mut actions = Vec::new();
    for op in ops {
        if op.op != "set" {
            return Err((name, format!("unknown op '{}'", op.op)));
        }
        let Some(template) = template_of(&op.value) else {
            return Err((name, format!("value for '{}' must be a string, number or boolean", op.path)));
        };
        actions.push(Action::Set { path: op.path, template });
    }

    for entry in kernel.map(OneOrMany::into_vec).unwrap_or_default() {
        let mut args = Vec::with_capacity(entry.args.len());
        for (arg, value) in entry.args {
            let Some(template) = template_of(&value) else {
                return Err((name, format!("kernel arg '{arg}' must be a string, number or boolean")));
            };
            args.push((arg, template));
        }
        actions.push(Action::Emit { op: entry.op, args });
    }

    if actions.is_empty() {
        return Err((name, "record has neither ops nor kernel".to_string()));
    }

    Ok(Rule { name, kind, pattern, actions })
}

fn load_widenings(doc: Value, notes: &mut Vec<LoadNote>) -> Vec<Widening> {
    let Value::Array(items) = doc else {
        note(notes, RuleDocument::Widenings, None, "expected an array of widenings");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Widening>(item) {
            Ok(widening) => Some(widening),
            Err(err) => {
                note(notes, RuleDocument::Widenings, None, format!("malformed widening: {err}"));
                None
            }
        })
        .collect()
}

/// Patterns are matched case-insensitively on top of lowercase normalization.
fn compile_pattern(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}

fn derive_meta(rule: &Rule, reserved_prefix: &str) -> RuleMeta {
    let reserved = !reserved_prefix.is_empty() && rule.name.starts_with(reserved_prefix);
    let anchor = match (&rule.kind, &rule.pattern) {
        (RuleKind::Command, Some(pattern)) => derive_anchor(pattern.as_str()),
        _ => None,
    };
    RuleMeta { anchor, reserved }
}

/// First content word of a pattern that is not anchor noise.
///
/// ```text
/// curve rows (\d+)-(\d+) (left|right) (\d+)\s*deg   -> "curve"
/// (?:add )?obstacle (?:at|on) rows? (\d+)           -> "add"
/// ```
///
/// Group syntax, escapes, character classes and repetition counts are blanked
/// out first so `(?P<seed>..)` or `\d` never produce words. This is a
/// heuristic: the first word is not always the one that names the command.
pub(crate) fn derive_anchor(pattern: &str) -> Option<String> {
    let stripped = regex!(r"\(\?P?<[A-Za-z_][A-Za-z0-9_]*>|\(\?[A-Za-z:=!<-]*|\\[A-Za-z]|\[[^\]]*\]|\{\d*,?\d*\}")
        .replace_all(pattern, " ");
    stripped
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .find(|w| !is_anchor_noise(w))
}

/// Rewrite the `regex` field of every record in a raw rule document that an
/// applied widening matches by name and by its pre-widening pattern. Records
/// sharing a name but carrying another pattern, and everything else in the
/// document, are kept as is. Returns the number of records changed.
pub(crate) fn rewrite_patterns(doc: &mut Value, applied: &[&AppliedWidening]) -> usize {
    let Value::Array(items) = doc else { return 0 };
    let mut changed = 0;
    for item in items.iter_mut() {
        let Some(record) = item.as_object_mut() else { continue };
        let Some(name) = record.get("name").and_then(Value::as_str) else { continue };
        let Some(current) = record.get("regex").and_then(Value::as_str).map(str::trim) else { continue };
        if let Some(widening) = applied.iter().find(|w| w.rule == name && w.from == current) {
            record.insert("regex".to_string(), Value::String(widening.pattern.clone()));
            changed += 1;
        }
    }
    changed
}

//! Compile passes and relaxation.
//!
//! ```text
//! pass 1  raw text, loaded table            complete? -> done
//! pass 2  auto_fix(raw), loaded table       complete? -> done   (AUTO_FIX)
//! pass 3  best text so far, widened table   -> done either way  (WIDENED)
//! ```
//!
//! Pass 2 only runs when the auto-fix actually changes the text, pass 3 only
//! when the widening table changes at least one rule. The last pass that ran
//! is the result. Incomplete is a normal outcome, never an error.
//!
//! Only the initial pass may end vacuously complete. A relaxation pass runs
//! because the text was already judged incomplete, so a rewrite that leaves
//! nothing for the rules to do is still incomplete.

use super::completeness::{Diagnostics, analyze};
use super::document::{push_path, set_path};
use super::matcher::match_rules;
use super::metrics::{PassKind, PassMetrics, RunMetrics};
use super::resolve::resolve;
use super::rule_table::RuleTable;
use crate::{Action, Captures, Options};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::time::Instant;
use tracing::debug;

bitflags::bitflags! {
    /// Relaxation passes that ran during a compile.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Passes: u8 {
        const AUTO_FIX = 1 << 0;
        const WIDENED  = 1 << 1;
    }
}

/// Everything one compile produced.
#[derive(Debug, Clone)]
pub(crate) struct Compilation {
    pub normalized: String,
    pub document: Value,
    pub diagnostics: Diagnostics,
    pub passes: Passes,
    /// Rules whose widened pattern was used by the last pass.
    pub widened: Vec<String>,
    pub metrics: RunMetrics,
}

struct PassOutcome {
    normalized: String,
    document: Value,
    diagnostics: Diagnostics,
}

pub(crate) fn compile(table: &RuleTable, raw: &str, options: &Options) -> Compilation {
    let started = Instant::now();
    let mut metrics = RunMetrics::default();
    let mut passes = Passes::empty();
    let mut widened = Vec::new();

    let mut outcome = run_pass(table, raw, options, PassKind::Initial, &mut metrics);
    let mut text = Cow::Borrowed(raw);

    if !outcome.diagnostics.complete && options.auto_fix {
        let fixed = auto_fix(raw);
        if fixed != raw {
            outcome = run_pass(table, &fixed, options, PassKind::AutoFix, &mut metrics);
            passes |= Passes::AUTO_FIX;
            text = Cow::Owned(fixed);
        } else {
            debug!("auto-fix left the text unchanged, pass skipped");
        }
    }

    if !outcome.diagnostics.complete && options.widen {
        match table.widened() {
            Some(w) => {
                outcome = run_pass(&w.table, &text, options, PassKind::Widened, &mut metrics);
                passes |= Passes::WIDENED;
                widened = w.applied.into_iter().map(|a| a.rule).collect();
            }
            None => debug!("no widening applies, pass skipped"),
        }
    }

    metrics.total = started.elapsed();
    let PassOutcome { normalized, document, diagnostics } = outcome;
    Compilation { normalized, document, diagnostics, passes, widened, metrics }
}

fn run_pass(table: &RuleTable, raw: &str, options: &Options, kind: PassKind, metrics: &mut RunMetrics) -> PassOutcome {
    let started = Instant::now();
    let normalized = table.normalize(raw);
    let mut document = Value::Object(Map::new());

    let mut diagnostics = if normalized.is_empty() {
        Diagnostics::empty()
    } else {
        let matches = match_rules(table, &normalized);
        let mut actions = 0;
        for m in &matches {
            for action in &table.rules()[m.rule].actions {
                apply(action, &m.captures, &mut document, options);
                actions += 1;
            }
        }
        analyze(&normalized, &matches, table, actions)
    };
    if kind != PassKind::Initial && diagnostics.vacuous {
        diagnostics.complete = false;
    }

    debug!(
        pass = %kind,
        normalized = %normalized,
        fired = diagnostics.matched.len(),
        unmatched = ?diagnostics.unmatched,
        missing = ?diagnostics.missing_required,
        complete = diagnostics.complete,
        "pass finished"
    );
    metrics.passes.push(PassMetrics {
        kind,
        duration: started.elapsed(),
        fired: diagnostics.matched.len(),
        unmatched: diagnostics.unmatched.len(),
        complete: diagnostics.complete,
    });

    PassOutcome { normalized, document, diagnostics }
}

fn apply(action: &Action, captures: &Captures, document: &mut Value, options: &Options) {
    match action {
        Action::Set { path, template } => set_path(document, path, resolve(template, captures).into()),
        Action::Emit { op, args } => {
            let mut entry = Map::new();
            entry.insert("op".to_string(), Value::String(op.clone()));
            for (arg, template) in args {
                entry.insert(arg.clone(), resolve(template, captures).into());
            }
            push_path(document, &options.actions_path, Value::Object(entry));
        }
    }
}

/// Common misspellings, fixed as whole words.
const TYPOS: &[(&str, &str)] = &[
    ("lenght", "length"),
    ("widht", "width"),
    ("cruve", "curve"),
    ("curev", "curve"),
    ("degress", "degrees"),
    ("rigth", "right"),
    ("slpoe", "slope"),
];

/// Hand-curated cleanup of raw input.
///
/// ```text
/// "105m x 6m"      -> "105 m by 6 m"
/// "105*6"          -> "105 by 6"
/// "15°"            -> "15 deg"
/// "15deg"          -> "15 deg"
/// "rows 10 - 20"   -> "rows 10-20"
/// "cruve"          -> "curve"
/// ```
pub fn auto_fix(raw: &str) -> String {
    let text = regex!(r"(?i)(\d(?:\s*(?:mm|cm|m))?)\s*[x×*]\s*(\d)").replace_all(raw, "${1} by ${2}");
    let text = regex!(r"(\d)\s*°").replace_all(&text, "${1} deg");
    let text = regex!(r"(?i)(\d)(degrees|degree|deg|rows|row|mm|cm|m)\b").replace_all(&text, "${1} ${2}");
    let text = regex!(r"(\d)\s+-\s*(\d)|(\d)\s*-\s+(\d)").replace_all(&text, "${1}${3}-${2}${4}");

    regex!(r"\b\w+\b")
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let word = &caps[0];
            match TYPOS.iter().find(|(typo, _)| word.eq_ignore_ascii_case(typo)) {
                Some((_, fix)) => (*fix).to_string(),
                None => word.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, RuleDocument};
    use serde_json::json;

    #[test]
    fn auto_fix_rewrites_dimensions_units_and_typos() {
        let cases = [
            ("105m x 6m", "105 m by 6 m"),
            ("105X6", "105 by 6"),
            ("105*6", "105 by 6"),
            ("105 m × 6 m", "105 m by 6 m"),
            ("left 15°", "left 15 deg"),
            ("left 15deg", "left 15 deg"),
            ("rows 10 - 20", "rows 10-20"),
            ("rows 10 -20", "rows 10-20"),
            ("Cruve rows 1-2 rigth", "curve rows 1-2 right"),
            ("max speed", "max speed"),
        ];
        for (input, expected) in cases {
            assert_eq!(auto_fix(input), expected, "input: {input}");
        }
    }

    fn table() -> RuleTable {
        let source = MemorySource::new()
            .with(
                RuleDocument::Intents,
                r#"[{"name":"size-by","regex":"(\\d+) m by (\\d+) m","ops":[
                    {"path":"track.length","value":"$1:int"},
                    {"path":"track.width","value":"$2:int"}]}]"#,
            )
            .with(
                RuleDocument::Commands,
                r#"[{"name":"curve-rows","regex":"curve rows (\\d+)-(\\d+) (left|right)","kernel":
                    {"op":"curve","args":{"from":"$1:int","to":"$2:int","side":"$3"}}}]"#,
            )
            .with(
                RuleDocument::Widenings,
                r#"[{"rule":"curve-rows","from":"curve rows (\\d+)-(\\d+) (left|right)",
                     "to":"curve(?: rows?)? (\\d+)\\s*(?:-|to)\\s*(\\d+) (left|right)"}]"#,
            );
        RuleTable::load(&source, &Options::default(), 1)
    }

    #[test]
    fn complete_first_pass_runs_once() {
        let c = compile(&table(), "105m by 6m", &Options::default());
        assert!(c.diagnostics.complete);
        assert_eq!(c.passes, Passes::empty());
        assert_eq!(c.metrics.passes.len(), 1);
        assert_eq!(c.document, json!({ "track": { "length": 105, "width": 6 } }));
    }

    #[test]
    fn auto_fix_pass_completes_dimension_with_x() {
        let c = compile(&table(), "105m x 6m", &Options::default());
        assert!(c.diagnostics.complete);
        assert_eq!(c.passes, Passes::AUTO_FIX);
        assert_eq!(c.normalized, "105 m by 6 m");
        assert_eq!(c.metrics.passes.iter().map(|p| p.kind).collect::<Vec<_>>(), vec![
            PassKind::Initial,
            PassKind::AutoFix
        ]);
    }

    #[test]
    fn widened_pass_rescues_brittle_command() {
        let c = compile(&table(), "curve rows 10 to 20 left", &Options::default());
        assert!(c.diagnostics.complete, "{:?}", c.diagnostics);
        assert_eq!(c.passes, Passes::WIDENED);
        assert_eq!(c.widened, vec!["curve-rows"]);
        assert_eq!(c.document, json!({ "actions": [ { "op": "curve", "from": 10, "to": 20, "side": "left" } ] }));
    }

    #[test]
    fn disabled_relaxation_returns_first_pass() {
        let options = Options { auto_fix: false, widen: false, ..Options::default() };
        let c = compile(&table(), "curve rows 10 to 20 left", &options);
        assert!(!c.diagnostics.complete);
        assert_eq!(c.passes, Passes::empty());
        assert_eq!(c.diagnostics.missing_required, vec!["curve"]);
    }

    #[test]
    fn vacuous_relaxation_pass_stays_incomplete() {
        let source = MemorySource::new()
            .with(RuleDocument::Synonyms, r#"{"bend":"curve"}"#)
            .with(RuleDocument::Widenings, "[]");
        let table = RuleTable::load(&source, &Options::default(), 1);
        let c = compile(&table, "cruve", &Options::default());
        assert_eq!(c.normalized, "curve");
        assert_eq!(c.passes, Passes::AUTO_FIX);
        assert!(c.diagnostics.vacuous);
        assert!(!c.diagnostics.complete);
        assert!(!c.metrics.passes[1].complete);
    }

    #[test]
    fn bare_dimensions_reach_the_widened_pass() {
        let source = MemorySource::new()
            .with(
                RuleDocument::Intents,
                r#"[{"name":"size-by","regex":"(\\d+) m by (\\d+) m","ops":[{"path":"track.length","value":"$1:int"}]}]"#,
            )
            .with(
                RuleDocument::Widenings,
                r#"[{"rule":"size-by","from":"(\\d+) m by (\\d+) m","to":"(\\d+) m? ?(?:by|x) (\\d+)"}]"#,
            );
        let table = RuleTable::load(&source, &Options::default(), 1);
        let c = compile(&table, "105 x 6", &Options::default());
        assert_eq!(c.passes, Passes::AUTO_FIX | Passes::WIDENED);
        assert!(c.diagnostics.complete, "{:?}", c.diagnostics);
        assert_eq!(c.document, json!({ "track": { "length": 105 } }));
    }

    #[test]
    fn empty_input_is_terminal() {
        let c = compile(&table(), "   ", &Options::default());
        assert!(c.diagnostics.complete);
        assert!(c.diagnostics.matched.is_empty());
        assert!(c.diagnostics.unmatched.is_empty());
        assert_eq!(c.document, json!({}));
        assert_eq!(c.metrics.passes.len(), 1);
    }

    #[test]
    fn actions_land_under_configured_path() {
        let options = Options { actions_path: "plan.ops".into(), ..Options::default() };
        let c = compile(&table(), "curve rows 1-2 right", &options);
        assert_eq!(c.document, json!({ "plan": { "ops": [ { "op": "curve", "from": 1, "to": 2, "side": "right" } ] } }));
    }
}

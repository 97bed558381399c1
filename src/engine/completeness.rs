//! Completeness analysis.
//!
//! Two independent checks decide whether a run produced a usable document:
//!
//! - **Unmatched tokens**: content words (not numbers, not stop words) that
//!   are neither synonym words nor part of the name of a rule that fired.
//! - **Anchors**: every command anchor that occurs in the text must belong to
//!   a command rule that actually fired. This catches phrasings that clearly
//!   ask for a command whose regex did not match.
//!
//! A run is complete when it executed at least one action, has no unmatched
//! tokens and no missing anchors. A run where nothing fired, nothing is left
//! over and the text carries no numbers (only stop words, or empty input) is
//! vacuously complete. Quantities always need a rule to consume them.

use super::rule_table::RuleTable;
use super::trigger::TriggerInfo;
use crate::{MatchResult, RuleKind, RuleRef, TokenClass};
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of one compilation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Fired rules in firing order.
    pub matched: Vec<RuleRef>,
    /// Unaccounted content words, in text order (repeats kept).
    pub unmatched: Vec<String>,
    /// Anchors present in the text with no fired command rule.
    pub missing_required: Vec<String>,
    /// Number of actions executed.
    pub actions: usize,
    pub vacuous: bool,
    pub complete: bool,
}

impl Diagnostics {
    /// Diagnostics for empty input: nothing ran, nothing is missing.
    pub fn empty() -> Self {
        Diagnostics { vacuous: true, complete: true, ..Default::default() }
    }

    pub fn matched_names(&self) -> Vec<String> {
        self.matched.iter().map(|r| r.name.clone()).collect()
    }
}

pub(crate) fn analyze(text: &str, matches: &[MatchResult], table: &RuleTable, actions: usize) -> Diagnostics {
    let trigger = TriggerInfo::scan(text, table);
    let quantities = trigger.tokens.iter().any(|t| t.class == TokenClass::Numeric);
    let fired = move || matches.iter().map(move |m| (m.rule, &table.rules()[m.rule]));

    let name_words: HashSet<String> = fired().flat_map(|(_, rule)| rule.name_words()).collect();
    let unmatched: Vec<String> = trigger
        .tokens
        .into_iter()
        .filter(|t| t.class == TokenClass::Content)
        .filter(|t| !table.is_synonym_word(&t.text) && !name_words.contains(&t.text))
        .map(|t| t.text)
        .collect();

    let fired_anchors: HashSet<&str> = fired()
        .filter(|(_, rule)| rule.kind == RuleKind::Command)
        .filter_map(|(id, _)| table.meta(id).anchor.as_deref())
        .collect();
    let missing_required: Vec<String> =
        trigger.implied.into_iter().filter(|anchor| !fired_anchors.contains(anchor.as_str())).collect();

    let matched: Vec<RuleRef> = fired().map(|(_, rule)| rule.rule_ref()).collect();
    let settled = unmatched.is_empty() && missing_required.is_empty();
    let vacuous = settled && matched.is_empty() && !quantities;
    let complete = vacuous || (settled && actions > 0);

    Diagnostics { matched, unmatched, missing_required, actions, vacuous, complete }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;
    use crate::engine::matcher::match_rules;
    use crate::source::{MemorySource, RuleDocument};

    fn table() -> RuleTable {
        let source = MemorySource::new()
            .with(RuleDocument::Synonyms, r#"{"bend":"curve","hill":"slope"}"#)
            .with(
                RuleDocument::Intents,
                r#"[{"name":"set-size","regex":"(\\d+) m by (\\d+) m","ops":[{"path":"a","value":"$1"}]}]"#,
            )
            .with(
                RuleDocument::Commands,
                r#"[{"name":"curve-rows","regex":"curve rows (\\d+)-(\\d+) (left|right)","kernel":{"op":"curve"}},
                    {"name":"slope-rows","regex":"slope rows (\\d+)","kernel":{"op":"slope"}}]"#,
            );
        RuleTable::load(&source, &Options::default(), 1)
    }

    fn run(table: &RuleTable, text: &str, actions: usize) -> Diagnostics {
        analyze(text, &match_rules(table, text), table, actions)
    }

    #[test]
    fn fully_covered_text_is_complete() {
        let t = table();
        let d = run(&t, "build 105 m by 6 m", 1);
        assert_eq!(d.matched_names(), vec!["set-size"]);
        assert!(d.unmatched.is_empty());
        assert!(d.missing_required.is_empty());
        assert!(d.complete);
        assert!(!d.vacuous);
    }

    #[test]
    fn rule_name_words_account_for_tokens() {
        let t = table();
        let d = run(&t, "curve rows 10-20 left", 1);
        assert!(d.unmatched.is_empty(), "{:?}", d.unmatched);
        assert!(d.complete);
    }

    #[test]
    fn gibberish_is_unmatched_and_incomplete() {
        let t = table();
        let d = run(&t, "florp the zanzibar florp", 0);
        assert!(d.matched.is_empty());
        assert_eq!(d.unmatched, vec!["florp", "zanzibar", "florp"]);
        assert!(!d.complete);
    }

    #[test]
    fn implied_anchor_without_fired_command_is_missing() {
        let t = table();
        let d = run(&t, "105 m by 6 m then slope up", 1);
        assert_eq!(d.matched_names(), vec!["set-size"]);
        assert_eq!(d.missing_required, vec!["slope"]);
        assert!(!d.complete);
    }

    #[test]
    fn synonym_words_are_accounted_for() {
        let t = table();
        let d = run(&t, "hill", 0);
        assert!(d.unmatched.is_empty());
        assert!(d.vacuous);
        assert!(d.complete);
    }

    #[test]
    fn synonym_value_that_is_an_anchor_is_not_vacuous() {
        let t = table();
        let d = run(&t, "curve", 0);
        assert!(d.unmatched.is_empty());
        assert_eq!(d.missing_required, vec!["curve"]);
        assert!(!d.vacuous);
        assert!(!d.complete);
    }

    #[test]
    fn bare_quantities_are_never_vacuous() {
        let t = table();
        let d = run(&t, "105 by 6", 0);
        assert!(d.matched.is_empty());
        assert!(d.unmatched.is_empty());
        assert!(!d.vacuous);
        assert!(!d.complete);
    }

    #[test]
    fn fired_rules_without_actions_are_incomplete() {
        let t = table();
        let d = run(&t, "105 m by 6 m", 0);
        assert!(!d.complete);
    }
}

//! Rule matching.
//!
//! Every rule gets exactly one chance against the whole normalized string, in
//! table order (intents, macros, commands). Matching is read-only: a rule
//! that fires does not consume text, so the same words may and usually do
//! feed several rules.
//!
//! Rules are skipped when they have no pattern or when their name carries the
//! reserved auto-generated prefix (placeholders awaiting review).

use super::rule_table::RuleTable;
use crate::{Captures, MatchResult};
use tracing::debug;

/// Match all rules of `table` against normalized `text`.
pub(crate) fn match_rules(table: &RuleTable, text: &str) -> Vec<MatchResult> {
    let mut matches = Vec::new();

    for (id, rule) in table.rules().iter().enumerate() {
        if table.meta(id).reserved {
            continue;
        }
        let Some(pattern) = &rule.pattern else { continue };
        let Some(caps) = pattern.captures(text) else { continue };

        let groups = caps.iter().map(|g| g.map(|m| m.as_str().to_string())).collect();
        let named = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();

        debug!(rule = %rule.name, kind = rule.kind.as_str(), "rule fired");
        matches.push(MatchResult { rule: id, captures: Captures { groups, named } });
    }

    matches
}

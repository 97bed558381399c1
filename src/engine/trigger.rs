//! Token and anchor scanning over normalized text.
//!
//! This module inspects the normalized string and produces the two signals the
//! completeness check needs:
//!
//! - **Tokens** (`TriggerInfo::tokens`): word-like runs classified as stop
//!   words, numbers, or content words.
//! - **Implied anchors** (`TriggerInfo::implied`): command anchors from the
//!   rule table that occur as whole words in the text.
//!
//! ## Design notes
//!
//! - Tokens are diagnostics only. Rules always match the full string.
//! - The word lists are English-only, like the rules shipped with the crate.

use super::rule_table::RuleTable;
use crate::{Token, TokenClass};

/// Articles, prepositions, unit words, directional words and the filler verbs
/// people put in front of a request.
const STOP_WORDS: &[&str] = &[
    // articles / conjunctions
    "a", "an", "the", "and", "or", "then", "also", "with", "please", //
    // prepositions
    "at", "by", "for", "from", "in", "into", "of", "on", "over", "per", "to", "between", "through", "thru", "until",
    "after", "before", //
    // units
    "m", "cm", "mm", "deg", "degree", "degrees", "row", "rows", "unit", "units", "tile", "tiles", //
    // directions
    "left", "right", "up", "down", "forward", "back", "backward", "straight", //
    // filler verbs
    "make", "build", "create", "generate", "give", "me", "i", "want", "need",
];

/// Extra words that are never picked as a command anchor.
const ANCHOR_NOISE: &[&str] = &["rows", "row", "left", "right", "deg", "make", "build", "create"];

pub(crate) fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

pub(crate) fn is_anchor_noise(word: &str) -> bool {
    ANCHOR_NOISE.contains(&word) || is_stop_word(word)
}

/// Split normalized text into classified tokens.
///
/// ```text
/// "curve rows 10-20 left 15 deg"
///  curve:Content rows:Stop 10:Numeric 20:Numeric left:Stop 15:Numeric deg:Stop
/// ```
pub(crate) fn tokenize(text: &str) -> Vec<Token> {
    regex!(r"\w+")
        .find_iter(text)
        .map(|m| {
            let word = m.as_str();
            let class = if word.chars().all(char::is_numeric) {
                TokenClass::Numeric
            } else if is_stop_word(word) {
                TokenClass::StopWord
            } else {
                TokenClass::Content
            };
            Token { text: word.to_string(), class }
        })
        .collect()
}

/// Input characteristics detected from the normalized text.
#[derive(Debug, Clone)]
pub(crate) struct TriggerInfo {
    pub tokens: Vec<Token>,
    /// Known command anchors present in the text, in anchor-index order.
    pub implied: Vec<String>,
}

impl TriggerInfo {
    pub fn scan(text: &str, table: &RuleTable) -> Self {
        let tokens = tokenize(text);
        let implied = table
            .anchors()
            .words()
            .iter()
            .filter(|anchor| tokens.iter().any(|t| &t.text == *anchor))
            .cloned()
            .collect();

        TriggerInfo { tokens, implied }
    }
}

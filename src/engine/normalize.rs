//! Text normalization.
//!
//! ```text
//! "  Build 105M   by 6m "
//!   (1) collapse   -> "Build 105M by 6m"
//!   (2) units      -> "Build 105 M by 6 m"
//!   (3) lowercase  -> "build 105 m by 6 m"
//!   (4) synonyms   -> forward pass in map order
//!   (5) collapse   -> "build 105 m by 6 m"
//! ```
//!
//! The order is fixed: unit splitting runs before lowercasing and synonyms see
//! lowercase text. Synonyms are a single forward pass, so a later entry sees
//! the output of an earlier one but the pass never repeats.

use super::rule_table::Synonym;
use regex::NoExpand;

/// Normalize `raw` for matching. Empty or whitespace-only input gives `""`.
pub fn normalize(raw: &str, synonyms: &[Synonym]) -> String {
    let collapsed = collapse_whitespace(raw);
    if collapsed.is_empty() {
        return collapsed;
    }

    let split = split_units(&collapsed);
    let mut text = split.to_lowercase();

    for synonym in synonyms {
        if synonym.matcher.is_match(&text) {
            text = synonym.matcher.replace_all(&text, NoExpand(&synonym.to)).into_owned();
        }
    }

    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `100m` -> `100 m`, `15deg` -> `15 deg`, `3rows` -> `3 rows`.
fn split_units(text: &str) -> String {
    regex!(r"(?i)(\d)(mm|cm|m|degrees|degree|deg|rows|row)\b").replace_all(text, "${1} ${2}").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synonyms(pairs: &[(&str, &str)]) -> Vec<Synonym> {
        pairs.iter().filter_map(|(from, to)| Synonym::new(from, to)).collect()
    }

    #[test]
    fn splits_glued_units() {
        let cases = [
            ("100m", "100 m"),
            ("build 105m by 6m", "build 105 m by 6 m"),
            ("15deg", "15 deg"),
            ("15Degrees", "15 degrees"),
            ("20mm and 3cm", "20 mm and 3 cm"),
            ("4rows", "4 rows"),
            ("2.5m", "2.5 m"),
            ("5min", "5min"),
            ("3rd", "3rd"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input, &[]), expected, "input: {input}");
        }
    }

    #[test]
    fn collapses_and_lowercases() {
        assert_eq!(normalize("  Curve\tROWS \n 10-20  ", &[]), "curve rows 10-20");
    }

    #[test]
    fn empty_input_short_circuits() {
        assert_eq!(normalize("", &[]), "");
        assert_eq!(normalize(" \t\n ", &synonyms(&[("a", "b")])), "");
    }

    #[test]
    fn synonyms_replace_whole_words_only() {
        let syn = synonyms(&[("turn", "curve")]);
        assert_eq!(normalize("Turn left, no turnstile", &syn), "curve left, no turnstile");
    }

    #[test]
    fn synonyms_are_a_single_forward_pass() {
        let forward = synonyms(&[("bend", "turn"), ("turn", "curve")]);
        assert_eq!(normalize("bend", &forward), "curve");

        let backward = synonyms(&[("turn", "curve"), ("bend", "turn")]);
        assert_eq!(normalize("bend", &backward), "turn");
    }

    #[test]
    fn synonym_removal_does_not_leave_double_spaces() {
        let syn = synonyms(&[("please", "")]);
        assert_eq!(normalize("make please a track", &syn), "make a track");
    }

    #[test]
    fn multi_word_synonyms() {
        let syn = synonyms(&[("hairpin turn", "hairpin")]);
        assert_eq!(normalize("a Hairpin  Turn here", &syn), "a hairpin here");
    }

    #[test]
    fn idempotent_on_examples() {
        let syn = synonyms(&[("meters", "m"), ("bend", "curve")]);
        for input in ["Build 105m by 6 Meters", "bend rows 1-2 left 15deg", "  ", "3rows of 2mm"] {
            let once = normalize(input, &syn);
            assert_eq!(normalize(&once, &syn), once, "input: {input}");
        }
    }
}

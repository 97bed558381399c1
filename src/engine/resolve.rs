//! Value resolution.
//!
//! A value template is literal text with capture placeholders and an optional
//! type suffix:
//!
//! ```text
//! "$1:int"        capture 1, rounded to an integer
//! "${seed}:int"   named capture
//! "$4"            untyped: "true"/"false" -> bool, clean numbers -> number
//! "left:str"      forced string, no sniffing
//! ```
//!
//! Resolution never fails. Missing captures expand to `""` and failed
//! coercions fall back to `0`, `0.0` or `false`.

use crate::{Captures, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    Int,
    Float,
    Bool,
    Str,
    Sniff,
}

/// Expand `template` against `captures` and coerce the result.
pub fn resolve(template: &str, captures: &Captures) -> Scalar {
    let (body, coercion) = split_suffix(template);
    let text = expand(body, captures);

    match coercion {
        Coercion::Int => Scalar::Int(parse_float(&text).map(round_to_i64).unwrap_or(0)),
        Coercion::Float => Scalar::Float(parse_float(&text).unwrap_or(0.0)),
        Coercion::Bool => Scalar::Bool(text.trim().eq_ignore_ascii_case("true")),
        Coercion::Str => Scalar::Str(text),
        Coercion::Sniff => sniff(text),
    }
}

fn split_suffix(template: &str) -> (&str, Coercion) {
    let Some((body, suffix)) = template.rsplit_once(':') else {
        return (template, Coercion::Sniff);
    };
    let coercion = match suffix {
        "int" => Coercion::Int,
        "float" => Coercion::Float,
        "bool" => Coercion::Bool,
        "str" | "string" => Coercion::Str,
        _ => return (template, Coercion::Sniff),
    };
    (body, coercion)
}

/// Replace `$n` and `${name}` placeholders. A `$` not followed by a digit or
/// `{` is kept as is.
fn expand(template: &str, captures: &Captures) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            let index = after[..digits].parse::<usize>().unwrap_or(usize::MAX);
            out.push_str(captures.get(index));
            rest = &after[digits..];
            continue;
        }

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let key = &braced[..end];
                match key.parse::<usize>() {
                    Ok(index) => out.push_str(captures.get(index)),
                    Err(_) => out.push_str(captures.name(key)),
                }
                rest = &braced[end + 1..];
                continue;
            }
        }

        out.push('$');
        rest = after;
    }

    out.push_str(rest);
    out
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn round_to_i64(value: f64) -> i64 {
    // `as` saturates at the i64 bounds.
    value.round() as i64
}

fn sniff(text: String) -> Scalar {
    if text.eq_ignore_ascii_case("true") {
        return Scalar::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Scalar::Bool(false);
    }
    // Only digit-bearing text counts as a number: `f64` also parses "inf" and "NaN".
    if text.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(v) = text.parse::<i64>() {
            return Scalar::Int(v);
        }
        if let Ok(v) = text.parse::<f64>() {
            if v.is_finite() {
                return Scalar::Float(v);
            }
        }
    }
    Scalar::Str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(groups: &[&str]) -> Captures {
        Captures::from_groups(groups.iter().copied())
    }

    #[test]
    fn typed_int_rounds_to_nearest() {
        let c = caps(&["15.7 m", "15.7"]);
        assert_eq!(resolve("$1:int", &c), Scalar::Int(16));
        assert_eq!(resolve("2.5:int", &c), Scalar::Int(3));
        assert_eq!(resolve("-2.5:int", &c), Scalar::Int(-3));
    }

    #[test]
    fn typed_coercions_fall_back_to_defaults() {
        let c = caps(&["abc", "abc"]);
        assert_eq!(resolve("$1:int", &c), Scalar::Int(0));
        assert_eq!(resolve("$1:float", &c), Scalar::Float(0.0));
        assert_eq!(resolve("$1:bool", &c), Scalar::Bool(false));
        assert_eq!(resolve("inf:float", &c), Scalar::Float(0.0));
    }

    #[test]
    fn typed_float_and_bool() {
        let c = caps(&["x", "2.25", "TRUE"]);
        assert_eq!(resolve("$1:float", &c), Scalar::Float(2.25));
        assert_eq!(resolve("$2:bool", &c), Scalar::Bool(true));
        assert_eq!(resolve("$1:str", &c), Scalar::Str("2.25".into()));
        assert_eq!(resolve("$1:string", &c), Scalar::Str("2.25".into()));
    }

    #[test]
    fn untyped_values_are_sniffed() {
        let c = caps(&["", "6", "6.5", "False", "left"]);
        assert_eq!(resolve("$1", &c), Scalar::Int(6));
        assert_eq!(resolve("$2", &c), Scalar::Float(6.5));
        assert_eq!(resolve("$3", &c), Scalar::Bool(false));
        assert_eq!(resolve("$4", &c), Scalar::Str("left".into()));
        assert_eq!(resolve("nan", &c), Scalar::Str("nan".into()));
        assert_eq!(resolve(" 6", &c), Scalar::Str(" 6".into()));
    }

    #[test]
    fn missing_groups_expand_to_empty() {
        let c = caps(&["all"]);
        assert_eq!(resolve("$7", &c), Scalar::Str(String::new()));
        assert_eq!(resolve("row-$3-end", &c), Scalar::Str("row--end".into()));
        assert_eq!(resolve("$9:int", &c), Scalar::Int(0));
        assert_eq!(resolve("$99999999999999999999999", &c), Scalar::Str(String::new()));
    }

    #[test]
    fn placeholders_compose_with_literal_text() {
        let c = caps(&["10-20", "10", "20"]);
        assert_eq!(resolve("$1-$2", &c), Scalar::Str("10-20".into()));
        assert_eq!(resolve("${1}0", &c), Scalar::Int(100));
        assert_eq!(resolve("cost $", &c), Scalar::Str("cost $".into()));
        assert_eq!(resolve("$x", &c), Scalar::Str("$x".into()));
    }

    #[test]
    fn named_captures() {
        let mut c = caps(&["seed 42", "42"]);
        c.named.push(("seed".into(), "42".into()));
        assert_eq!(resolve("${seed}:int", &c), Scalar::Int(42));
        assert_eq!(resolve("${other}", &c), Scalar::Str(String::new()));
    }

    #[test]
    fn unknown_suffix_is_part_of_the_text() {
        let c = caps(&["12"]);
        assert_eq!(resolve("12:30", &c), Scalar::Str("12:30".into()));
        assert_eq!(resolve("$0:int", &c), Scalar::Int(12));
    }
}

//! Mojibake repair for text exported through a Latin-1/UTF-8 round trip
//!
//! `25Â°C` becomes `25°C`, `Ã‚Â°` becomes `°`, smart quotes and dashes are
//! mapped back, and stray `Â` bytes are dropped. Whitespace is collapsed
//! only in strings that needed a repair.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

const LITERALS: &[(&str, &str)] = &[
    ("Ã‚Â°", "°"),
    ("Â°", "°"),
    ("Ã‚", ""),
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€\u{9d}", "\""),
    ("â€“", "-"),
    ("â€”", "-"),
    ("â€¢", "•"),
    ("Ã—", "x"),
];

#[allow(clippy::disallowed_methods)] // Static patterns - compilation is covered by tests
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn spaced_degree() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"(\d+)\s*Â\s*°\s*([CF])"))
}

fn degree_range() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"(-?\d+°[CF])\s*to\s*(-?\d+°[CF])"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"\s+"))
}

/// Does the text carry any of the known broken sequences
pub fn needs_repair(text: &str) -> bool {
    text.contains('Â') || LITERALS.iter().any(|(bad, _)| text.contains(bad))
}

pub fn repair_text(text: &str) -> Cow<'_, str> {
    if !needs_repair(text) {
        return Cow::Borrowed(text);
    }
    let mut fixed = spaced_degree().replace_all(text, "$1°$2").into_owned();
    for (bad, good) in LITERALS {
        if fixed.contains(bad) {
            fixed = fixed.replace(bad, good);
        }
    }
    fixed = fixed.replace('Â', "");
    fixed = degree_range().replace_all(&fixed, "$1 to $2").into_owned();
    let collapsed = whitespace().replace_all(fixed.trim(), " ").into_owned();
    Cow::Owned(collapsed)
}

/// Repair every string inside `value`, returning how many changed
pub fn repair_value(value: &mut Value) -> usize {
    match value {
        Value::String(text) => {
            let fixed = match repair_text(text) {
                Cow::Owned(fixed) => Some(fixed),
                Cow::Borrowed(_) => None,
            };
            match fixed {
                Some(fixed) if fixed != *text => {
                    *text = fixed;
                    1
                },
                _ => 0,
            }
        },
        Value::Array(items) => items.iter_mut().map(repair_value).sum(),
        Value::Object(map) => map.values_mut().map(repair_value).sum(),
        _ => 0,
    }
}

//! SKU normalization and matching
//!
//! Spreadsheets and the database spell the same code differently
//! (`TSR-23SD-N`, `tsr23sdn`, `TSR 23SD N (AL)`). Everything is compared in
//! normalized form: uppercase with `-`, whitespace and parentheses removed.

use serde::{Deserialize, Serialize};

/// Default minimum length of the shorter code for substring matches
pub const DEFAULT_MIN_CONTAINMENT_LEN: usize = 4;

fn is_stripped(c: char) -> bool {
    c == '-' || c == '(' || c == ')' || c.is_whitespace()
}

/// Uppercase and drop separator characters
pub fn normalize_sku(raw: &str) -> String {
    raw.chars()
        .filter(|c| !is_stripped(*c))
        .flat_map(char::to_uppercase)
        .collect()
}

/// How two codes were found to match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Normalized SKU equal
    Exact,
    /// Normalized model equal
    Model,
    /// One normalized code contains the other
    Containment,
}

/// Normalizer with optional trailing suffix tokens (`AL`, `AR`, ...)
#[derive(Debug, Clone, Default)]
pub struct SkuNormalizer {
    suffixes: Vec<String>,
}

impl SkuNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip any of `suffixes` from the end of normalized codes
    pub fn with_suffixes<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = suffixes
            .into_iter()
            .map(|s| normalize_sku(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        Self { suffixes }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Normalize, then strip suffixes until none is left
    ///
    /// A suffix is kept when removing it would leave nothing.
    pub fn normalize(&self, raw: &str) -> String {
        let mut code = normalize_sku(raw);
        loop {
            let strippable = self
                .suffixes
                .iter()
                .find(|suffix| code.len() > suffix.len() && code.ends_with(suffix.as_str()));
            match strippable {
                Some(suffix) => {
                    let keep = code.len() - suffix.len();
                    code.truncate(keep);
                },
                None => return code,
            }
        }
    }
}

/// Compare two already-normalized codes
///
/// Equal codes match exactly. Otherwise one must contain the other and the
/// shorter one must be longer than `min_len`, so short codes like `A1` do
/// not match everything.
pub fn skus_match(a: &str, b: &str, min_len: usize) -> Option<MatchKind> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if a == b {
        return Some(MatchKind::Exact);
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.len() > min_len && long.contains(short) {
        Some(MatchKind::Containment)
    } else {
        None
    }
}

/// Family pattern of a code: drops a trailing size token (`-N2`, `/N`) and
/// then a trailing single-letter variant (`-A`, `/B`)
///
/// `TSR-23SD-N6` and `TSR-23SD-N` share the pattern `TSR-23SD`.
pub fn sku_pattern(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let without_size = strip_trailing_token(&upper, |token| {
        let mut chars = token.chars();
        chars.next() == Some('N') && chars.all(|c| c.is_ascii_digit())
    });
    strip_trailing_token(without_size, |token| {
        token.len() == 1 && token.chars().all(|c| c.is_ascii_uppercase())
    })
    .to_string()
}

fn strip_trailing_token(code: &str, is_token: impl Fn(&str) -> bool) -> &str {
    match code.rfind(['-', '/']) {
        Some(idx) if idx > 0 && is_token(&code[idx + 1..]) => &code[..idx],
        _ => code,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "TSR-23SD-N",
        "tsr23sdn",
        " abc - 100 ",
        "(MBF8505)",
        "T-49-HC AL",
        "FRAL",
        "AL",
        "X-ALAR",
        "",
        "ñandú-7",
    ];

    #[test]
    fn test_normalize_is_idempotent() {
        let plain = SkuNormalizer::new();
        let suffixed = SkuNormalizer::with_suffixes(["AL", "AR"]);
        for raw in SAMPLES {
            let once = normalize_sku(raw);
            assert_eq!(normalize_sku(&once), once, "plain: {raw}");

            let once = plain.normalize(raw);
            assert_eq!(plain.normalize(&once), once, "normalizer: {raw}");

            let once = suffixed.normalize(raw);
            assert_eq!(suffixed.normalize(&once), once, "suffixed: {raw}");
        }
    }

    #[test]
    fn test_normalize_ignores_case_and_punctuation() {
        assert_eq!(normalize_sku("TSR-23SD-N"), normalize_sku("tsr23sdn"));
        assert_eq!(normalize_sku("abc (100)"), "ABC100");
        assert_eq!(normalize_sku("a\tb\nc"), "ABC");
    }

    #[test]
    fn test_suffix_stripping() {
        let normalizer = SkuNormalizer::with_suffixes(["AL", "ar"]);
        assert_eq!(normalizer.normalize("T-49-HC AL"), "T49HC");
        assert_eq!(normalizer.normalize("X-ALAR"), "X");
        // never strips down to nothing
        assert_eq!(normalizer.normalize("AL"), "AL");
        assert_eq!(normalizer.suffixes(), &["AL".to_string(), "AR".to_string()]);
    }

    #[test]
    fn test_matching_is_reflexive() {
        for raw in SAMPLES.iter().filter(|s| !normalize_sku(s).is_empty()) {
            let code = normalize_sku(raw);
            assert_eq!(
                skus_match(&code, &code, DEFAULT_MIN_CONTAINMENT_LEN),
                Some(MatchKind::Exact)
            );
        }
    }

    #[test]
    fn test_containment_needs_long_needle() {
        assert_eq!(
            skus_match("TSR23SD", "TSR23SDN", 4),
            Some(MatchKind::Containment)
        );
        assert_eq!(
            skus_match("TSR23SDN", "TSR23SD", 4),
            Some(MatchKind::Containment)
        );
        // four characters is not enough
        assert_eq!(skus_match("T49H", "T49HC", 4), None);
        assert_eq!(skus_match("", "ABC", 4), None);
        assert_eq!(skus_match("ABCDE", "VWXYZ", 4), None);
    }

    #[test]
    fn test_sku_pattern() {
        assert_eq!(sku_pattern("TSR-23SD-N6"), "TSR-23SD");
        assert_eq!(sku_pattern("TSR-23SD-N"), "TSR-23SD");
        assert_eq!(sku_pattern("MBF8505/A"), "MBF8505");
        assert_eq!(sku_pattern("T-49-HC"), "T-49-HC");
        assert_eq!(sku_pattern("-A"), "-A");
    }
}

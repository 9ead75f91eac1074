//! Shared Serde deserializers
//!
//! Exported documents and spreadsheets are loose about numeric fields:
//! stock may arrive as `12`, `12.0`, `"12"`, `"1,200"` or `null`, prices
//! as `1499.5` or `"$1,499.50"`. These helpers accept all of them.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

// ============================================================================
// Default Value Functions (for serde #[serde(default = "...")] attributes)
// ============================================================================

/// Default value: true
pub fn bool_true() -> bool {
    true
}

// ============================================================================
// Text parsing
// ============================================================================

/// Parse a stock quantity written as text
///
/// Thousands separators are removed and fractions truncate toward zero.
/// Negative values clamp to 0. Returns `None` when the text is not a number.
pub fn parse_quantity_text(text: &str) -> Option<u64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('\'')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return Some(n.max(0) as u64);
    }
    quantity_from_f64(cleaned.parse::<f64>().ok()?)
}

/// Convert a float quantity, truncating. Non-finite values are rejected.
pub fn quantity_from_f64(value: f64) -> Option<u64> {
    if !value.is_finite() {
        return None;
    }
    Some(if value <= 0.0 { 0 } else { value.trunc() as u64 })
}

/// Parse a price written as text (`"1499.5"`, `"$1,499.50"`)
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

// ============================================================================
// Custom Deserializers (for JSON records)
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    String(String),
    /// Booleans, arrays and objects
    Other(IgnoredAny),
}

/// Lenient stock quantity: numbers, numeric strings and `null` (-> 0)
///
/// Anything that cannot be read as a quantity becomes 0.
pub fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        None | Some(NumberOrString::Other(_)) => 0,
        Some(NumberOrString::Unsigned(n)) => n,
        Some(NumberOrString::Signed(n)) => n.max(0) as u64,
        Some(NumberOrString::Float(f)) => quantity_from_f64(f).unwrap_or(0),
        Some(NumberOrString::String(s)) => parse_quantity_text(&s).unwrap_or(0),
    })
}

/// Lenient optional price: `null`, `""` and unparsable text -> None
pub fn deserialize_optional_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        None | Some(NumberOrString::Other(_)) => None,
        Some(NumberOrString::Unsigned(n)) => Some(n as f64),
        Some(NumberOrString::Signed(n)) => Some(n as f64),
        Some(NumberOrString::Float(f)) => Some(f),
        Some(NumberOrString::String(s)) => parse_price_text(&s),
    })
}

/// Optional string that also accepts numbers (SKUs exported as `1234`)
pub fn deserialize_optional_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        None | Some(NumberOrString::Other(_)) => None,
        Some(NumberOrString::Unsigned(n)) => Some(n.to_string()),
        Some(NumberOrString::Signed(n)) => Some(n.to_string()),
        Some(NumberOrString::Float(f)) => Some(f.to_string()),
        Some(NumberOrString::String(s)) if s.trim().is_empty() => None,
        Some(NumberOrString::String(s)) => Some(s),
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // unwrap is acceptable in tests
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Record {
        #[serde(default, deserialize_with = "deserialize_quantity")]
        stock: u64,
        #[serde(default, deserialize_with = "deserialize_optional_price")]
        price: Option<f64>,
        #[serde(default, deserialize_with = "deserialize_optional_code")]
        sku: Option<String>,
    }

    fn parse(json: &str) -> Record {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_quantity_text() {
        assert_eq!(parse_quantity_text("12"), Some(12));
        assert_eq!(parse_quantity_text(" 1,200 "), Some(1200));
        assert_eq!(parse_quantity_text("7.9"), Some(7));
        assert_eq!(parse_quantity_text("-3"), Some(0));
        assert_eq!(parse_quantity_text("'15"), Some(15));
        assert_eq!(parse_quantity_text("n/a"), None);
        assert_eq!(parse_quantity_text(""), None);
    }

    #[test]
    fn test_price_text() {
        assert_eq!(parse_price_text("$1,499.50"), Some(1499.5));
        assert_eq!(parse_price_text("0"), Some(0.0));
        assert_eq!(parse_price_text("call"), None);
    }

    #[test]
    fn test_quantity_deserializer_variants() {
        assert_eq!(parse(r#"{"stock": 12}"#).stock, 12);
        assert_eq!(parse(r#"{"stock": "12"}"#).stock, 12);
        assert_eq!(parse(r#"{"stock": 12.0}"#).stock, 12);
        assert_eq!(parse(r#"{"stock": -4}"#).stock, 0);
        assert_eq!(parse(r#"{"stock": null}"#).stock, 0);
        assert_eq!(parse(r#"{"stock": "lots"}"#).stock, 0);
        assert_eq!(parse(r#"{}"#).stock, 0);
    }

    #[test]
    fn test_price_deserializer_variants() {
        assert_eq!(parse(r#"{"price": 10}"#).price, Some(10.0));
        assert_eq!(parse(r#"{"price": "1,200.5"}"#).price, Some(1200.5));
        assert_eq!(parse(r#"{"price": ""}"#).price, None);
        assert_eq!(parse(r#"{"price": null}"#).price, None);
    }

    #[test]
    fn test_non_scalar_values_read_as_missing() {
        let record = parse(r#"{"stock": true, "price": [1], "sku": {"code": "A"}}"#);
        assert_eq!(record.stock, 0);
        assert_eq!(record.price, None);
        assert_eq!(record.sku, None);
    }

    #[test]
    fn test_code_deserializer_accepts_numbers() {
        assert_eq!(parse(r#"{"sku": 4410}"#).sku.as_deref(), Some("4410"));
        assert_eq!(parse(r#"{"sku": "TSR-23SD-N"}"#).sku.as_deref(), Some("TSR-23SD-N"));
        assert_eq!(parse(r#"{"sku": "  "}"#).sku, None);
    }
}

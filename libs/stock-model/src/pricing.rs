//! Price-list comparison
//!
//! Price rows only ever match by exact normalized SKU. Rows that miss are
//! listed with same-family candidates (see [`sku_pattern`]) for review.

use std::collections::HashMap;

use serde::Serialize;

use crate::document::{DatabaseDocument, Section};
use crate::error::Result;
use crate::matcher::{MatchOptions, SkuIndex};
use crate::record::{price_value, ProductView, FIELD_PRICE};
use crate::sku::sku_pattern;

/// One row of a price sheet
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub sku: String,
    pub price: Option<f64>,
    /// 1-based sheet row
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceUpdate {
    pub firebase_key: String,
    pub sku: String,
    pub old_price: Option<f64>,
    pub new_price: f64,
}

impl PriceUpdate {
    pub fn difference(&self) -> f64 {
        self.new_price - self.old_price.unwrap_or(0.0)
    }

    /// Change relative to the old price, `None` when there was none
    pub fn percent(&self) -> Option<f64> {
        self.old_price
            .filter(|old| *old != 0.0)
            .map(|old| self.difference() / old * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedPrice {
    pub sku: String,
    pub row: usize,
    /// Product SKUs sharing the row's family pattern
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceComparison {
    pub rows: usize,
    pub updates: Vec<PriceUpdate>,
    pub unchanged: usize,
    pub unmatched: Vec<UnmatchedPrice>,
    /// Sheet rows whose price cell was blank or unreadable
    pub without_price: Vec<usize>,
}

impl PriceComparison {
    pub fn matched(&self) -> usize {
        self.updates.len() + self.unchanged
    }
}

pub fn compare_prices(
    doc: &DatabaseDocument,
    rows: &[PriceRow],
    matching: MatchOptions,
) -> PriceComparison {
    let options = MatchOptions {
        match_model: false,
        allow_containment: false,
        ..matching
    };
    let index = SkuIndex::build(doc.records(Section::Products), options);

    let mut families: HashMap<String, Vec<String>> = HashMap::new();
    let mut current: HashMap<String, (Option<String>, Option<f64>)> = HashMap::new();
    for (key, record) in doc.records(Section::Products) {
        let view = ProductView::from_record(&serde_json::Value::Object(record.clone()));
        if let Some(sku) = &view.sku {
            families
                .entry(sku_pattern(sku))
                .or_default()
                .push(sku.clone());
        }
        current.insert(key.to_string(), (view.sku, view.price));
    }

    let mut comparison = PriceComparison {
        rows: rows.len(),
        ..Default::default()
    };
    for row in rows {
        let Some(new_price) = row.price else {
            comparison.without_price.push(row.row);
            continue;
        };
        let Some(found) = index.find(&row.sku) else {
            comparison.unmatched.push(UnmatchedPrice {
                sku: row.sku.clone(),
                row: row.row,
                variants: families
                    .get(&sku_pattern(&row.sku))
                    .cloned()
                    .unwrap_or_default(),
            });
            continue;
        };
        let (sku, old_price) = current.get(&found.key).cloned().unwrap_or_default();
        if old_price.is_some_and(|old| (old - new_price).abs() < 0.005) {
            comparison.unchanged += 1;
            continue;
        }
        comparison.updates.push(PriceUpdate {
            firebase_key: found.key,
            sku: sku.unwrap_or_else(|| row.sku.clone()),
            old_price,
            new_price,
        });
    }
    comparison
}

/// Write new prices into the products section, returning how many changed
pub fn apply_price_updates(doc: &mut DatabaseDocument, updates: &[PriceUpdate]) -> Result<usize> {
    let mut applied = 0;
    for update in updates {
        if let Some(record) = doc.record_mut(Section::Products, &update.firebase_key) {
            record.insert(FIELD_PRICE.into(), price_value(update.new_price));
            applied += 1;
        }
    }
    Ok(applied)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // json! macro and test unwraps
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> DatabaseDocument {
        DatabaseDocument::from_value(
            json!({"products": {
                "p1": {"sku": "TSR-23SD-N", "price": 1000},
                "p2": {"sku": "TSR-23SD-N6", "price": "1,200.50"},
                "p3": {"sku": "MBF-8505", "price": 500}
            }}),
            None,
        )
        .unwrap()
    }

    fn row(sku: &str, price: Option<f64>, n: usize) -> PriceRow {
        PriceRow {
            sku: sku.into(),
            price,
            row: n,
        }
    }

    #[test]
    fn test_compare_prices() {
        let rows = vec![
            row("tsr-23sd-n", Some(1100.0), 2),
            row("MBF 8505", Some(500.0), 3),
            row("TSR-23SD-N2", Some(900.0), 4),
            row("TSR-23SD", Some(900.0), 5),
            row("EMPTY-1", None, 6),
        ];
        let cmp = compare_prices(&doc(), &rows, MatchOptions::default());

        assert_eq!(cmp.updates.len(), 1);
        let update = &cmp.updates[0];
        assert_eq!(update.firebase_key, "p1");
        assert_eq!(update.sku, "TSR-23SD-N");
        assert_eq!(update.old_price, Some(1000.0));
        assert!((update.percent().unwrap() - 10.0).abs() < 1e-9);

        assert_eq!(cmp.unchanged, 1);
        assert_eq!(cmp.without_price, vec![6]);
        // containment is never used for prices
        assert_eq!(cmp.unmatched.len(), 2);
        assert_eq!(
            cmp.unmatched[0].variants,
            vec!["TSR-23SD-N".to_string(), "TSR-23SD-N6".to_string()]
        );
    }

    #[test]
    fn test_apply_price_updates() {
        let mut d = doc();
        let updates = vec![
            PriceUpdate {
                firebase_key: "p2".into(),
                sku: "TSR-23SD-N6".into(),
                old_price: Some(1200.5),
                new_price: 1300.0,
            },
            PriceUpdate {
                firebase_key: "gone".into(),
                sku: "X".into(),
                old_price: None,
                new_price: 1.0,
            },
        ];
        assert_eq!(apply_price_updates(&mut d, &updates).unwrap(), 1);
        assert_eq!(d.section(Section::Products).unwrap()["p2"]["price"], 1300);
        assert_eq!(updates[1].percent(), None);
    }
}

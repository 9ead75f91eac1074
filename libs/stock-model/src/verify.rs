//! Post-merge verification of a document against the sheet it came from

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::document::{safe_key, DatabaseDocument, Section};
use crate::matcher::{MatchOptions, SkuIndex};
use crate::merge::invariant_violations;
use crate::record::ProductView;
use crate::stock::InventoryItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMismatch {
    pub product_key: String,
    pub sheet_skus: Vec<String>,
    pub expected: u64,
    pub actual: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub items_checked: usize,
    /// Products whose stock equals the summed sheet rows
    pub products_ok: usize,
    pub spare_parts_ok: usize,
    pub mismatches: Vec<StockMismatch>,
    /// Sheet codes found in neither products nor spare parts
    pub missing: Vec<String>,
    pub invariant_violations: Vec<String>,
    /// `warehouseStock` does not sum to `totalStock`
    pub ledger_mismatches: Vec<String>,
    pub available_over_total: Vec<String>,
}

impl VerifyReport {
    pub fn failures(&self) -> usize {
        self.mismatches.len()
            + self.missing.len()
            + self.invariant_violations.len()
            + self.ledger_mismatches.len()
            + self.available_over_total.len()
    }

    pub fn is_ok(&self) -> bool {
        self.failures() == 0
    }
}

/// Check that every sheet item landed where a merge would have put it
pub fn verify_stock(
    doc: &DatabaseDocument,
    items: &[InventoryItem],
    matching: MatchOptions,
) -> VerifyReport {
    let mut report = VerifyReport {
        items_checked: items.len(),
        ..Default::default()
    };
    let index = SkuIndex::build(doc.records(Section::Products), matching);

    let spare_keys: HashSet<String> = doc
        .records(Section::SpareParts)
        .flat_map(|(key, record)| {
            let sku = record
                .get("sku")
                .and_then(Value::as_str)
                .map(safe_key)
                .unwrap_or_default();
            [key.to_string(), sku]
        })
        .filter(|k| !k.is_empty())
        .collect();

    // product key -> (sheet codes, expected total), in first-match order
    let mut expected: Vec<(String, Vec<String>, u64)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for item in items {
        match index.find(&item.sku) {
            Some(found) => {
                let pos = *positions.entry(found.key.clone()).or_insert_with(|| {
                    expected.push((found.key.clone(), Vec::new(), 0));
                    expected.len() - 1
                });
                expected[pos].1.push(item.sku.clone());
                expected[pos].2 += item.ledger.total();
            },
            None if spare_keys.contains(&safe_key(&item.sku)) => report.spare_parts_ok += 1,
            None if item.ledger.is_empty() => {},
            None => report.missing.push(item.sku.clone()),
        }
    }

    for (key, sheet_skus, want) in expected {
        let actual = doc
            .section(Section::Products)
            .and_then(|products| products.get(&key))
            .map(|record| ProductView::from_record(record).stock)
            .unwrap_or(0);
        if actual == want {
            report.products_ok += 1;
        } else {
            report.mismatches.push(StockMismatch {
                product_key: key,
                sheet_skus,
                expected: want,
                actual,
            });
        }
    }

    report.invariant_violations = invariant_violations(doc);
    let (ledgers, available) = check_ledgers(doc);
    report.ledger_mismatches = ledgers;
    report.available_over_total = available;
    report
}

/// `section/key` lists of records whose stock fields disagree
///
/// Only records carrying `warehouseStock` are checked.
pub fn check_ledgers(doc: &DatabaseDocument) -> (Vec<String>, Vec<String>) {
    let mut ledger_mismatches = Vec::new();
    let mut available_over_total = Vec::new();
    for section in [Section::Products, Section::SpareParts] {
        for (key, record) in doc.records(section) {
            let view = ProductView::from_record(&Value::Object(record.clone()));
            let Some(ledger) = view.ledger() else {
                continue;
            };
            let total = view.total_stock.unwrap_or(view.stock);
            if ledger.total() != total {
                ledger_mismatches.push(format!("{}/{}", section, key));
            }
            if view.available_stock.is_some_and(|available| available > total) {
                available_over_total.push(format!("{}/{}", section, key));
            }
        }
    }
    (ledger_mismatches, available_over_total)
}

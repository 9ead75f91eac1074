//! Merging stock sheet items into a database document

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::assignment::WarehouseAssigner;
use crate::document::{safe_key, DatabaseDocument, Section};
use crate::error::Result;
use crate::matcher::{MatchOptions, SkuIndex};
use crate::record::{apply_stock, reset_stock, ProductView, SparePart, FIELD_SKU};
use crate::sku::MatchKind;
use crate::stock::{Distribution, InventoryItem, StockLedger};
use crate::warehouse::WarehouseCode;

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Zero every product's stock before applying the sheet
    pub reset_stock: bool,
    /// Rebuild the spare-parts section instead of updating it
    pub replace_spare_parts: bool,
    /// Timestamp written to `warehouseStock.*.lastUpdate`
    pub last_update: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            reset_stock: true,
            replace_spare_parts: true,
            last_update: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub sheet_sku: String,
    pub product_key: String,
    pub kind: MatchKind,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub items: usize,
    pub matches: Vec<MatchRecord>,
    pub products_updated: usize,
    pub spare_parts: Vec<String>,
    /// Unmatched sheet items with no stock, not turned into spare parts
    pub skipped_empty: Vec<String>,
    pub units_to_products: u64,
    pub units_to_spare_parts: u64,
    /// Records whose location came from the assignment policy
    pub assigned_by_policy: usize,
    pub product_distribution: Distribution,
    pub spare_distribution: Distribution,
    /// Spare parts keyed away from a taken key (`sku -> key`)
    pub renamed_spare_parts: Vec<String>,
    /// Records left with stock but no warehouse
    pub invariant_violations: Vec<String>,
}

impl MergeReport {
    pub fn count_by_kind(&self) -> BTreeMap<MatchKind, usize> {
        let mut counts = BTreeMap::new();
        for m in &self.matches {
            *counts.entry(m.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn ambiguous(&self) -> impl Iterator<Item = &MatchRecord> {
        self.matches.iter().filter(|m| !m.alternatives.is_empty())
    }

    pub fn total_units(&self) -> u64 {
        self.units_to_products + self.units_to_spare_parts
    }
}

pub struct StockMerger {
    matching: MatchOptions,
    products: WarehouseAssigner,
    spare_parts: WarehouseAssigner,
    options: MergeOptions,
}

impl StockMerger {
    pub fn new(
        matching: MatchOptions,
        products: WarehouseAssigner,
        spare_parts: WarehouseAssigner,
        options: MergeOptions,
    ) -> Self {
        Self {
            matching,
            products,
            spare_parts,
            options,
        }
    }

    /// Place unlocated stock, then pick the record's warehouse
    ///
    /// Unlocated units join the largest non-reserved warehouse, or go where
    /// the policy says; they never become reserved stock.
    fn settle(
        assigner: &mut WarehouseAssigner,
        ledger: &mut StockLedger,
        assigned_by_policy: &mut usize,
    ) -> Option<WarehouseCode> {
        if ledger.unlocated() > 0 {
            let target = ledger
                .available_warehouse()
                .or_else(|| assigner.assign_available(ledger.total()));
            if let Some(code) = target {
                ledger.locate_unlocated(code);
                *assigned_by_policy += 1;
            }
        }
        ledger.primary_warehouse()
    }

    /// One key per spare part
    ///
    /// Items whose SKUs normalize alike share a key and a summed ledger.
    /// A different SKU that lands on a taken key gets `<key>_2`, `<key>_3`...
    fn spare_part_keys<'a>(
        &self,
        section: &Map<String, Value>,
        residual: Vec<&'a InventoryItem>,
        report: &mut MergeReport,
    ) -> Vec<(String, &'a InventoryItem, StockLedger)> {
        let normalize = |sku: &str| self.matching.normalizer.normalize(sku);
        let mut parts: Vec<(String, &InventoryItem, StockLedger)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        'items: for item in residual {
            let normalized = normalize(&item.sku);
            let base = safe_key(&item.sku);
            let mut key = base.clone();
            let mut suffix = 1;
            loop {
                let owner = match positions.get(&key) {
                    Some(&pos) => Some(normalize(&parts[pos].1.sku)),
                    None => section
                        .get(&key)
                        .and_then(|record| record.get(FIELD_SKU))
                        .and_then(Value::as_str)
                        .map(normalize),
                };
                match owner {
                    Some(owner) if owner == normalized => {
                        if let Some(&pos) = positions.get(&key) {
                            parts[pos].2.merge(&item.ledger);
                            continue 'items;
                        }
                        break;
                    },
                    Some(_) => {
                        suffix += 1;
                        key = format!("{}_{}", base, suffix);
                    },
                    None => break,
                }
            }
            if key != base {
                warn!("Spare part {} moved to key {}, {} is taken", item.sku, key, base);
                report.renamed_spare_parts.push(format!("{} -> {}", item.sku, key));
            }
            positions.insert(key.clone(), parts.len());
            parts.push((key, item, item.ledger.clone()));
        }
        parts
    }

    pub fn merge(
        &mut self,
        doc: &mut DatabaseDocument,
        items: &[InventoryItem],
    ) -> Result<MergeReport> {
        let mut report = MergeReport {
            items: items.len(),
            ..Default::default()
        };

        let index = SkuIndex::build(doc.records(Section::Products), self.matching.clone());
        info!("Indexed {} products", index.len());

        // product key -> accumulated ledger, in first-match order
        let mut ledgers: Vec<(String, StockLedger)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut residual: Vec<&InventoryItem> = Vec::new();

        for item in items {
            match index.find(&item.sku) {
                Some(found) => {
                    if found.is_ambiguous() {
                        warn!(
                            "{} matched {} ({:?}), also matches {:?}",
                            item.sku, found.key, found.kind, found.alternatives
                        );
                    } else {
                        debug!("{} -> {} ({:?})", item.sku, found.key, found.kind);
                    }
                    let pos = *positions.entry(found.key.clone()).or_insert_with(|| {
                        ledgers.push((found.key.clone(), StockLedger::new()));
                        ledgers.len() - 1
                    });
                    ledgers[pos].1.merge(&item.ledger);
                    report.matches.push(MatchRecord {
                        sheet_sku: item.sku.clone(),
                        product_key: found.key,
                        kind: found.kind,
                        alternatives: found.alternatives,
                    });
                },
                None if item.ledger.is_empty() => report.skipped_empty.push(item.sku.clone()),
                None => residual.push(item),
            }
        }

        if self.options.reset_stock {
            let products = doc.section_mut(Section::Products)?;
            for record in products.values_mut().filter_map(Value::as_object_mut) {
                reset_stock(record);
            }
        }

        for (key, mut ledger) in ledgers {
            let warehouse =
                Self::settle(&mut self.products, &mut ledger, &mut report.assigned_by_policy);
            if let Some(record) = doc.record_mut(Section::Products, &key) {
                apply_stock(record, &ledger, warehouse, &self.options.last_update);
                report.units_to_products += ledger.total();
                report.product_distribution.record(&ledger);
                report.products_updated += 1;
            }
        }

        let mut spare_section = if self.options.replace_spare_parts {
            Map::new()
        } else {
            doc.section(Section::SpareParts).cloned().unwrap_or_default()
        };
        for (key, item, mut ledger) in self.spare_part_keys(&spare_section, residual, &mut report) {
            let warehouse =
                Self::settle(&mut self.spare_parts, &mut ledger, &mut report.assigned_by_policy);
            match spare_section.get_mut(&key).and_then(Value::as_object_mut) {
                Some(existing) => {
                    apply_stock(existing, &ledger, warehouse, &self.options.last_update);
                },
                None => {
                    let part = SparePart::from_ledger(
                        item.sku.clone(),
                        item.name.clone(),
                        &ledger,
                        warehouse,
                        &self.options.last_update,
                    );
                    spare_section.insert(key.clone(), part.into_value());
                },
            }
            report.units_to_spare_parts += ledger.total();
            report.spare_distribution.record(&ledger);
            report.spare_parts.push(key);
        }
        doc.replace_section(Section::SpareParts, spare_section);

        report.invariant_violations = invariant_violations(doc);
        info!(
            "Merged {} items: {} products updated, {} spare parts",
            report.items,
            report.products_updated,
            report.spare_parts.len()
        );
        Ok(report)
    }
}

/// `section/key` of every product or spare part with stock but no warehouse
pub fn invariant_violations(doc: &DatabaseDocument) -> Vec<String> {
    let mut violations = Vec::new();
    for section in [Section::Products, Section::SpareParts] {
        for (key, record) in doc.records(section) {
            let view = ProductView::from_record(&Value::Object(record.clone()));
            if view.violates_warehouse_invariant() {
                violations.push(format!("{}/{}", section, key));
            }
        }
    }
    violations
}

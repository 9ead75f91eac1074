//! Stock aggregation
//!
//! A [`StockLedger`] holds one item's quantities per warehouse. Quantities
//! read from sheets without warehouse sections stay "unlocated" until a
//! warehouse is assigned. Totals always equal the sum of the parts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::warehouse::WarehouseCode;

/// Per-warehouse entry written to `warehouseStock`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStockEntry {
    pub available: u64,
    pub reserved: u64,
    #[serde(rename = "lastUpdate", default)]
    pub last_update: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockLedger {
    per_warehouse: BTreeMap<WarehouseCode, u64>,
    unlocated: u64,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, code: WarehouseCode, quantity: u64) {
        if quantity > 0 {
            *self.per_warehouse.entry(code).or_insert(0) += quantity;
        }
    }

    pub fn add_unlocated(&mut self, quantity: u64) {
        self.unlocated += quantity;
    }

    pub fn merge(&mut self, other: &StockLedger) {
        for (code, quantity) in &other.per_warehouse {
            self.add(*code, *quantity);
        }
        self.unlocated += other.unlocated;
    }

    /// Move all unlocated stock into `code`
    pub fn locate_unlocated(&mut self, code: WarehouseCode) {
        let quantity = std::mem::take(&mut self.unlocated);
        self.add(code, quantity);
    }

    pub fn unlocated(&self) -> u64 {
        self.unlocated
    }

    pub fn quantity(&self, code: WarehouseCode) -> u64 {
        self.per_warehouse.get(&code).copied().unwrap_or(0)
    }

    pub fn warehouses(&self) -> impl Iterator<Item = (WarehouseCode, u64)> + '_ {
        self.per_warehouse.iter().map(|(code, qty)| (*code, *qty))
    }

    pub fn total(&self) -> u64 {
        self.per_warehouse.values().sum::<u64>() + self.unlocated
    }

    pub fn reserved(&self) -> u64 {
        self.quantity(WarehouseCode::Reserved)
    }

    /// Total minus reserved stock
    pub fn available(&self) -> u64 {
        self.total() - self.reserved()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-reserved warehouse holding the most stock; ties go to the earlier code
    pub fn available_warehouse(&self) -> Option<WarehouseCode> {
        let mut best: Option<(WarehouseCode, u64)> = None;
        for (code, qty) in self.warehouses() {
            if code.is_reserved() || qty == 0 {
                continue;
            }
            if best.map_or(true, |(_, best_qty)| qty > best_qty) {
                best = Some((code, qty));
            }
        }
        best.map(|(code, _)| code)
    }

    /// Record warehouse: [`available_warehouse`](Self::available_warehouse),
    /// or `999` when reserved stock is all there is
    pub fn primary_warehouse(&self) -> Option<WarehouseCode> {
        self.available_warehouse()
            .or_else(|| (self.reserved() > 0).then_some(WarehouseCode::Reserved))
    }

    /// Render as the `warehouseStock` map of a product record
    pub fn to_warehouse_stock(&self, last_update: &str) -> Map<String, Value> {
        let mut map = Map::new();
        for (code, qty) in self.warehouses() {
            let entry = WarehouseStockEntry {
                available: if code.is_reserved() { 0 } else { qty },
                reserved: if code.is_reserved() { qty } else { 0 },
                last_update: last_update.to_string(),
            };
            map.insert(
                code.as_str().to_string(),
                serde_json::to_value(entry).unwrap_or(Value::Null),
            );
        }
        map
    }

    /// Read a `warehouseStock` map back, skipping unknown codes
    ///
    /// Returns the ledger and the codes that could not be parsed.
    pub fn from_warehouse_stock(value: &Value) -> (Self, Vec<String>) {
        let mut ledger = Self::new();
        let mut unknown = Vec::new();
        let Some(map) = value.as_object() else {
            return (ledger, unknown);
        };
        for (code, entry) in map {
            match code.parse::<WarehouseCode>() {
                Ok(parsed) => {
                    let qty = match serde_json::from_value::<WarehouseStockEntry>(entry.clone()) {
                        Ok(e) => e.available + e.reserved,
                        Err(_) => entry.as_u64().unwrap_or(0),
                    };
                    ledger.add(parsed, qty);
                },
                Err(_) => unknown.push(code.clone()),
            }
        }
        (ledger, unknown)
    }
}

/// One aggregated stock sheet item
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryItem {
    /// SKU as cleaned from the sheet (apostrophes and padding removed)
    pub sku: String,
    pub name: String,
    pub ledger: StockLedger,
    /// 1-based sheet rows this item was read from
    pub rows: Vec<usize>,
}

impl InventoryItem {
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            ledger: StockLedger::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_stock(mut self, code: Option<WarehouseCode>, quantity: u64) -> Self {
        match code {
            Some(code) => self.ledger.add(code, quantity),
            None => self.ledger.add_unlocated(quantity),
        }
        self
    }
}

/// Units per warehouse across many ledgers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub per_warehouse: BTreeMap<WarehouseCode, u64>,
    pub unlocated: u64,
}

impl Distribution {
    pub fn record(&mut self, ledger: &StockLedger) {
        for (code, qty) in ledger.warehouses() {
            *self.per_warehouse.entry(code).or_insert(0) += qty;
        }
        self.unlocated += ledger.unlocated();
    }

    pub fn total(&self) -> u64 {
        self.per_warehouse.values().sum::<u64>() + self.unlocated
    }

    pub fn available(&self) -> u64 {
        self.total() - self.per_warehouse.get(&WarehouseCode::Reserved).copied().unwrap_or(0)
    }
}

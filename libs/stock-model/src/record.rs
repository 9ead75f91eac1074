//! Product and spare-part records
//!
//! Records stay raw JSON objects so fields this crate does not know about
//! survive untouched and in order. [`ProductView`] is a typed, lenient
//! read of the known fields; the `apply_*` functions patch them in place.

use common::serde_helpers::{
    deserialize_optional_code, deserialize_optional_price, deserialize_quantity,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::stock::StockLedger;
use crate::warehouse::WarehouseCode;

pub const FIELD_SKU: &str = "sku";
pub const FIELD_MODEL: &str = "model";
pub const FIELD_NAME: &str = "name";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_STOCK: &str = "stock";
pub const FIELD_WAREHOUSE: &str = "warehouse";
pub const FIELD_WAREHOUSE_STOCK: &str = "warehouseStock";
pub const FIELD_TOTAL_STOCK: &str = "totalStock";
pub const FIELD_AVAILABLE_STOCK: &str = "availableStock";

fn deserialize_optional_quantity<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(deserialize_quantity(&v).unwrap_or(0)),
    })
}

/// Typed view of the fields stock jobs care about
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductView {
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_price")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub stock: u64,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub warehouse: Option<String>,
    #[serde(
        rename = "totalStock",
        default,
        deserialize_with = "deserialize_optional_quantity"
    )]
    pub total_stock: Option<u64>,
    #[serde(
        rename = "availableStock",
        default,
        deserialize_with = "deserialize_optional_quantity"
    )]
    pub available_stock: Option<u64>,
    #[serde(rename = "warehouseStock", default)]
    pub warehouse_stock: Option<Value>,
}

impl ProductView {
    /// Read a record; non-object values give an empty view
    pub fn from_record(record: &Value) -> Self {
        Self::deserialize(record).unwrap_or_default()
    }

    pub fn warehouse_code(&self) -> Option<WarehouseCode> {
        self.warehouse.as_deref().and_then(|w| w.parse().ok())
    }

    /// A warehouse value is present but is not a known code
    pub fn has_unknown_warehouse(&self) -> bool {
        self.warehouse.is_some() && self.warehouse_code().is_none()
    }

    /// `stock > 0` requires a warehouse
    pub fn violates_warehouse_invariant(&self) -> bool {
        self.stock > 0 && self.warehouse_code().is_none()
    }

    pub fn ledger(&self) -> Option<StockLedger> {
        self.warehouse_stock
            .as_ref()
            .map(|v| StockLedger::from_warehouse_stock(v).0)
    }
}

/// Write stock fields from a ledger
///
/// Existing keys keep their position; new keys are appended.
pub fn apply_stock(
    record: &mut Map<String, Value>,
    ledger: &StockLedger,
    warehouse: Option<WarehouseCode>,
    last_update: &str,
) {
    record.insert(FIELD_STOCK.into(), Value::from(ledger.total()));
    record.insert(FIELD_WAREHOUSE.into(), warehouse_value(warehouse));
    record.insert(
        FIELD_WAREHOUSE_STOCK.into(),
        Value::Object(ledger.to_warehouse_stock(last_update)),
    );
    record.insert(FIELD_TOTAL_STOCK.into(), Value::from(ledger.total()));
    record.insert(FIELD_AVAILABLE_STOCK.into(), Value::from(ledger.available()));
}

/// Zero the stock fields before a full re-merge
pub fn reset_stock(record: &mut Map<String, Value>) {
    record.insert(FIELD_STOCK.into(), Value::from(0u64));
    record.insert(FIELD_WAREHOUSE.into(), Value::Null);
    if record.contains_key(FIELD_WAREHOUSE_STOCK) {
        record.insert(FIELD_WAREHOUSE_STOCK.into(), Value::Object(Map::new()));
    }
    for field in [FIELD_TOTAL_STOCK, FIELD_AVAILABLE_STOCK] {
        if record.contains_key(field) {
            record.insert(field.into(), Value::from(0u64));
        }
    }
}

/// Whole prices are written as integers, like the console exports them
pub fn price_value(price: f64) -> Value {
    if price.fract() == 0.0 && price.abs() < 1e15 {
        Value::from(price as i64)
    } else {
        Value::from(price)
    }
}

pub fn warehouse_value(warehouse: Option<WarehouseCode>) -> Value {
    warehouse
        .map(|w| Value::String(w.as_str().to_string()))
        .unwrap_or(Value::Null)
}

/// Residual record for sheet stock that matched no product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparePart {
    pub sku: String,
    pub name: String,
    pub stock: u64,
    pub warehouse: Option<WarehouseCode>,
    pub price: f64,
    #[serde(rename = "warehouseStock", default, skip_serializing_if = "Map::is_empty")]
    pub warehouse_stock: Map<String, Value>,
}

impl SparePart {
    pub fn from_ledger(
        sku: impl Into<String>,
        name: impl Into<String>,
        ledger: &StockLedger,
        warehouse: Option<WarehouseCode>,
        last_update: &str,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            stock: ledger.total(),
            warehouse,
            price: 0.0,
            warehouse_stock: ledger.to_warehouse_stock(last_update),
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

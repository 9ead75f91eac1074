//! Stock and price sheet reading
//!
//! Workbooks (`xlsx`, `xlsm`, `xls`, `xlsb`, `ods`) are read with calamine,
//! `.csv` with the csv crate. Both become rows of [`Cell`] so one sniffing
//! path handles every format.
//!
//! Layout rules:
//! - header: first row within `scan_rows` holding an SKU marker and a stock
//!   (or price) marker; without one, columns 0/1/2 are SKU/name/stock
//! - `Almac...` rows label the next warehouse section
//! - a row whose first token is a warehouse code (and whose stock cell holds
//!   no number) switches the current warehouse

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use common::serde_helpers::{parse_price_text, parse_quantity_text, quantity_from_f64};
use errors::StockError;
use serde::Serialize;
use stock_model::{InventoryItem, PriceRow, WarehouseCode};
use tracing::{debug, info, warn};

use crate::context::SheetConfig;

const SKU_MARKERS: &[&str] = &["digo", "sku", "clave", "modelo"];
const STOCK_MARKERS: &[&str] = &["existencia", "stock", "inventario", "cantidad"];
const NAME_MARKERS: &[&str] = &["nombre", "descrip"];
const PRICE_MARKERS: &[&str] = &["precio", "price"];
const LABEL_WORDS: &[&str] = &[
    "almac",
    "codigo",
    "código",
    "digo",
    "nombre",
    "existencia",
    "inventario",
    "total",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Display text; whole numbers print without a fraction
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }

    fn has_number(&self) -> bool {
        match self {
            Cell::Number(_) => true,
            Cell::Text(text) => parse_quantity_text(text).is_some(),
            Cell::Empty => false,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Value(u64),
    Negative,
    Blank,
    Malformed,
}

fn read_quantity(cell: Option<&Cell>) -> Quantity {
    match cell {
        None | Some(Cell::Empty) => Quantity::Blank,
        Some(Cell::Number(n)) if *n < 0.0 => Quantity::Negative,
        Some(Cell::Number(n)) => quantity_from_f64(*n).map_or(Quantity::Malformed, Quantity::Value),
        Some(Cell::Text(text)) if text.trim().is_empty() => Quantity::Blank,
        Some(Cell::Text(text)) => match parse_quantity_text(text) {
            Some(_) if text.trim().trim_start_matches('\'').starts_with('-') => Quantity::Negative,
            Some(qty) => Quantity::Value(qty),
            None => Quantity::Malformed,
        },
    }
}

fn read_price(cell: Option<&Cell>) -> Option<f64> {
    match cell? {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(text) => parse_price_text(text),
        _ => None,
    }
}

/// Columns and header row found in a sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetLayout {
    /// 0-based row index of the header, if one was found
    pub header_row: Option<usize>,
    pub sku_col: usize,
    pub name_col: Option<usize>,
    pub stock_col: usize,
    pub price_col: Option<usize>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            header_row: None,
            sku_col: 0,
            name_col: Some(1),
            stock_col: 2,
            price_col: None,
        }
    }
}

fn find_marker(row: &[Cell], markers: &[&str]) -> Option<usize> {
    row.iter().position(|cell| {
        let text = cell.text().to_lowercase();
        !text.is_empty() && markers.iter().any(|m| text.contains(m))
    })
}

pub fn sniff_layout(rows: &[Vec<Cell>], scan_rows: usize) -> SheetLayout {
    for (idx, row) in rows.iter().take(scan_rows).enumerate() {
        let Some(sku_col) = find_marker(row, SKU_MARKERS) else {
            continue;
        };
        let stock_col = find_marker(row, STOCK_MARKERS);
        let price_col = find_marker(row, PRICE_MARKERS);
        if stock_col.is_none() && price_col.is_none() {
            continue;
        }
        let layout = SheetLayout {
            header_row: Some(idx),
            sku_col,
            name_col: find_marker(row, NAME_MARKERS),
            stock_col: stock_col.unwrap_or(SheetLayout::default().stock_col),
            price_col,
        };
        debug!("Header at row {}: {:?}", idx + 1, layout);
        return layout;
    }
    debug!("No header in the first {} rows, using default columns", scan_rows);
    SheetLayout::default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseSection {
    pub code: WarehouseCode,
    pub label: Option<String>,
    /// 1-based row that opened the section
    pub row: usize,
    pub units: u64,
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub value: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct SheetInventory {
    pub layout: SheetLayout,
    pub items: Vec<InventoryItem>,
    pub sections: Vec<WarehouseSection>,
    pub skipped: Vec<SkippedRow>,
    /// Stock cells that were not numbers, read as 0
    pub malformed_stock: Vec<usize>,
    /// Negative stock cells, read as 0
    pub negative_stock: Vec<usize>,
    pub data_rows: usize,
}

impl SheetInventory {
    pub fn total_units(&self) -> u64 {
        self.items.iter().map(|item| item.ledger.total()).sum()
    }

    pub fn unlocated_units(&self) -> u64 {
        self.items.iter().map(|item| item.ledger.unlocated()).sum()
    }

    pub fn has_sections(&self) -> bool {
        !self.sections.is_empty()
    }
}

/// Cleaned SKU from a cell, or why the row is not an item
fn clean_sku(cell: Option<&Cell>, min_len: usize) -> std::result::Result<String, &'static str> {
    let raw = cell.map(Cell::text).unwrap_or_default();
    let sku = raw.replace('\'', "").trim().to_string();
    if sku.is_empty() {
        return Err("blank");
    }
    let lower = sku.to_lowercase();
    if LABEL_WORDS.iter().any(|w| lower.contains(w)) {
        return Err("label row");
    }
    if sku.chars().count() <= min_len {
        return Err("sku too short");
    }
    Ok(sku)
}

/// Warehouse code opening a section
///
/// The first cell is either the bare code (`CA`, label in the next column)
/// or the code plus its label (`'999 Mercancía apartada`) alone on the row.
/// A row like `INT 500,Interruptor,` is an item with blank stock.
fn section_code(row: &[Cell], layout: &SheetLayout) -> Option<WarehouseCode> {
    let first = row.first()?.text();
    let mut tokens = first.split_whitespace();
    let code = tokens.next()?.parse::<WarehouseCode>().ok()?;
    if row.get(layout.stock_col).is_some_and(Cell::has_number) {
        return None;
    }
    let bare = tokens.next().is_none();
    let alone = row.iter().skip(1).all(Cell::is_empty);
    (bare || alone).then_some(code)
}

fn is_section_label(row: &[Cell]) -> bool {
    row.first()
        .map(|cell| cell.text().to_lowercase().starts_with("almac"))
        .unwrap_or(false)
}

pub fn parse_inventory(rows: &[Vec<Cell>], config: &SheetConfig) -> SheetInventory {
    let layout = sniff_layout(rows, config.scan_rows);
    let start = layout.header_row.map_or(0, |h| h + 1);
    let mut sheet = SheetInventory {
        layout: layout.clone(),
        ..Default::default()
    };
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut current: Option<WarehouseCode> = None;
    let mut pending_label: Option<String> = None;

    for (idx, row) in rows.iter().enumerate().skip(start) {
        let row_no = idx + 1;
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        if is_section_label(row) {
            pending_label = row.iter().map(Cell::text).find(|t| !t.is_empty());
            continue;
        }
        if let Some(code) = section_code(row, &layout) {
            debug!("Row {}: warehouse section {}", row_no, code);
            current = Some(code);
            sheet.sections.push(WarehouseSection {
                code,
                label: pending_label.take(),
                row: row_no,
                units: 0,
                items: 0,
            });
            continue;
        }

        let sku = match clean_sku(row.get(layout.sku_col), config.min_sku_len) {
            Ok(sku) => sku,
            Err("blank") => continue,
            Err(reason) => {
                sheet.skipped.push(SkippedRow {
                    row: row_no,
                    value: row.get(layout.sku_col).map(Cell::text).unwrap_or_default(),
                    reason,
                });
                continue;
            },
        };
        sheet.data_rows += 1;

        let quantity = match read_quantity(row.get(layout.stock_col)) {
            Quantity::Value(qty) => qty,
            Quantity::Blank => 0,
            Quantity::Negative => {
                warn!("Row {}: negative stock for {}, read as 0", row_no, sku);
                sheet.negative_stock.push(row_no);
                0
            },
            Quantity::Malformed => {
                warn!("Row {}: unreadable stock for {}, read as 0", row_no, sku);
                sheet.malformed_stock.push(row_no);
                0
            },
        };

        let pos = *positions.entry(sku.clone()).or_insert_with(|| {
            let name = layout
                .name_col
                .and_then(|col| row.get(col))
                .map(Cell::text)
                .unwrap_or_default();
            sheet.items.push(InventoryItem::new(sku.clone(), name));
            sheet.items.len() - 1
        });
        let item = &mut sheet.items[pos];
        item.rows.push(row_no);
        match current {
            Some(code) => item.ledger.add(code, quantity),
            None => item.ledger.add_unlocated(quantity),
        }
        if let Some(section) = sheet.sections.last_mut().filter(|_| current.is_some()) {
            section.units += quantity;
            section.items += 1;
        }
    }

    info!(
        "Sheet: {} data rows, {} items, {} units, {} warehouse sections",
        sheet.data_rows,
        sheet.items.len(),
        sheet.total_units(),
        sheet.sections.len()
    );
    sheet
}

/// SKU/price rows; `price_col` overrides the sniffed column
pub fn parse_price_rows(
    rows: &[Vec<Cell>],
    config: &SheetConfig,
    sku_col: Option<usize>,
    price_col: Option<usize>,
) -> Result<Vec<PriceRow>> {
    let layout = sniff_layout(rows, config.scan_rows);
    let sku_col = sku_col.unwrap_or(layout.sku_col);
    let price_col = price_col.or(layout.price_col).ok_or_else(|| {
        StockError::InvalidParameter {
            param: "price-col".into(),
            reason: "no price column found, pass --price-col".into(),
        }
    })?;
    let start = layout.header_row.map_or(0, |h| h + 1);

    let mut prices = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(start) {
        let Ok(sku) = clean_sku(row.get(sku_col), config.min_sku_len) else {
            continue;
        };
        prices.push(PriceRow {
            sku,
            price: read_price(row.get(price_col)),
            row: idx + 1,
        });
    }
    Ok(prices)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.with_context(|| format!("Failed to read CSV record: {:?}", path))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let text = String::from_utf8_lossy(field);
                    if text.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(text.into_owned())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path, sheet_name: Option<&str>) -> Result<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| StockError::Spreadsheet(format!("{}: {}", path.display(), e)))?;
    let names = workbook.sheet_names();
    let name = match sheet_name {
        Some(wanted) => names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| StockError::SheetNotFound(wanted.to_string()))?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| StockError::Spreadsheet(format!("{} has no sheets", path.display())))?,
    };
    debug!("Reading sheet '{}' of {:?}", name, path);
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| StockError::Spreadsheet(format!("{}: {}", name, e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect())
}

/// All rows of the chosen sheet
pub fn read_rows(path: &Path, sheet_name: Option<&str>) -> Result<Vec<Vec<Cell>>> {
    if !path.is_file() {
        return Err(StockError::FileNotFound(path.display().to_string()).into());
    }
    match extension(path).as_str() {
        "csv" => read_csv_rows(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_rows(path, sheet_name),
        other => Err(StockError::UnsupportedFormat(format!(".{}", other)).into()),
    }
}

pub fn sheet_names(path: &Path) -> Result<Vec<String>> {
    match extension(path).as_str() {
        "csv" => Ok(vec![path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("csv")
            .to_string()]),
        _ => {
            let workbook = open_workbook_auto(path)
                .map_err(|e| StockError::Spreadsheet(format!("{}: {}", path.display(), e)))?;
            Ok(workbook.sheet_names())
        },
    }
}

pub fn read_inventory(
    path: &Path,
    sheet_name: Option<&str>,
    config: &SheetConfig,
) -> Result<SheetInventory> {
    let rows = read_rows(path, sheet_name)?;
    Ok(parse_inventory(&rows, config))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rows(csv: &str) -> Vec<Vec<Cell>> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet.csv");
        fs::write(&path, csv).unwrap();
        read_rows(&path, None).unwrap()
    }

    const SECTIONED: &str = "\
INVENTARIO MEXICO,,
Fecha: 09.12.25,,
Código,Nombre,Existencia
Almacén:,,
CA,Cancún,
'TSR-23SD-N,Refrigerador 1 puerta,5
M3R24-1-N,Refrigerador M3,\"1,200\"
Total almacén,,1205
Almacén:,,
'999 Mercancía apartada,,
'TSR-23SD-N,Refrigerador 1 puerta,2
PRO-26R-N,Pro,abc
Almacén:,,
PU,Puebla BINEX,
EGG-7000,Huevo,-3
TSR-23SD-N,Refrigerador 1 puerta,4.9
AB,Corto,1
";

    #[test]
    fn test_sectioned_sheet() {
        let sheet = parse_inventory(&rows(SECTIONED), &SheetConfig::default());
        assert_eq!(sheet.layout.header_row, Some(2));
        assert_eq!(sheet.layout.stock_col, 2);
        assert_eq!(sheet.layout.name_col, Some(1));

        let codes: Vec<_> = sheet.sections.iter().map(|s| s.code).collect();
        assert_eq!(
            codes,
            vec![WarehouseCode::Ca, WarehouseCode::Reserved, WarehouseCode::Pu]
        );
        assert_eq!(sheet.sections[0].label.as_deref(), Some("Almacén:"));
        assert_eq!(sheet.sections[0].units, 1205);

        let skus: Vec<_> = sheet.items.iter().map(|i| i.sku.as_str()).collect();
        assert_eq!(skus, vec!["TSR-23SD-N", "M3R24-1-N", "PRO-26R-N", "EGG-7000"]);

        let tsr = &sheet.items[0];
        assert_eq!(tsr.name, "Refrigerador 1 puerta");
        assert_eq!(tsr.ledger.quantity(WarehouseCode::Ca), 5);
        assert_eq!(tsr.ledger.quantity(WarehouseCode::Reserved), 2);
        assert_eq!(tsr.ledger.quantity(WarehouseCode::Pu), 4);
        assert_eq!(tsr.ledger.available(), 9);
        assert_eq!(tsr.rows, vec![6, 11, 16]);

        assert_eq!(sheet.items[1].ledger.total(), 1200);
        assert_eq!(sheet.malformed_stock, vec![12]);
        assert_eq!(sheet.negative_stock, vec![15]);
        assert_eq!(sheet.unlocated_units(), 0);

        let reasons: Vec<_> = sheet.skipped.iter().map(|s| (s.row, s.reason)).collect();
        assert_eq!(reasons, vec![(8, "label row"), (17, "sku too short")]);
    }

    #[test]
    fn test_item_starting_with_a_code_is_not_a_section() {
        let csv = "\
Código,Nombre,Existencia
CA,Cancún,
INT 500,Interruptor,
'999 Mercancía apartada,,
PU 12-B,Bisagra,3
";
        let sheet = parse_inventory(&rows(csv), &SheetConfig::default());
        let codes: Vec<_> = sheet.sections.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![WarehouseCode::Ca, WarehouseCode::Reserved]);

        let skus: Vec<_> = sheet.items.iter().map(|i| i.sku.as_str()).collect();
        assert_eq!(skus, vec!["INT 500", "PU 12-B"]);
        assert!(sheet.items[0].ledger.is_empty());
        assert_eq!(sheet.items[1].ledger.reserved(), 3);
    }

    #[test]
    fn test_flat_sheet_without_header() {
        let sheet = parse_inventory(
            &rows("ABC-100,Refrigerador,12\nABC-100,Refrigerador,3\nZZZ-999,Empaque,\n"),
            &SheetConfig::default(),
        );
        assert_eq!(sheet.layout, SheetLayout::default());
        assert!(!sheet.has_sections());
        assert_eq!(sheet.items.len(), 2);
        assert_eq!(sheet.items[0].ledger.unlocated(), 15);
        assert!(sheet.items[1].ledger.is_empty());
    }

    #[test]
    fn test_header_with_other_column_order() {
        let sheet = parse_inventory(
            &rows("Cantidad,Descripción,SKU\n7,Mesa,MSA-48\n"),
            &SheetConfig::default(),
        );
        assert_eq!(sheet.layout.sku_col, 2);
        assert_eq!(sheet.layout.stock_col, 0);
        assert_eq!(sheet.items[0].sku, "MSA-48");
        assert_eq!(sheet.items[0].name, "Mesa");
        assert_eq!(sheet.total_units(), 7);
    }

    #[test]
    fn test_price_rows() {
        let data = rows("Modelo,Descripcion,Precio Lista\nTSR-23SD-N,Refri,\"$1,499.50\"\nM3R24-1-N,M3,\nx,tiny,5\n");
        let prices = parse_price_rows(&data, &SheetConfig::default(), None, None).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].price, Some(1499.5));
        assert_eq!(prices[0].row, 2);
        assert_eq!(prices[1].price, None);

        let flat = rows("TSR-23SD-N,1000\n");
        let err = parse_price_rows(&flat, &SheetConfig::default(), None, None).unwrap_err();
        assert!(err.to_string().contains("price"));
        let prices = parse_price_rows(&flat, &SheetConfig::default(), Some(0), Some(1)).unwrap();
        assert_eq!(prices[0].price, Some(1000.0));
    }

    #[test]
    fn test_unsupported_and_missing_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stock.txt");
        fs::write(&path, "x").unwrap();
        let err = read_rows(&path, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StockError>(),
            Some(StockError::UnsupportedFormat(_))
        ));
        let err = read_rows(&dir.path().join("none.csv"), None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StockError>(),
            Some(StockError::FileNotFound(_))
        ));
    }
}

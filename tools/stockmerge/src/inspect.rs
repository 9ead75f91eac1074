//! Read-only views of sheets and documents

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use serde_json::Value;
use stock_model::{DatabaseDocument, ProductView, Section};

use crate::context::ToolConfig;
use crate::core::sheet::{read_inventory, sheet_names};
use crate::report;
use crate::stock::DocArgs;

#[derive(Subcommand, Debug, Clone)]
pub enum InspectCommands {
    /// Show the sniffed layout, warehouse sections and totals of a sheet
    Sheet {
        path: PathBuf,

        #[arg(long)]
        sheet_name: Option<String>,

        /// Also list the rows that were skipped
        #[arg(long)]
        skipped: bool,
    },

    /// Show section counts and stock totals of a document
    Db {
        #[command(flatten)]
        doc: DocArgs,
    },
}

/// Units per warehouse value across products and spare parts
pub fn warehouse_distribution(doc: &DatabaseDocument) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for section in [Section::Products, Section::SpareParts] {
        for (_, record) in doc.records(section) {
            let view = ProductView::from_record(&Value::Object(record.clone()));
            if view.stock == 0 {
                continue;
            }
            let label = view.warehouse.unwrap_or_else(|| "(none)".to_string());
            *totals.entry(label).or_insert(0) += view.stock;
        }
    }
    totals
}

fn inspect_sheet(path: PathBuf, sheet_name: Option<String>, skipped: bool, config: &ToolConfig) -> Result<()> {
    let names = sheet_names(&path)?;
    let sheet = read_inventory(&path, sheet_name.as_deref(), &config.sheet)?;

    report::header("Sheet Layout");
    report::field("File", path.display());
    report::field("Sheets", names.join(", "));
    let layout = &sheet.layout;
    report::field(
        "Header row",
        layout
            .header_row
            .map_or_else(|| "none (default columns)".to_string(), |r| (r + 1).to_string()),
    );
    report::field("SKU column", layout.sku_col);
    report::field(
        "Name column",
        layout.name_col.map_or_else(|| "-".to_string(), |c| c.to_string()),
    );
    report::field("Stock column", layout.stock_col);
    report::field("Data rows", sheet.data_rows);
    report::field("Items", sheet.items.len());
    report::field("Total units", sheet.total_units());
    report::field("Unlocated units", sheet.unlocated_units());
    report::field("Unreadable stock cells", sheet.malformed_stock.len());
    report::field("Negative stock cells", sheet.negative_stock.len());

    if sheet.has_sections() {
        println!("\n  {}", "Warehouse sections:".bright_cyan());
        for section in &sheet.sections {
            println!(
                "    row {:>5}  {:<6} {:>8} units {:>5} items  {}",
                section.row,
                section.code,
                section.units,
                section.items,
                section.label.as_deref().unwrap_or(section.code.description())
            );
        }
    } else {
        report::warning("No warehouse sections found");
    }

    if skipped {
        let rows: Vec<String> = sheet
            .skipped
            .iter()
            .map(|s| format!("row {}: {:?} ({})", s.row, s.value, s.reason))
            .collect();
        report::examples("Skipped rows", &rows, usize::MAX);
    } else if !sheet.skipped.is_empty() {
        println!("  {} rows skipped, use --skipped to list them", sheet.skipped.len());
    }
    Ok(())
}

fn inspect_db(doc_args: &DocArgs, config: &ToolConfig) -> Result<()> {
    let doc = doc_args.load(config)?;

    report::header("Document Summary");
    report::field("Shape", format!("{:?}", doc.scope()));
    println!(
        "\n  {:<16} {:>8} {:>8} {:>10} {:>8} {:>8} {:>10}",
        "section", "entries", "items", "units", "stocked", "priced", "no wh"
    );
    for summary in doc.summary() {
        let items = summary
            .nested_items
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "  {:<16} {:>8} {:>8} {:>10} {:>8} {:>8} {:>10}",
            summary.name,
            summary.entries,
            items,
            summary.total_stock,
            summary.with_stock,
            summary.with_price,
            summary.missing_warehouse
        );
    }

    let distribution = warehouse_distribution(&doc);
    if !distribution.is_empty() {
        println!("\n  {}", "Stock by warehouse:".bright_cyan());
        for (warehouse, units) in &distribution {
            println!("    {:<8} {:>10}", warehouse, units);
        }
    }

    let violations = stock_model::invariant_violations(&doc);
    if violations.is_empty() {
        report::ok("Every stocked record has a warehouse");
    } else {
        report::warning(format!("{} records with stock but no warehouse", violations.len()));
        report::examples("Records", &violations, 10);
    }
    Ok(())
}

pub fn handle_command(cmd: InspectCommands, config: &ToolConfig) -> Result<()> {
    match cmd {
        InspectCommands::Sheet {
            path,
            sheet_name,
            skipped,
        } => inspect_sheet(path, sheet_name, skipped, config),
        InspectCommands::Db { doc } => inspect_db(&doc, config),
    }
}

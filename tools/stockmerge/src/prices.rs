//! Price-list comparison and patching

use anyhow::Result;
use chrono::Local;
use clap::Args;
use colored::*;
use stock_model::{apply_price_updates, compare_prices, PriceComparison};

use crate::context::ToolConfig;
use crate::core::file_utils::{timestamped_path, write_document, write_json_pretty};
use crate::core::sheet::{parse_price_rows, read_rows};
use crate::report;
use crate::stock::{DocArgs, SheetArgs};

#[derive(Args, Debug, Clone)]
pub struct PriceArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    #[command(flatten)]
    pub doc: DocArgs,

    /// 0-based SKU column (sniffed from the header by default)
    #[arg(long)]
    pub sku_col: Option<usize>,

    /// 0-based price column (sniffed from the header by default)
    #[arg(long)]
    pub price_col: Option<usize>,

    /// Write a snapshot with the new prices
    #[arg(long)]
    pub apply: bool,
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn print_comparison(result: &PriceComparison) {
    report::header("Price Comparison");
    report::field("Sheet rows", result.rows);
    report::field("Matched", result.matched());
    report::field("Unchanged", result.unchanged);
    report::field("Price changes", result.updates.len());
    report::field("Unmatched", result.unmatched.len());
    report::field("Rows without price", result.without_price.len());

    if !result.updates.is_empty() {
        println!("\n  {}", "Changes:".bright_cyan());
        for update in result.updates.iter().take(25) {
            let percent = update
                .percent()
                .map_or_else(|| "new".to_string(), |p| format!("{:+.1}%", p));
            let line = format!(
                "    {:<24} {:>12} -> {:>12}  {}",
                update.sku,
                money(update.old_price),
                money(Some(update.new_price)),
                percent
            );
            if update.difference() < 0.0 {
                println!("{}", line.yellow());
            } else {
                println!("{}", line);
            }
        }
        if result.updates.len() > 25 {
            println!("    ... and {} more", result.updates.len() - 25);
        }
    }

    let unmatched: Vec<String> = result
        .unmatched
        .iter()
        .map(|u| {
            if u.variants.is_empty() {
                format!("row {}: {}", u.row, u.sku)
            } else {
                format!("row {}: {} (similar: {})", u.row, u.sku, u.variants.join(", "))
            }
        })
        .collect();
    report::examples("Unmatched SKUs", &unmatched, 20);
}

pub fn prices(args: PriceArgs, config: &ToolConfig) -> Result<()> {
    let rows = read_rows(&args.sheet.sheet, args.sheet.sheet_name.as_deref())?;
    let price_rows = parse_price_rows(&rows, &config.sheet, args.sku_col, args.price_col)?;
    let mut doc = args.doc.load(config)?;

    let result = compare_prices(&doc, &price_rows, config.match_options());
    print_comparison(&result);

    let updates_path = timestamped_path(&config.output_dir, "price-updates", "json", Local::now());
    write_json_pretty(&updates_path, &result.updates)?;

    if !args.apply {
        println!("\n  Run again with --apply to write a patched snapshot");
        return Ok(());
    }
    let applied = apply_price_updates(&mut doc, &result.updates)?;
    let path = write_document(&doc, &config.output_dir, "price-patched")?;
    report::written(&path, doc.scope());
    report::done(format!("{} prices updated", applied));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_prices_apply_writes_updates_and_snapshot() {
        let dir = TempDir::new().unwrap();
        let sheet = dir.path().join("precios.csv");
        fs::write(&sheet, "Modelo,Descripción,Precio\nTSR-23SD-N,Refri,\"$1,150.00\"\nNOPE-1,x,5\n")
            .unwrap();
        let db = dir.path().join("database-export.json");
        fs::write(
            &db,
            r#"{"products": {"p1": {"sku": "TSR-23SD-N", "price": 1000}}, "users": {}}"#,
        )
        .unwrap();

        let mut config = ToolConfig::default();
        config.output_dir = dir.path().join("out");
        let args = PriceArgs {
            sheet: SheetArgs {
                sheet: sheet.clone(),
                sheet_name: None,
            },
            doc: DocArgs {
                db: dir.path().to_path_buf(),
                scope: None,
            },
            sku_col: None,
            price_col: None,
            apply: true,
        };
        prices(args, &config).unwrap();

        let mut names: Vec<String> = fs::read_dir(&config.output_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("price-patched-"));
        assert!(names[1].starts_with("price-updates-"));

        let patched: Value = serde_json::from_str(
            &fs::read_to_string(config.output_dir.join(&names[0])).unwrap(),
        )
        .unwrap();
        assert_eq!(patched["products"]["p1"]["price"], 1150);
        let updates: Value = serde_json::from_str(
            &fs::read_to_string(config.output_dir.join(&names[1])).unwrap(),
        )
        .unwrap();
        assert_eq!(updates[0]["firebase_key"], "p1");
        assert_eq!(updates[0]["old_price"], 1000.0);
    }
}

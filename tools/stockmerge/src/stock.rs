//! Stock commands: merge, match, assign, verify

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::Args;
use colored::*;
use errors::StockError;
use serde::Serialize;
use stock_model::repair::assign_warehouses;
use stock_model::{
    verify_stock, DatabaseDocument, Distribution, DocumentScope, MatchKind, MatchRecord,
    MergeOptions, MergeReport, Section, SkuIndex, StockMerger,
};
use tracing::{info, warn};

use crate::context::ToolConfig;
use crate::core::file_utils::{
    load_document, resolve_input, timestamped_path, write_document, write_json_pretty,
};
use crate::core::sheet::{read_inventory, SheetInventory};
use crate::report;

#[derive(Args, Debug, Clone)]
pub struct SheetArgs {
    /// Stock spreadsheet (.xlsx, .xlsm, .xls, .ods or .csv)
    pub sheet: PathBuf,

    /// Worksheet to read; the first one by default
    #[arg(long)]
    pub sheet_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DocArgs {
    /// Database export, or a directory holding snapshots
    #[arg(short, long)]
    pub db: PathBuf,

    /// Document shape: root, products or spareparts (detected by default)
    #[arg(long, value_parser = parse_scope)]
    pub scope: Option<DocumentScope>,
}

impl DocArgs {
    pub fn load(&self, config: &ToolConfig) -> Result<DatabaseDocument> {
        let input = resolve_input(&self.db, &config.snapshot_prefixes)?;
        info!("Loading {}", input.display());
        load_document(&input, self.scope)
    }
}

pub fn parse_scope(raw: &str) -> Result<DocumentScope, String> {
    if raw.eq_ignore_ascii_case("root") || raw == "/" {
        return Ok(DocumentScope::Root);
    }
    raw.parse::<Section>()
        .map(DocumentScope::Subtree)
        .map_err(|e| e.to_string())
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    #[command(flatten)]
    pub doc: DocArgs,

    /// Keep current product stock instead of zeroing it first
    #[arg(long)]
    pub keep_stock: bool,

    /// Update the spare-parts section instead of rebuilding it
    #[arg(long)]
    pub keep_spare_parts: bool,

    /// Seed for random warehouse selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report without writing a snapshot
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MatchArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    #[command(flatten)]
    pub doc: DocArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AssignArgs {
    #[command(flatten)]
    pub doc: DocArgs,

    /// Section to place: products or spareparts
    #[arg(long, default_value = "products")]
    pub section: String,

    /// Re-place records that already have a warehouse
    #[arg(long)]
    pub overwrite: bool,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    #[command(flatten)]
    pub doc: DocArgs,
}

/// Read and summarize a stock sheet
pub fn load_sheet(args: &SheetArgs, config: &ToolConfig) -> Result<SheetInventory> {
    let sheet = read_inventory(&args.sheet, args.sheet_name.as_deref(), &config.sheet)?;
    println!(
        "{} {} items, {} units from {}",
        "Sheet:".bright_cyan(),
        sheet.items.len(),
        sheet.total_units(),
        args.sheet.display()
    );
    if sheet.has_sections() {
        println!("  {} warehouse sections", sheet.sections.len());
    } else if sheet.unlocated_units() > 0 {
        report::warning(format!(
            "No warehouse sections, {} units placed by policy",
            sheet.unlocated_units()
        ));
    }
    if !sheet.malformed_stock.is_empty() {
        report::warning(format!(
            "{} unreadable stock cells read as 0 (rows {:?})",
            sheet.malformed_stock.len(),
            sheet.malformed_stock
        ));
    }
    if !sheet.negative_stock.is_empty() {
        report::warning(format!(
            "{} negative stock cells read as 0 (rows {:?})",
            sheet.negative_stock.len(),
            sheet.negative_stock
        ));
    }
    Ok(sheet)
}

fn print_distribution(title: &str, distribution: &Distribution) {
    if distribution.total() == 0 {
        return;
    }
    println!("  {}:", title.bright_cyan());
    for (code, units) in &distribution.per_warehouse {
        println!("    {:<6} {:>8}  {}", code, units, code.description());
    }
    if distribution.unlocated > 0 {
        println!("    {:<6} {:>8}", "?", distribution.unlocated);
    }
}

fn print_merge_report(result: &MergeReport) {
    report::header("Stock Merge");
    report::field("Sheet items", result.items);
    for (kind, count) in result.count_by_kind() {
        report::field(&format!("Matched ({:?})", kind), count);
    }
    report::field("Products updated", result.products_updated);
    report::field("Units to products", result.units_to_products);
    report::field("Spare parts", result.spare_parts.len());
    report::field("Units to spare parts", result.units_to_spare_parts);
    report::field("Placed by policy", result.assigned_by_policy);

    let ambiguous: Vec<String> = result
        .ambiguous()
        .map(|m| format!("{} -> {} (also {:?})", m.sheet_sku, m.product_key, m.alternatives))
        .collect();
    report::examples("Ambiguous matches", &ambiguous, 10);
    report::examples("Unmatched without stock", &result.skipped_empty, 10);
    report::examples("Spare parts under a new key", &result.renamed_spare_parts, 10);
    print_distribution("Product stock by warehouse", &result.product_distribution);
    print_distribution("Spare-part stock by warehouse", &result.spare_distribution);

    if result.invariant_violations.is_empty() {
        report::ok("Every stocked record has a warehouse");
    } else {
        report::fail(format!(
            "{} records with stock but no warehouse",
            result.invariant_violations.len()
        ));
        report::examples("Violations", &result.invariant_violations, 10);
    }
}

/// Spare parts of a products subtree merge, written for the `/spareparts` import
///
/// A subtree snapshot only holds `products`, so the spare-parts section is
/// written beside it as `spareparts-<ts>.json`.
pub fn write_detached_spare_parts(doc: &DatabaseDocument, out_dir: &Path) -> Result<Option<PathBuf>> {
    if doc.scope() == DocumentScope::Root {
        return Ok(None);
    }
    let Some(parts) = doc.section(Section::SpareParts).filter(|parts| !parts.is_empty()) else {
        return Ok(None);
    };
    let path = timestamped_path(out_dir, "spareparts", "json", Local::now());
    write_json_pretty(&path, parts)?;
    Ok(Some(path))
}

pub fn merge(args: MergeArgs, config: &ToolConfig) -> Result<()> {
    let sheet = load_sheet(&args.sheet, config)?;
    let mut doc = args.doc.load(config)?;
    if let DocumentScope::Subtree(section) = doc.scope() {
        let reason = match section {
            Section::Products if args.keep_spare_parts => Some(
                "a /products export holds no spare parts to keep, merge a root export instead",
            ),
            Section::Products => None,
            _ => Some("merge needs a root or /products export"),
        };
        if let Some(reason) = reason {
            return Err(StockError::InvalidParameter {
                param: "db".into(),
                reason: format!("{} is a /{} export: {}", args.doc.db.display(), section, reason),
            }
            .into());
        }
    }
    let (products, spare_parts) = config.assigners(args.seed)?;
    let options = MergeOptions {
        reset_stock: !args.keep_stock,
        replace_spare_parts: !args.keep_spare_parts,
        ..Default::default()
    };

    let result = StockMerger::new(config.match_options(), products, spare_parts, options)
        .merge(&mut doc, &sheet.items)?;
    print_merge_report(&result);

    if args.dry_run {
        report::dry_run();
        return Ok(());
    }
    let path = write_document(&doc, &config.output_dir, "stock-merge")?;
    report::written(&path, doc.scope());
    if let Some(path) = write_detached_spare_parts(&doc, &config.output_dir)? {
        report::written(&path, DocumentScope::Subtree(Section::SpareParts));
    }
    report::done(format!("{} units merged", result.total_units()));
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub sheet: String,
    pub items: usize,
    pub counts: BTreeMap<MatchKind, usize>,
    pub matches: Vec<MatchRecord>,
    pub unmatched: Vec<String>,
    /// Normalized SKUs shared by several products, with their keys
    pub duplicate_skus: Vec<(String, Vec<String>)>,
}

pub fn build_match_report(
    sheet: &SheetInventory,
    doc: &DatabaseDocument,
    config: &ToolConfig,
) -> MatchReport {
    let index = SkuIndex::build(doc.records(Section::Products), config.match_options());
    let mut report = MatchReport {
        sheet: String::new(),
        items: sheet.items.len(),
        counts: BTreeMap::new(),
        matches: Vec::new(),
        unmatched: Vec::new(),
        duplicate_skus: index.duplicate_skus(),
    };
    for item in &sheet.items {
        match index.find(&item.sku) {
            Some(found) => {
                *report.counts.entry(found.kind).or_insert(0) += 1;
                report.matches.push(MatchRecord {
                    sheet_sku: item.sku.clone(),
                    product_key: found.key,
                    kind: found.kind,
                    alternatives: found.alternatives,
                });
            },
            None => report.unmatched.push(item.sku.clone()),
        }
    }
    report
}

pub fn match_sheet(args: MatchArgs, config: &ToolConfig) -> Result<()> {
    let sheet = load_sheet(&args.sheet, config)?;
    let doc = args.doc.load(config)?;
    let mut result = build_match_report(&sheet, &doc, config);
    result.sheet = args.sheet.sheet.display().to_string();

    report::header("SKU Matching");
    report::field("Sheet items", result.items);
    for (kind, count) in &result.counts {
        report::field(&format!("{:?}", kind), count);
    }
    report::field("Unmatched", result.unmatched.len());
    let ambiguous: Vec<String> = result
        .matches
        .iter()
        .filter(|m| !m.alternatives.is_empty())
        .map(|m| format!("{} -> {} (also {:?})", m.sheet_sku, m.product_key, m.alternatives))
        .collect();
    report::examples("Ambiguous matches", &ambiguous, 10);
    let duplicates: Vec<String> = result
        .duplicate_skus
        .iter()
        .map(|(sku, keys)| format!("{}: {}", sku, keys.join(", ")))
        .collect();
    report::examples("Duplicate product SKUs", &duplicates, 10);
    report::examples("Unmatched codes", &result.unmatched, 20);

    let path = timestamped_path(&config.output_dir, "match-report", "json", Local::now());
    write_json_pretty(&path, &result)?;
    report::done(format!("Report saved to {}", path.display()));
    Ok(())
}

pub fn assign(args: AssignArgs, config: &ToolConfig) -> Result<()> {
    let section: Section = args.section.parse()?;
    let mut doc = args.doc.load(config)?;
    let (products, spare_parts) = config.assigners(args.seed)?;
    let mut assigner = match section {
        Section::Products => products,
        Section::SpareParts => spare_parts,
        other => {
            return Err(StockError::InvalidParameter {
                param: "section".into(),
                reason: format!("{} has no warehouses", other),
            }
            .into())
        },
    };

    let result = assign_warehouses(&mut doc, section, &mut assigner, args.overwrite)?;
    report::header("Warehouse Assignment");
    report::field("Records examined", result.examined);
    report::field("Warehouses changed", result.changed);
    report::examples("Changes", &result.changes, 20);

    if args.dry_run {
        report::dry_run();
        return Ok(());
    }
    let path = write_document(&doc, &config.output_dir, "repaired-assign")?;
    report::written(&path, doc.scope());
    Ok(())
}

pub fn verify(args: VerifyArgs, config: &ToolConfig) -> Result<()> {
    let sheet = load_sheet(&args.sheet, config)?;
    let doc = args.doc.load(config)?;
    let result = verify_stock(&doc, &sheet.items, config.match_options());

    report::header("Stock Verification");
    report::field("Sheet items", result.items_checked);
    report::field("Products matching sheet", result.products_ok);
    report::field("Found in spare parts", result.spare_parts_ok);

    let mismatches: Vec<String> = result
        .mismatches
        .iter()
        .map(|m| {
            format!(
                "{} ({}): expected {}, found {}",
                m.product_key,
                m.sheet_skus.join(", "),
                m.expected,
                m.actual
            )
        })
        .collect();
    let checks = [
        ("Stock mismatches", mismatches),
        ("Missing from document", result.missing.clone()),
        ("Stock without warehouse", result.invariant_violations.clone()),
        ("warehouseStock != totalStock", result.ledger_mismatches.clone()),
        ("availableStock > totalStock", result.available_over_total.clone()),
    ];
    for (title, entries) in &checks {
        if entries.is_empty() {
            report::ok(title);
        } else {
            report::fail(format!("{}: {}", title, entries.len()));
            report::examples(title, entries, 10);
        }
    }

    if !result.is_ok() {
        warn!("Verification found {} problems", result.failures());
        return Err(StockError::VerificationFailed(result.failures()).into());
    }
    report::done("Document matches the sheet");
    Ok(())
}

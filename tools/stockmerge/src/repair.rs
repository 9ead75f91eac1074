//! `repair` command: one-pass schema fixes on a snapshot

use anyhow::Result;
use clap::Subcommand;
use errors::validation_error;
use stock_model::repair::{
    fill_spare_part_defaults, fix_encoding, prune_prefix, rekey_by_sku, rekey_sequential,
    set_spare_part_prices, standardize_fields, strip_asterisks, sync_users,
};
use stock_model::{DatabaseDocument, RepairReport, Section};
use tracing::info;

use crate::context::ToolConfig;
use crate::core::file_utils::write_document;
use crate::report;
use crate::stock::DocArgs;

#[derive(Subcommand, Debug, Clone)]
pub enum RepairCommands {
    /// Create missing users from profiles and missing profiles from users
    Users,

    /// Rename snake_case timestamps and fill profile names
    Fields,

    /// Fill price, sku, name and stock on spare parts
    #[command(name = "spare-defaults")]
    SpareDefaults,

    /// Set the price of every spare part
    #[command(name = "spare-prices")]
    SparePrices {
        #[arg(long, default_value_t = 0.0)]
        price: f64,

        /// Leave parts that already have a price
        #[arg(long)]
        only_missing: bool,
    },

    /// Strip `*` from SKUs and rekey records keyed by them
    Asterisks,

    /// Key records by their SKU
    #[command(name = "rekey-sku")]
    RekeySku {
        #[arg(long, default_value = "products")]
        section: String,
    },

    /// Key records as `<prefix>0001`, `<prefix>0002`... in document order
    #[command(name = "rekey-seq")]
    RekeySeq {
        #[arg(long, default_value = "products")]
        section: String,

        #[arg(long, default_value = "product_")]
        prefix: String,

        #[arg(long, default_value_t = 4)]
        width: usize,
    },

    /// Repair mojibake in product and spare-part text
    Encoding,

    /// Delete records whose SKU (or model) starts with a prefix
    #[command(name = "prune-prefix")]
    PrunePrefix {
        #[arg(long)]
        prefix: String,

        #[arg(long, default_value = "products")]
        section: String,
    },

    /// fields, users, spare-defaults, asterisks and encoding in order
    All,
}

impl RepairCommands {
    fn stem(&self) -> &'static str {
        match self {
            Self::Users => "repaired-users",
            Self::Fields => "repaired-fields",
            Self::SpareDefaults => "repaired-spare-defaults",
            Self::SparePrices { .. } => "repaired-spare-prices",
            Self::Asterisks => "repaired-asterisks",
            Self::RekeySku { .. } => "repaired-rekey-sku",
            Self::RekeySeq { .. } => "repaired-rekey-seq",
            Self::Encoding => "repaired-encoding",
            Self::PrunePrefix { .. } => "repaired-prune",
            Self::All => "repaired",
        }
    }
}

/// Apply one repair kind, returning one report per pass
pub fn run_repair(doc: &mut DatabaseDocument, kind: &RepairCommands) -> Result<Vec<RepairReport>> {
    let reports = match kind {
        RepairCommands::Users => vec![sync_users(doc)?],
        RepairCommands::Fields => vec![standardize_fields(doc)?],
        RepairCommands::SpareDefaults => vec![fill_spare_part_defaults(doc)?],
        RepairCommands::SparePrices {
            price,
            only_missing,
        } => vec![set_spare_part_prices(doc, *price, *only_missing)?],
        RepairCommands::Asterisks => vec![strip_asterisks(doc)?],
        RepairCommands::RekeySku { section } => vec![rekey_by_sku(doc, section.parse::<Section>()?)?],
        RepairCommands::RekeySeq {
            section,
            prefix,
            width,
        } => vec![rekey_sequential(doc, section.parse::<Section>()?, prefix, *width)?],
        RepairCommands::Encoding => vec![fix_encoding(doc)?],
        RepairCommands::PrunePrefix { prefix, section } => {
            if prefix.trim().is_empty() {
                return Err(validation_error!("prune-prefix needs a non-empty --prefix").into());
            }
            vec![prune_prefix(doc, section.parse::<Section>()?, prefix)?]
        },
        RepairCommands::All => {
            let mut reports = vec![standardize_fields(doc)?];
            if doc.section(Section::Users).is_some() || doc.section(Section::UserProfiles).is_some() {
                reports.push(sync_users(doc)?);
            }
            if doc.section(Section::SpareParts).is_some() {
                reports.push(fill_spare_part_defaults(doc)?);
            }
            reports.push(strip_asterisks(doc)?);
            reports.push(fix_encoding(doc)?);
            reports
        },
    };
    Ok(reports)
}

fn print_report(result: &RepairReport) {
    report::header(&format!("Repair: {}", result.name));
    report::field("Records examined", result.examined);
    report::field("Records changed", result.changed);
    report::examples("Changes", &result.changes, 15);
    if !result.conflicts.is_empty() {
        report::warning(format!("{} records left untouched", result.conflicts.len()));
        report::examples("Conflicts", &result.conflicts, 15);
    }
}

pub fn repair(kind: RepairCommands, doc_args: &DocArgs, dry_run: bool, config: &ToolConfig) -> Result<()> {
    let mut doc = doc_args.load(config)?;
    let reports = run_repair(&mut doc, &kind)?;
    for result in &reports {
        print_report(result);
    }

    let changed: usize = reports.iter().map(|r| r.changed).sum();
    info!("{} repair pass(es), {} records changed", reports.len(), changed);
    if dry_run {
        report::dry_run();
        return Ok(());
    }
    if changed == 0 {
        report::ok("Nothing to repair, no snapshot written");
        return Ok(());
    }
    let path = write_document(&doc, &config.output_dir, kind.stem())?;
    report::written(&path, doc.scope());
    report::done(format!("{} records changed", changed));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // json! macro and test unwraps
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_runs_every_pass() {
        let mut doc = DatabaseDocument::from_value(
            json!({
                "products": {"p1": {"sku": "TSR*", "description": "5 Â°C", "created_at": 1}},
                "spareparts": {"X-1": {"description": "Empaque"}},
                "users": {"u1": {"email": "a@b.mx"}}
            }),
            None,
        )
        .unwrap();
        let reports = run_repair(&mut doc, &RepairCommands::All).unwrap();
        let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), 5);

        let products = doc.section(Section::Products).unwrap();
        assert_eq!(products["p1"]["sku"], "TSR");
        assert_eq!(products["p1"]["description"], "5°C");
        assert_eq!(products["p1"]["createdAt"], 1);
        assert_eq!(doc.section(Section::SpareParts).unwrap()["X-1"]["name"], "Empaque");
        assert!(doc.section(Section::UserProfiles).unwrap().contains_key("u1"));
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let mut doc = DatabaseDocument::from_value(json!({"products": {}}), None).unwrap();
        let kind = RepairCommands::RekeySku {
            section: "widgets".into(),
        };
        assert!(run_repair(&mut doc, &kind).is_err());
        assert_eq!(kind.stem(), "repaired-rekey-sku");
    }

    #[test]
    fn test_blank_prune_prefix_is_refused() {
        let mut doc =
            DatabaseDocument::from_value(json!({"products": {"p1": {"sku": "TSR"}}}), None).unwrap();
        let kind = RepairCommands::PrunePrefix {
            prefix: "  ".into(),
            section: "products".into(),
        };
        let err = run_repair(&mut doc, &kind).unwrap_err();
        let stock_err = err.downcast_ref::<errors::StockError>().unwrap();
        assert_eq!(stock_err.error_code(), "VALIDATION_ERROR");
        assert_eq!(stock_err.exit_code(), 1);
        assert!(doc.section(Section::Products).unwrap().contains_key("p1"));
    }
}

//! Remote database jobs
//!
//! Every job goes through [`store::RemoteStore`]; writes run in a
//! [`store::BatchUploader`] that throttles requests and logs failed keys.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::Subcommand;
use serde_json::{Map, Value};
use stock_model::record::{
    FIELD_AVAILABLE_STOCK, FIELD_SKU, FIELD_STOCK, FIELD_TOTAL_STOCK, FIELD_WAREHOUSE,
    FIELD_WAREHOUSE_STOCK,
};
use stock_model::{DatabaseDocument, Section};
use tracing::{info, warn};

use crate::context::ToolConfig;
use crate::core::file_utils::{
    load_document, read_failure_log, resolve_input, timestamped_path, write_json_pretty,
};
use crate::report;

pub mod client;
#[cfg(test)]
pub mod memory;
pub mod store;

use client::RestStore;
use store::{finish_batch, path_segments, BatchItem, BatchUploader, Operation, RemoteStore};

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Download a subtree into a timestamped file
    Pull {
        /// Database path, `/` for the whole database
        #[arg(default_value = "/")]
        path: String,
    },

    /// Write product stock fields from a local document
    #[command(name = "push-stock")]
    PushStock {
        /// Merged document (or a directory holding snapshots)
        #[arg(short, long)]
        input: PathBuf,

        /// Only push the keys listed in a failure log
        #[arg(long)]
        only_keys: Option<PathBuf>,

        /// List what would be sent
        #[arg(long)]
        dry_run: bool,
    },

    /// Move records keyed by starred SKUs to their clean keys
    #[command(name = "strip-asterisks")]
    StripAsterisks {
        #[arg(long)]
        dry_run: bool,
    },
}

const PUSHED_FIELDS: [&str; 4] = [
    FIELD_STOCK,
    FIELD_WAREHOUSE_STOCK,
    FIELD_TOTAL_STOCK,
    FIELD_AVAILABLE_STOCK,
];

/// One PATCH per product; `only_keys` limits the set and reports keys not found
pub fn push_stock_items(
    doc: &DatabaseDocument,
    only_keys: Option<&HashSet<String>>,
) -> (Vec<BatchItem>, Vec<String>) {
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    for (key, record) in doc.records(Section::Products) {
        if only_keys.is_some_and(|keys| !keys.contains(key)) {
            continue;
        }
        seen.insert(key.to_string());

        let mut body = Map::new();
        for field in PUSHED_FIELDS {
            if let Some(value) = record.get(field) {
                body.insert(field.to_string(), value.clone());
            }
        }
        body.entry(FIELD_STOCK).or_insert(Value::from(0u64));
        body.insert(
            FIELD_WAREHOUSE.to_string(),
            record.get(FIELD_WAREHOUSE).cloned().unwrap_or(Value::Null),
        );
        items.push(BatchItem::new(
            key,
            vec![Operation::Patch {
                path: format!("{}/{}", Section::Products, key),
                body: Value::Object(body),
            }],
        ));
    }

    let mut missing: Vec<String> = only_keys
        .map(|keys| keys.difference(&seen).cloned().collect())
        .unwrap_or_default();
    missing.sort();
    (items, missing)
}

/// Moves for starred records in `products` and `spareparts`, plus collisions
pub async fn strip_asterisk_items(store: &dyn RemoteStore) -> Result<(Vec<BatchItem>, Vec<String>)> {
    let mut items = Vec::new();
    let mut collisions = Vec::new();
    for section in [Section::Products, Section::SpareParts] {
        let Value::Object(records) = store.get(section.as_str()).await? else {
            continue;
        };
        for (key, record) in &records {
            let sku = record.get(FIELD_SKU).and_then(Value::as_str);
            let starred_sku = sku.is_some_and(|s| s.contains('*'));
            if !key.contains('*') && !starred_sku {
                continue;
            }

            let mut fixed = record.clone();
            if let (Some(sku), Value::Object(fields)) = (sku, &mut fixed) {
                fields.insert(FIELD_SKU.to_string(), Value::from(sku.replace('*', "")));
            }
            let tag = format!("{}/{}", section, key);

            if !key.contains('*') {
                let mut body = Map::new();
                body.insert(FIELD_SKU.to_string(), fixed[FIELD_SKU].clone());
                items.push(BatchItem::new(
                    tag.clone(),
                    vec![Operation::Patch {
                        path: tag,
                        body: Value::Object(body),
                    }],
                ));
                continue;
            }

            let clean = key.replace('*', "");
            if clean.is_empty() || records.contains_key(&clean) {
                collisions.push(tag);
                continue;
            }
            items.push(BatchItem::new(
                tag.clone(),
                vec![
                    Operation::Put {
                        path: format!("{}/{}", section, clean),
                        body: fixed,
                    },
                    Operation::Delete { path: tag },
                ],
            ));
        }
    }
    Ok((items, collisions))
}

fn pull_stem(path: &str) -> String {
    let segments = path_segments(path);
    if segments.is_empty() {
        "remote-root".to_string()
    } else {
        format!("remote-{}", segments.join("-"))
    }
}

pub async fn handle_command(
    cmd: RemoteCommands,
    config: &ToolConfig,
    database_url: Option<String>,
) -> Result<()> {
    let mut remote = config.remote.clone();
    if database_url.is_some() {
        remote.database_url = database_url;
    }
    let store = RestStore::new(&remote)?;
    run_command(cmd, config, &store).await
}

pub async fn run_command(
    cmd: RemoteCommands,
    config: &ToolConfig,
    store: &dyn RemoteStore,
) -> Result<()> {
    match cmd {
        RemoteCommands::Pull { path } => {
            let value = store.get(&path).await?;
            if value.is_null() {
                report::warning(format!("Nothing stored at '{}'", path));
            }
            let out = timestamped_path(&config.output_dir, &pull_stem(&path), "json", Local::now());
            write_json_pretty(&out, &value)?;
            report::done(format!("Pulled '{}' into {}", path, out.display()));
        },
        RemoteCommands::PushStock {
            input,
            only_keys,
            dry_run,
        } => {
            let input = resolve_input(&input, &config.snapshot_prefixes)?;
            let doc = load_document(&input, None)?;
            let keys = match &only_keys {
                Some(log) => Some(read_failure_log(log)?.into_iter().collect::<HashSet<_>>()),
                None => None,
            };
            let (items, missing) = push_stock_items(&doc, keys.as_ref());
            for key in &missing {
                report::warning(format!("{} is not a product in {}", key, input.display()));
            }
            info!("Pushing stock for {} products", items.len());

            if dry_run {
                report::examples(
                    "Products to update",
                    &items.iter().map(|i| i.key.as_str()).collect::<Vec<_>>(),
                    10,
                );
                report::dry_run();
                return Ok(());
            }
            let outcome = BatchUploader::new(store, config.throttle.clone())
                .run(&items)
                .await;
            report::field("Updated", outcome.succeeded);
            report::field("Failed", outcome.failures.len());
            if outcome.retryable > 0 {
                report::field("Worth retrying", outcome.retryable);
            }
            report::field("Throttle pauses", outcome.pauses);
            finish_batch("push-stock", &outcome, &config.output_dir)?;
            report::done(format!("{} products updated", outcome.succeeded));
        },
        RemoteCommands::StripAsterisks { dry_run } => {
            let (items, collisions) = strip_asterisk_items(store).await?;
            for tag in &collisions {
                warn!("{} collides with an existing record, left as is", tag);
            }
            report::examples("Collisions kept", &collisions, 20);

            if dry_run {
                report::examples(
                    "Records to move",
                    &items.iter().map(|i| i.key.as_str()).collect::<Vec<_>>(),
                    20,
                );
                report::dry_run();
                return Ok(());
            }
            let outcome = BatchUploader::new(store, config.throttle.clone())
                .run(&items)
                .await;
            report::field("Moved", outcome.succeeded);
            report::field("Failed", outcome.failures.len());
            if outcome.retryable > 0 {
                report::field("Worth retrying", outcome.retryable);
            }
            finish_batch("strip-asterisks", &outcome, &config.output_dir)?;
            report::done(format!("{} records cleaned", outcome.succeeded));
        },
    }
    Ok(())
}

//! Stock Model Library
//!
//! Pure inventory logic shared by the stockmerge jobs. Nothing here touches
//! the filesystem or the network: callers load a [`DatabaseDocument`] and a
//! list of [`InventoryItem`]s, run an operation, and decide what to write.
//!
//! # Modules
//!
//! - `sku`: normalization, containment matching, family patterns
//! - `matcher`: deterministic SKU index over a section
//! - `warehouse`: the closed set of warehouse codes
//! - `assignment`: quantity tiers to warehouse candidates
//! - `stock`: per-warehouse ledgers and sheet items
//! - `document`: whole-database and sub-path exports
//! - `record`: typed reads and stock writes on records
//! - `merge`: sheet items into products and spare parts
//! - `repair`: one-pass schema repairs
//! - `encoding`: mojibake repair
//! - `verify`: post-merge checks
//! - `pricing`: price-list comparison
//!
//! # Example
//!
//! ```
//! use stock_model::{normalize_sku, skus_match, MatchKind};
//!
//! assert_eq!(normalize_sku("tsr-23sd (n)"), "TSR23SDN");
//! assert_eq!(skus_match("TSR23SD", "TSR23SDN6", 4), Some(MatchKind::Containment));
//! ```

pub mod assignment;
pub mod document;
pub mod encoding;
pub mod error;
pub mod matcher;
pub mod merge;
pub mod pricing;
pub mod record;
pub mod repair;
pub mod sku;
pub mod stock;
pub mod verify;
pub mod warehouse;

// Re-exports for convenience
pub use assignment::{AssignmentPolicy, AssignmentTier, Selection, WarehouseAssigner};
pub use document::{safe_key, DatabaseDocument, DocumentScope, Section, SectionSummary};
pub use error::{ModelError, Result};
pub use matcher::{MatchOptions, MatchResult, SkuIndex};
pub use merge::{invariant_violations, MatchRecord, MergeOptions, MergeReport, StockMerger};
pub use pricing::{
    apply_price_updates, compare_prices, PriceComparison, PriceRow, PriceUpdate, UnmatchedPrice,
};
pub use record::{ProductView, SparePart};
pub use repair::RepairReport;
pub use sku::{normalize_sku, sku_pattern, skus_match, MatchKind, SkuNormalizer};
pub use stock::{Distribution, InventoryItem, StockLedger, WarehouseStockEntry};
pub use verify::{check_ledgers, verify_stock, StockMismatch, VerifyReport};
pub use warehouse::WarehouseCode;

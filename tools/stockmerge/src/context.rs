//! Tool configuration
//!
//! Loaded through `common::load_layered`: built-in defaults, then
//! `stockmerge.{toml,yaml,yml,json}` in `./` or `config/`, then `-c <file>`,
//! then `STOCKMERGE_*` environment variables (`__` separates nested keys,
//! e.g. `STOCKMERGE_THROTTLE__EVERY=20`).

use std::path::{Path, PathBuf};

use common::serde_helpers::bool_true;
use errors::{config_error, StockError, StockResult};
use serde::{Deserialize, Serialize};
use stock_model::{AssignmentPolicy, MatchOptions, Selection, SkuNormalizer, WarehouseAssigner};

pub const CONFIG_NAME: &str = "stockmerge";
pub const ENV_PREFIX: &str = "STOCKMERGE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Where timestamped snapshots and failure logs are written
    pub output_dir: PathBuf,
    /// Run log directory; unset logs to the console only
    pub log_dir: Option<PathBuf>,
    /// File name prefixes searched when an input path is a directory
    pub snapshot_prefixes: Vec<String>,
    pub matching: MatchingConfig,
    pub assignment: AssignmentConfig,
    pub sheet: SheetConfig,
    pub remote: RemoteConfig,
    pub throttle: ThrottleConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            log_dir: None,
            snapshot_prefixes: vec![
                "stock-merge".to_string(),
                "repaired".to_string(),
                "price-patched".to_string(),
                "database-export".to_string(),
            ],
            matching: MatchingConfig::default(),
            assignment: AssignmentConfig::default(),
            sheet: SheetConfig::default(),
            remote: RemoteConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Trailing tokens stripped during normalization (`AL`, `AR`)
    pub suffixes: Vec<String>,
    pub min_containment_len: usize,
    #[serde(default = "bool_true")]
    pub match_model: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            suffixes: Vec::new(),
            min_containment_len: stock_model::sku::DEFAULT_MIN_CONTAINMENT_LEN,
            match_model: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    pub selection: Selection,
    pub seed: u64,
    pub products: AssignmentPolicy,
    pub spare_parts: AssignmentPolicy,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            selection: Selection::First,
            seed: 0,
            products: AssignmentPolicy::products(),
            spare_parts: AssignmentPolicy::spare_parts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Rows searched for the header
    pub scan_rows: usize,
    /// SKUs this short or shorter are skipped
    pub min_sku_len: usize,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            scan_rows: 30,
            min_sku_len: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Database base URL, e.g. `https://example-rtdb.firebaseio.com`
    pub database_url: Option<String>,
    /// Sent as the `auth` query parameter
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Pause after this many requests
    pub every: usize,
    pub pause_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            every: 10,
            pause_ms: 500,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> StockError {
    StockError::InvalidConfig {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl ToolConfig {
    pub fn load(explicit: Option<&Path>) -> StockResult<Self> {
        let config: Self = common::load_layered(CONFIG_NAME, explicit, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StockResult<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(invalid("output_dir", "must not be empty"));
        }
        if self.throttle.every == 0 {
            return Err(invalid("throttle.every", "must be at least 1"));
        }
        if self.remote.timeout_secs == 0 {
            return Err(invalid("remote.timeout_secs", "must be at least 1"));
        }
        if self.sheet.scan_rows == 0 {
            return Err(invalid("sheet.scan_rows", "must be at least 1"));
        }
        if let Some(url) = &self.remote.database_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(invalid("remote.database_url", "must be an http(s) URL"));
            }
        }
        for (field, policy) in [
            ("assignment.products", &self.assignment.products),
            ("assignment.spare_parts", &self.assignment.spare_parts),
        ] {
            policy
                .validate()
                .map_err(|e| invalid(field, e.to_string()))?;
        }
        Ok(())
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            normalizer: SkuNormalizer::with_suffixes(&self.matching.suffixes),
            min_containment_len: self.matching.min_containment_len,
            match_model: self.matching.match_model,
            allow_containment: true,
        }
    }

    /// Product and spare-part assigners; `seed` overrides the configured one
    pub fn assigners(&self, seed: Option<u64>) -> StockResult<(WarehouseAssigner, WarehouseAssigner)> {
        let seed = seed.unwrap_or(self.assignment.seed);
        let build = |policy: &AssignmentPolicy| {
            WarehouseAssigner::new(policy.clone(), self.assignment.selection, seed)
                .map_err(|e| config_error!("assignment policy: {}", e))
        };
        Ok((
            build(&self.assignment.products)?,
            build(&self.assignment.spare_parts)?,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ToolConfig::default();
        config.validate().unwrap();
        assert_eq!(config.throttle.every, 10);
        assert_eq!(config.throttle.pause_ms, 500);
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.assignment.products, AssignmentPolicy::products());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = ToolConfig::default();
        config.throttle.every = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StockError::InvalidConfig { ref field, .. } if field == "throttle.every"));
        assert_eq!(err.exit_code(), 2);

        let mut config = ToolConfig::default();
        config.assignment.spare_parts.fallback.clear();
        config.assignment.spare_parts.tiers.clear();
        assert!(config.validate().is_err());

        let mut config = ToolConfig::default();
        config.remote.database_url = Some("ftp://x".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "matching:\n  suffixes: [AL, AR]\nthrottle:\n  every: 25\n";
        let config: ToolConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.throttle.every, 25);
        assert_eq!(config.throttle.pause_ms, 500);
        assert!(config.matching.match_model);
        assert_eq!(config.match_options().normalizer.normalize("T-49 AL"), "T49");
    }

    #[test]
    fn test_seed_override() {
        let mut config = ToolConfig::default();
        config.assignment.selection = Selection::Random;
        let (mut a, _) = config.assigners(Some(3)).unwrap();
        let (mut b, _) = config.assigners(Some(3)).unwrap();
        let left: Vec<_> = (1..50).map(|n| a.assign(n)).collect();
        let right: Vec<_> = (1..50).map(|n| b.assign(n)).collect();
        assert_eq!(left, right);
    }
}

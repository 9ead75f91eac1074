//! Layered configuration loading
//!
//! Priority (highest to lowest):
//! 1. Environment variables (`{PREFIX}_`, `__` separates nested keys)
//! 2. Explicit config file passed on the command line
//! 3. `config/{name}.{toml,yaml,yml,json}`
//! 4. `{name}.{toml,yaml,yml,json}` in the working directory
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use errors::{config_error, StockError, StockResult};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Candidate config files for `name`, lowest priority first
pub fn candidate_files(name: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in [PathBuf::from("."), PathBuf::from("config")] {
        for ext in ["toml", "yaml", "yml", "json"] {
            files.push(dir.join(format!("{}.{}", name, ext)));
        }
    }
    files
}

fn merge_file(figment: Figment, path: &Path) -> StockResult<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| config_error!("Config file must have an extension"))?;

    let merged = match extension {
        "toml" => figment.merge(Toml::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        "json" => figment.merge(Json::file(path)),
        _ => {
            return Err(StockError::Configuration(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };
    Ok(merged)
}

/// Load configuration for `name` on top of `T::default()`
///
/// `explicit` must exist when given; the discovered files are optional.
pub fn load_layered<T>(name: &str, explicit: Option<&Path>, env_prefix: &str) -> StockResult<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));

    for path in candidate_files(name) {
        if path.is_file() {
            debug!("Config file: {}", path.display());
            figment = merge_file(figment, &path)?;
        }
    }

    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(StockError::FileNotFound(path.display().to_string()));
        }
        info!("Using config file {}", path.display());
        figment = merge_file(figment, path)?;
    }

    figment = figment.merge(Env::prefixed(env_prefix).split("__"));

    figment
        .extract()
        .map_err(|e| config_error!("Failed to load configuration: {}", e))
}

/// Write a configuration value as YAML or JSON, chosen by extension
pub fn save_config_to_file<T, P>(config: &T, path: P) -> StockResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| config_error!("Config file must have an extension"))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = match extension {
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        _ => {
            return Err(StockError::Configuration(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        output_dir: String,
        every: usize,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                output_dir: "output".into(),
                every: 10,
            }
        }
    }

    #[test]
    fn test_defaults_when_no_files() {
        let loaded: Sample = load_layered("no-such-tool", None, "NO_SUCH_TOOL_").unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "every: 25\n").unwrap();

        let loaded: Sample = load_layered("no-such-tool", Some(&path), "NO_SUCH_TOOL_").unwrap();
        assert_eq!(loaded.every, 25);
        assert_eq!(loaded.output_dir, "output");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result: StockResult<Sample> = load_layered(
            "no-such-tool",
            Some(Path::new("/definitely/missing.toml")),
            "NO_SUCH_TOOL_",
        );
        assert!(matches!(result, Err(StockError::FileNotFound(_))));
    }

    #[test]
    fn test_save_and_reload_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("cfg.yaml");
        let sample = Sample {
            output_dir: "snapshots".into(),
            every: 3,
        };
        save_config_to_file(&sample, &path).unwrap();

        let loaded: Sample = load_layered("no-such-tool", Some(&path), "NO_SUCH_TOOL_").unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = save_config_to_file(&Sample::default(), "cfg.ini");
        assert!(matches!(result, Err(StockError::Configuration(_))));
    }
}

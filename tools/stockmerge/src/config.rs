//! `config` command: print or scaffold the tool configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use errors::StockError;
use tracing::info;

use crate::context::{ToolConfig, CONFIG_NAME, ENV_PREFIX};
use crate::report;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration after every layer is applied
    Show,

    /// Write the built-in defaults to a file
    Init {
        /// Target file (.yaml, .yml or .json)
        #[arg(default_value = "stockmerge.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Config as printed by `config show`; the auth token is masked
pub fn redacted(config: &ToolConfig) -> ToolConfig {
    let mut shown = config.clone();
    if shown.remote.auth_token.is_some() {
        shown.remote.auth_token = Some("********".to_string());
    }
    shown
}

pub fn handle_command(cmd: ConfigCommands, config: &ToolConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            println!(
                "{} defaults < {}.{{toml,yaml,json}} < -c <file> < {}* env",
                "Layers:".bright_cyan(),
                CONFIG_NAME,
                ENV_PREFIX
            );
            println!();
            print!("{}", serde_yaml::to_string(&redacted(config))?);
        },
        ConfigCommands::Init { path, force } => {
            if path.exists() && !force {
                return Err(StockError::InvalidParameter {
                    param: "path".into(),
                    reason: format!("{} exists, pass --force to overwrite", path.display()),
                }
                .into());
            }
            common::save_config_to_file(&ToolConfig::default(), &path)?;
            info!("Wrote default configuration to {}", path.display());
            report::done(format!("Configuration written to {}", path.display()));
        },
    }
    Ok(())
}

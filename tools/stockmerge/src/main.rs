//! stockmerge - inventory sheet and database export migration tool
//!
//! Merges warehouse stock spreadsheets into database exports, repairs the
//! exported schema and pushes stock changes to the hosted database.

mod config;
mod context;
mod core;
mod inspect;
mod prices;
mod remote;
mod repair;
mod report;
mod stock;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use common::logging::{self, LogConfig};
use errors::{config_error, StockError};
use tracing::{debug, Level};

use crate::context::ToolConfig;

#[derive(Parser)]
#[command(name = "stockmerge")]
#[command(about = "Inventory spreadsheet and database export migration tool")]
#[command(long_about = "Inventory spreadsheet and database export migration tool

Stock:
  merge       Merge a stock sheet into a database export
  match       Show how sheet codes match product SKUs
  assign      Place stocked records without a warehouse
  verify      Check a merged export against its sheet
  prices      Compare a price sheet with product prices

Maintenance:
  repair      One-pass schema repairs on an export
  inspect     Show sheet layout or document contents
  remote      Pull from or push to the hosted database
  config      Show or create the configuration file

Examples:
  stockmerge merge inventario.xlsx --db exports/
  stockmerge verify inventario.xlsx --db output/
  stockmerge repair --db output/ asterisks
  stockmerge remote push-stock --input output/

Use 'stockmerge <command> --help' for more information on a specific command.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (layered over ./stockmerge.* and config/stockmerge.*)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Output directory for snapshots and logs (overrides output_dir)
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a stock sheet into a database export
    Merge(stock::MergeArgs),

    /// Match sheet codes against product SKUs without writing anything
    Match(stock::MatchArgs),

    /// Place stocked records that have no warehouse
    Assign(stock::AssignArgs),

    /// Check a merged export against the sheet it came from
    Verify(stock::VerifyArgs),

    /// Compare a price sheet with product prices
    Prices(prices::PriceArgs),

    /// One-pass schema repairs
    Repair {
        #[command(flatten)]
        doc: stock::DocArgs,

        /// Print the report without writing a snapshot
        #[arg(long, global = true)]
        dry_run: bool,

        #[command(subcommand)]
        kind: repair::RepairCommands,
    },

    /// Inspect a sheet or a document
    Inspect {
        #[command(subcommand)]
        command: inspect::InspectCommands,
    },

    /// Hosted database jobs
    Remote {
        /// Database base URL (overrides remote.database_url)
        #[arg(long)]
        database_url: Option<String>,

        #[command(subcommand)]
        command: remote::RemoteCommands,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = run(cli).await {
        let code = match err.downcast_ref::<StockError>() {
            Some(e) => {
                eprintln!("{} [{}] {:#}", "ERROR".red(), e.error_code(), err);
                e.exit_code()
            },
            None => {
                eprintln!("{} {:#}", "ERROR".red(), err);
                1
            },
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ToolConfig::load(cli.config.as_deref())?;
    if let Some(out_dir) = cli.out_dir {
        config.output_dir = out_dir;
    }

    let _log_guard = logging::init_with_config(LogConfig {
        tool_name: context::CONFIG_NAME.to_string(),
        log_dir: config.log_dir.clone(),
        console_level: if cli.verbose { Level::DEBUG } else { Level::INFO },
        file_level: Level::DEBUG,
        enable_json: false,
        ansi: !cli.no_color,
    })
    .map_err(|e| config_error!("Failed to initialize logging: {}", e))?;
    debug!("Output directory: {}", config.output_dir.display());

    match cli.command {
        Commands::Merge(args) => stock::merge(args, &config)?,
        Commands::Match(args) => stock::match_sheet(args, &config)?,
        Commands::Assign(args) => stock::assign(args, &config)?,
        Commands::Verify(args) => stock::verify(args, &config)?,
        Commands::Prices(args) => prices::prices(args, &config)?,
        Commands::Repair { doc, dry_run, kind } => repair::repair(kind, &doc, dry_run, &config)?,
        Commands::Inspect { command } => inspect::handle_command(command, &config)?,
        Commands::Remote {
            database_url,
            command,
        } => remote::handle_command(command, &config, database_url).await?,
        Commands::Config { command } => config::handle_command(command, &config)?,
    }

    Ok(())
}

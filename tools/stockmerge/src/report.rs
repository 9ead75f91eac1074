//! Console report helpers

use std::fmt::Display;
use std::path::Path;

use colored::*;
use stock_model::DocumentScope;

pub fn header(title: &str) {
    println!();
    println!("{}", "=".repeat(60).bright_blue());
    println!("{:^60}", title.bright_yellow());
    println!("{}", "=".repeat(60).bright_blue());
}

pub fn ok(message: impl Display) {
    println!("{} {}", "OK".green(), message);
}

pub fn fail(message: impl Display) {
    println!("{} {}", "FAIL".red(), message);
}

pub fn warning(message: impl Display) {
    println!("{} {}", "WARNING".yellow(), message);
}

pub fn done(message: impl Display) {
    println!("\n{} {}", "DONE".green(), message);
}

/// `label: value` with a padded label
pub fn field(label: &str, value: impl Display) {
    println!("  {:<28} {}", format!("{}:", label), value);
}

/// First `limit` entries, then a count of the rest
pub fn examples<T: Display>(title: &str, entries: &[T], limit: usize) {
    if entries.is_empty() {
        return;
    }
    println!("  {} ({}):", title.bright_cyan(), entries.len());
    for entry in entries.iter().take(limit) {
        println!("    - {}", entry);
    }
    if entries.len() > limit {
        println!("    ... and {} more", entries.len() - limit);
    }
}

pub fn written(path: &Path, scope: DocumentScope) {
    println!("\n{} {}", "Saved:".bright_cyan(), path.display());
    println!(
        "  Import it with \"Import JSON\" at {}",
        scope.import_path().bright_yellow()
    );
}

pub fn dry_run() {
    println!("\n{} Dry run, nothing written", "WARNING".yellow());
}

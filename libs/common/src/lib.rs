//! Shared foundation for the stockmerge tools
//!
//! - logging setup (console + run log file)
//! - layered configuration loading
//! - lenient serde helpers for loosely typed exports

pub mod config_loader;
pub mod logging;
pub mod serde_helpers;

pub use config_loader::{load_layered, save_config_to_file};
pub use logging::{LogConfig, LogGuard};

// Re-export common dependencies
pub use anyhow;
pub use serde;
pub use serde_json;

//! Logging setup for the stockmerge tools
//!
//! Console output always goes through the bracketed formatter. When a log
//! directory is configured, every event is also appended to
//! `{YYYYMMDD}_{tool}.log` through a non-blocking writer so long batch runs
//! leave a trace the operator can review afterwards.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-10-16T09:12:44.809Z [INFO] Loaded 812 products`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Tool name, used in the log file name and the default filter
    pub tool_name: String,
    /// Directory for the run log; `None` logs to the console only
    pub log_dir: Option<PathBuf>,
    /// Console log level
    pub console_level: Level,
    /// File log level
    pub file_level: Level,
    /// Write the file log as JSON lines
    pub enable_json: bool,
    /// Emit ANSI colors on the console
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            tool_name: "stockmerge".to_string(),
            log_dir: None,
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            enable_json: false,
            ansi: true,
        }
    }
}

/// Keeps the non-blocking file writer alive; dropping it flushes the log.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
    /// Path of the run log, if one was opened
    pub log_file: Option<PathBuf>,
}

/// Path of the log file for `tool_name` written today
pub fn log_file_path(log_dir: &Path, tool_name: &str) -> PathBuf {
    let date = chrono::Local::now().format("%Y%m%d");
    log_dir.join(format!("{}_{}.log", date, tool_name))
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Build the console filter. `RUST_LOG` wins when it is set.
fn console_filter(config: &LogConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(spec) => EnvFilter::new(spec),
        Err(_) => EnvFilter::new(format!(
            "warn,{}={},stock_model={},common={}",
            config.tool_name.replace('-', "_"),
            config.console_level.as_str().to_lowercase(),
            config.console_level.as_str().to_lowercase(),
            config.console_level.as_str().to_lowercase(),
        )),
    }
}

fn file_filter(config: &LogConfig) -> EnvFilter {
    let level = config.file_level.as_str().to_lowercase();
    EnvFilter::new(format!(
        "warn,{}={},stock_model={},common={}",
        config.tool_name.replace('-', "_"),
        level,
        level,
        level
    ))
}

/// Initialize logging system with configuration
pub fn init_with_config(config: LogConfig) -> Result<LogGuard, Box<dyn std::error::Error>> {
    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .event_format(BracketedLevelFormat)
        .with_filter(console_filter(&config))
        .boxed();

    let (file_layer, guard, log_file) = match &config.log_dir {
        Some(dir) => {
            let path = log_file_path(dir, &config.tool_name);
            let file = open_log_file(&path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);

            let layer = if config.enable_json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_level(true)
                    .with_target(true)
                    .with_filter(file_filter(&config))
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .with_filter(file_filter(&config))
                    .boxed()
            };
            (Some(layer), Some(guard), Some(path))
        },
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(path) = &log_file {
        tracing::debug!("Run log: {}", path.display());
    }

    Ok(LogGuard {
        _file: guard,
        log_file,
    })
}

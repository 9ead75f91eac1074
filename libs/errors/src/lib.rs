//! Unified error handling for the stockmerge tools
//!
//! One error enum shared by the CLI and the support libraries. Each variant
//! belongs to an [`ErrorCategory`], which in turn decides the process exit
//! code and whether an operator can simply rerun the failed step.

use thiserror::Error;

// ============================================================================
// StockError - Main error type
// ============================================================================

/// Main error type for the stockmerge workspace
#[derive(Debug, Error)]
pub enum StockError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ======================================
    // File & IO Errors
    // ======================================
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No snapshot matching '{prefix}' in {dir}")]
    SnapshotNotFound { dir: String, prefix: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ======================================
    // Parsing & Serialization Errors
    // ======================================
    #[error("Parse error in {file}: {error}")]
    ParseError { file: String, error: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ======================================
    // Spreadsheet Errors
    // ======================================
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Sheet '{0}' not found in workbook")]
    SheetNotFound(String),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    // ======================================
    // Data Errors
    // ======================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid parameter: {param}: {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("Section '{0}' not found in document")]
    SectionMissing(String),

    #[error("Verification failed: {0} check(s) did not pass")]
    VerificationFailed(usize),

    // ======================================
    // Remote Store Errors
    // ======================================
    #[error("Remote request failed: {method} {path}: HTTP {status}")]
    Remote {
        method: String,
        path: String,
        status: u16,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    #[error("{failed} of {total} remote operation(s) failed, see {log}")]
    PartialFailure {
        failed: usize,
        total: usize,
        log: String,
    },

    // ======================================
    // System Errors
    // ======================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type using StockError
pub type StockResult<T> = Result<T, StockError>;

impl StockError {
    /// Classification used for exit codes and log levels
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::MissingConfig(_) => {
                ErrorCategory::Configuration
            },

            Self::FileNotFound(_) | Self::SnapshotNotFound { .. } | Self::SheetNotFound(_) => {
                ErrorCategory::NotFound
            },

            Self::Io(_) => ErrorCategory::Io,

            Self::ParseError { .. }
            | Self::Serialization(_)
            | Self::Deserialization(_)
            | Self::Spreadsheet(_)
            | Self::UnsupportedFormat(_) => ErrorCategory::Input,

            Self::Validation(_)
            | Self::InvalidParameter { .. }
            | Self::SectionMissing(_)
            | Self::VerificationFailed(_) => ErrorCategory::Validation,

            Self::Remote { .. } | Self::HttpClient(_) | Self::PartialFailure { .. } => {
                ErrorCategory::Remote
            },

            Self::Timeout(_) => ErrorCategory::Timeout,

            Self::Internal(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable code for logs and failure files
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::MissingConfig(_) => "MISSING_CONFIG",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::SnapshotNotFound { .. } => "SNAPSHOT_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Deserialization(_) => "DESERIALIZATION_ERROR",
            Self::Spreadsheet(_) => "SPREADSHEET_ERROR",
            Self::SheetNotFound(_) => "SHEET_NOT_FOUND",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::SectionMissing(_) => "SECTION_MISSING",
            Self::VerificationFailed(_) => "VERIFICATION_FAILED",
            Self::Remote { .. } => "REMOTE_ERROR",
            Self::HttpClient(_) => "HTTP_CLIENT_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::PartialFailure { .. } => "PARTIAL_FAILURE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
    }

    /// Check if rerunning the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            Self::HttpClient(err) => err.is_timeout() || err.is_connect(),
            _ => matches!(self.category(), ErrorCategory::Timeout),
        }
    }

    /// Process exit code for this error
    ///
    /// `1` for missing or unusable input, `2` for bad configuration and
    /// `3` when remote work was left incomplete.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Remote | ErrorCategory::Timeout => 3,
            _ => 1,
        }
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for StockError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::Deserialization(err.to_string())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

impl From<serde_yaml::Error> for StockError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<std::num::ParseIntError> for StockError {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::Validation(format!("Invalid integer: {}", err))
    }
}

impl From<std::num::ParseFloatError> for StockError {
    fn from(err: std::num::ParseFloatError) -> Self {
        Self::Validation(format!("Invalid float: {}", err))
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::StockError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::StockError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::StockError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::StockError::Validation(format!($fmt, $($arg)*))
    };
}

// ============================================================================
// Error categories
// ============================================================================

/// Error category enum - used for classification and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    NotFound,
    Io,
    Input,
    Validation,
    Remote,
    Timeout,
    Internal,
}

//! CLI-specific error types and exit code mapping

use depscan_core::error::{DepscanError, ScanError};
use depscan_scanner::ScannerError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The scan target could not be opened (missing path, daemon unreachable, not a repository).
    #[error("cannot access scan target: {0}")]
    SourceAccess(String),

    /// The scan itself failed after the target was opened.
    #[error("scan error: {0}")]
    Scan(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file write, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                        |
    /// |------|--------------------------------|
    /// | 0    | Success                        |
    /// | 1    | General / command / scan error |
    /// | 2    | Configuration error            |
    /// | 3    | Scan target not accessible     |
    /// | 10   | IO error                       |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::SourceAccess(_) => 3,
            Self::Io(_) => 10,
            Self::Command(_) | Self::Scan(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<DepscanError> for CliError {
    fn from(e: DepscanError) -> Self {
        match e {
            DepscanError::Config(c) => Self::Config(c.to_string()),
            DepscanError::Scan(ScanError::SourceAccess(msg)) => Self::SourceAccess(msg),
            DepscanError::Scan(s) => Self::Scan(s.to_string()),
            DepscanError::Io(io) => Self::Io(io),
        }
    }
}

impl From<ScannerError> for CliError {
    fn from(e: ScannerError) -> Self {
        DepscanError::from(e).into()
    }
}

//! Unified error types for the sprawl workspace.
//!
//! [`SprawlError`] is the common error representation shared by every crate
//! in the workspace. Domain layers construct the specific variants; the
//! batch driver and CLI convert everything into `anyhow` at their
//! boundaries. Nothing in the simulator recovers from an error silently:
//! every variant here is fatal to the run that raised it.

use thiserror::Error;

/// Unified error type for all simulator operations.
#[derive(Error, Debug)]
pub enum SprawlError {
    /// I/O errors (raster files, checkpoint files, log files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing errors (scenario values, raster headers, binary records)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input-data invariant violations (dimension mismatch, bad land class,
    /// all-urban seed, divide-by-zero in derived surfaces)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Grid pool failures (stack underflow, sentinel corruption)
    #[error("Pool error: {0}")]
    Pool(String),

    /// Scenario/configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using SprawlError.
pub type SprawlResult<T> = Result<T, SprawlError>;

impl From<anyhow::Error> for SprawlError {
    fn from(err: anyhow::Error) -> Self {
        SprawlError::Other(err.to_string())
    }
}

impl From<String> for SprawlError {
    fn from(s: String) -> Self {
        SprawlError::Other(s)
    }
}

impl From<&str> for SprawlError {
    fn from(s: &str) -> Self {
        SprawlError::Other(s.to_string())
    }
}

//! Error types for dbpeak-core.

use thiserror::Error;

/// Main error type for the dbpeak-core library.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing file, bad TOML, failed validation)
    #[error("configuration error: {0}")]
    Config(String),

    /// Controller rejected our credentials. Unlike transient fetch failures
    /// this is fatal: every subsequent tick would fail identically.
    #[error("controller rejected credentials (HTTP {0})")]
    AuthRejected(u16),

    /// Failure while building the HTTP client itself (transport-level
    /// failures during a fetch are swallowed, not surfaced here).
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Report rendering error (PNG encoding, CSV writer)
    #[error("report error: {0}")]
    Report(String),

    /// Mail assembly or delivery error
    #[error("mail error: {0}")]
    Mail(String),
}

/// Result type alias for dbpeak-core.
pub type Result<T> = std::result::Result<T, Error>;

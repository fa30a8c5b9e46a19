//! Error types for the hatnode binary.
//!
//! [`AppError`] wraps every failure mode during startup and serving.

use hatnode_core::config::ConfigError;
use hatnode_core::hardware::HardwareError;
use hatnode_server::ServerError;

/// Top-level error for the hatnode binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The configured hardware could not be opened.
    #[error("hardware error: {source}")]
    Hardware {
        /// The underlying driver error.
        #[from]
        source: HardwareError,
    },

    /// The poller thread could not be started.
    #[error("poller thread error: {source}")]
    Poller {
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}

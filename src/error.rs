//! Error types for the farming console.

use thiserror::Error;

/// Errors surfaced by the console library.
///
/// Inside the tracker's per-block processing these are caught and logged;
/// only `start()` preconditions reach the caller directly.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete configuration (e.g. no reward address);
    /// tracking cannot start.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// RPC transport failure (disconnected node, timeout, bad response).
    #[error("chain RPC error: {0}")]
    Network(String),

    /// Malformed on-chain data (digest log, event record).
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Ledger load/save failure.
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// Key generation or address encoding failure.
    #[error("crypto error: {0}")]
    Crypto(String),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

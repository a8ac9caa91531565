//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (artifact file)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid event record
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Block not found
    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    /// Block rejected on append (index or linkage mismatch)
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Persisted artifact could not be reconstructed (strict recovery only)
    #[error("Corrupted ledger artifact: {0}")]
    Corrupted(String),

    /// Nonce search stopped by deadline or cancellation
    #[error("Seal aborted after {attempts} attempts: {reason}")]
    SealAborted {
        /// Why the search stopped
        reason: String,
        /// Nonces tried before stopping
        attempts: u64,
    },

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Error types for Canopy.

use thiserror::Error;

/// Result type alias using CanopyError.
pub type Result<T> = std::result::Result<T, CanopyError>;

/// Errors that can occur in Canopy operations.
#[derive(Debug, Error)]
pub enum CanopyError {
    // Index errors
    #[error("erase from empty tree")]
    Underflow,

    #[error("cursor does not reference a live entry")]
    InvalidCursor,

    #[error("stale cursor: minted at generation {minted}, tree is at {current}")]
    StaleCursor { minted: u64, current: u64 },

    #[error("tree order must be at least 2, got {0}")]
    InvalidOrder(usize),

    #[error("tree corrupted: {0}")]
    Corrupted(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Driver errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

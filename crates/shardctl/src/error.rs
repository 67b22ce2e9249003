//! Shard controller error types

use crate::config::Gid;
use thiserror::Error;

/// Shard controller errors
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Shard {shard} out of range (shard count {n_shards})")]
    ShardOutOfRange { shard: usize, n_shards: usize },

    #[error("Unknown group: {0}")]
    UnknownGroup(Gid),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Codec error: {0}")]
    Codec(String),
}

/// Result type for shard controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

impl From<serde_json::Error> for ControllerError {
    fn from(e: serde_json::Error) -> Self {
        ControllerError::Codec(e.to_string())
    }
}

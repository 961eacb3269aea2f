//! Error types for the shardindex engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Stale cache artifact: {0}")]
    StaleCache(std::path::PathBuf),

    #[error("Tokenizer timeout in zone {zone}: estimated {elapsed_ms}ms exceeds {threshold_ms}ms")]
    TokenizerTimeout {
        zone: String,
        elapsed_ms: u64,
        threshold_ms: u64,
    },
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

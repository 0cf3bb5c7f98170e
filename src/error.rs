//! Error types for edgesim

use thiserror::Error;

/// Core error type for simulator operations
#[derive(Error, Debug)]
pub enum EdgesimError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model persistence error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EdgesimError>;

//! Error types for the Flightdeck state store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    /// Another run holds the database's file lock.
    #[error("state database {} is in use by another run", .0.display())]
    Locked(PathBuf),

    #[error("no state database at {}", .0.display())]
    Missing(PathBuf),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("failed to create configuration: {0}")]
    Create(String),

    #[error("asset {name} not found for {deployment}")]
    AssetNotFound { deployment: String, name: String },
}

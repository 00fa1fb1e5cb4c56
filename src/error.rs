//! Error types for the announcement feed.

use crate::composer::DraftField;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Store already exists: {0}")]
    StoreExists(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// A draft was rejected before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required field(s): {}", join_fields(.missing))]
pub struct ValidationError {
    /// Every blank required field, in form order.
    pub missing: Vec<DraftField>,
}

fn join_fields(fields: &[DraftField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why posting an announcement failed.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not post the announcement: {0}")]
    Submission(#[source] StoreError),
}

/// Errors from a viewer session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is detached")]
    Detached,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

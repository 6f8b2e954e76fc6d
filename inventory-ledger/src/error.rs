//! Error types for the ledger

use crate::types::{ItemId, WarehouseId};
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed draft: missing warehouse, bad quantity, duplicate code, etc.
    /// Always raised before any mutation; the caller can resubmit.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A debit would drive a balance below zero.
    #[error(
        "Insufficient stock for {sku} at warehouse {warehouse}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        /// Warehouse being debited
        warehouse: WarehouseId,
        /// Offending item
        item: ItemId,
        /// Item SKU for display
        sku: String,
        /// Quantity the operation tried to remove
        requested: i64,
        /// Quantity actually on hand
        available: i64,
    },

    /// Reversing a transaction would drive a balance below zero because
    /// later transactions already consumed the stock it supplied.
    #[error(
        "Reversal would leave negative stock for item {item} at warehouse {warehouse}: requested {requested}, available {available}"
    )]
    NegativeBalance {
        /// Affected warehouse
        warehouse: WarehouseId,
        /// Affected item
        item: ItemId,
        /// Quantity the reversal tried to remove
        requested: i64,
        /// Quantity actually on hand
        available: i64,
    },

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    NotFound(Uuid),

    /// Invariant violation (balance drifted from the journal)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

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

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

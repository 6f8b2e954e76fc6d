//! Warehouse inventory ledger
//!
//! Records stock movements (receipts, issues, inter-warehouse transfers,
//! physical-count adjustments), maintains per-(warehouse, item) on-hand
//! balances, supports edit/delete of historical movements via compensating
//! updates, and answers on-hand, stock-card, and threshold-alert queries.
//!
//! # Architecture
//!
//! - **Single writer**: one actor task owns the write path; create, update,
//!   and delete are serialized critical sections
//! - **Atomic commits**: every operation lands as one RocksDB `WriteBatch` -
//!   all of a transaction's balance rows apply, or none do
//! - **Soft delete**: reversed movements stay in the journal, flagged
//!   `Reversed`, preserving the audit trail
//!
//! # Invariants
//!
//! - Conservation: every balance equals the sum of signed effects of all
//!   applied journal rows
//! - Non-negativity: no committed operation drives a balance below zero
//! - Atomicity: a multi-line movement applies fully or not at all

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

mod actor;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod reporting;
pub mod storage;
pub mod types;

// Re-exports
pub use catalog::{Catalog, Employee, Item, Supplier, Threshold, Warehouse};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use reporting::Reporting;
pub use storage::Storage;
pub use types::{
    ActorId, BalanceKey, ItemId, Line, LineDraft, StockTransaction, TransactionCode,
    TransactionDraft, TransactionPatch, TransactionStatus, TransactionType, WarehouseId,
};

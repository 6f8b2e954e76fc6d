//! Core types for the inventory ledger
//!
//! All journal records are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for costs, i64 for quantities)
//! - One closed enum per behavior axis (transaction kind, status)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Warehouse identifier (owned by external master data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WarehouseId(pub u32);

impl fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item (product variant) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supplier identifier (pass-through counterparty)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupplierId(pub u32);

/// Employee identifier (pass-through counterparty)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub u32);

/// Identifier of the user performing an operation, carried into audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key for one on-hand balance row.
///
/// `Ord` by (warehouse, item) so multi-row commits touch rows in a fixed,
/// deterministic order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BalanceKey {
    /// Warehouse half of the key
    pub warehouse: WarehouseId,
    /// Item half of the key
    pub item: ItemId,
}

impl BalanceKey {
    /// Create a balance key
    pub fn new(warehouse: WarehouseId, item: ItemId) -> Self {
        Self { warehouse, item }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(warehouse {}, item {})", self.warehouse, self.item)
    }
}

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionType {
    /// Goods received into `warehouse_to`
    Receipt = 1,
    /// Goods issued out of `warehouse_from`
    Issue = 2,
    /// Goods moved from `warehouse_from` to `warehouse_to`
    Transfer = 3,
    /// Physical-count correction at `warehouse_from`; line quantities are
    /// signed deltas (counted minus system)
    Adjustment = 4,
}

impl TransactionType {
    /// Two-letter code prefix, preserved from the original system
    /// (NK = receipt, XK = issue, CK = transfer, KK = stocktake).
    pub fn code_prefix(&self) -> &'static str {
        match self {
            TransactionType::Receipt => "NK",
            TransactionType::Issue => "XK",
            TransactionType::Transfer => "CK",
            TransactionType::Adjustment => "KK",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Receipt => "RECEIPT",
            TransactionType::Issue => "ISSUE",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Adjustment => "ADJUSTMENT",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a journal row.
///
/// Rows are never physically removed: a deleted transaction has its effect
/// reversed and is flipped to `Reversed`, preserving the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Balances reflect this transaction's effect exactly once
    Applied = 1,
    /// Balances reflect zero net effect from this transaction
    Reversed = 2,
}

/// Human-readable transaction code, unique across the journal.
///
/// Format: `<prefix><YYMMDD>-<6 digits>`, e.g. `NK260830-374912`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionCode(String);

impl TransactionCode {
    /// Wrap a caller-supplied code
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generate a fresh code for `kind` dated `date` with a random suffix
    pub fn generate(kind: TransactionType, date: NaiveDate) -> Self {
        let suffix: u32 = rand::Rng::gen_range(&mut rand::thread_rng(), 100_000..1_000_000);
        Self(format!(
            "{}{}-{}",
            kind.code_prefix(),
            date.format("%y%m%d"),
            suffix
        ))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One item + quantity entry within a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Line number within the transaction, 1-based
    pub id: u32,
    /// Item being moved
    pub item: ItemId,
    /// Moved quantity: strictly positive for receipt/issue/transfer,
    /// nonzero signed delta for adjustment
    pub quantity: i64,
    /// Unit cost, informational (reporting only, never a balance invariant)
    pub unit_cost: Decimal,
}

/// Line item as submitted by a caller, before ids are assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDraft {
    /// Item being moved
    pub item: ItemId,
    /// Moved quantity (sign rules as on [`Line::quantity`])
    pub quantity: i64,
    /// Unit cost
    pub unit_cost: Decimal,
}

/// A committed stock movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransaction {
    /// Unique id (UUIDv7, time-ordered; also the cardex tie-breaker)
    pub id: Uuid,

    /// Unique human-readable code
    pub code: TransactionCode,

    /// Movement kind
    pub kind: TransactionType,

    /// Movement date (business date; the journal also keeps `created_at`)
    pub date: NaiveDate,

    /// Source warehouse (issue/transfer; the adjusted warehouse for
    /// adjustments)
    pub warehouse_from: Option<WarehouseId>,

    /// Destination warehouse (receipt/transfer)
    pub warehouse_to: Option<WarehouseId>,

    /// Supplier reference, pass-through
    pub supplier: Option<SupplierId>,

    /// Employee reference, pass-through
    pub employee: Option<EmployeeId>,

    /// Free-text note
    pub note: String,

    /// Ordered line items; never empty once committed
    pub lines: Vec<Line>,

    /// Applied or Reversed
    pub status: TransactionStatus,

    /// When the row was committed
    pub created_at: DateTime<Utc>,

    /// Who committed the row
    pub created_by: ActorId,
}

impl StockTransaction {
    /// Signed effect of this transaction on every balance row it touches,
    /// aggregated across lines.
    ///
    /// This is the single source of truth for apply, reverse, sufficiency
    /// checks, and conservation verification.
    pub fn balance_effects(&self) -> BTreeMap<BalanceKey, i64> {
        let mut effects: BTreeMap<BalanceKey, i64> = BTreeMap::new();
        for line in &self.lines {
            match self.kind {
                TransactionType::Receipt => {
                    if let Some(to) = self.warehouse_to {
                        *effects.entry(BalanceKey::new(to, line.item)).or_insert(0) +=
                            line.quantity;
                    }
                }
                TransactionType::Issue => {
                    if let Some(from) = self.warehouse_from {
                        *effects.entry(BalanceKey::new(from, line.item)).or_insert(0) -=
                            line.quantity;
                    }
                }
                TransactionType::Transfer => {
                    if let (Some(from), Some(to)) = (self.warehouse_from, self.warehouse_to) {
                        *effects.entry(BalanceKey::new(from, line.item)).or_insert(0) -=
                            line.quantity;
                        *effects.entry(BalanceKey::new(to, line.item)).or_insert(0) +=
                            line.quantity;
                    }
                }
                TransactionType::Adjustment => {
                    if let Some(at) = self.warehouse_from {
                        *effects.entry(BalanceKey::new(at, line.item)).or_insert(0) +=
                            line.quantity;
                    }
                }
            }
        }
        effects
    }

    /// Negation of [`balance_effects`](Self::balance_effects): the
    /// compensating deltas that undo this transaction.
    pub fn inverse_effects(&self) -> BTreeMap<BalanceKey, i64> {
        self.balance_effects()
            .into_iter()
            .map(|(key, delta)| (key, -delta))
            .collect()
    }

    /// Warehouses this transaction touches (1 or 2 entries)
    pub fn warehouses(&self) -> impl Iterator<Item = WarehouseId> + '_ {
        self.warehouse_from.into_iter().chain(self.warehouse_to)
    }
}

/// Caller input for creating a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    /// Movement kind
    pub kind: TransactionType,
    /// Movement date
    pub date: NaiveDate,
    /// Source warehouse, per kind requirements
    pub warehouse_from: Option<WarehouseId>,
    /// Destination warehouse, per kind requirements
    pub warehouse_to: Option<WarehouseId>,
    /// Supplier reference, pass-through
    pub supplier: Option<SupplierId>,
    /// Employee reference, pass-through
    pub employee: Option<EmployeeId>,
    /// Free-text note
    pub note: String,
    /// Explicit code; generated from kind + date when absent
    pub code: Option<TransactionCode>,
    /// Line items
    pub lines: Vec<LineDraft>,
}

/// Caller input for editing a transaction.
///
/// Kind, code, and warehouse references are immutable after creation;
/// only date, counterparties, note, and lines may change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    /// New movement date
    pub date: NaiveDate,
    /// New supplier reference
    pub supplier: Option<SupplierId>,
    /// New employee reference
    pub employee: Option<EmployeeId>,
    /// New note
    pub note: String,
    /// Replacement line set
    pub lines: Vec<LineDraft>,
}

//! Main ledger orchestration layer
//!
//! This module ties together storage, validation, and the single-writer
//! actor into a high-level API for stock movement processing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use inventory_ledger::{audit::TracingAuditSink, Catalog, Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> inventory_ledger::Result<()> {
//!     let config = Config::default();
//!     let catalog = Catalog::default();
//!     let ledger = Ledger::open(config, catalog, Arc::new(TracingAuditSink)).await?;
//!
//!     // let txn = ledger.create_transaction(draft, actor).await?;
//!
//!     ledger.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    audit::{AuditAction, AuditEvent, AuditSink},
    metrics::Metrics,
    storage::CommitBatch,
    types::{
        ActorId, BalanceKey, Line, StockTransaction, TransactionCode, TransactionDraft,
        TransactionPatch, TransactionStatus, TransactionType,
    },
    Catalog, Config, Error, Result, Storage,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for the serialized write path
    handle: LedgerHandle,

    /// Writer task, joined on shutdown so the actor's storage reference
    /// is released before the database closes
    writer: tokio::task::JoinHandle<()>,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Master data shared with the reporting adapter
    catalog: Arc<Catalog>,

    /// Operation counters and latencies
    metrics: Metrics,
}

impl Ledger {
    /// Open the ledger: storage, metrics, and the writer actor
    pub async fn open(
        config: Config,
        catalog: Catalog,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let catalog = Arc::new(catalog);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {e}")))?;

        let core = LedgerCore {
            storage: storage.clone(),
            catalog: catalog.clone(),
            audit,
            metrics: metrics.clone(),
            code_retry_attempts: config.code_retry_attempts,
        };
        let (handle, writer) = spawn_ledger_actor(core);

        Ok(Self {
            handle,
            writer,
            storage,
            catalog,
            metrics,
        })
    }

    /// Validate and apply a new stock movement
    pub async fn create_transaction(
        &self,
        draft: TransactionDraft,
        actor: ActorId,
    ) -> Result<StockTransaction> {
        self.handle.create_transaction(draft, actor).await
    }

    /// Edit a committed movement via a compensating update
    pub async fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
        actor: ActorId,
    ) -> Result<StockTransaction> {
        self.handle.update_transaction(id, patch, actor).await
    }

    /// Reverse a committed movement (soft delete: the journal row stays,
    /// flagged `Reversed`)
    pub async fn delete_transaction(&self, id: Uuid, actor: ActorId) -> Result<()> {
        self.handle.delete_transaction(id, actor).await
    }

    /// Get one journal row by id
    pub fn get_transaction(&self, id: Uuid) -> Result<StockTransaction> {
        self.storage.get_transaction(id)
    }

    /// Full journal, newest first (reversed rows included)
    pub fn transactions(&self) -> Result<Vec<StockTransaction>> {
        self.storage.transactions()
    }

    /// Current on-hand quantity for one (warehouse, item) pair
    pub fn balance(&self, key: BalanceKey) -> Result<i64> {
        self.storage.balance(key)
    }

    /// Check the conservation invariant: every balance row must equal the
    /// sum of signed effects of all applied journal rows. Runs inside the
    /// writer so no mutation can interleave with the check.
    pub async fn verify_conservation(&self) -> Result<()> {
        self.handle.verify_conservation().await
    }

    /// Read-only reporting adapter sharing this ledger's stores
    pub fn reporting(&self) -> crate::Reporting {
        crate::Reporting::new(self.storage.clone(), self.catalog.clone())
    }

    /// Metrics registry for scraping
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Drain the writer and close storage. The database lock is released
    /// by the time this returns, so the same data directory can be
    /// reopened immediately.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await?;
        let Self {
            writer, storage, ..
        } = self;
        writer
            .await
            .map_err(|e| Error::Concurrency(format!("Ledger writer task failed: {e}")))?;
        storage.close();
        Ok(())
    }
}

/// The write-path engine, owned by the actor task.
///
/// All three mutating operations share the same shape: validate everything
/// against current state, then commit one atomic batch. Nothing is mutated
/// before every check has passed.
pub(crate) struct LedgerCore {
    pub(crate) storage: Arc<Storage>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) metrics: Metrics,
    pub(crate) code_retry_attempts: u32,
}

impl LedgerCore {
    pub(crate) fn create_transaction(
        &self,
        draft: TransactionDraft,
        actor: ActorId,
    ) -> Result<StockTransaction> {
        let timer = self.metrics.commit_duration.start_timer();
        let result = self.create_inner(draft, actor);
        timer.observe_duration();

        match &result {
            Ok(txn) => {
                self.metrics.applied_total.inc();
                tracing::info!(
                    code = %txn.code,
                    kind = %txn.kind,
                    lines = txn.lines.len(),
                    "Transaction applied"
                );
                self.audit.record(AuditEvent::new(
                    actor,
                    AuditAction::Created,
                    txn.id,
                    None,
                    Some(txn.clone()),
                ));
            }
            Err(e) => {
                self.metrics.rejections_total.inc();
                tracing::warn!(error = %e, "Create rejected");
            }
        }
        result
    }

    fn create_inner(&self, draft: TransactionDraft, actor: ActorId) -> Result<StockTransaction> {
        self.validate_warehouses(draft.kind, draft.warehouse_from, draft.warehouse_to)?;
        let lines = self.validate_lines(draft.kind, &draft.lines)?;
        let code = self.resolve_code(draft.code, draft.kind, draft.date)?;

        let txn = StockTransaction {
            id: Uuid::now_v7(),
            code,
            kind: draft.kind,
            date: draft.date,
            warehouse_from: draft.warehouse_from,
            warehouse_to: draft.warehouse_to,
            supplier: draft.supplier,
            employee: draft.employee,
            note: draft.note,
            lines,
            status: TransactionStatus::Applied,
            created_at: Utc::now(),
            created_by: actor,
        };

        // Two-phase: every pair checked before any row is written
        let balances = self.check_and_sum(&txn.balance_effects(), false)?;

        self.storage.commit(CommitBatch {
            transaction: &txn,
            prior: None,
            balances: &balances,
            register_code: true,
        })?;

        Ok(txn)
    }

    pub(crate) fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
        actor: ActorId,
    ) -> Result<StockTransaction> {
        let timer = self.metrics.commit_duration.start_timer();
        let result = self.update_inner(id, patch);
        timer.observe_duration();

        match &result {
            Ok((before, after)) => {
                self.metrics.updated_total.inc();
                tracing::info!(code = %after.code, "Transaction updated");
                self.audit.record(AuditEvent::new(
                    actor,
                    AuditAction::Updated,
                    after.id,
                    Some(before.clone()),
                    Some(after.clone()),
                ));
            }
            Err(e) => {
                self.metrics.rejections_total.inc();
                tracing::warn!(transaction_id = %id, error = %e, "Update rejected");
            }
        }
        result.map(|(_, after)| after)
    }

    fn update_inner(
        &self,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<(StockTransaction, StockTransaction)> {
        let existing = self.storage.get_transaction(id)?;
        if existing.status != TransactionStatus::Applied {
            return Err(Error::Validation(format!(
                "Transaction {} is reversed and cannot be edited",
                existing.code
            )));
        }

        let lines = self.validate_lines(existing.kind, &patch.lines)?;

        let mut updated = existing.clone();
        updated.date = patch.date;
        updated.supplier = patch.supplier;
        updated.employee = patch.employee;
        updated.note = patch.note;
        updated.lines = lines;

        // Reverse-then-reapply, folded into one delta set: the new lines
        // are validated against the state with the old effect removed, and
        // both halves commit in the same batch.
        let mut combined = existing.inverse_effects();
        for (key, delta) in updated.balance_effects() {
            *combined.entry(key).or_insert(0) += delta;
        }
        let balances = self.check_and_sum(&combined, false)?;

        self.storage.commit(CommitBatch {
            transaction: &updated,
            prior: Some(&existing),
            balances: &balances,
            register_code: false,
        })?;

        Ok((existing, updated))
    }

    pub(crate) fn delete_transaction(&self, id: Uuid, actor: ActorId) -> Result<()> {
        let timer = self.metrics.commit_duration.start_timer();
        let result = self.delete_inner(id);
        timer.observe_duration();

        match &result {
            Ok(before) => {
                self.metrics.reversed_total.inc();
                tracing::info!(code = %before.code, "Transaction reversed");
                self.audit.record(AuditEvent::new(
                    actor,
                    AuditAction::Reversed,
                    before.id,
                    Some(before.clone()),
                    None,
                ));
            }
            Err(e) => {
                self.metrics.rejections_total.inc();
                tracing::warn!(transaction_id = %id, error = %e, "Delete rejected");
            }
        }
        result.map(|_| ())
    }

    fn delete_inner(&self, id: Uuid) -> Result<StockTransaction> {
        let existing = self.storage.get_transaction(id)?;
        if existing.status != TransactionStatus::Applied {
            return Err(Error::Validation(format!(
                "Transaction {} is already reversed",
                existing.code
            )));
        }

        // Later transactions may have consumed stock this one supplied;
        // the reversal is checked against current balances.
        let balances = self.check_and_sum(&existing.inverse_effects(), true)?;

        let mut reversed = existing.clone();
        reversed.status = TransactionStatus::Reversed;

        self.storage.commit(CommitBatch {
            transaction: &reversed,
            prior: None,
            balances: &balances,
            register_code: false,
        })?;

        Ok(existing)
    }

    /// Rebuild every balance from the applied journal and compare with the
    /// balance store.
    pub(crate) fn verify_conservation(&self) -> Result<()> {
        let mut expected: BTreeMap<BalanceKey, i64> = BTreeMap::new();
        for txn in self.storage.transactions()? {
            if txn.status != TransactionStatus::Applied {
                continue;
            }
            for (key, delta) in txn.balance_effects() {
                *expected.entry(key).or_insert(0) += delta;
            }
        }

        for (key, actual) in self.storage.balances_snapshot()? {
            let want = expected.remove(&key).unwrap_or(0);
            if actual != want {
                return Err(Error::InvariantViolation(format!(
                    "Balance {key} is {actual}, journal sums to {want}"
                )));
            }
        }
        if let Some((key, want)) = expected.into_iter().find(|(_, v)| *v != 0) {
            return Err(Error::InvariantViolation(format!(
                "Balance {key} is missing, journal sums to {want}"
            )));
        }
        Ok(())
    }

    // Validation

    fn validate_warehouses(
        &self,
        kind: TransactionType,
        from: Option<crate::types::WarehouseId>,
        to: Option<crate::types::WarehouseId>,
    ) -> Result<()> {
        match kind {
            TransactionType::Receipt => {
                if from.is_some() || to.is_none() {
                    return Err(Error::Validation(
                        "Receipt requires a destination warehouse only".to_string(),
                    ));
                }
            }
            TransactionType::Issue => {
                if to.is_some() || from.is_none() {
                    return Err(Error::Validation(
                        "Issue requires a source warehouse only".to_string(),
                    ));
                }
            }
            TransactionType::Transfer => {
                let (Some(from), Some(to)) = (from, to) else {
                    return Err(Error::Validation(
                        "Transfer requires both source and destination warehouses".to_string(),
                    ));
                };
                if from == to {
                    return Err(Error::Validation(
                        "Transfer source and destination must differ".to_string(),
                    ));
                }
            }
            TransactionType::Adjustment => {
                if to.is_some() || from.is_none() {
                    return Err(Error::Validation(
                        "Adjustment requires the adjusted warehouse in the source field"
                            .to_string(),
                    ));
                }
            }
        }

        for warehouse in from.into_iter().chain(to) {
            if self.catalog.warehouse(warehouse).is_none() {
                return Err(Error::Validation(format!(
                    "Unknown warehouse {warehouse}"
                )));
            }
        }
        Ok(())
    }

    fn validate_lines(
        &self,
        kind: TransactionType,
        drafts: &[crate::types::LineDraft],
    ) -> Result<Vec<Line>> {
        if drafts.is_empty() {
            return Err(Error::Validation(
                "Transaction requires at least one line".to_string(),
            ));
        }

        let mut lines = Vec::with_capacity(drafts.len());
        for (idx, draft) in drafts.iter().enumerate() {
            if self.catalog.item(draft.item).is_none() {
                return Err(Error::Validation(format!("Unknown item {}", draft.item)));
            }
            match kind {
                TransactionType::Adjustment => {
                    if draft.quantity == 0 {
                        return Err(Error::Validation(
                            "Adjustment delta must be nonzero".to_string(),
                        ));
                    }
                }
                _ => {
                    if draft.quantity <= 0 {
                        return Err(Error::Validation(format!(
                            "Quantity must be positive for {kind}"
                        )));
                    }
                }
            }
            lines.push(Line {
                id: idx as u32 + 1,
                item: draft.item,
                quantity: draft.quantity,
                unit_cost: draft.unit_cost,
            });
        }
        Ok(lines)
    }

    fn resolve_code(
        &self,
        explicit: Option<TransactionCode>,
        kind: TransactionType,
        date: chrono::NaiveDate,
    ) -> Result<TransactionCode> {
        if let Some(code) = explicit {
            if self.storage.code_exists(&code)? {
                return Err(Error::Validation(format!(
                    "Transaction code {code} already exists"
                )));
            }
            return Ok(code);
        }

        for _ in 0..self.code_retry_attempts.max(1) {
            let code = TransactionCode::generate(kind, date);
            if !self.storage.code_exists(&code)? {
                return Ok(code);
            }
        }
        Err(Error::Validation(
            "Could not generate a unique transaction code".to_string(),
        ))
    }

    /// Check every delta against current balances and return the absolute
    /// post-commit values. `reversal` selects the delete-path error kind.
    fn check_and_sum(
        &self,
        effects: &BTreeMap<BalanceKey, i64>,
        reversal: bool,
    ) -> Result<BTreeMap<BalanceKey, i64>> {
        let mut balances = BTreeMap::new();
        for (&key, &delta) in effects {
            let available = self.storage.balance(key)?;
            let next = available.checked_add(delta).ok_or_else(|| {
                Error::Validation(format!("Quantity overflow at {key}"))
            })?;
            if next < 0 {
                let requested = -delta;
                return Err(if reversal {
                    Error::NegativeBalance {
                        warehouse: key.warehouse,
                        item: key.item,
                        requested,
                        available,
                    }
                } else {
                    Error::InsufficientStock {
                        warehouse: key.warehouse,
                        item: key.item,
                        sku: self.catalog.sku_of(key.item),
                        requested,
                        available,
                    }
                });
            }
            balances.insert(key, next);
        }
        Ok(balances)
    }
}

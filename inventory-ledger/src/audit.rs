//! Audit sink contract
//!
//! Every successful create/update/delete pushes exactly one event to an
//! external collaborator. The push is one-way: the ledger never reads
//! audit state back, and sink failures cannot fail a committed operation.

use crate::types::{ActorId, StockTransaction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What happened to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    /// Transaction created and applied
    Created,
    /// Transaction edited via compensating update
    Updated,
    /// Transaction reversed (soft delete)
    Reversed,
}

/// One audit trail entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Who performed the operation
    pub actor: ActorId,
    /// What they did
    pub action: AuditAction,
    /// Entity type, always `"StockTransaction"` for ledger events
    pub entity_type: &'static str,
    /// Entity id
    pub entity_id: Uuid,
    /// Snapshot before the operation (update/delete)
    pub before: Option<StockTransaction>,
    /// Snapshot after the operation (create/update)
    pub after: Option<StockTransaction>,
    /// When the event was emitted
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub(crate) fn new(
        actor: ActorId,
        action: AuditAction,
        entity_id: Uuid,
        before: Option<StockTransaction>,
        after: Option<StockTransaction>,
    ) -> Self {
        Self {
            actor,
            action,
            entity_type: "StockTransaction",
            entity_id,
            before,
            after,
            at: Utc::now(),
        }
    }
}

/// One-way push target for audit events
pub trait AuditSink: Send + Sync {
    /// Record one event. Must not block for long and must not panic.
    fn record(&self, event: AuditEvent);
}

/// Sink that emits audit events as structured log lines
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let before = event
            .before
            .as_ref()
            .and_then(|t| serde_json::to_string(t).ok());
        let after = event
            .after
            .as_ref()
            .and_then(|t| serde_json::to_string(t).ok());
        tracing::info!(
            actor = %event.actor,
            action = ?event.action,
            entity_type = event.entity_type,
            entity_id = %event.entity_id,
            before = before.as_deref().unwrap_or("-"),
            after = after.as_deref().unwrap_or("-"),
            "Audit event"
        );
    }
}

/// Sink that drops every event (for callers that wire their own trail)
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

//! Single-writer concurrency for the ledger
//!
//! The reference system mutated balances with separate find-then-mutate
//! steps and no locking. Here every mutating operation is a message to one
//! actor task that owns the write path, so create/update/delete execute as
//! serialized critical sections. Reads go straight to storage: each
//! operation commits as one atomic `WriteBatch`, so a reader observes the
//! state either before or after an operation, never in between.

use crate::ledger::LedgerCore;
use crate::types::{ActorId, StockTransaction, TransactionDraft, TransactionPatch};
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Message sent to the ledger actor
pub(crate) enum LedgerMessage {
    /// Validate and apply a new movement
    Create {
        draft: TransactionDraft,
        actor: ActorId,
        response: oneshot::Sender<Result<StockTransaction>>,
    },

    /// Compensating edit of an applied movement
    Update {
        id: Uuid,
        patch: TransactionPatch,
        actor: ActorId,
        response: oneshot::Sender<Result<StockTransaction>>,
    },

    /// Reverse an applied movement
    Delete {
        id: Uuid,
        actor: ActorId,
        response: oneshot::Sender<Result<()>>,
    },

    /// Check the conservation invariant with no writer interleaving
    VerifyConservation {
        response: oneshot::Sender<Result<()>>,
    },

    /// Stop the actor
    Shutdown,
}

/// Actor that processes ledger messages
pub(crate) struct LedgerActor {
    core: LedgerCore,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    pub(crate) fn new(core: LedgerCore, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { core, mailbox }
    }

    /// Run the actor event loop until shutdown or all handles dropped
    pub(crate) async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Create {
                    draft,
                    actor,
                    response,
                } => {
                    let _ = response.send(self.core.create_transaction(draft, actor));
                }
                LedgerMessage::Update {
                    id,
                    patch,
                    actor,
                    response,
                } => {
                    let _ = response.send(self.core.update_transaction(id, patch, actor));
                }
                LedgerMessage::Delete {
                    id,
                    actor,
                    response,
                } => {
                    let _ = response.send(self.core.delete_transaction(id, actor));
                }
                LedgerMessage::VerifyConservation { response } => {
                    let _ = response.send(self.core.verify_conservation());
                }
                LedgerMessage::Shutdown => break,
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub(crate) struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    fn mailbox_closed() -> Error {
        Error::Concurrency("Ledger actor mailbox closed".to_string())
    }

    fn reply_closed() -> Error {
        Error::Concurrency("Ledger actor reply channel closed".to_string())
    }

    pub(crate) async fn create_transaction(
        &self,
        draft: TransactionDraft,
        actor: ActorId,
    ) -> Result<StockTransaction> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Create {
                draft,
                actor,
                response: tx,
            })
            .await
            .map_err(|_| Self::mailbox_closed())?;
        rx.await.map_err(|_| Self::reply_closed())?
    }

    pub(crate) async fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
        actor: ActorId,
    ) -> Result<StockTransaction> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Update {
                id,
                patch,
                actor,
                response: tx,
            })
            .await
            .map_err(|_| Self::mailbox_closed())?;
        rx.await.map_err(|_| Self::reply_closed())?
    }

    pub(crate) async fn delete_transaction(&self, id: Uuid, actor: ActorId) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Delete {
                id,
                actor,
                response: tx,
            })
            .await
            .map_err(|_| Self::mailbox_closed())?;
        rx.await.map_err(|_| Self::reply_closed())?
    }

    pub(crate) async fn verify_conservation(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::VerifyConservation { response: tx })
            .await
            .map_err(|_| Self::mailbox_closed())?;
        rx.await.map_err(|_| Self::reply_closed())?
    }

    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Self::mailbox_closed())
    }
}

/// Spawn the ledger actor; the returned handle is the only write path.
/// The join handle lets shutdown wait for the actor to drain and release
/// its storage reference before the caller closes the database.
pub(crate) fn spawn_ledger_actor(core: LedgerCore) -> (LedgerHandle, JoinHandle<()>) {
    // Bounded channel for backpressure
    let (tx, rx) = mpsc::channel(256);
    let actor = LedgerActor::new(core, rx);
    let task = tokio::spawn(actor.run());

    (LedgerHandle { sender: tx }, task)
}

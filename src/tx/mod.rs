//! Transaction management.
//!
//! Two layers:
//! - [`Transaction`] is what a storage backend hands out;
//! - [`CoreTx`] wraps one backend transaction together with the type-cache
//!   overlay of that transaction. All engine operations run on a `CoreTx`.
//!
//! Type-cache changes made inside a transaction stay in its overlay. They are
//! published at commit, under the cache lock, and dropped on rollback.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::TopicType;
use crate::storage::StorageBackend;
use crate::{Error, Result, TopicGraph};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

/// Transaction trait that all backends must implement.
///
/// No `Send` bound: a transaction may own lock guards and stays on the thread
/// that opened it.
pub trait Transaction {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;
}

// ============================================================================
// CoreTx
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pending,
    Success,
    Failure,
}

/// Type-cache changes staged by one transaction. `None` marks a removal.
pub(crate) type CacheOverlay = HashMap<String, Option<Arc<TopicType>>>;

/// An engine transaction.
///
/// Call [`success`](CoreTx::success) to mark it for commit, then
/// [`finish`](CoreTx::finish). Anything else rolls back: a `failure()` mark,
/// no mark at all, or dropping the transaction without finishing it.
pub struct CoreTx<'g, B: StorageBackend> {
    pub(crate) graph: &'g TopicGraph<B>,
    tx: Option<B::Tx>,
    pub(crate) overlay: CacheOverlay,
    outcome: Outcome,
}

impl<'g, B: StorageBackend> CoreTx<'g, B> {
    pub(crate) fn new(graph: &'g TopicGraph<B>, tx: B::Tx) -> Self {
        Self {
            graph,
            tx: Some(tx),
            overlay: CacheOverlay::new(),
            outcome: Outcome::Pending,
        }
    }

    /// Mark the transaction for commit.
    pub fn success(&mut self) {
        self.outcome = Outcome::Success;
    }

    /// Mark the transaction for rollback. Wins over an earlier `success()`.
    pub fn failure(&mut self) {
        self.outcome = Outcome::Failure;
    }

    pub fn mode(&self) -> TxMode {
        self.tx.as_ref().map_or(TxMode::ReadOnly, Transaction::mode)
    }

    pub fn id(&self) -> Option<TxId> {
        self.tx.as_ref().map(Transaction::id)
    }

    /// The graph this transaction runs against.
    pub fn graph(&self) -> &'g TopicGraph<B> {
        self.graph
    }

    pub(crate) fn backend(&self) -> &'g B {
        &self.graph.backend
    }

    /// The backend transaction.
    pub fn raw(&self) -> Result<&B::Tx> {
        self.tx.as_ref().ok_or_else(finished)
    }

    /// The backend transaction, mutably.
    pub fn raw_mut(&mut self) -> Result<&mut B::Tx> {
        self.tx.as_mut().ok_or_else(finished)
    }

    /// Commit if marked successful, otherwise roll back.
    pub fn finish(mut self) -> Result<()> {
        let Some(tx) = self.tx.take() else {
            return Err(finished());
        };
        let backend = &self.graph.backend;
        match self.outcome {
            Outcome::Success => {
                let overlay = std::mem::take(&mut self.overlay);
                // Hold the cache lock across the storage commit so no reader
                // sees the new graph with the old types.
                let mut cache = self.graph.types.lock_for_publish();
                backend.commit_tx(tx)?;
                if !overlay.is_empty() {
                    debug!(entries = overlay.len(), "type cache overlay published");
                }
                cache.publish(overlay);
                Ok(())
            }
            Outcome::Pending | Outcome::Failure => {
                self.overlay.clear();
                backend.rollback_tx(tx)
            }
        }
    }
}

impl<B: StorageBackend> Drop for CoreTx<'_, B> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(err) = self.graph.backend.rollback_tx(tx) {
                warn!(error = %err, "rollback of unfinished transaction failed");
            }
        }
    }
}

fn finished() -> Error {
    Error::TxError("transaction already finished".into())
}

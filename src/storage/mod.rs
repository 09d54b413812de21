//! # Storage Backend Trait
//!
//! This is THE contract between the topicgraph engine and any storage
//! engine: a transactional store of nodes, n-ary edges, flat properties and
//! the key/fulltext indexes over them.
//!
//! The backend knows nothing about types. Instance-of edges, sequences and
//! association definitions are ordinary edges to it; the engine layers the
//! type system on top.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory with undo-log rollback |

pub mod memory;

use crate::index::IndexMode;
use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub use memory::{MemoryBackend, MemoryTx};

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Isolation is the backend's responsibility: the engine adds no locking of
/// its own. Everything done through one `Tx` must become visible atomically
/// on `commit_tx` and vanish on `rollback_tx` (or when the `Tx` is dropped
/// unfinished).
pub trait StorageBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the backend, flushing any pending writes.
    fn shutdown(&self) -> Result<()>;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction.
    fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction.
    fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a node with the given properties. Properties set here are not
    /// indexed.
    fn create_node(&self, tx: &mut Self::Tx, props: PropertyMap) -> Result<NodeId>;

    /// Get a node by ID. Returns None if not found.
    fn get_node(&self, tx: &Self::Tx, id: NodeId) -> Result<Option<NodeRecord>>;

    /// Delete a node and its index entries. Returns true if it existed.
    /// Fails if the node still has incident edges.
    fn delete_node(&self, tx: &mut Self::Tx, id: NodeId) -> Result<bool>;

    // ========================================================================
    // Edge CRUD
    // ========================================================================

    /// Create an edge. Needs at least two roles; every player must exist.
    fn create_edge(&self, tx: &mut Self::Tx, roles: Roles, props: PropertyMap) -> Result<EdgeId>;

    /// Get an edge by ID.
    fn get_edge(&self, tx: &Self::Tx, id: EdgeId) -> Result<Option<EdgeRecord>>;

    /// Delete an edge and its index entries. Returns true if it existed.
    /// Fails if other edges still connect to it.
    fn delete_edge(&self, tx: &mut Self::Tx, id: EdgeId) -> Result<bool>;

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Edges in which `player` takes part, optionally only those where it
    /// plays `role_type`.
    fn incident_edges(
        &self,
        tx: &Self::Tx,
        player: ElementRef,
        role_type: Option<&str>,
    ) -> Result<Vec<EdgeRecord>>;

    /// Whether a node or edge exists.
    fn exists(&self, tx: &Self::Tx, element: ElementRef) -> Result<bool> {
        Ok(match element {
            ElementRef::Node(id) => self.get_node(tx, id)?.is_some(),
            ElementRef::Edge(id) => self.get_edge(tx, id)?.is_some(),
        })
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn get_property(&self, tx: &Self::Tx, element: ElementRef, key: &str) -> Result<Option<Value>>;

    /// Set a property (upsert). Returns the previous value. Indexes are not
    /// touched; see [`StorageBackend::index_add`].
    fn set_property(
        &self,
        tx: &mut Self::Tx,
        element: ElementRef,
        key: &str,
        value: Value,
    ) -> Result<Option<Value>>;

    /// Remove a property. Returns the previous value.
    fn remove_property(&self, tx: &mut Self::Tx, element: ElementRef, key: &str) -> Result<Option<Value>>;

    // ========================================================================
    // Index
    // ========================================================================

    fn index_add(
        &self,
        tx: &mut Self::Tx,
        mode: IndexMode,
        key: &str,
        element: ElementRef,
        value: &Value,
    ) -> Result<()>;

    fn index_remove(
        &self,
        tx: &mut Self::Tx,
        mode: IndexMode,
        key: &str,
        element: ElementRef,
        value: &Value,
    ) -> Result<()>;

    /// Drop every index entry of `element`, whatever value it was indexed by.
    fn index_purge(&self, tx: &mut Self::Tx, element: ElementRef) -> Result<()>;

    /// Exact-match lookup in the KEY index.
    fn lookup(&self, tx: &Self::Tx, key: &str, value: &Value) -> Result<Vec<ElementRef>>;

    /// Fulltext search. `bucket = None` searches the shared bucket.
    fn search(
        &self,
        tx: &Self::Tx,
        bucket: Option<&str>,
        term: &str,
        whole_word: bool,
    ) -> Result<Vec<ElementRef>>;

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Total number of nodes, the root node included.
    fn node_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// Total number of edges.
    fn edge_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// IDs of all nodes.
    fn all_node_ids(&self, tx: &Self::Tx) -> Result<Vec<NodeId>>;
}

/// Error for a write attempted through a read-only transaction.
pub(crate) fn read_only(tx_id: crate::tx::TxId) -> Error {
    Error::TxError(format!("transaction {} is read-only", tx_id.0))
}

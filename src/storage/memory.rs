//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`. The whole graph
//! lives in one `GraphState` behind a `parking_lot::RwLock`.
//!
//! ## Transactions
//!
//! - A read-write transaction holds the write guard for its whole lifetime, so
//!   writers are serialized and readers never observe uncommitted state.
//! - A read-only transaction holds a read guard; any number may run at once.
//! - Every mutation appends an inverse step to the transaction's undo log.
//!   `rollback_tx` (or dropping an unfinished transaction) replays the log
//!   backwards; `commit_tx` discards it.
//!
//! Id counters are not rolled back: ids of rolled-back elements are never
//! reused.
//!
//! A thread holding a transaction must not begin another one; the second
//! `begin_tx` would wait for the first forever.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use tracing::{debug, warn};

use crate::index::{IndexDelta, IndexMode, IndexStore};
use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::{StorageBackend, read_only};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory hypergraph storage.
///
/// Clones are handles on the same store, so a graph can be closed and
/// opened again over the data it left behind.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<GraphState>>,
    next_tx_id: Arc<AtomicU64>,
}

impl MemoryBackend {
    /// A fresh store containing only the root node.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(GraphState::new())),
            next_tx_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GraphState
// ============================================================================

/// Everything the backend stores.
#[derive(Debug)]
pub struct GraphState {
    nodes: HashMap<NodeId, NodeRecord>,
    edges: HashMap<EdgeId, EdgeRecord>,
    /// player → edges it takes part in, in creation order
    adjacency: HashMap<ElementRef, Vec<EdgeId>>,
    index: IndexStore,
    next_node_id: u64,
    next_edge_id: u64,
}

impl GraphState {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::ROOT, NodeRecord::new(NodeId::ROOT));
        let mut adjacency = HashMap::new();
        adjacency.insert(ElementRef::Node(NodeId::ROOT), Vec::new());
        Self {
            nodes,
            edges: HashMap::new(),
            adjacency,
            index: IndexStore::new(),
            next_node_id: 1,
            next_edge_id: 1,
        }
    }

    fn contains(&self, element: ElementRef) -> bool {
        match element {
            ElementRef::Node(id) => self.nodes.contains_key(&id),
            ElementRef::Edge(id) => self.edges.contains_key(&id),
        }
    }

    fn properties(&self, element: ElementRef) -> Option<&PropertyMap> {
        match element {
            ElementRef::Node(id) => self.nodes.get(&id).map(|n| &n.properties),
            ElementRef::Edge(id) => self.edges.get(&id).map(|e| &e.properties),
        }
    }

    fn properties_mut(&mut self, element: ElementRef) -> Result<&mut PropertyMap> {
        match element {
            ElementRef::Node(id) => self.nodes.get_mut(&id).map(|n| &mut n.properties),
            ElementRef::Edge(id) => self.edges.get_mut(&id).map(|e| &mut e.properties),
        }
        .ok_or_else(|| Error::NotFound(format!("{element}")))
    }

    fn incident_count(&self, element: ElementRef) -> usize {
        self.adjacency.get(&element).map_or(0, Vec::len)
    }

    fn link(&mut self, edge: &EdgeRecord) {
        for role in &edge.roles {
            let list = self.adjacency.entry(role.player).or_default();
            if !list.contains(&edge.id) {
                list.push(edge.id);
            }
        }
        self.adjacency.entry(ElementRef::Edge(edge.id)).or_default();
    }

    /// Detach an edge from its players. Returns the slot it held in each
    /// player's list.
    fn unlink(&mut self, edge: &EdgeRecord) -> Vec<(ElementRef, usize)> {
        let mut slots = Vec::with_capacity(edge.roles.len());
        for role in &edge.roles {
            if let Some(list) = self.adjacency.get_mut(&role.player) {
                if let Some(at) = list.iter().position(|id| *id == edge.id) {
                    list.remove(at);
                    slots.push((role.player, at));
                }
            }
        }
        self.adjacency.remove(&ElementRef::Edge(edge.id));
        slots
    }

    /// Put a deleted edge back into the slots [`Self::unlink`] took it from.
    fn relink(&mut self, edge: &EdgeRecord, slots: &[(ElementRef, usize)]) {
        for &(player, at) in slots {
            let list = self.adjacency.entry(player).or_default();
            list.insert(at.min(list.len()), edge.id);
        }
        self.adjacency.entry(ElementRef::Edge(edge.id)).or_default();
    }

    /// Apply one inverse step.
    fn undo(&mut self, step: Undo) {
        match step {
            Undo::NodeCreated(id) => {
                self.nodes.remove(&id);
                self.adjacency.remove(&ElementRef::Node(id));
            }
            Undo::NodeDeleted(record) => {
                self.adjacency.insert(ElementRef::Node(record.id), Vec::new());
                self.nodes.insert(record.id, record);
            }
            Undo::EdgeCreated(id) => {
                if let Some(edge) = self.edges.remove(&id) {
                    self.unlink(&edge);
                }
            }
            Undo::EdgeDeleted { record, slots } => {
                self.relink(&record, &slots);
                self.edges.insert(record.id, record);
            }
            Undo::PropertySet { element, key, old } => {
                if let Ok(props) = self.properties_mut(element) {
                    match old {
                        Some(v) => { props.insert(key, v); }
                        None => { props.remove(&key); }
                    }
                }
            }
            Undo::IndexAdded(delta) => self.index.apply_removed(&delta),
            Undo::IndexRemoved(delta) => self.index.apply_added(&delta),
        }
    }
}

/// Inverse of one mutation.
#[derive(Debug)]
enum Undo {
    NodeCreated(NodeId),
    NodeDeleted(NodeRecord),
    EdgeCreated(EdgeId),
    EdgeDeleted { record: EdgeRecord, slots: Vec<(ElementRef, usize)> },
    PropertySet { element: ElementRef, key: String, old: Option<Value> },
    IndexAdded(IndexDelta),
    IndexRemoved(IndexDelta),
}

// ============================================================================
// MemoryTx
// ============================================================================

enum StateGuard {
    Read(ArcRwLockReadGuard<RawRwLock, GraphState>),
    Write(ArcRwLockWriteGuard<RawRwLock, GraphState>),
}

/// In-memory transaction: a lock guard plus an undo log.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    guard: StateGuard,
    undo: Vec<Undo>,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

impl MemoryTx {
    fn state(&self) -> &GraphState {
        match &self.guard {
            StateGuard::Read(g) => g,
            StateGuard::Write(g) => g,
        }
    }

    fn parts_mut(&mut self) -> Result<(&mut GraphState, &mut Vec<Undo>)> {
        match &mut self.guard {
            StateGuard::Write(g) => Ok((&mut **g, &mut self.undo)),
            StateGuard::Read(_) => Err(read_only(self.id)),
        }
    }

    /// Number of pending inverse steps.
    pub fn pending_changes(&self) -> usize {
        self.undo.len()
    }

    fn rollback_in_place(&mut self) {
        let steps = std::mem::take(&mut self.undo);
        if let StateGuard::Write(g) = &mut self.guard {
            for step in steps.into_iter().rev() {
                g.undo(step);
            }
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.undo.is_empty() {
            warn!(tx = self.id.0, changes = self.undo.len(), "transaction dropped unfinished, rolling back");
            self.rollback_in_place();
        }
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

impl StorageBackend for MemoryBackend {
    type Tx = MemoryTx;

    fn shutdown(&self) -> Result<()> { Ok(()) }

    fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.next_tx_id.fetch_add(1, Ordering::Relaxed));
        let guard = match mode {
            TxMode::ReadOnly => StateGuard::Read(self.state.read_arc()),
            TxMode::ReadWrite => StateGuard::Write(self.state.write_arc()),
        };
        Ok(MemoryTx { id, mode, guard, undo: Vec::new() })
    }

    fn commit_tx(&self, mut tx: MemoryTx) -> Result<()> {
        debug!(tx = tx.id.0, changes = tx.undo.len(), "commit");
        tx.undo.clear();
        Ok(())
    }

    fn rollback_tx(&self, mut tx: MemoryTx) -> Result<()> {
        debug!(tx = tx.id.0, changes = tx.undo.len(), "rollback");
        tx.rollback_in_place();
        Ok(())
    }

    // ========================================================================
    // Node CRUD
    // ========================================================================

    fn create_node(&self, tx: &mut MemoryTx, props: PropertyMap) -> Result<NodeId> {
        let (state, undo) = tx.parts_mut()?;
        let id = NodeId(state.next_node_id);
        state.next_node_id += 1;
        state.nodes.insert(id, NodeRecord { id, properties: props });
        state.adjacency.insert(ElementRef::Node(id), Vec::new());
        undo.push(Undo::NodeCreated(id));
        Ok(id)
    }

    fn get_node(&self, tx: &MemoryTx, id: NodeId) -> Result<Option<NodeRecord>> {
        Ok(tx.state().nodes.get(&id).cloned())
    }

    fn delete_node(&self, tx: &mut MemoryTx, id: NodeId) -> Result<bool> {
        if id == NodeId::ROOT {
            return Err(Error::ConstraintViolation("the root node cannot be deleted".into()));
        }
        let (state, undo) = tx.parts_mut()?;
        let element = ElementRef::Node(id);
        if !state.nodes.contains_key(&id) {
            return Ok(false);
        }
        let incident = state.incident_count(element);
        if incident > 0 {
            return Err(Error::ConstraintViolation(format!(
                "Cannot delete node {id} with {incident} edges. Delete edges first."
            )));
        }

        let purged = state.index.purge(element);
        if !purged.is_empty() {
            undo.push(Undo::IndexRemoved(purged));
        }
        state.adjacency.remove(&element);
        if let Some(record) = state.nodes.remove(&id) {
            undo.push(Undo::NodeDeleted(record));
        }
        Ok(true)
    }

    // ========================================================================
    // Edge CRUD
    // ========================================================================

    fn create_edge(&self, tx: &mut MemoryTx, roles: Roles, props: PropertyMap) -> Result<EdgeId> {
        let (state, undo) = tx.parts_mut()?;
        if roles.len() < 2 {
            return Err(Error::InvalidArgument(format!(
                "an edge needs at least 2 roles, got {}", roles.len()
            )));
        }
        for role in &roles {
            if !state.contains(role.player) {
                return Err(Error::NotFound(format!("player {} of role \"{}\"", role.player, role.role_type)));
            }
        }

        let id = EdgeId(state.next_edge_id);
        state.next_edge_id += 1;
        let edge = EdgeRecord { id, roles, properties: props };
        state.link(&edge);
        state.edges.insert(id, edge);
        undo.push(Undo::EdgeCreated(id));
        Ok(id)
    }

    fn get_edge(&self, tx: &MemoryTx, id: EdgeId) -> Result<Option<EdgeRecord>> {
        Ok(tx.state().edges.get(&id).cloned())
    }

    fn delete_edge(&self, tx: &mut MemoryTx, id: EdgeId) -> Result<bool> {
        let (state, undo) = tx.parts_mut()?;
        let element = ElementRef::Edge(id);
        if !state.edges.contains_key(&id) {
            return Ok(false);
        }
        let incident = state.incident_count(element);
        if incident > 0 {
            return Err(Error::ConstraintViolation(format!(
                "Cannot delete edge {id} with {incident} edges attached. Delete those first."
            )));
        }

        let purged = state.index.purge(element);
        if !purged.is_empty() {
            undo.push(Undo::IndexRemoved(purged));
        }
        if let Some(record) = state.edges.remove(&id) {
            let slots = state.unlink(&record);
            undo.push(Undo::EdgeDeleted { record, slots });
        }
        Ok(true)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    fn incident_edges(
        &self,
        tx: &MemoryTx,
        player: ElementRef,
        role_type: Option<&str>,
    ) -> Result<Vec<EdgeRecord>> {
        let state = tx.state();
        let Some(ids) = state.adjacency.get(&player) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.edges.get(id))
            .filter(|edge| role_type.map_or(true, |rt| edge.plays(player, rt)))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn get_property(&self, tx: &MemoryTx, element: ElementRef, key: &str) -> Result<Option<Value>> {
        let props = tx.state().properties(element)
            .ok_or_else(|| Error::NotFound(format!("{element}")))?;
        Ok(props.get(key).cloned())
    }

    fn set_property(
        &self,
        tx: &mut MemoryTx,
        element: ElementRef,
        key: &str,
        value: Value,
    ) -> Result<Option<Value>> {
        let (state, undo) = tx.parts_mut()?;
        let props = state.properties_mut(element)?;
        let old = props.insert(key.to_string(), value);
        undo.push(Undo::PropertySet { element, key: key.to_string(), old: old.clone() });
        Ok(old)
    }

    fn remove_property(&self, tx: &mut MemoryTx, element: ElementRef, key: &str) -> Result<Option<Value>> {
        let (state, undo) = tx.parts_mut()?;
        let props = state.properties_mut(element)?;
        let old = props.remove(key);
        if old.is_some() {
            undo.push(Undo::PropertySet { element, key: key.to_string(), old: old.clone() });
        }
        Ok(old)
    }

    // ========================================================================
    // Index
    // ========================================================================

    fn index_add(
        &self,
        tx: &mut MemoryTx,
        mode: IndexMode,
        key: &str,
        element: ElementRef,
        value: &Value,
    ) -> Result<()> {
        let (state, undo) = tx.parts_mut()?;
        let delta = state.index.add(mode, key, element, value);
        if !delta.is_empty() {
            undo.push(Undo::IndexAdded(delta));
        }
        Ok(())
    }

    fn index_remove(
        &self,
        tx: &mut MemoryTx,
        mode: IndexMode,
        key: &str,
        element: ElementRef,
        value: &Value,
    ) -> Result<()> {
        let (state, undo) = tx.parts_mut()?;
        let delta = state.index.remove(mode, key, element, value);
        if !delta.is_empty() {
            undo.push(Undo::IndexRemoved(delta));
        }
        Ok(())
    }

    fn index_purge(&self, tx: &mut MemoryTx, element: ElementRef) -> Result<()> {
        let (state, undo) = tx.parts_mut()?;
        let delta = state.index.purge(element);
        if !delta.is_empty() {
            undo.push(Undo::IndexRemoved(delta));
        }
        Ok(())
    }

    fn lookup(&self, tx: &MemoryTx, key: &str, value: &Value) -> Result<Vec<ElementRef>> {
        Ok(tx.state().index.lookup(key, value))
    }

    fn search(
        &self,
        tx: &MemoryTx,
        bucket: Option<&str>,
        term: &str,
        whole_word: bool,
    ) -> Result<Vec<ElementRef>> {
        Ok(tx.state().index.search(bucket, term, whole_word))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    fn node_count(&self, tx: &MemoryTx) -> Result<u64> {
        Ok(tx.state().nodes.len() as u64)
    }

    fn edge_count(&self, tx: &MemoryTx) -> Result<u64> {
        Ok(tx.state().edges.len() as u64)
    }

    fn all_node_ids(&self, tx: &MemoryTx) -> Result<Vec<NodeId>> {
        let mut ids: Vec<NodeId> = tx.state().nodes.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Hypergraph primitives on a running transaction.
//!
//! Thin, type-agnostic access to the backend: nodes, n-ary edges and flat
//! properties. The typed operations in [`crate::service`] are built from
//! these.

use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result};

impl<B: StorageBackend> CoreTx<'_, B> {
    // ========================================================================
    // Nodes
    // ========================================================================

    pub fn create_node(&mut self, props: PropertyMap) -> Result<NodeId> {
        let backend = self.backend();
        backend.create_node(self.raw_mut()?, props)
    }

    pub fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>> {
        self.backend().get_node(self.raw()?, id)
    }

    pub(crate) fn require_node(&self, id: NodeId) -> Result<NodeRecord> {
        self.get_node(id)?.ok_or_else(|| Error::NotFound(format!("node {id}")))
    }

    /// Delete a node. Fails while edges still connect to it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<bool> {
        let backend = self.backend();
        backend.delete_node(self.raw_mut()?, id)
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Create an edge from `(player, role type)` pairs.
    pub fn create_edge(&mut self, roles: Roles, props: PropertyMap) -> Result<EdgeId> {
        let backend = self.backend();
        backend.create_edge(self.raw_mut()?, roles, props)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Option<EdgeRecord>> {
        self.backend().get_edge(self.raw()?, id)
    }

    pub(crate) fn require_edge(&self, id: EdgeId) -> Result<EdgeRecord> {
        self.get_edge(id)?.ok_or_else(|| Error::NotFound(format!("edge {id}")))
    }

    /// Delete an edge. Fails while other edges still connect to it.
    pub fn delete_edge(&mut self, id: EdgeId) -> Result<bool> {
        let backend = self.backend();
        backend.delete_edge(self.raw_mut()?, id)
    }

    /// Delete an edge after everything attached to it, depth first.
    pub(crate) fn delete_edge_cascade(&mut self, id: EdgeId) -> Result<()> {
        for attached in self.incident_edges(ElementRef::Edge(id), None)? {
            self.delete_edge_cascade(attached.id)?;
        }
        self.delete_edge(id)?;
        Ok(())
    }

    pub fn incident_edges(&self, player: ElementRef, role_type: Option<&str>) -> Result<Vec<EdgeRecord>> {
        self.backend().incident_edges(self.raw()?, player, role_type)
    }

    pub fn exists(&self, element: ElementRef) -> Result<bool> {
        self.backend().exists(self.raw()?, element)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn node_count(&self) -> Result<u64> {
        self.backend().node_count(self.raw()?)
    }

    pub fn edge_count(&self) -> Result<u64> {
        self.backend().edge_count(self.raw()?)
    }

    pub fn all_node_ids(&self) -> Result<Vec<NodeId>> {
        self.backend().all_node_ids(self.raw()?)
    }

    /// The `uri` property of a node, empty if unset.
    pub(crate) fn node_uri(&self, id: NodeId) -> Result<String> {
        Ok(self
            .get_property(ElementRef::Node(id), uri::URI_KEY)?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }
}

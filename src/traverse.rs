//! Role- and type-filtered traversal.
//!
//! Filters split into two groups:
//! - role and association-type filters apply to the connecting edge;
//! - the topic-type filter applies to the element at the far end, after its
//!   type is resolved.
//!
//! Typeless edges count as having association type `""`.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result};

/// What to follow from a player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalFilter {
    /// Role the start player must play in the connecting edge.
    pub my_role_type: Option<String>,
    /// Role the far player must play.
    pub others_role_type: Option<String>,
    /// Exact association type of the connecting edge.
    pub assoc_type: Option<String>,
    /// Type of the far player.
    pub others_topic_type: Option<String>,
    /// Only edges of these association types.
    #[serde(default)]
    pub include_assoc_types: Vec<String>,
    /// No edges of these association types.
    #[serde(default)]
    pub exclude_assoc_types: Vec<String>,
    /// Follow instance-of and sequence edges too.
    #[serde(default)]
    pub include_meta_edges: bool,
}

impl TraversalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn my_role(mut self, role_type: impl Into<String>) -> Self {
        self.my_role_type = Some(role_type.into());
        self
    }

    pub fn others_role(mut self, role_type: impl Into<String>) -> Self {
        self.others_role_type = Some(role_type.into());
        self
    }

    pub fn assoc_type(mut self, assoc_type: impl Into<String>) -> Self {
        self.assoc_type = Some(assoc_type.into());
        self
    }

    pub fn others_topic_type(mut self, type_uri: impl Into<String>) -> Self {
        self.others_topic_type = Some(type_uri.into());
        self
    }

    pub fn include(mut self, assoc_type: impl Into<String>) -> Self {
        self.include_assoc_types.push(assoc_type.into());
        self
    }

    pub fn exclude(mut self, assoc_type: impl Into<String>) -> Self {
        self.exclude_assoc_types.push(assoc_type.into());
        self
    }

    pub fn with_meta_edges(mut self) -> Self {
        self.include_meta_edges = true;
        self
    }

    /// Include and exclude lists are mutually exclusive.
    pub fn validate(&self) -> Result<()> {
        if !self.include_assoc_types.is_empty() && !self.exclude_assoc_types.is_empty() {
            return Err(Error::InvalidArgument(
                "include and exclude association type filters can't be combined".into(),
            ));
        }
        Ok(())
    }

    fn filters_assoc_type(&self) -> bool {
        self.assoc_type.is_some() || !self.include_assoc_types.is_empty() || !self.exclude_assoc_types.is_empty()
    }

    fn accepts_assoc_type(&self, assoc_type: &str) -> bool {
        if let Some(wanted) = &self.assoc_type {
            if wanted != assoc_type {
                return false;
            }
        }
        if !self.include_assoc_types.is_empty() && !self.include_assoc_types.iter().any(|t| t == assoc_type) {
            return false;
        }
        !self.exclude_assoc_types.iter().any(|t| t == assoc_type)
    }
}

impl<B: StorageBackend> CoreTx<'_, B> {
    /// Elements connected to `player`, each with the edge that connects it.
    ///
    /// An element reachable through several edges appears once per edge.
    pub fn connected_players(
        &self,
        player: ElementRef,
        filter: &TraversalFilter,
    ) -> Result<Vec<(ElementRef, EdgeId)>> {
        filter.validate()?;
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for edge in self.incident_edges(player, filter.my_role_type.as_deref())? {
            if edge.meta_kind().is_some() && !filter.include_meta_edges {
                continue;
            }
            if filter.filters_assoc_type() {
                let assoc_type = self.type_uri_of(ElementRef::Edge(edge.id))?;
                if !filter.accepts_assoc_type(&assoc_type) {
                    continue;
                }
            }
            for role in &edge.roles {
                if role.player == player {
                    continue;
                }
                if let Some(wanted) = &filter.others_role_type {
                    if &role.role_type != wanted {
                        continue;
                    }
                }
                if let Some(wanted) = &filter.others_topic_type {
                    if &self.far_type_uri(role.player)? != wanted {
                        continue;
                    }
                }
                if seen.insert((role.player, edge.id)) {
                    out.push((role.player, edge.id));
                }
            }
        }
        Ok(out)
    }

    /// Type URI of a traversal target. The root node and typeless edges
    /// resolve to `""`.
    fn far_type_uri(&self, element: ElementRef) -> Result<String> {
        match element {
            ElementRef::Node(NodeId::ROOT) => Ok(String::new()),
            other => self.type_uri_of(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TopicGraph, TxMode};

    #[test]
    fn test_include_and_exclude_conflict() {
        let filter = TraversalFilter::new().include("a").exclude("b");
        assert!(matches!(filter.validate(), Err(Error::InvalidArgument(_))));

        let graph = TopicGraph::open_memory().unwrap();
        let tx = graph.begin_tx(TxMode::ReadOnly).unwrap();
        let err = tx.connected_players(ElementRef::Node(NodeId::ROOT), &filter).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_meta_edges_skipped_by_default() {
        let graph = TopicGraph::open_memory().unwrap();
        let tx = graph.begin_tx(TxMode::ReadOnly).unwrap();
        let text = tx.node_by_uri(uri::TEXT).unwrap().unwrap();

        assert!(tx.connected_players(ElementRef::Node(text), &TraversalFilter::new()).unwrap().is_empty());

        let with_meta = TraversalFilter::new().with_meta_edges().others_role(uri::TYPE_ROLE);
        let types = tx.connected_players(ElementRef::Node(text), &with_meta).unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].0, ElementRef::Node(tx.type_node(uri::DATA_TYPE).unwrap()));
    }

    #[test]
    fn test_typeless_edges_have_empty_assoc_type() {
        let graph = TopicGraph::open_memory().unwrap();
        let tx = graph.begin_tx(TxMode::ReadOnly).unwrap();
        let text = tx.node_by_uri(uri::TEXT).unwrap().unwrap();

        let filter = TraversalFilter::new().with_meta_edges().assoc_type("");
        assert_eq!(tx.connected_players(ElementRef::Node(text), &filter).unwrap().len(), 1);

        let filter = TraversalFilter::new().with_meta_edges().exclude("");
        assert!(tx.connected_players(ElementRef::Node(text), &filter).unwrap().is_empty());
    }
}

//! Association CRUD.

use tracing::debug;

use crate::access::Access;
use crate::events::CoreEvent;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::traverse::TraversalFilter;
use crate::tx::CoreTx;
use crate::{Error, Result, TopicGraph};

impl<B: StorageBackend> CoreTx<'_, B> {
    /// Create a typed edge without validation or events.
    pub(crate) fn create_association_record(&mut self, type_uri: &str, roles: Roles) -> Result<EdgeId> {
        let type_node = self.type_node(type_uri)?;
        let edge = self.create_edge(roles, PropertyMap::new())?;
        self.instantiate(ElementRef::Edge(edge), type_node)?;
        Ok(edge)
    }

    /// Read an association without access checks.
    pub(crate) fn load_association(&self, id: EdgeId) -> Result<Association> {
        let record = self.require_edge(id)?;
        let ty = self
            .resolve_association_type(id)?
            .ok_or_else(|| Error::Inconsistency(format!("No type node connected to association {id}")))?;
        Ok(Association {
            id,
            type_uri: ty.uri,
            roles: record
                .roles
                .iter()
                .map(|r| RoleModel::new(r.player, r.role_type.as_str()))
                .collect(),
        })
    }

    pub fn create_association(&mut self, mut model: AssociationModel) -> Result<Association> {
        self.fire(&mut CoreEvent::PreCreateAssociation(&mut model))?;
        let ty = self.type_definition(&model.type_uri)?;
        if ty.kind != TypeKind::Association {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" is not an association type",
                model.type_uri
            )));
        }
        self.check_access(Access::Write, ElementRef::Node(ty.id))?;
        for role in &model.roles {
            self.require_role_type(&role.role_type_uri)?;
        }

        let roles: Roles = model
            .roles
            .iter()
            .map(|r| Role::new(r.player, r.role_type_uri.as_str()))
            .collect();
        let id = self.create_association_record(&ty.uri, roles)?;
        let association = self.load_association(id)?;
        debug!(edge = id.0, type_uri = %ty.uri, "association created");
        self.fire(&mut CoreEvent::PostCreateAssociation(&association))?;
        Ok(association)
    }

    pub fn get_association(&self, id: EdgeId) -> Result<Association> {
        self.check_access(Access::Read, ElementRef::Edge(id))?;
        self.load_association(id)
    }

    /// Readable associations of `player` accepted by `filter`. Typeless
    /// edges are never associations and are left out.
    pub fn get_associations(&self, player: ElementRef, filter: &TraversalFilter) -> Result<Vec<Association>> {
        let mut associations: Vec<Association> = Vec::new();
        for (_, id) in self.connected_players(player, filter)? {
            if associations.iter().any(|a| a.id == id) {
                continue;
            }
            if !self.may(Access::Read, ElementRef::Edge(id)) || self.resolve_association_type(id)?.is_none() {
                continue;
            }
            associations.push(self.load_association(id)?);
        }
        Ok(associations)
    }

    /// The association connecting `a` and `b`, optionally of one type.
    ///
    /// Fails with `Ambiguous` when several match.
    pub fn get_association_between(
        &self,
        a: ElementRef,
        b: ElementRef,
        assoc_type: Option<&str>,
    ) -> Result<Option<Association>> {
        let mut hits = Vec::new();
        for edge in self.incident_edges(a, None)? {
            if edge.meta_kind().is_some() || !edge.involves(b) {
                continue;
            }
            let Some(ty) = self.resolve_association_type(edge.id)? else {
                continue;
            };
            if assoc_type.is_some_and(|wanted| wanted != ty.uri) {
                continue;
            }
            hits.push(edge.id);
        }
        match hits.as_slice() {
            [] => Ok(None),
            [id] => self.get_association(*id).map(Some),
            _ => Err(Error::Ambiguous(format!(
                "{} associations connect {a} and {b}",
                hits.len()
            ))),
        }
    }

    pub fn delete_association(&mut self, id: EdgeId) -> Result<()> {
        self.check_access(Access::Write, ElementRef::Edge(id))?;
        self.remove_association(id)
    }

    /// Delete an association and every edge attached to it. No access
    /// checks.
    pub(crate) fn remove_association(&mut self, id: EdgeId) -> Result<()> {
        let association = self.load_association(id)?;
        self.fire(&mut CoreEvent::PreDeleteAssociation(&association))?;
        for attached in self.incident_edges(ElementRef::Edge(id), None)? {
            if attached.meta_kind().is_none() && self.resolve_association_type(attached.id)?.is_some() {
                self.remove_association(attached.id)?;
            }
        }
        self.delete_edge_cascade(id)?;
        debug!(edge = id.0, type_uri = %association.type_uri, "association deleted");
        self.fire(&mut CoreEvent::PostDeleteAssociation(&association))?;
        Ok(())
    }
}

// ============================================================================
// One transaction per call
// ============================================================================

impl<B: StorageBackend> TopicGraph<B> {
    pub fn create_association(&self, model: AssociationModel) -> Result<Association> {
        self.write(format!("association of type \"{}\" can't be created", model.type_uri), |tx| {
            tx.create_association(model)
        })
    }

    pub fn get_association(&self, id: EdgeId) -> Result<Association> {
        self.read(format!("association {id} can't be fetched"), |tx| tx.get_association(id))
    }

    pub fn get_associations(&self, player: ElementRef, filter: &TraversalFilter) -> Result<Vec<Association>> {
        self.read(format!("associations of {player} can't be fetched"), |tx| {
            tx.get_associations(player, filter)
        })
    }

    pub fn get_association_between(
        &self,
        a: ElementRef,
        b: ElementRef,
        assoc_type: Option<&str>,
    ) -> Result<Option<Association>> {
        self.read(format!("association between {a} and {b} can't be fetched"), |tx| {
            tx.get_association_between(a, b, assoc_type)
        })
    }

    pub fn delete_association(&self, id: EdgeId) -> Result<()> {
        self.write(format!("association {id} can't be deleted"), |tx| tx.delete_association(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBackend, TxMode};
    use pretty_assertions::assert_eq;

    fn two_topics(graph: &TopicGraph<MemoryBackend>) -> (NodeId, NodeId) {
        graph.create_topic_type(TopicTypeModel::new("a.item", "Item", uri::TEXT)).unwrap();
        let a = graph.create_topic(TopicModel::new("a.item", "a")).unwrap().id;
        let b = graph.create_topic(TopicModel::new("a.item", "b")).unwrap().id;
        (a, b)
    }

    fn link(a: NodeId, b: NodeId) -> AssociationModel {
        AssociationModel::binary(
            uri::ASSOCIATION,
            RoleModel::new(a, uri::DEFAULT_ROLE),
            RoleModel::new(b, uri::DEFAULT_ROLE),
        )
    }

    #[test]
    fn test_create_and_find_between() {
        let graph = TopicGraph::open_memory().unwrap();
        let (a, b) = two_topics(&graph);
        let assoc = graph.create_association(link(a, b)).unwrap();
        assert_eq!(assoc.type_uri, uri::ASSOCIATION);
        assert_eq!(assoc.other_player(ElementRef::Node(a)), Some(ElementRef::Node(b)));

        let found = graph.get_association_between(a.into(), b.into(), None).unwrap();
        assert_eq!(found, Some(assoc.clone()));
        assert_eq!(graph.get_association_between(a.into(), b.into(), Some(uri::COMPOSITION)).unwrap(), None);

        graph.create_association(link(b, a)).unwrap();
        let err = graph.get_association_between(a.into(), b.into(), None).unwrap_err();
        assert!(matches!(err.cause(), Error::Ambiguous(_)));
    }

    #[test]
    fn test_topic_type_is_not_an_association_type() {
        let graph = TopicGraph::open_memory().unwrap();
        let (a, b) = two_topics(&graph);
        let model = AssociationModel { type_uri: "a.item".into(), ..link(a, b) };
        let err = graph.create_association(model).unwrap_err();
        assert!(matches!(err.cause(), Error::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_role_type_rejected() {
        let graph = TopicGraph::open_memory().unwrap();
        let (a, b) = two_topics(&graph);
        let model = AssociationModel::binary(
            uri::ASSOCIATION,
            RoleModel::new(a, uri::DEFAULT_ROLE),
            RoleModel::new(b, "a.nobody"),
        );
        assert!(matches!(graph.create_association(model).unwrap_err().cause(), Error::NotFound(_)));
    }

    #[test]
    fn test_association_on_association_is_deleted_with_it() {
        let graph = TopicGraph::open_memory().unwrap();
        let (a, b) = two_topics(&graph);
        let first = graph.create_association(link(a, b)).unwrap();
        let meta = graph
            .create_association(AssociationModel::binary(
                uri::ASSOCIATION,
                RoleModel::new(first.id, uri::DEFAULT_ROLE),
                RoleModel::new(a, uri::DEFAULT_ROLE),
            ))
            .unwrap();

        graph.delete_association(first.id).unwrap();
        let tx = graph.begin_tx(TxMode::ReadOnly).unwrap();
        assert!(!tx.exists(ElementRef::Edge(meta.id)).unwrap());
        assert!(tx.get_associations(ElementRef::Node(a), &TraversalFilter::new()).unwrap().is_empty());
    }

    #[test]
    fn test_typeless_edge_is_inconsistent() {
        let graph = TopicGraph::open_memory().unwrap();
        let (a, b) = two_topics(&graph);
        let mut tx = graph.begin_tx(TxMode::ReadWrite).unwrap();
        let roles: Roles = [Role::new(a, uri::DEFAULT_ROLE), Role::new(b, uri::DEFAULT_ROLE)].into_iter().collect();
        let edge = tx.create_edge(roles, PropertyMap::new()).unwrap();
        let err = tx.get_association(edge).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Graph inconsistency: No type node connected to association {edge}")
        );
    }
}

//! Association definitions: the fields of a composite type.
//!
//! A definition is an edge between the parent type node (`core.parent_type`)
//! and the child type node (`core.child_type`), typed `core.composition_def`.
//! It carries the association type and the role pair that instance
//! associations of this field use.

use tracing::debug;

use hashbrown::HashSet;

use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result};

impl<B: StorageBackend> CoreTx<'_, B> {
    /// Definition edges registered on `type_node`, in no particular order.
    fn definition_edges(&self, type_node: NodeId) -> Result<Vec<EdgeRecord>> {
        Ok(self
            .incident_edges(ElementRef::Node(type_node), Some(uri::PARENT_TYPE_ROLE))?
            .into_iter()
            .filter(|e| e.player(uri::CHILD_TYPE_ROLE).is_some())
            .collect())
    }

    /// Definition edges that reference `type_node` as child.
    pub(crate) fn definitions_using(&self, type_node: NodeId) -> Result<Vec<EdgeRecord>> {
        Ok(self
            .incident_edges(ElementRef::Node(type_node), Some(uri::CHILD_TYPE_ROLE))?
            .into_iter()
            .filter(|e| e.player(uri::PARENT_TYPE_ROLE).is_some())
            .collect())
    }

    fn definition_from_edge(&self, parent_type_uri: &str, edge: &EdgeRecord) -> Result<AssociationDefinition> {
        let child = edge
            .player(uri::CHILD_TYPE_ROLE)
            .and_then(|p| p.as_node())
            .ok_or_else(|| Error::Inconsistency(format!("definition edge {} has no child type", edge.id)))?;
        let text = |key: &str| edge.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(AssociationDefinition {
            id: edge.id,
            parent_type_uri: parent_type_uri.to_string(),
            child_type_uri: self.node_uri(child)?,
            assoc_type_uri: text(uri::ASSOC_TYPE_KEY),
            parent_role_type_uri: text(uri::PARENT_ROLE_KEY),
            child_role_type_uri: text(uri::CHILD_ROLE_KEY),
        })
    }

    /// Definitions of a type in field order.
    ///
    /// The chain must cover exactly the registered definitions.
    pub(crate) fn load_definitions(&self, type_node: NodeId, type_uri: &str) -> Result<Vec<AssociationDefinition>> {
        let registered = self.definition_edges(type_node)?;
        let order = self.field_sequence(type_node, type_uri)?;
        if order.len() != registered.len() {
            return Err(Error::Inconsistency(format!(
                "type \"{type_uri}\" has {} association definitions but a field sequence of {}",
                registered.len(),
                order.len()
            )));
        }
        order
            .iter()
            .map(|id| {
                let edge = registered.iter().find(|e| e.id == *id).ok_or_else(|| {
                    Error::Inconsistency(format!(
                        "field sequence of type \"{type_uri}\" contains foreign edge {id}"
                    ))
                })?;
                self.definition_from_edge(type_uri, edge)
            })
            .collect()
    }

    /// A role type callers may put on associations. Engine roles are
    /// refused: an edge carrying them would be read as bookkeeping.
    pub(crate) fn require_role_type(&self, role_type_uri: &str) -> Result<()> {
        if uri::is_engine_role(role_type_uri) {
            return Err(Error::InvalidArgument(format!(
                "role type \"{role_type_uri}\" is reserved for the engine's own edges"
            )));
        }
        let node = self
            .node_by_uri(role_type_uri)?
            .ok_or_else(|| Error::NotFound(format!("role type \"{role_type_uri}\"")))?;
        let ty = self.resolve_type(node)?;
        if ty.uri() != uri::ROLE_TYPE {
            return Err(Error::InvalidArgument(format!(
                "\"{role_type_uri}\" is a \"{}\", not a role type",
                ty.uri()
            )));
        }
        Ok(())
    }

    /// Add a field to a composite type, at the end of its field order.
    pub fn add_association_definition(
        &mut self,
        parent_type_uri: &str,
        model: AssociationDefinitionModel,
    ) -> Result<AssociationDefinition> {
        let parent = self.type_definition(parent_type_uri)?;
        if !parent.is_composite() {
            return Err(Error::InvalidArgument(format!(
                "type \"{parent_type_uri}\" has data type \"{}\"; only composite types have fields",
                parent.data_type_uri
            )));
        }
        if parent.assoc_def(&model.child_type_uri).is_some() {
            return Err(Error::InvalidArgument(format!(
                "type \"{parent_type_uri}\" already has a field \"{}\"",
                model.child_type_uri
            )));
        }
        let child_node = self.type_node(&model.child_type_uri)?;
        if self.type_kind(child_node)? != TypeKind::Topic {
            return Err(Error::InvalidArgument(format!(
                "field type \"{}\" is not a topic type",
                model.child_type_uri
            )));
        }
        let assoc_type = self.type_definition(&model.assoc_type_uri)?;
        if assoc_type.kind != TypeKind::Association {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" is not an association type",
                model.assoc_type_uri
            )));
        }
        if model.assoc_type_uri == uri::AGGREGATION && self.type_definition(&model.child_type_uri)?.is_composite() {
            return Err(Error::InvalidArgument(format!(
                "composite type \"{}\" can't be an aggregated field",
                model.child_type_uri
            )));
        }
        self.require_role_type(&model.parent_role_type_uri)?;
        self.require_role_type(&model.child_role_type_uri)?;

        let roles: Roles = [
            Role::new(parent.id, uri::PARENT_TYPE_ROLE),
            Role::new(child_node, uri::CHILD_TYPE_ROLE),
        ]
        .into_iter()
        .collect();
        let edge = self.create_edge(roles, props([
            (uri::ASSOC_TYPE_KEY, model.assoc_type_uri.as_str()),
            (uri::PARENT_ROLE_KEY, model.parent_role_type_uri.as_str()),
            (uri::CHILD_ROLE_KEY, model.child_role_type_uri.as_str()),
        ]))?;
        let def_type = self.type_node(uri::COMPOSITION_DEF)?;
        self.instantiate(ElementRef::Edge(edge), def_type)?;
        self.append_to_sequence(parent.id, parent_type_uri, edge)?;
        debug!(parent = parent_type_uri, child = %model.child_type_uri, edge = edge.0, "association definition added");

        let ty = self.refresh_type(parent.id)?;
        ty.assoc_def(&model.child_type_uri)
            .cloned()
            .ok_or_else(|| Error::Inconsistency(format!("new field \"{}\" missing after reload", model.child_type_uri)))
    }

    /// Remove a field. Existing child values of instances are left alone.
    pub fn remove_association_definition(&mut self, type_uri: &str, field_uri: &str) -> Result<()> {
        let ty = self.type_definition(type_uri)?;
        let def = ty.assoc_def(field_uri).cloned().ok_or_else(|| {
            Error::NotFound(format!("field \"{field_uri}\" of type \"{type_uri}\""))
        })?;
        self.remove_from_sequence(ty.id, type_uri, def.id)?;
        self.delete_edge_cascade(def.id)?;
        debug!(parent = type_uri, child = field_uri, "association definition removed");
        self.refresh_type(ty.id)?;
        Ok(())
    }

    /// Put the fields of a type in a new order.
    ///
    /// `ordered` must be a permutation of the current field URIs.
    pub fn reorder_fields<S: AsRef<str>>(&mut self, type_uri: &str, ordered: &[S]) -> Result<()> {
        let ty = self.type_definition(type_uri)?;
        let current: HashSet<&str> = ty.field_uris().into_iter().collect();
        let wanted: HashSet<&str> = ordered.iter().map(AsRef::as_ref).collect();
        if ordered.len() != current.len() || wanted.len() != ordered.len() || wanted != current {
            let given: Vec<&str> = ordered.iter().map(AsRef::as_ref).collect();
            return Err(Error::InvalidArgument(format!(
                "field order {given:?} is not a permutation of the fields {:?} of type \"{type_uri}\"",
                ty.field_uris()
            )));
        }

        let defs: Vec<EdgeId> = ordered
            .iter()
            .filter_map(|field| ty.assoc_def(field.as_ref()).map(|d| d.id))
            .collect();
        self.rebuild_sequence(ty.id, type_uri, &defs)?;
        self.refresh_type(ty.id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TopicGraph, TxMode};
    use pretty_assertions::assert_eq;

    fn setup(tx: &mut CoreTx<'_, crate::MemoryBackend>) {
        for field in ["t.a", "t.b", "t.c"] {
            tx.create_topic_type(TopicTypeModel::new(field, field, uri::TEXT)).unwrap();
        }
        tx.create_topic_type(TopicTypeModel::new("t.parent", "Parent", uri::COMPOSITE)).unwrap();
    }

    #[test]
    fn test_add_and_remove_definitions() {
        let graph = TopicGraph::open_memory().unwrap();
        let mut tx = graph.begin_tx(TxMode::ReadWrite).unwrap();
        setup(&mut tx);

        for field in ["t.a", "t.b", "t.c"] {
            tx.add_association_definition("t.parent", AssociationDefinitionModel::composition(field)).unwrap();
        }
        assert_eq!(tx.type_definition("t.parent").unwrap().field_uris(), vec!["t.a", "t.b", "t.c"]);

        tx.remove_association_definition("t.parent", "t.b").unwrap();
        let ty = tx.type_definition("t.parent").unwrap();
        assert_eq!(ty.field_uris(), vec!["t.a", "t.c"]);
        assert_eq!(tx.load_type(ty.id).unwrap().field_uris(), vec!["t.a", "t.c"]);
    }

    #[test]
    fn test_duplicate_and_bad_definitions() {
        let graph = TopicGraph::open_memory().unwrap();
        let mut tx = graph.begin_tx(TxMode::ReadWrite).unwrap();
        setup(&mut tx);

        tx.add_association_definition("t.parent", AssociationDefinitionModel::composition("t.a")).unwrap();
        let dup = tx.add_association_definition("t.parent", AssociationDefinitionModel::composition("t.a"));
        assert!(matches!(dup, Err(Error::InvalidArgument(_))));

        let not_composite = tx.add_association_definition("t.a", AssociationDefinitionModel::composition("t.b"));
        assert!(matches!(not_composite, Err(Error::InvalidArgument(_))));

        let bad_role = tx.add_association_definition(
            "t.parent",
            AssociationDefinitionModel::composition("t.b").with_roles("core.whole", "no.such.role"),
        );
        assert!(matches!(bad_role, Err(Error::NotFound(_))));

        for (parent_role, child_role) in [
            (uri::TYPE_ROLE, uri::INSTANCE_ROLE),
            (uri::PARENT_TYPE_ROLE, uri::CHILD_TYPE_ROLE),
            (uri::WHOLE_ROLE, uri::SUCCESSOR_ROLE),
        ] {
            let engine_role = tx.add_association_definition(
                "t.parent",
                AssociationDefinitionModel::composition("t.b").with_roles(parent_role, child_role),
            );
            assert!(matches!(engine_role, Err(Error::InvalidArgument(_))), "{parent_role}/{child_role}");
        }
        assert_eq!(tx.type_definition("t.parent").unwrap().field_uris(), vec!["t.a"]);
    }

    #[test]
    fn test_reorder_must_be_permutation() {
        let graph = TopicGraph::open_memory().unwrap();
        let mut tx = graph.begin_tx(TxMode::ReadWrite).unwrap();
        setup(&mut tx);
        for field in ["t.a", "t.b"] {
            tx.add_association_definition("t.parent", AssociationDefinitionModel::composition(field)).unwrap();
        }

        assert!(matches!(tx.reorder_fields("t.parent", &["t.a"]), Err(Error::InvalidArgument(_))));
        assert!(matches!(tx.reorder_fields("t.parent", &["t.a", "t.a"]), Err(Error::InvalidArgument(_))));
        assert!(matches!(tx.reorder_fields("t.parent", &["t.a", "t.c"]), Err(Error::InvalidArgument(_))));

        tx.reorder_fields("t.parent", &["t.b", "t.a"]).unwrap();
        assert_eq!(tx.type_definition("t.parent").unwrap().field_uris(), vec!["t.b", "t.a"]);
    }

    #[test]
    fn test_chain_mismatch_is_inconsistent() {
        let graph = TopicGraph::open_memory().unwrap();
        let mut tx = graph.begin_tx(TxMode::ReadWrite).unwrap();
        setup(&mut tx);
        let def = tx.add_association_definition("t.parent", AssociationDefinitionModel::composition("t.a")).unwrap();
        let parent = tx.type_node("t.parent").unwrap();

        tx.remove_from_sequence(parent, "t.parent", def.id).unwrap();
        assert!(matches!(tx.load_type(parent), Err(Error::Inconsistency(_))));
    }
}

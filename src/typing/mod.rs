//! Type resolution.
//!
//! A node's type is the node at the other end of its instance-of edge: the
//! node plays `core.instance`, its type plays `core.type`. The meta type is
//! the fixpoint; it has no instance-of edge and resolves to the synthetic
//! meta-meta-type.

use crate::index::IndexMode;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result};

impl<B: StorageBackend> CoreTx<'_, B> {
    /// Type of a node.
    ///
    /// Fails with `Inconsistency` if the node has no instance-of edge or more
    /// than one.
    pub fn resolve_type(&self, node: NodeId) -> Result<TypeOf> {
        self.require_node(node)?;
        if self.node_uri(node)? == uri::META_TYPE {
            return Ok(TypeOf::MetaMetaType);
        }
        match self.type_edge(ElementRef::Node(node))? {
            Some(type_node) => Ok(TypeOf::Resolved(self.type_ref(type_node)?)),
            None => Err(Error::Inconsistency(format!("No type node connected to node {node}"))),
        }
    }

    /// Type of an association, or `None` for the engine's typeless edges.
    pub fn resolve_association_type(&self, edge: EdgeId) -> Result<Option<TypeRef>> {
        self.require_edge(edge)?;
        self.type_edge(ElementRef::Edge(edge))?
            .map(|type_node| self.type_ref(type_node))
            .transpose()
    }

    /// URI of an element's type. Typeless edges resolve to `""`.
    pub(crate) fn type_uri_of(&self, element: ElementRef) -> Result<String> {
        match element {
            ElementRef::Node(id) => Ok(self.resolve_type(id)?.uri().to_string()),
            ElementRef::Edge(id) => Ok(self.resolve_association_type(id)?.map(|t| t.uri).unwrap_or_default()),
        }
    }

    fn type_edge(&self, instance: ElementRef) -> Result<Option<NodeId>> {
        let mut types = self
            .incident_edges(instance, Some(uri::INSTANCE_ROLE))?
            .into_iter()
            .filter(|e| e.meta_kind() == Some(MetaEdge::Instantiation))
            .filter_map(|e| e.player(uri::TYPE_ROLE));
        match (types.next(), types.next()) {
            (None, _) => Ok(None),
            (Some(ElementRef::Node(id)), None) => Ok(Some(id)),
            (Some(ElementRef::Edge(id)), None) => Err(Error::Inconsistency(format!(
                "{instance} is typed by edge {id}; types are nodes"
            ))),
            (Some(_), Some(_)) => Err(Error::Inconsistency(format!(
                "More than one type node connected to {instance}"
            ))),
        }
    }

    fn type_ref(&self, type_node: NodeId) -> Result<TypeRef> {
        Ok(TypeRef { id: type_node, uri: self.node_uri(type_node)? })
    }

    /// Connect `instance` to its type.
    pub(crate) fn instantiate(&mut self, instance: ElementRef, type_node: NodeId) -> Result<EdgeId> {
        let roles: Roles = [
            Role::new(type_node, uri::TYPE_ROLE),
            Role::new(instance, uri::INSTANCE_ROLE),
        ]
        .into_iter()
        .collect();
        self.create_edge(roles, PropertyMap::new())
    }

    /// Remove the instance-of edge of `instance`, if any.
    pub(crate) fn uninstantiate(&mut self, instance: ElementRef) -> Result<()> {
        let edges: Vec<EdgeId> = self
            .incident_edges(instance, Some(uri::INSTANCE_ROLE))?
            .into_iter()
            .filter(|e| e.meta_kind() == Some(MetaEdge::Instantiation))
            .map(|e| e.id)
            .collect();
        for id in edges {
            self.delete_edge(id)?;
        }
        Ok(())
    }

    /// Elements typed by `type_node`, in creation order.
    pub fn instances_of(&self, type_node: NodeId) -> Result<Vec<ElementRef>> {
        Ok(self
            .incident_edges(ElementRef::Node(type_node), Some(uri::TYPE_ROLE))?
            .into_iter()
            .filter(|e| e.meta_kind() == Some(MetaEdge::Instantiation))
            .filter_map(|e| e.player(uri::INSTANCE_ROLE))
            .collect())
    }

    // ========================================================================
    // Type nodes
    // ========================================================================

    /// The node of the type with URI `type_uri`.
    pub fn type_node(&self, type_uri: &str) -> Result<NodeId> {
        let node = self
            .node_by_uri(type_uri)?
            .ok_or_else(|| Error::NotFound(format!("type \"{type_uri}\"")))?;
        self.type_kind(node)?;
        Ok(node)
    }

    /// What instances of the type at `type_node` are. `InvalidArgument` if
    /// the node isn't a type.
    pub fn type_kind(&self, type_node: NodeId) -> Result<TypeKind> {
        match self.resolve_type(type_node)? {
            TypeOf::MetaMetaType => Ok(TypeKind::Meta),
            TypeOf::Resolved(t) => match t.uri.as_str() {
                uri::TOPIC_TYPE => Ok(TypeKind::Topic),
                uri::ASSOC_TYPE => Ok(TypeKind::Association),
                uri::META_TYPE => Ok(TypeKind::Meta),
                other => Err(Error::InvalidArgument(format!(
                    "node {type_node} is a \"{other}\" instance, not a type"
                ))),
            },
        }
    }

    /// Whether `node` is a type node.
    pub(crate) fn is_type(&self, node: NodeId) -> Result<bool> {
        match self.resolve_type(node)? {
            TypeOf::MetaMetaType => Ok(true),
            TypeOf::Resolved(t) => Ok(matches!(t.uri.as_str(), uri::TOPIC_TYPE | uri::ASSOC_TYPE | uri::META_TYPE)),
        }
    }

    /// URIs of all stored types, meta types first.
    pub fn all_type_uris(&self) -> Result<Vec<String>> {
        let mut uris = vec![uri::META_TYPE.to_string()];
        for meta in [uri::META_TYPE, uri::TOPIC_TYPE, uri::ASSOC_TYPE] {
            let node = self.type_node(meta)?;
            for instance in self.instances_of(node)? {
                if let ElementRef::Node(id) = instance {
                    let type_uri = self.node_uri(id)?;
                    if !uris.contains(&type_uri) {
                        uris.push(type_uri);
                    }
                }
            }
        }
        Ok(uris)
    }

    /// Materialise the full definition of the type stored at `type_node`.
    pub fn load_type(&self, type_node: NodeId) -> Result<TopicType> {
        let kind = self.type_kind(type_node)?;
        let element = ElementRef::Node(type_node);
        let type_uri = self.node_uri(type_node)?;
        let text = |key: &str| -> Result<String> {
            Ok(self
                .get_property(element, key)?
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default())
        };
        let value = text(uri::VALUE_KEY)?;
        let data_type_uri = text(uri::DATA_TYPE_KEY)?;
        let index_modes = IndexMode::split(&text(uri::INDEX_MODES_KEY)?)?;
        let assoc_defs = self.load_definitions(type_node, &type_uri)?;

        Ok(TopicType {
            id: type_node,
            uri: type_uri,
            value,
            kind,
            data_type_uri,
            index_modes,
            assoc_defs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TopicGraph, TxMode};

    #[test]
    fn test_meta_type_resolves_to_meta_meta_type() {
        let graph = TopicGraph::open_memory().unwrap();
        let tx = graph.begin_tx(TxMode::ReadOnly).unwrap();
        let meta = tx.type_node(uri::META_TYPE).unwrap();
        assert_eq!(tx.resolve_type(meta).unwrap(), TypeOf::MetaMetaType);
        assert_eq!(tx.type_kind(meta).unwrap(), TypeKind::Meta);
    }

    #[test]
    fn test_core_types_resolve() {
        let graph = TopicGraph::open_memory().unwrap();
        let tx = graph.begin_tx(TxMode::ReadOnly).unwrap();

        let topic_type = tx.type_node(uri::TOPIC_TYPE).unwrap();
        assert_eq!(tx.resolve_type(topic_type).unwrap().uri(), uri::META_TYPE);

        let text = tx.node_by_uri(uri::TEXT).unwrap().unwrap();
        assert_eq!(tx.resolve_type(text).unwrap().uri(), uri::DATA_TYPE);
        assert!(matches!(tx.type_node(uri::TEXT), Err(Error::InvalidArgument(_))));
        assert_eq!(tx.type_kind(tx.type_node(uri::COMPOSITION).unwrap()).unwrap(), TypeKind::Association);
    }

    #[test]
    fn test_untyped_node_is_inconsistent() {
        let graph = TopicGraph::open_memory().unwrap();
        let mut tx = graph.begin_tx(TxMode::ReadWrite).unwrap();
        let n = tx.create_node(PropertyMap::new()).unwrap();
        assert!(matches!(tx.resolve_type(n), Err(Error::Inconsistency(_))));
        assert!(matches!(tx.resolve_type(NodeId(987_654)), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_double_typed_node_is_inconsistent() {
        let graph = TopicGraph::open_memory().unwrap();
        let mut tx = graph.begin_tx(TxMode::ReadWrite).unwrap();
        let n = tx.create_node(PropertyMap::new()).unwrap();
        let data_type = tx.type_node(uri::DATA_TYPE).unwrap();
        let role_type = tx.type_node(uri::ROLE_TYPE).unwrap();
        tx.instantiate(ElementRef::Node(n), data_type).unwrap();
        assert_eq!(tx.resolve_type(n).unwrap().uri(), uri::DATA_TYPE);
        tx.instantiate(ElementRef::Node(n), role_type).unwrap();
        assert!(matches!(tx.resolve_type(n), Err(Error::Inconsistency(_))));
    }

    #[test]
    fn test_load_type_kinds() {
        let graph = TopicGraph::open_memory().unwrap();
        let tx = graph.begin_tx(TxMode::ReadOnly).unwrap();
        let composition = tx.load_type(tx.type_node(uri::COMPOSITION).unwrap()).unwrap();
        assert_eq!(composition.kind, TypeKind::Association);
        assert!(composition.assoc_defs.is_empty());
        let all = tx.all_type_uris().unwrap();
        assert!(all.contains(&uri::DATA_TYPE.to_string()));
        assert!(!all.contains(&uri::TEXT.to_string()));
    }
}

//! Composite values.
//!
//! A composite topic holds no value of its own. Each field is a child topic
//! of the field's type, connected through an association that uses the
//! definition's association type and role pair. Children are created lazily
//! the first time a field is set.

use crate::model::*;
use crate::storage::StorageBackend;
use crate::traverse::TraversalFilter;
use crate::tx::CoreTx;
use crate::{Error, Result};

impl<B: StorageBackend> CoreTx<'_, B> {
    fn check_depth(&self, depth: usize) -> Result<()> {
        let max = self.graph.config.max_composite_depth;
        if depth > max {
            return Err(Error::InvalidArgument(format!(
                "composite value nested deeper than {max} levels"
            )));
        }
        Ok(())
    }

    /// Reject values that don't fit the data type of `ty`.
    pub(crate) fn validate_value(&self, ty: &TopicType, value: &TopicValue) -> Result<()> {
        let fits = match (ty.data_type(), value) {
            (Some(DataType::Composite), TopicValue::Composite(_)) => true,
            (Some(data_type), TopicValue::Simple(v)) => data_type.accepts(v),
            (Some(_), TopicValue::Composite(_)) => false,
            (None, TopicValue::Simple(_)) => true,
            (None, TopicValue::Composite(_)) => false,
        };
        if !fits {
            return Err(Error::InvalidArgument(format!(
                "value {} doesn't fit data type \"{}\" of type \"{}\"",
                describe(value),
                ty.data_type_uri,
                ty.uri
            )));
        }
        Ok(())
    }

    /// The child topic linked to `parent` through `def`, with the linking
    /// association.
    pub(crate) fn child_topic(
        &self,
        parent: NodeId,
        def: &AssociationDefinition,
    ) -> Result<Option<(NodeId, EdgeId)>> {
        let filter = TraversalFilter::new()
            .my_role(&def.parent_role_type_uri)
            .others_role(&def.child_role_type_uri)
            .assoc_type(&def.assoc_type_uri)
            .others_topic_type(&def.child_type_uri);
        let hits = self.connected_players(ElementRef::Node(parent), &filter)?;
        match hits.as_slice() {
            [] => Ok(None),
            [(ElementRef::Node(child), edge)] => Ok(Some((*child, *edge))),
            [(ElementRef::Edge(id), _)] => Err(Error::Inconsistency(format!(
                "field \"{}\" of node {parent} is played by edge {id}",
                def.field_uri()
            ))),
            _ => Err(Error::Ambiguous(format!(
                "node {parent} has {} children for field \"{}\"",
                hits.len(),
                def.field_uri()
            ))),
        }
    }

    /// Value of `node` read as an instance of `ty`.
    pub(crate) fn load_value(&mut self, node: NodeId, ty: &TopicType, depth: usize) -> Result<TopicValue> {
        if !ty.is_composite() {
            let value = self.get_property(ElementRef::Node(node), uri::VALUE_KEY)?;
            return Ok(TopicValue::Simple(value.unwrap_or_default()));
        }
        if depth > self.graph.config.max_composite_depth {
            return Err(Error::Inconsistency(format!(
                "composite value of node {node} nested deeper than {} levels",
                self.graph.config.max_composite_depth
            )));
        }
        let mut children = CompositeValue::new();
        for def in &ty.assoc_defs {
            if let Some((child, _)) = self.child_topic(node, def)? {
                let child_ty = self.type_definition(&def.child_type_uri)?;
                let value = self.load_value(child, &child_ty, depth + 1)?;
                children.insert(def.child_type_uri.clone(), value);
            }
        }
        Ok(TopicValue::Composite(children))
    }

    /// Store `value` on `node`, an instance of `ty`.
    pub(crate) fn write_value(&mut self, node: NodeId, ty: &TopicType, value: TopicValue, depth: usize) -> Result<()> {
        self.validate_value(ty, &value)?;
        match value {
            TopicValue::Composite(tree) => self.materialize(node, ty, &tree, depth),
            // nothing to store on a composite
            TopicValue::Simple(_) if ty.is_composite() => Ok(()),
            TopicValue::Simple(v) => {
                self.set_property(ElementRef::Node(node), uri::VALUE_KEY, v, &ty.index_modes, &ty.uri)
            }
        }
    }

    /// Create a topic of type `ty` with `value`. No events are fired.
    pub(crate) fn create_instance(
        &mut self,
        ty: &TopicType,
        topic_uri: &str,
        value: TopicValue,
        depth: usize,
    ) -> Result<NodeId> {
        if ty.kind != TypeKind::Topic {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" is not a topic type",
                ty.uri
            )));
        }
        self.validate_value(ty, &value)?;
        if !topic_uri.is_empty() {
            self.ensure_uri_free(topic_uri)?;
        }
        let node = self.create_node(PropertyMap::new())?;
        self.claim_uri(ElementRef::Node(node), topic_uri)?;
        self.instantiate(ElementRef::Node(node), ty.id)?;
        self.write_value(node, ty, value, depth)?;
        Ok(node)
    }

    fn link_child(&mut self, parent: NodeId, def: &AssociationDefinition, child: NodeId) -> Result<EdgeId> {
        let roles = [
            Role::new(parent, def.parent_role_type_uri.as_str()),
            Role::new(child, def.child_role_type_uri.as_str()),
        ];
        self.create_association_record(&def.assoc_type_uri, roles.into_iter().collect())
    }

    /// Set one field of `parent`.
    ///
    /// Compositions update the linked child in place or create it.
    /// Aggregations share their children: a new scalar value re-links the
    /// parent to a topic that already has it (or a new one) and leaves the
    /// old child untouched. Returns the child now linked, if any.
    pub(crate) fn set_child(
        &mut self,
        parent: NodeId,
        def: &AssociationDefinition,
        value: TopicValue,
        depth: usize,
    ) -> Result<Option<NodeId>> {
        self.check_depth(depth)?;
        let child_ty = self.type_definition(&def.child_type_uri)?;
        self.validate_value(&child_ty, &value)?;
        let existing = self.child_topic(parent, def)?;

        if def.is_aggregation() {
            let scalar = match value {
                TopicValue::Simple(v) => v,
                TopicValue::Composite(_) => Value::Null,
            };
            return self.relink_aggregate(parent, def, &child_ty, existing, scalar, depth);
        }

        match existing {
            Some((child, _)) => {
                self.write_value(child, &child_ty, value, depth)?;
                Ok(Some(child))
            }
            None => {
                let child = self.create_instance(&child_ty, "", value, depth)?;
                self.link_child(parent, def, child)?;
                Ok(Some(child))
            }
        }
    }

    fn relink_aggregate(
        &mut self,
        parent: NodeId,
        def: &AssociationDefinition,
        child_ty: &TopicType,
        existing: Option<(NodeId, EdgeId)>,
        value: Value,
        depth: usize,
    ) -> Result<Option<NodeId>> {
        if let Some((child, edge)) = existing {
            let current = self.get_property(ElementRef::Node(child), uri::VALUE_KEY)?.unwrap_or_default();
            if current == value {
                return Ok(Some(child));
            }
            self.delete_edge_cascade(edge)?;
        }
        if value.is_null() {
            return Ok(None);
        }
        let target = match self.find_instance_by_value(child_ty, &value)? {
            Some(node) => node,
            None => self.create_instance(child_ty, "", TopicValue::Simple(value), depth)?,
        };
        self.link_child(parent, def, target)?;
        Ok(Some(target))
    }

    /// A topic of type `ty` whose value equals `value`.
    pub(crate) fn find_instance_by_value(&self, ty: &TopicType, value: &Value) -> Result<Option<NodeId>> {
        if ty.index_modes.contains(&crate::index::IndexMode::Key) {
            for hit in self.lookup(&ty.uri, value)? {
                if let ElementRef::Node(id) = hit {
                    if self.resolve_type(id)?.id() == Some(ty.id) {
                        return Ok(Some(id));
                    }
                }
            }
            return Ok(None);
        }
        for instance in self.instances_of(ty.id)? {
            if let ElementRef::Node(id) = instance {
                if self.get_property(instance, uri::VALUE_KEY)?.as_ref() == Some(value) {
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    /// Apply a value tree to `node`, nested composites before leaves.
    fn materialize(&mut self, node: NodeId, ty: &TopicType, tree: &CompositeValue, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        let (nested, leaves): (Vec<_>, Vec<_>) = tree
            .iter()
            .partition(|(_, value)| matches!(value, TopicValue::Composite(_)));
        for (field, value) in nested.into_iter().chain(leaves) {
            let def = ty.assoc_def(field).cloned().ok_or_else(|| {
                Error::InvalidArgument(format!("type \"{}\" has no field \"{field}\"", ty.uri))
            })?;
            self.set_child(node, &def, value.clone(), depth + 1)?;
        }
        Ok(())
    }

    // ========================================================================
    // Public surface
    // ========================================================================

    /// Apply a value tree to an existing composite topic.
    pub fn materialize_composite(&mut self, topic: NodeId, tree: &CompositeValue) -> Result<()> {
        let ty = self.topic_type_of(topic)?;
        self.materialize(topic, &ty, tree, 0)
    }

    /// Value of one field of `parent`. `None` if the child was never set.
    pub fn get_child_value(&mut self, parent: NodeId, field_uri: &str) -> Result<Option<TopicValue>> {
        let ty = self.topic_type_of(parent)?;
        let def = field_of(&ty, field_uri)?;
        match self.child_topic(parent, &def)? {
            Some((child, _)) => {
                let child_ty = self.type_definition(&def.child_type_uri)?;
                Ok(Some(self.load_value(child, &child_ty, 1)?))
            }
            None => Ok(None),
        }
    }

    /// Set one field of `parent`, creating the child if needed.
    pub fn set_child_value(&mut self, parent: NodeId, field_uri: &str, value: impl Into<TopicValue>) -> Result<()> {
        let ty = self.topic_type_of(parent)?;
        let def = field_of(&ty, field_uri)?;
        self.set_child(parent, &def, value.into(), 1)?;
        Ok(())
    }

    /// Type definition of a topic node.
    pub(crate) fn topic_type_of(&mut self, node: NodeId) -> Result<std::sync::Arc<TopicType>> {
        let type_uri = self.resolve_type(node)?.uri().to_string();
        self.type_definition(&type_uri)
    }
}

fn field_of(ty: &TopicType, field_uri: &str) -> Result<AssociationDefinition> {
    ty.assoc_def(field_uri)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("field \"{field_uri}\" of type \"{}\"", ty.uri)))
}

fn describe(value: &TopicValue) -> String {
    match value {
        TopicValue::Simple(v) => format!("{v} ({})", v.type_name()),
        TopicValue::Composite(c) => format!("composite with {} fields", c.len()),
    }
}

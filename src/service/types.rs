//! Topic types and association types.
//!
//! A rename touches everything that refers to a type by URI rather than by
//! node: the `uri` key, the tags of its field chain, the value index keys of
//! its instances, the `assoc_type_uri` of field definitions and the type
//! cache. All of it happens in the caller's transaction.

use std::sync::Arc;

use tracing::{debug, info};

use crate::access::Access;
use crate::index::IndexMode;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result, TopicGraph};

impl<B: StorageBackend> CoreTx<'_, B> {
    fn create_type(&mut self, model: TopicTypeModel, meta_uri: &str) -> Result<Arc<TopicType>> {
        if model.uri.is_empty() {
            return Err(Error::InvalidArgument(format!("\"{}\" needs a URI to be a type", model.value)));
        }
        if DataType::from_uri(&model.data_type_uri).is_none() {
            return Err(Error::InvalidArgument(format!(
                "type \"{}\" has unknown data type \"{}\"",
                model.uri, model.data_type_uri
            )));
        }
        let meta = self.type_node(meta_uri)?;
        self.check_access(Access::Write, ElementRef::Node(meta))?;
        self.ensure_uri_free(&model.uri)?;

        let node = self.create_node(props([
            (uri::VALUE_KEY, model.value.as_str()),
            (uri::DATA_TYPE_KEY, model.data_type_uri.as_str()),
            (uri::INDEX_MODES_KEY, IndexMode::join(&model.index_modes).as_str()),
        ]))?;
        self.claim_uri(ElementRef::Node(node), &model.uri)?;
        self.instantiate(ElementRef::Node(node), meta)?;
        self.refresh_type(node)?;

        for def in model.assoc_defs {
            self.add_association_definition(&model.uri, def)?;
        }
        let ty = self.refresh_type(node)?;
        debug!(node = node.0, uri = %ty.uri, kind = ?ty.kind, "type created");
        Ok(ty)
    }

    /// Create a topic type together with its fields.
    pub fn create_topic_type(&mut self, model: TopicTypeModel) -> Result<Arc<TopicType>> {
        self.create_type(model, uri::TOPIC_TYPE)
    }

    pub fn create_association_type(&mut self, model: TopicTypeModel) -> Result<Arc<TopicType>> {
        self.create_type(model, uri::ASSOC_TYPE)
    }

    /// A type definition, access-checked. Works for association types too.
    pub fn get_topic_type(&mut self, type_uri: &str) -> Result<Arc<TopicType>> {
        let ty = self.type_definition(type_uri)?;
        self.check_access(Access::Read, ElementRef::Node(ty.id))?;
        Ok(ty)
    }

    fn types_of(&mut self, meta_uri: &str) -> Result<Vec<Arc<TopicType>>> {
        let meta = self.type_node(meta_uri)?;
        let mut types = Vec::new();
        for instance in self.instances_of(meta)? {
            let ElementRef::Node(id) = instance else { continue };
            if !self.may(Access::Read, instance) {
                continue;
            }
            let type_uri = self.node_uri(id)?;
            types.push(self.type_definition(&type_uri)?);
        }
        Ok(types)
    }

    /// All readable topic types.
    pub fn get_topic_types(&mut self) -> Result<Vec<Arc<TopicType>>> {
        self.types_of(uri::TOPIC_TYPE)
    }

    /// All readable association types.
    pub fn get_association_types(&mut self) -> Result<Vec<Arc<TopicType>>> {
        self.types_of(uri::ASSOC_TYPE)
    }

    /// Give a type a new URI. Core types keep theirs and no type can take
    /// a `core.` URI.
    pub fn rename_type(&mut self, old_uri: &str, new_uri: &str) -> Result<Arc<TopicType>> {
        if uri::is_core(old_uri) {
            return Err(Error::InvalidArgument(format!("core type \"{old_uri}\" can't be renamed")));
        }
        let ty = self.type_definition(old_uri)?;
        if old_uri == new_uri {
            return Ok(ty);
        }
        if new_uri.is_empty() {
            return Err(Error::InvalidArgument(format!("type \"{old_uri}\" can't lose its URI")));
        }
        if uri::is_core(new_uri) {
            return Err(Error::InvalidArgument(format!(
                "type \"{old_uri}\" can't move into the core namespace as \"{new_uri}\""
            )));
        }
        self.check_access(Access::Write, ElementRef::Node(ty.id))?;
        self.ensure_uri_free(new_uri)?;

        let node = ElementRef::Node(ty.id);
        self.set_property(node, uri::URI_KEY, Value::from(new_uri), &[IndexMode::Key], uri::URI_KEY)?;
        let retagged = self.retag_sequence(ty.id, old_uri, new_uri)?;

        let instances = self.instances_of(ty.id)?;
        if !ty.index_modes.is_empty() {
            for &instance in &instances {
                self.rekey_index(instance, uri::VALUE_KEY, &ty.index_modes, old_uri, new_uri)?;
            }
        }

        let def_type = self.type_node(uri::COMPOSITION_DEF)?;
        let mut rewritten = 0;
        for def in self.instances_of(def_type)? {
            if self.get_property(def, uri::ASSOC_TYPE_KEY)?.as_ref().and_then(Value::as_str) == Some(old_uri) {
                self.set_property(def, uri::ASSOC_TYPE_KEY, Value::from(new_uri), &[], "")?;
                rewritten += 1;
            }
        }

        self.invalidate_type(old_uri)?;
        let renamed = self.refresh_type(ty.id)?;
        for cached_uri in self.cached_type_uris() {
            if cached_uri == new_uri {
                continue;
            }
            let cached = self.type_definition(&cached_uri)?;
            let refers = cached
                .assoc_defs
                .iter()
                .any(|d| d.child_type_uri == old_uri || d.assoc_type_uri == old_uri);
            if refers {
                self.refresh_type(cached.id)?;
            }
        }

        info!(
            old = old_uri,
            new = new_uri,
            chain_edges = retagged,
            instances = instances.len(),
            definitions = rewritten,
            "type renamed"
        );
        Ok(renamed)
    }

    /// Change how the values of a type's instances are indexed. Existing
    /// entries are moved over.
    pub fn set_index_modes(&mut self, type_uri: &str, modes: &[IndexMode]) -> Result<Arc<TopicType>> {
        let ty = self.type_definition(type_uri)?;
        self.check_access(Access::Write, ElementRef::Node(ty.id))?;
        for instance in self.instances_of(ty.id)? {
            self.change_index_modes(instance, uri::VALUE_KEY, &ty.index_modes, modes, &ty.uri)?;
        }
        let joined = IndexMode::join(modes);
        self.set_property(ElementRef::Node(ty.id), uri::INDEX_MODES_KEY, Value::from(joined), &[], "")?;
        debug!(uri = type_uri, modes = %IndexMode::join(modes), "index modes changed");
        self.refresh_type(ty.id)
    }

    /// Delete a type that nothing uses.
    ///
    /// Fails with `ConstraintViolation` while the type has instances, is the
    /// field type of another type or the association type of a field, and
    /// for the built-in `core.` types.
    pub fn delete_type(&mut self, type_uri: &str) -> Result<()> {
        let ty = self.type_definition(type_uri)?;
        if uri::is_core(type_uri) {
            return Err(Error::ConstraintViolation(format!("core type \"{type_uri}\" can't be deleted")));
        }
        self.check_access(Access::Write, ElementRef::Node(ty.id))?;

        let instances = self.instances_of(ty.id)?.len();
        if instances > 0 {
            return Err(Error::ConstraintViolation(format!(
                "type \"{type_uri}\" still has {instances} instances"
            )));
        }
        // a type may be its own field type; that link goes with the type
        let used = self
            .definitions_using(ty.id)?
            .iter()
            .filter(|e| e.player(uri::PARENT_TYPE_ROLE) != Some(ElementRef::Node(ty.id)))
            .count();
        if used > 0 {
            return Err(Error::ConstraintViolation(format!(
                "type \"{type_uri}\" is the field type of {used} association definitions"
            )));
        }
        let def_type = self.type_node(uri::COMPOSITION_DEF)?;
        for def in self.instances_of(def_type)? {
            if self.get_property(def, uri::ASSOC_TYPE_KEY)?.as_ref().and_then(Value::as_str) == Some(type_uri) {
                return Err(Error::ConstraintViolation(format!(
                    "type \"{type_uri}\" is the association type of definition {def}"
                )));
            }
        }

        for def in &ty.assoc_defs {
            self.remove_association_definition(type_uri, def.field_uri())?;
        }
        self.forget_type(type_uri);
        let node = ElementRef::Node(ty.id);
        self.uninstantiate(node)?;
        self.delete_node(ty.id)?;
        debug!(node = ty.id.0, uri = type_uri, "type deleted");
        Ok(())
    }
}

// ============================================================================
// One transaction per call
// ============================================================================

impl<B: StorageBackend> TopicGraph<B> {
    pub fn create_topic_type(&self, model: TopicTypeModel) -> Result<Arc<TopicType>> {
        self.write(format!("topic type \"{}\" can't be created", model.uri), |tx| {
            tx.create_topic_type(model)
        })
    }

    pub fn create_association_type(&self, model: TopicTypeModel) -> Result<Arc<TopicType>> {
        self.write(format!("association type \"{}\" can't be created", model.uri), |tx| {
            tx.create_association_type(model)
        })
    }

    pub fn get_topic_type(&self, type_uri: &str) -> Result<Arc<TopicType>> {
        self.read(format!("type \"{type_uri}\" can't be fetched"), |tx| tx.get_topic_type(type_uri))
    }

    pub fn get_topic_types(&self) -> Result<Vec<Arc<TopicType>>> {
        self.read("topic types can't be fetched", |tx| tx.get_topic_types())
    }

    pub fn get_association_types(&self) -> Result<Vec<Arc<TopicType>>> {
        self.read("association types can't be fetched", |tx| tx.get_association_types())
    }

    pub fn add_association_definition(
        &self,
        parent_type_uri: &str,
        model: AssociationDefinitionModel,
    ) -> Result<AssociationDefinition> {
        let operation = format!(
            "field \"{}\" can't be added to type \"{parent_type_uri}\"",
            model.child_type_uri
        );
        self.write(operation, |tx| {
            let parent = tx.type_node(parent_type_uri)?;
            tx.check_access(Access::Write, ElementRef::Node(parent))?;
            tx.add_association_definition(parent_type_uri, model)
        })
    }

    pub fn remove_association_definition(&self, type_uri: &str, field_uri: &str) -> Result<()> {
        self.write(
            format!("field \"{field_uri}\" can't be removed from type \"{type_uri}\""),
            |tx| {
                let parent = tx.type_node(type_uri)?;
                tx.check_access(Access::Write, ElementRef::Node(parent))?;
                tx.remove_association_definition(type_uri, field_uri)
            },
        )
    }

    pub fn reorder_fields<S: AsRef<str>>(&self, type_uri: &str, ordered: &[S]) -> Result<()> {
        self.write(format!("fields of type \"{type_uri}\" can't be reordered"), |tx| {
            let parent = tx.type_node(type_uri)?;
            tx.check_access(Access::Write, ElementRef::Node(parent))?;
            tx.reorder_fields(type_uri, ordered)
        })
    }

    pub fn rename_type(&self, old_uri: &str, new_uri: &str) -> Result<Arc<TopicType>> {
        self.write(format!("type \"{old_uri}\" can't be renamed to \"{new_uri}\""), |tx| {
            tx.rename_type(old_uri, new_uri)
        })
    }

    pub fn set_index_modes(&self, type_uri: &str, modes: &[IndexMode]) -> Result<Arc<TopicType>> {
        self.write(format!("index modes of type \"{type_uri}\" can't be set"), |tx| {
            tx.set_index_modes(type_uri, modes)
        })
    }

    pub fn delete_type(&self, type_uri: &str) -> Result<()> {
        self.write(format!("type \"{type_uri}\" can't be deleted"), |tx| tx.delete_type(type_uri))
    }
}

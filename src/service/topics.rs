//! Topic CRUD.
//!
//! Deleting a topic removes, in order: its associations (with whatever hangs
//! off them), its composition children, its instance-of edge and finally the
//! node. Type nodes are handed to the type operations instead.

use hashbrown::HashSet;
use tracing::debug;

use crate::access::Access;
use crate::events::CoreEvent;
use crate::index::IndexMode;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::traverse::TraversalFilter;
use crate::tx::CoreTx;
use crate::{Error, Result, TopicGraph};

impl<B: StorageBackend> CoreTx<'_, B> {
    /// Read a topic without access checks or events.
    pub(crate) fn load_topic(&mut self, id: NodeId) -> Result<Topic> {
        if id == NodeId::ROOT {
            return Err(Error::NotFound(format!("topic {id}")));
        }
        let type_of = self.resolve_type(id)?;
        let value = match &type_of {
            TypeOf::MetaMetaType => {
                TopicValue::Simple(self.get_property(ElementRef::Node(id), uri::VALUE_KEY)?.unwrap_or_default())
            }
            TypeOf::Resolved(t) => {
                let ty = self.type_definition(&t.uri)?;
                self.load_value(id, &ty, 0)?
            }
        };
        Ok(Topic {
            id,
            uri: self.node_uri(id)?,
            type_uri: type_of.uri().to_string(),
            value,
        })
    }

    /// Load a topic for a caller and let listeners enrich it.
    fn hand_out(&mut self, id: NodeId) -> Result<Topic> {
        let mut topic = self.load_topic(id)?;
        self.fire(&mut CoreEvent::EnrichTopic(&mut topic))?;
        Ok(topic)
    }

    /// Readable topics among `elements`, in order, without duplicates.
    fn readable_topics(&mut self, elements: impl IntoIterator<Item = ElementRef>) -> Result<Vec<Topic>> {
        let mut seen = HashSet::new();
        let mut topics = Vec::new();
        for element in elements {
            let ElementRef::Node(id) = element else { continue };
            if id == NodeId::ROOT || !seen.insert(id) || !self.may(Access::Read, element) {
                continue;
            }
            topics.push(self.hand_out(id)?);
        }
        Ok(topics)
    }

    pub fn create_topic(&mut self, mut model: TopicModel) -> Result<Topic> {
        self.fire(&mut CoreEvent::PreCreateTopic(&mut model))?;
        let ty = self.type_definition(&model.type_uri)?;
        self.check_access(Access::Write, ElementRef::Node(ty.id))?;

        let id = self.create_instance(&ty, &model.uri, model.value, 0)?;
        let topic = self.load_topic(id)?;
        debug!(node = id.0, type_uri = %ty.uri, "topic created");
        self.fire(&mut CoreEvent::PostCreateTopic(&topic))?;
        Ok(topic)
    }

    pub fn get_topic(&mut self, id: NodeId) -> Result<Topic> {
        self.check_access(Access::Read, ElementRef::Node(id))?;
        self.hand_out(id)
    }

    pub fn get_topic_by_uri(&mut self, topic_uri: &str) -> Result<Option<Topic>> {
        match self.node_by_uri(topic_uri)? {
            Some(id) => self.get_topic(id).map(Some),
            None => Ok(None),
        }
    }

    /// The topic indexed under `key` with exactly `value`.
    ///
    /// Fails with `Ambiguous` when more than one topic matches.
    pub fn get_topic_by_value(&mut self, key: &str, value: &Value) -> Result<Option<Topic>> {
        let hits = self.topic_hits(key, value)?;
        self.single_topic(&hits, || format!("{} topics have {key} = {value}", hits.len()))
    }

    /// Like [`get_topic_by_value`](Self::get_topic_by_value), restricted to
    /// topics of one type.
    pub fn get_topic_by_value_of_type(&mut self, key: &str, value: &Value, type_uri: &str) -> Result<Option<Topic>> {
        let mut hits = Vec::new();
        for id in self.topic_hits(key, value)? {
            if self.resolve_type(id)?.uri() == type_uri {
                hits.push(id);
            }
        }
        self.single_topic(&hits, || {
            format!("{} topics of type \"{type_uri}\" have {key} = {value}", hits.len())
        })
    }

    fn topic_hits(&self, key: &str, value: &Value) -> Result<Vec<NodeId>> {
        Ok(self.lookup(key, value)?.into_iter().filter_map(|e| e.as_node()).collect())
    }

    fn single_topic(&mut self, hits: &[NodeId], ambiguous: impl FnOnce() -> String) -> Result<Option<Topic>> {
        match hits {
            [] => Ok(None),
            [id] => self.get_topic(*id).map(Some),
            _ => Err(Error::Ambiguous(ambiguous())),
        }
    }

    /// All readable instances of a type, in creation order.
    pub fn get_topics_by_type(&mut self, type_uri: &str) -> Result<Vec<Topic>> {
        let type_node = self.type_node(type_uri)?;
        let instances = self.instances_of(type_node)?;
        self.readable_topics(instances)
    }

    /// Fulltext search over topic values. See [`CoreTx::search`].
    pub fn search_topics(&mut self, bucket: Option<&str>, term: &str, whole_word: bool) -> Result<Vec<Topic>> {
        let hits = self.search(bucket, term, whole_word)?;
        self.readable_topics(hits)
    }

    /// Readable topics connected to `id` through edges accepted by `filter`.
    pub fn get_related_topics(&mut self, id: NodeId, filter: &TraversalFilter) -> Result<Vec<Topic>> {
        let players = self.connected_players(ElementRef::Node(id), filter)?;
        self.readable_topics(players.into_iter().map(|(player, _)| player))
    }

    /// Change a topic's URI and/or value.
    ///
    /// Composite values are merged: fields missing from the new tree keep
    /// their children. On a type node a URI change is a type rename.
    pub fn update_topic(&mut self, id: NodeId, mut update: TopicUpdate) -> Result<Topic> {
        self.check_access(Access::Write, ElementRef::Node(id))?;
        let old = self.load_topic(id)?;
        self.fire(&mut CoreEvent::PreUpdateTopic { topic: &old, update: &mut update })?;

        if self.is_type(id)? {
            self.update_type_node(&old, update)?;
        } else {
            if let Some(new_uri) = update.uri.filter(|u| *u != old.uri) {
                self.change_uri(id, &new_uri)?;
            }
            if let Some(value) = update.value {
                let ty = self.type_definition(&old.type_uri)?;
                self.write_value(id, &ty, value, 0)?;
            }
        }

        let topic = self.load_topic(id)?;
        debug!(node = id.0, "topic updated");
        self.fire(&mut CoreEvent::PostUpdateTopic { topic: &topic, old: &old })?;
        Ok(topic)
    }

    fn change_uri(&mut self, id: NodeId, new_uri: &str) -> Result<()> {
        let element = ElementRef::Node(id);
        if new_uri.is_empty() {
            self.remove_property(element, uri::URI_KEY, &[IndexMode::Key], uri::URI_KEY)?;
            return Ok(());
        }
        self.ensure_uri_free(new_uri)?;
        self.set_property(element, uri::URI_KEY, Value::from(new_uri), &[IndexMode::Key], uri::URI_KEY)
    }

    fn update_type_node(&mut self, old: &Topic, update: TopicUpdate) -> Result<()> {
        let mut current_uri = old.uri.clone();
        if let Some(new_uri) = update.uri.filter(|u| *u != old.uri) {
            self.rename_type(&old.uri, &new_uri)?;
            current_uri = new_uri;
        }
        if let Some(value) = update.value {
            let Some(name) = value.as_simple().and_then(Value::as_str) else {
                return Err(Error::InvalidArgument(format!(
                    "the value of type \"{current_uri}\" is its name and must be text"
                )));
            };
            self.set_property(ElementRef::Node(old.id), uri::VALUE_KEY, Value::from(name), &[], "")?;
            self.refresh_type(old.id)?;
        }
        Ok(())
    }

    pub fn delete_topic(&mut self, id: NodeId) -> Result<()> {
        self.check_access(Access::Write, ElementRef::Node(id))?;
        if id != NodeId::ROOT && self.is_type(id)? {
            let topic = self.load_topic(id)?;
            self.fire(&mut CoreEvent::PreDeleteTopic(&topic))?;
            self.delete_type(&topic.uri)?;
            self.fire(&mut CoreEvent::PostDeleteTopic(&topic))?;
            return Ok(());
        }
        self.remove_topic(id)
    }

    /// Delete a plain topic and everything it owns. No access checks.
    pub(crate) fn remove_topic(&mut self, id: NodeId) -> Result<()> {
        let topic = self.load_topic(id)?;
        self.fire(&mut CoreEvent::PreDeleteTopic(&topic))?;

        let ty = self.type_definition(&topic.type_uri)?;
        let mut children = Vec::new();
        if self.graph.config.cascade_composition_delete {
            for def in ty.assoc_defs.iter().filter(|d| d.is_composition()) {
                if let Some((child, _)) = self.child_topic(id, def)? {
                    children.push(child);
                }
            }
        }

        let element = ElementRef::Node(id);
        for edge in self.incident_edges(element, None)? {
            if edge.meta_kind().is_some() || !self.exists(ElementRef::Edge(edge.id))? {
                continue;
            }
            if self.resolve_association_type(edge.id)?.is_some() {
                self.remove_association(edge.id)?;
            } else {
                self.delete_edge_cascade(edge.id)?;
            }
        }
        for child in children {
            if self.exists(ElementRef::Node(child))? {
                self.remove_topic(child)?;
            }
        }
        self.uninstantiate(element)?;
        self.delete_node(id)?;
        debug!(node = id.0, type_uri = %topic.type_uri, "topic deleted");

        self.fire(&mut CoreEvent::PostDeleteTopic(&topic))?;
        Ok(())
    }
}

// ============================================================================
// One transaction per call
// ============================================================================

impl<B: StorageBackend> TopicGraph<B> {
    pub fn create_topic(&self, model: TopicModel) -> Result<Topic> {
        self.write(format!("topic of type \"{}\" can't be created", model.type_uri), |tx| {
            tx.create_topic(model)
        })
    }

    pub fn get_topic(&self, id: NodeId) -> Result<Topic> {
        self.read(format!("topic {id} can't be fetched"), |tx| tx.get_topic(id))
    }

    pub fn get_topic_by_uri(&self, topic_uri: &str) -> Result<Option<Topic>> {
        self.read(format!("topic \"{topic_uri}\" can't be fetched"), |tx| tx.get_topic_by_uri(topic_uri))
    }

    pub fn get_topic_by_value(&self, key: &str, value: &Value) -> Result<Option<Topic>> {
        self.read(format!("topic with {key} = {value} can't be fetched"), |tx| {
            tx.get_topic_by_value(key, value)
        })
    }

    pub fn get_topic_by_value_of_type(&self, key: &str, value: &Value, type_uri: &str) -> Result<Option<Topic>> {
        self.read(
            format!("topic of type \"{type_uri}\" with {key} = {value} can't be fetched"),
            |tx| tx.get_topic_by_value_of_type(key, value, type_uri),
        )
    }

    pub fn get_topics_by_type(&self, type_uri: &str) -> Result<Vec<Topic>> {
        self.read(format!("topics of type \"{type_uri}\" can't be fetched"), |tx| {
            tx.get_topics_by_type(type_uri)
        })
    }

    pub fn search_topics(&self, bucket: Option<&str>, term: &str, whole_word: bool) -> Result<Vec<Topic>> {
        self.read(format!("topics matching \"{term}\" can't be searched"), |tx| {
            tx.search_topics(bucket, term, whole_word)
        })
    }

    pub fn get_related_topics(&self, id: NodeId, filter: &TraversalFilter) -> Result<Vec<Topic>> {
        self.read(format!("topics related to topic {id} can't be fetched"), |tx| {
            tx.get_related_topics(id, filter)
        })
    }

    pub fn update_topic(&self, id: NodeId, update: TopicUpdate) -> Result<Topic> {
        self.write(format!("topic {id} can't be updated"), |tx| tx.update_topic(id, update))
    }

    pub fn delete_topic(&self, id: NodeId) -> Result<()> {
        self.write(format!("topic {id} can't be deleted"), |tx| tx.delete_topic(id))
    }

    pub fn get_child_value(&self, parent: NodeId, field_uri: &str) -> Result<Option<TopicValue>> {
        self.read(format!("field \"{field_uri}\" of topic {parent} can't be read"), |tx| {
            tx.check_access(Access::Read, ElementRef::Node(parent))?;
            tx.get_child_value(parent, field_uri)
        })
    }

    pub fn set_child_value(&self, parent: NodeId, field_uri: &str, value: impl Into<TopicValue>) -> Result<()> {
        let value = value.into();
        self.write(format!("field \"{field_uri}\" of topic {parent} can't be set"), |tx| {
            tx.check_access(Access::Write, ElementRef::Node(parent))?;
            tx.set_child_value(parent, field_uri, value)
        })
    }

    pub fn materialize_composite(&self, topic: NodeId, tree: &CompositeValue) -> Result<()> {
        self.write(format!("composite value of topic {topic} can't be written"), |tx| {
            tx.check_access(Access::Write, ElementRef::Node(topic))?;
            tx.materialize_composite(topic, tree)
        })
    }
}

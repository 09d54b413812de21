//! Core events and listeners.
//!
//! Listeners run synchronously, in registration order, inside the
//! transaction of the operation that fired the event. They get that
//! transaction and may read or write through it. An error from any listener
//! aborts the operation, and its transaction rolls back.

use std::fmt;
use std::sync::Arc;

use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::Result;

/// Something the engine is about to do, or just did.
///
/// `Pre*` events can still change the input through the `&mut` payloads.
#[derive(Debug)]
pub enum CoreEvent<'a> {
    PreCreateTopic(&'a mut TopicModel),
    PostCreateTopic(&'a Topic),
    PreUpdateTopic { topic: &'a Topic, update: &'a mut TopicUpdate },
    PostUpdateTopic { topic: &'a Topic, old: &'a Topic },
    PreDeleteTopic(&'a Topic),
    PostDeleteTopic(&'a Topic),
    PreCreateAssociation(&'a mut AssociationModel),
    PostCreateAssociation(&'a Association),
    PreDeleteAssociation(&'a Association),
    PostDeleteAssociation(&'a Association),
    /// A topic is being handed out; listeners may add to it.
    EnrichTopic(&'a mut Topic),
}

impl CoreEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            CoreEvent::PreCreateTopic(_) => "pre_create_topic",
            CoreEvent::PostCreateTopic(_) => "post_create_topic",
            CoreEvent::PreUpdateTopic { .. } => "pre_update_topic",
            CoreEvent::PostUpdateTopic { .. } => "post_update_topic",
            CoreEvent::PreDeleteTopic(_) => "pre_delete_topic",
            CoreEvent::PostDeleteTopic(_) => "post_delete_topic",
            CoreEvent::PreCreateAssociation(_) => "pre_create_association",
            CoreEvent::PostCreateAssociation(_) => "post_create_association",
            CoreEvent::PreDeleteAssociation(_) => "pre_delete_association",
            CoreEvent::PostDeleteAssociation(_) => "post_delete_association",
            CoreEvent::EnrichTopic(_) => "enrich_topic",
        }
    }
}

impl fmt::Display for CoreEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives core events.
pub trait Listener<B: StorageBackend>: Send + Sync {
    fn on_event(&self, tx: &mut CoreTx<'_, B>, event: &mut CoreEvent<'_>) -> Result<()>;
}

/// Ordered set of listeners.
pub struct ListenerRegistry<B: StorageBackend> {
    listeners: Vec<Arc<dyn Listener<B>>>,
}

impl<B: StorageBackend> ListenerRegistry<B> {
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    pub fn register(&mut self, listener: Arc<dyn Listener<B>>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Listener<B>>> {
        self.listeners.iter()
    }
}

impl<B: StorageBackend> Default for ListenerRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: StorageBackend> CoreTx<'_, B> {
    /// Hand `event` to every listener, stopping at the first error.
    pub fn fire(&mut self, event: &mut CoreEvent<'_>) -> Result<()> {
        let graph = self.graph;
        for listener in graph.listeners.iter() {
            listener.on_event(self, event)?;
        }
        Ok(())
    }
}

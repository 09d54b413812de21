//! Node in the hypergraph.

use serde::{Deserialize, Serialize};
use super::{EdgeId, PropertyMap, Value};

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// The reserved root node. It carries global counters and has no type.
    pub const ROOT: NodeId = NodeId(0);
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to anything that can play a role in an edge or own properties.
///
/// Nodes and edges live in separate id spaces, so the kind is part of the
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ElementRef {
    Node(NodeId),
    Edge(EdgeId),
}

impl ElementRef {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            ElementRef::Node(id) => Some(*id),
            ElementRef::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            ElementRef::Edge(id) => Some(*id),
            ElementRef::Node(_) => None,
        }
    }
}

impl From<NodeId> for ElementRef {
    fn from(id: NodeId) -> Self { ElementRef::Node(id) }
}

impl From<EdgeId> for ElementRef {
    fn from(id: EdgeId) -> Self { ElementRef::Edge(id) }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementRef::Node(id) => write!(f, "node {id}"),
            ElementRef::Edge(id) => write!(f, "edge {id}"),
        }
    }
}

/// A stored node: identity plus flat properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub properties: PropertyMap,
}

impl NodeRecord {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

//! Edge (association) in the hypergraph.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{ElementRef, PropertyMap, Value, uri};

/// Opaque edge identifier. Separate id space from [`super::NodeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One end of an edge: a player and the part it plays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub player: ElementRef,
    pub role_type: String,
}

impl Role {
    pub fn new(player: impl Into<ElementRef>, role_type: impl Into<String>) -> Self {
        Self { player: player.into(), role_type: role_type.into() }
    }
}

/// Roles of an edge. Binary edges stay inline.
pub type Roles = SmallVec<[Role; 2]>;

/// Edges the engine uses for its own bookkeeping. They carry no type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaEdge {
    /// instance → type
    Instantiation,
    /// type → first association definition
    SequenceStart,
    /// association definition → next association definition
    Sequence,
}

/// A stored edge connecting two or more players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub roles: Roles,
    pub properties: PropertyMap,
}

impl EdgeRecord {
    pub fn new(id: EdgeId, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            id,
            roles: roles.into_iter().collect(),
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

    pub fn arity(&self) -> usize {
        self.roles.len()
    }

    /// Whether `player` takes part in this edge at all.
    pub fn involves(&self, player: ElementRef) -> bool {
        self.roles.iter().any(|r| r.player == player)
    }

    /// Players filling `role_type`.
    pub fn players_with_role<'a>(&'a self, role_type: &'a str) -> impl Iterator<Item = ElementRef> + 'a {
        self.roles.iter().filter(move |r| r.role_type == role_type).map(|r| r.player)
    }

    /// The single player filling `role_type`, if exactly one does.
    pub fn player(&self, role_type: &str) -> Option<ElementRef> {
        let mut it = self.players_with_role(role_type);
        match (it.next(), it.next()) {
            (Some(p), None) => Some(p),
            _ => None,
        }
    }

    /// Whether `player` plays `role_type` in this edge.
    pub fn plays(&self, player: ElementRef, role_type: &str) -> bool {
        self.roles.iter().any(|r| r.player == player && r.role_type == role_type)
    }

    /// Value of the `type_uri` tag carried by sequence edges.
    pub fn tag(&self) -> Option<&str> {
        self.get(uri::SEQUENCE_TAG).and_then(Value::as_str)
    }

    /// Classify engine-internal edges by their role pair.
    pub fn meta_kind(&self) -> Option<MetaEdge> {
        let has = |role: &str| self.roles.iter().any(|r| r.role_type == role);
        if self.arity() != 2 {
            return None;
        }
        if has(uri::TYPE_ROLE) && has(uri::INSTANCE_ROLE) {
            Some(MetaEdge::Instantiation)
        } else if has(uri::SEQUENCE_OWNER_ROLE) && has(uri::SEQUENCE_HEAD_ROLE) {
            Some(MetaEdge::SequenceStart)
        } else if has(uri::PREDECESSOR_ROLE) && has(uri::SUCCESSOR_ROLE) {
            Some(MetaEdge::Sequence)
        } else {
            None
        }
    }
}

//! Topic and association DTOs exchanged with callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{EdgeId, ElementRef, NodeId, Value};
use crate::{Error, Result};

// ============================================================================
// Values
// ============================================================================

/// Child values of a composite topic, keyed by child type URI.
pub type CompositeValue = BTreeMap<String, TopicValue>;

/// The full value of a topic: a scalar, or a tree of child values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicValue {
    Simple(Value),
    Composite(CompositeValue),
}

impl TopicValue {
    pub fn composite() -> Self {
        TopicValue::Composite(CompositeValue::new())
    }

    /// Builder for composite literals.
    pub fn with(mut self, child_type_uri: impl Into<String>, value: impl Into<TopicValue>) -> Self {
        if let TopicValue::Composite(children) = &mut self {
            children.insert(child_type_uri.into(), value.into());
        }
        self
    }

    pub fn as_simple(&self) -> Option<&Value> {
        match self {
            TopicValue::Simple(v) => Some(v),
            TopicValue::Composite(_) => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeValue> {
        match self {
            TopicValue::Composite(c) => Some(c),
            TopicValue::Simple(_) => None,
        }
    }

    /// Child value by child type URI (composite values only).
    pub fn child(&self, child_type_uri: &str) -> Option<&TopicValue> {
        self.as_composite().and_then(|c| c.get(child_type_uri))
    }
}

impl Default for TopicValue {
    fn default() -> Self {
        TopicValue::Simple(Value::Null)
    }
}

impl<T: Into<Value>> From<T> for TopicValue {
    fn from(v: T) -> Self {
        TopicValue::Simple(v.into())
    }
}

// ============================================================================
// Topics
// ============================================================================

/// Input for topic creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicModel {
    /// Globally unique when non-empty.
    #[serde(default)]
    pub uri: String,
    pub type_uri: String,
    #[serde(default)]
    pub value: TopicValue,
}

impl TopicModel {
    pub fn new(type_uri: impl Into<String>, value: impl Into<TopicValue>) -> Self {
        Self {
            uri: String::new(),
            type_uri: type_uri.into(),
            value: value.into(),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }
}

/// Partial update of an existing topic. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicUpdate {
    pub uri: Option<String>,
    pub value: Option<TopicValue>,
}

/// A topic as read from the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: NodeId,
    pub uri: String,
    pub type_uri: String,
    pub value: TopicValue,
}

impl Topic {
    pub fn simple_value(&self) -> Option<&Value> {
        self.value.as_simple()
    }

    pub fn child(&self, child_type_uri: &str) -> Option<&TopicValue> {
        self.value.child(child_type_uri)
    }
}

// ============================================================================
// Associations
// ============================================================================

/// A role as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleModel {
    pub player: ElementRef,
    pub role_type_uri: String,
}

impl RoleModel {
    pub fn new(player: impl Into<ElementRef>, role_type_uri: impl Into<String>) -> Self {
        Self { player: player.into(), role_type_uri: role_type_uri.into() }
    }
}

/// Input for association creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationModel {
    pub type_uri: String,
    pub roles: Vec<RoleModel>,
}

impl AssociationModel {
    /// The common two-player case.
    pub fn binary(type_uri: impl Into<String>, first: RoleModel, second: RoleModel) -> Self {
        Self { type_uri: type_uri.into(), roles: vec![first, second] }
    }
}

/// An association as read from the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub id: EdgeId,
    pub type_uri: String,
    pub roles: Vec<RoleModel>,
}

impl Association {
    /// The player filling `role_type_uri`.
    ///
    /// Fails with `Ambiguous` when more than one player fills that role.
    pub fn player(&self, role_type_uri: &str) -> Result<Option<ElementRef>> {
        let mut matches = self.roles.iter().filter(|r| r.role_type_uri == role_type_uri);
        match (matches.next(), matches.next()) {
            (None, _) => Ok(None),
            (Some(r), None) => Ok(Some(r.player)),
            (Some(_), Some(_)) => Err(Error::Ambiguous(format!(
                "association {} has more than one player in role \"{role_type_uri}\"",
                self.id
            ))),
        }
    }

    /// The player on the other side of a binary association.
    pub fn other_player(&self, me: ElementRef) -> Option<ElementRef> {
        if self.roles.len() != 2 {
            return None;
        }
        match (self.roles[0].player, self.roles[1].player) {
            (a, b) if a == me => Some(b),
            (a, b) if b == me => Some(a),
            _ => None,
        }
    }
}

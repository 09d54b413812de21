//! Type definitions: topic types, association types and their
//! association definitions.

use serde::{Deserialize, Serialize};

use super::{EdgeId, NodeId, Value, uri};
use crate::index::IndexMode;

/// Lightweight reference to a type node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub id: NodeId,
    pub uri: String,
}

/// Result of resolving the type of a node.
///
/// The meta type is the only node without an instance-of edge; its type is
/// the synthetic meta-meta-type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeOf {
    Resolved(TypeRef),
    MetaMetaType,
}

impl TypeOf {
    pub fn uri(&self) -> &str {
        match self {
            TypeOf::Resolved(t) => &t.uri,
            TypeOf::MetaMetaType => uri::META_META_TYPE,
        }
    }

    pub fn id(&self) -> Option<NodeId> {
        match self {
            TypeOf::Resolved(t) => Some(t.id),
            TypeOf::MetaMetaType => None,
        }
    }
}

/// What instances of a type are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Instances are topics.
    Topic,
    /// Instances are associations.
    Association,
    /// Instances are types (meta type, topic type, association type).
    Meta,
}

/// Scalar data type of a type's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Text,
    Number,
    Boolean,
    Composite,
}

impl DataType {
    pub fn from_uri(data_type_uri: &str) -> Option<Self> {
        match data_type_uri {
            uri::TEXT => Some(DataType::Text),
            uri::NUMBER => Some(DataType::Number),
            uri::BOOLEAN => Some(DataType::Boolean),
            uri::COMPOSITE => Some(DataType::Composite),
            _ => None,
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            DataType::Text => uri::TEXT,
            DataType::Number => uri::NUMBER,
            DataType::Boolean => uri::BOOLEAN,
            DataType::Composite => uri::COMPOSITE,
        }
    }

    /// Whether a scalar value fits this data type. `Null` always fits.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Text, Value::String(_)) => true,
            (DataType::Number, Value::Int(_) | Value::Float(_)) => true,
            (DataType::Boolean, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

// ============================================================================
// Association definitions
// ============================================================================

fn default_assoc_type() -> String { uri::COMPOSITION.to_string() }
fn default_parent_role() -> String { uri::WHOLE_ROLE.to_string() }
fn default_child_role() -> String { uri::PART_ROLE.to_string() }

/// Input describing one child field of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDefinitionModel {
    pub child_type_uri: String,
    #[serde(default = "default_assoc_type")]
    pub assoc_type_uri: String,
    #[serde(default = "default_parent_role")]
    pub parent_role_type_uri: String,
    #[serde(default = "default_child_role")]
    pub child_role_type_uri: String,
}

impl AssociationDefinitionModel {
    /// A composition field with the default whole/part roles.
    pub fn composition(child_type_uri: impl Into<String>) -> Self {
        Self {
            child_type_uri: child_type_uri.into(),
            assoc_type_uri: default_assoc_type(),
            parent_role_type_uri: default_parent_role(),
            child_role_type_uri: default_child_role(),
        }
    }

    /// An aggregation field: the child topic is shared, not owned.
    pub fn aggregation(child_type_uri: impl Into<String>) -> Self {
        Self {
            assoc_type_uri: uri::AGGREGATION.to_string(),
            ..Self::composition(child_type_uri)
        }
    }

    pub fn with_roles(mut self, parent_role: impl Into<String>, child_role: impl Into<String>) -> Self {
        self.parent_role_type_uri = parent_role.into();
        self.child_role_type_uri = child_role.into();
        self
    }
}

/// A stored association definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDefinition {
    /// The definition edge (parent type ↔ child type).
    pub id: EdgeId,
    pub parent_type_uri: String,
    pub child_type_uri: String,
    pub assoc_type_uri: String,
    pub parent_role_type_uri: String,
    pub child_role_type_uri: String,
}

impl AssociationDefinition {
    /// The field URI. Fields are keyed by their child type.
    pub fn field_uri(&self) -> &str {
        &self.child_type_uri
    }

    pub fn is_aggregation(&self) -> bool {
        self.assoc_type_uri == uri::AGGREGATION
    }

    pub fn is_composition(&self) -> bool {
        self.assoc_type_uri == uri::COMPOSITION
    }
}

// ============================================================================
// Types
// ============================================================================

/// Input for type creation (topic types and association types alike).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTypeModel {
    pub uri: String,
    /// Display name.
    pub value: String,
    #[serde(default = "default_data_type")]
    pub data_type_uri: String,
    #[serde(default)]
    pub index_modes: Vec<IndexMode>,
    #[serde(default)]
    pub assoc_defs: Vec<AssociationDefinitionModel>,
}

fn default_data_type() -> String { uri::TEXT.to_string() }

impl TopicTypeModel {
    pub fn new(uri: impl Into<String>, value: impl Into<String>, data_type_uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            value: value.into(),
            data_type_uri: data_type_uri.into(),
            index_modes: Vec::new(),
            assoc_defs: Vec::new(),
        }
    }

    pub fn with_index_modes(mut self, modes: impl IntoIterator<Item = IndexMode>) -> Self {
        self.index_modes = modes.into_iter().collect();
        self
    }

    pub fn with_assoc_def(mut self, def: AssociationDefinitionModel) -> Self {
        self.assoc_defs.push(def);
        self
    }
}

/// A fully materialised type definition, as held by the type cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicType {
    pub id: NodeId,
    pub uri: String,
    pub value: String,
    pub kind: TypeKind,
    pub data_type_uri: String,
    pub index_modes: Vec<IndexMode>,
    /// In field order.
    pub assoc_defs: Vec<AssociationDefinition>,
}

impl TopicType {
    pub fn data_type(&self) -> Option<DataType> {
        DataType::from_uri(&self.data_type_uri)
    }

    pub fn is_composite(&self) -> bool {
        self.data_type_uri == uri::COMPOSITE
    }

    pub fn assoc_def(&self, field_uri: &str) -> Option<&AssociationDefinition> {
        self.assoc_defs.iter().find(|d| d.field_uri() == field_uri)
    }

    /// Field URIs in sequence order.
    pub fn field_uris(&self) -> Vec<&str> {
        self.assoc_defs.iter().map(AssociationDefinition::field_uri).collect()
    }
}

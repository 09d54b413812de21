//! # Hypergraph Model
//!
//! Clean DTOs for the typed hypergraph.
//!
//! Two layers live here:
//! - storage records (`NodeRecord`, `EdgeRecord`, `Role`) as kept by a
//!   [`crate::StorageBackend`];
//! - caller-facing models (`Topic`, `Association`, `TopicType`) as produced
//!   by the engine.
//!
//! Design rule: this module is pure data. No I/O, no state, no locking.

pub mod node;
pub mod edge;
pub mod value;
pub mod property_map;
pub mod topic;
pub mod topic_type;
pub mod uri;

pub use node::{NodeId, NodeRecord, ElementRef};
pub use edge::{EdgeId, EdgeRecord, Role, Roles, MetaEdge};
pub use value::Value;
pub use property_map::{PropertyMap, props};
pub use topic::{
    Topic, TopicModel, TopicUpdate, TopicValue, CompositeValue,
    Association, AssociationModel, RoleModel,
};
pub use topic_type::{
    TopicType, TopicTypeModel, TypeKind, TypeOf, TypeRef, DataType,
    AssociationDefinition, AssociationDefinitionModel,
};

//! Reserved URIs and property keys of the core type system.
//!
//! Everything here is created by the core bootstrap (see
//! [`crate::migration::bootstrap`]) except the meta-meta-type, which is
//! synthetic and never stored.

/// Whether `uri` lies in the namespace of the built-in types.
pub fn is_core(uri: &str) -> bool {
    uri.starts_with("core.")
}

// ============================================================================
// Meta types
// ============================================================================

/// The root of the type system. Its type is [`META_META_TYPE`].
pub const META_TYPE: &str = "core.meta_type";
/// Synthetic type of [`META_TYPE`]. Never persisted.
pub const META_META_TYPE: &str = "core.meta_meta_type";
/// Type of every topic type.
pub const TOPIC_TYPE: &str = "core.topic_type";
/// Type of every association type.
pub const ASSOC_TYPE: &str = "core.assoc_type";

// ============================================================================
// Data types
// ============================================================================

pub const DATA_TYPE: &str = "core.data_type";
pub const TEXT: &str = "core.text";
pub const NUMBER: &str = "core.number";
pub const BOOLEAN: &str = "core.boolean";
pub const COMPOSITE: &str = "core.composite";

// ============================================================================
// Role types
// ============================================================================

pub const ROLE_TYPE: &str = "core.role_type";
pub const TYPE_ROLE: &str = "core.type";
pub const INSTANCE_ROLE: &str = "core.instance";
pub const WHOLE_ROLE: &str = "core.whole";
pub const PART_ROLE: &str = "core.part";
pub const DEFAULT_ROLE: &str = "core.default";
pub const PARENT_TYPE_ROLE: &str = "core.parent_type";
pub const CHILD_TYPE_ROLE: &str = "core.child_type";
pub const SEQUENCE_OWNER_ROLE: &str = "core.sequence_owner";
pub const SEQUENCE_HEAD_ROLE: &str = "core.sequence_head";
pub const PREDECESSOR_ROLE: &str = "core.predecessor";
pub const SUCCESSOR_ROLE: &str = "core.successor";

/// Roles of the engine's own edges: instance-of, definition and field
/// chain edges. Associations and field definitions can't use them.
pub const ENGINE_ROLES: [&str; 8] = [
    TYPE_ROLE,
    INSTANCE_ROLE,
    PARENT_TYPE_ROLE,
    CHILD_TYPE_ROLE,
    SEQUENCE_OWNER_ROLE,
    SEQUENCE_HEAD_ROLE,
    PREDECESSOR_ROLE,
    SUCCESSOR_ROLE,
];

pub fn is_engine_role(role_type_uri: &str) -> bool {
    ENGINE_ROLES.contains(&role_type_uri)
}

// ============================================================================
// Association types
// ============================================================================

/// Generic association.
pub const ASSOCIATION: &str = "core.association";
/// Parent owns child; child is deleted with the parent.
pub const COMPOSITION: &str = "core.composition";
/// Parent refers to a shared child.
pub const AGGREGATION: &str = "core.aggregation";
/// Type of association-definition edges (parent type ↔ child type).
pub const COMPOSITION_DEF: &str = "core.composition_def";

// ============================================================================
// Property keys
// ============================================================================

pub const URI_KEY: &str = "uri";
pub const VALUE_KEY: &str = "value";
pub const DATA_TYPE_KEY: &str = "data_type_uri";
pub const INDEX_MODES_KEY: &str = "index_modes";
pub const ASSOC_TYPE_KEY: &str = "assoc_type_uri";
pub const PARENT_ROLE_KEY: &str = "parent_role_type_uri";
pub const CHILD_ROLE_KEY: &str = "child_role_type_uri";
/// Tag on SEQUENCE_START / SEQUENCE edges naming the owning type.
pub const SEQUENCE_TAG: &str = "type_uri";
/// Root-node counter of applied core migrations.
pub const CORE_MIGRATION_NR_KEY: &str = "core_migration_nr";
/// Prefix of root-node counters of applied plugin migrations.
pub const PLUGIN_MIGRATION_NR_PREFIX: &str = "plugin_migration_nr:";

//! Core migration 1: the type system's own types.
//!
//! The meta type is created first and stays untyped. Everything else is an
//! instance of something created before it:
//!
//! ```text
//! core.meta_type
//! ├── core.topic_type ── core.data_type ── core.text, core.number, ...
//! │                   └─ core.role_type ── core.type, core.instance, ...
//! └── core.assoc_type ── core.association, core.composition, ...
//! ```
//!
//! Nothing here goes through the typed API. That API needs these types to
//! exist already.

use tracing::debug;

use crate::index::IndexMode;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::Result;

const DATA_TYPES: [(&str, &str); 4] = [
    (uri::TEXT, "Text"),
    (uri::NUMBER, "Number"),
    (uri::BOOLEAN, "Boolean"),
    (uri::COMPOSITE, "Composite"),
];

const ROLE_TYPES: [(&str, &str); 11] = [
    (uri::TYPE_ROLE, "Type"),
    (uri::INSTANCE_ROLE, "Instance"),
    (uri::WHOLE_ROLE, "Whole"),
    (uri::PART_ROLE, "Part"),
    (uri::DEFAULT_ROLE, "Default"),
    (uri::PARENT_TYPE_ROLE, "Parent Type"),
    (uri::CHILD_TYPE_ROLE, "Child Type"),
    (uri::SEQUENCE_OWNER_ROLE, "Sequence Owner"),
    (uri::SEQUENCE_HEAD_ROLE, "Sequence Head"),
    (uri::PREDECESSOR_ROLE, "Predecessor"),
    (uri::SUCCESSOR_ROLE, "Successor"),
];

const ASSOC_TYPES: [(&str, &str); 4] = [
    (uri::ASSOCIATION, "Association"),
    (uri::COMPOSITION, "Composition"),
    (uri::AGGREGATION, "Aggregation"),
    (uri::COMPOSITION_DEF, "Composition Definition"),
];

/// Create a type node without going through type validation.
fn raw_type<B: StorageBackend>(
    tx: &mut CoreTx<'_, B>,
    type_uri: &str,
    name: &str,
    data_type_uri: &str,
    modes: &[IndexMode],
    of: Option<NodeId>,
) -> Result<NodeId> {
    let node = tx.create_node(props([
        (uri::VALUE_KEY, name),
        (uri::DATA_TYPE_KEY, data_type_uri),
        (uri::INDEX_MODES_KEY, IndexMode::join(modes).as_str()),
    ]))?;
    tx.claim_uri(ElementRef::Node(node), type_uri)?;
    if let Some(of) = of {
        tx.instantiate(ElementRef::Node(node), of)?;
    }
    Ok(node)
}

/// Create a plain topic of a type whose value isn't indexed.
fn raw_topic<B: StorageBackend>(tx: &mut CoreTx<'_, B>, topic_uri: &str, name: &str, of: NodeId) -> Result<NodeId> {
    let node = tx.create_node(props([(uri::VALUE_KEY, name)]))?;
    tx.claim_uri(ElementRef::Node(node), topic_uri)?;
    tx.instantiate(ElementRef::Node(node), of)?;
    Ok(node)
}

/// Install the core types and register them in the type cache.
pub fn install<B: StorageBackend>(tx: &mut CoreTx<'_, B>) -> Result<()> {
    let meta = raw_type(tx, uri::META_TYPE, "Meta Type", uri::TEXT, &[], None)?;
    let topic_type = raw_type(tx, uri::TOPIC_TYPE, "Topic Type", uri::TEXT, &[], Some(meta))?;
    let assoc_type = raw_type(tx, uri::ASSOC_TYPE, "Association Type", uri::TEXT, &[], Some(meta))?;

    let data_type = raw_type(tx, uri::DATA_TYPE, "Data Type", uri::TEXT, &[], Some(topic_type))?;
    for (topic_uri, name) in DATA_TYPES {
        raw_topic(tx, topic_uri, name, data_type)?;
    }

    let role_type = raw_type(tx, uri::ROLE_TYPE, "Role Type", uri::TEXT, &[], Some(topic_type))?;
    for (topic_uri, name) in ROLE_TYPES {
        raw_topic(tx, topic_uri, name, role_type)?;
    }

    for (type_uri, name) in ASSOC_TYPES {
        raw_type(tx, type_uri, name, uri::TEXT, &[], Some(assoc_type))?;
    }

    for type_uri in tx.all_type_uris()? {
        let node = tx.type_node(&type_uri)?;
        tx.refresh_type(node)?;
    }
    debug!(nodes = tx.node_count()?, edges = tx.edge_count()?, "core bootstrap done");
    Ok(())
}

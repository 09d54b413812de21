//! End-to-end tests for edge cases.
//!
//! Tests the root node, data type checks, URI changes, fulltext matching,
//! hyperedges with more than two players, raw edges without a type,
//! engine role types and the composition cascade switch.

use pretty_assertions::assert_eq;
use topicgraph::{
    AssociationDefinitionModel, AssociationModel, CoreConfig, EdgeId, ElementRef, Error, IndexMode, MemoryBackend,
    NodeId, PropertyMap, Role, RoleModel, Roles, TopicGraph, TopicModel, TopicTypeModel, TopicUpdate, TopicValue,
    TraversalFilter, Value, uri,
};

fn scalar_types(graph: &TopicGraph<MemoryBackend>) {
    graph
        .create_topic_type(
            TopicTypeModel::new("x.word", "Word", uri::TEXT).with_index_modes([IndexMode::Key, IndexMode::Fulltext]),
        )
        .unwrap();
    graph.create_topic_type(TopicTypeModel::new("x.count", "Count", uri::NUMBER)).unwrap();
    graph.create_topic_type(TopicTypeModel::new("x.flag", "Flag", uri::BOOLEAN)).unwrap();
}

fn word(graph: &TopicGraph<MemoryBackend>, text: &str) -> NodeId {
    graph.create_topic(TopicModel::new("x.word", text)).unwrap().id
}

// ============================================================================
// 1. The root node is not a topic
// ============================================================================

#[test]
fn test_root_is_not_a_topic() {
    let graph = TopicGraph::open_memory().unwrap();
    assert!(matches!(graph.get_topic(NodeId::ROOT).unwrap_err().cause(), Error::NotFound(_)));
    assert!(matches!(graph.delete_topic(NodeId::ROOT).unwrap_err().cause(), Error::NotFound(_)));
}

// ============================================================================
// 2. Values must fit the data type
// ============================================================================

#[test]
fn test_values_checked_against_data_type() {
    let graph = TopicGraph::open_memory().unwrap();
    scalar_types(&graph);

    graph.create_topic(TopicModel::new("x.count", 3)).unwrap();
    graph.create_topic(TopicModel::new("x.count", 2.5)).unwrap();
    graph.create_topic(TopicModel::new("x.flag", true)).unwrap();
    // null fits every data type
    graph.create_topic(TopicModel::new("x.flag", Value::Null)).unwrap();

    for model in [
        TopicModel::new("x.count", "three"),
        TopicModel::new("x.flag", 1),
        TopicModel::new("x.word", false),
        TopicModel::new("x.word", TopicValue::composite().with("x.count", 1)),
    ] {
        let err = graph.create_topic(model).unwrap_err();
        assert!(matches!(err.cause(), Error::InvalidArgument(_)), "{err}");
    }
}

#[test]
fn test_topic_needs_a_topic_type() {
    let graph = TopicGraph::open_memory().unwrap();
    let err = graph.create_topic(TopicModel::new("x.nothing", "?")).unwrap_err();
    assert!(matches!(err.cause(), Error::NotFound(_)));

    let err = graph.create_topic(TopicModel::new(uri::ASSOCIATION, "?")).unwrap_err();
    assert!(matches!(err.cause(), Error::InvalidArgument(_)));
}

// ============================================================================
// 3. URI changes
// ============================================================================

#[test]
fn test_uri_update_and_removal() {
    let graph = TopicGraph::open_memory().unwrap();
    scalar_types(&graph);
    let hello = graph.create_topic(TopicModel::new("x.word", "hello").with_uri("w.hello")).unwrap();
    graph.create_topic(TopicModel::new("x.word", "world").with_uri("w.world")).unwrap();

    let taken = TopicUpdate { uri: Some("w.world".into()), ..TopicUpdate::default() };
    let err = graph.update_topic(hello.id, taken).unwrap_err();
    assert!(matches!(err.cause(), Error::InvalidArgument(_)));
    assert_eq!(graph.get_topic(hello.id).unwrap().uri, "w.hello");

    let cleared = TopicUpdate { uri: Some(String::new()), ..TopicUpdate::default() };
    graph.update_topic(hello.id, cleared).unwrap();
    assert_eq!(graph.get_topic(hello.id).unwrap().uri, "");
    assert_eq!(graph.get_topic_by_uri("w.hello").unwrap(), None);

    // a freed URI can be taken again
    graph.create_topic(TopicModel::new("x.word", "hi").with_uri("w.hello")).unwrap();
}

// ============================================================================
// 4. Fulltext matching
// ============================================================================

#[test]
fn test_fulltext_prefix_and_whole_word() {
    let graph = TopicGraph::open_memory().unwrap();
    scalar_types(&graph);
    let river = word(&graph, "Rivers of London");
    let rover = word(&graph, "Mars Rover");

    let hits = |term: &str, whole_word: bool| -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = graph.search_topics(None, term, whole_word).unwrap().iter().map(|t| t.id).collect();
        ids.sort();
        ids
    };
    assert_eq!(hits("r", false), vec![river, rover]);
    assert_eq!(hits("riv", false), vec![river]);
    assert!(hits("riv", true).is_empty());
    assert_eq!(hits("ROVER", true), vec![rover]);
    assert_eq!(hits("london rivers", false), vec![river]);
    assert!(hits("", false).is_empty());
    assert!(graph.search_topics(Some("x.word"), "rivers", false).unwrap().is_empty());
}

// ============================================================================
// 5. Hyperedges
// ============================================================================

#[test]
fn test_deleting_one_player_removes_the_hyperedge() {
    let graph = TopicGraph::open_memory().unwrap();
    scalar_types(&graph);
    let players: Vec<NodeId> = ["a", "b", "c"].iter().map(|w| word(&graph, w)).collect();
    let roles = players.iter().map(|&p| RoleModel::new(p, uri::DEFAULT_ROLE)).collect();
    let triple = graph.create_association(AssociationModel { type_uri: uri::ASSOCIATION.into(), roles }).unwrap();
    assert_eq!(triple.roles.len(), 3);

    graph.delete_topic(players[1]).unwrap();
    assert!(matches!(graph.get_association(triple.id).unwrap_err().cause(), Error::NotFound(_)));
    for &survivor in [players[0], players[2]].iter() {
        graph.get_topic(survivor).unwrap();
        let left = graph.get_associations(ElementRef::Node(survivor), &TraversalFilter::new()).unwrap();
        assert!(left.is_empty());
    }
}

#[test]
fn test_missing_association() {
    let graph = TopicGraph::open_memory().unwrap();
    let err = graph.get_association(EdgeId(424_242)).unwrap_err();
    assert!(matches!(err.cause(), Error::NotFound(_)));
}

// ============================================================================
// 6. Raw edges without a type
// ============================================================================

#[test]
fn test_typeless_edge_is_not_an_association() {
    let graph = TopicGraph::open_memory().unwrap();
    scalar_types(&graph);
    let a = word(&graph, "a");
    let b = word(&graph, "b");
    let raw = graph
        .write("raw edge", |tx| {
            let roles: Roles = [Role::new(a, uri::DEFAULT_ROLE), Role::new(b, uri::DEFAULT_ROLE)]
                .into_iter()
                .collect();
            tx.create_edge(roles, PropertyMap::new())
        })
        .unwrap();

    let err = graph.get_association(raw).unwrap_err();
    assert!(matches!(err.cause(), Error::Inconsistency(_)));
    assert!(graph.get_associations(ElementRef::Node(a), &TraversalFilter::new()).unwrap().is_empty());
    assert_eq!(graph.get_association_between(a.into(), b.into(), None).unwrap(), None);

    // the player can still be deleted, taking the raw edge with it
    graph.delete_topic(a).unwrap();
    let gone = graph.read("raw edge", |tx| tx.exists(ElementRef::Edge(raw))).unwrap();
    assert!(!gone);
}

// ============================================================================
// 7. Engine role types are off limits
// ============================================================================

#[test]
fn test_engine_roles_rejected_on_associations() {
    let graph = TopicGraph::open_memory().unwrap();
    scalar_types(&graph);
    let a = word(&graph, "a");
    let b = word(&graph, "b");

    for (first, second) in [
        (uri::TYPE_ROLE, uri::INSTANCE_ROLE),
        (uri::PREDECESSOR_ROLE, uri::SUCCESSOR_ROLE),
        (uri::SEQUENCE_OWNER_ROLE, uri::SEQUENCE_HEAD_ROLE),
        (uri::PARENT_TYPE_ROLE, uri::CHILD_TYPE_ROLE),
        (uri::DEFAULT_ROLE, uri::INSTANCE_ROLE),
    ] {
        let model = AssociationModel::binary(uri::ASSOCIATION, RoleModel::new(a, first), RoleModel::new(b, second));
        let err = graph.create_association(model).unwrap_err();
        assert!(matches!(err.cause(), Error::InvalidArgument(_)), "{first}/{second}: {err}");
    }

    // both players still resolve to exactly one type
    assert_eq!(graph.get_topic(b).unwrap().type_uri, "x.word");
    assert_eq!(graph.get_topics_by_type("x.word").unwrap().len(), 2);
    assert!(graph.get_associations(ElementRef::Node(a), &TraversalFilter::new()).unwrap().is_empty());
}

#[test]
fn test_engine_roles_rejected_on_fields() {
    let graph = TopicGraph::open_memory().unwrap();
    scalar_types(&graph);
    graph.create_topic_type(TopicTypeModel::new("x.phrase", "Phrase", uri::COMPOSITE)).unwrap();

    let def = AssociationDefinitionModel::composition("x.word").with_roles(uri::TYPE_ROLE, uri::INSTANCE_ROLE);
    let err = graph.add_association_definition("x.phrase", def).unwrap_err();
    assert!(matches!(err.cause(), Error::InvalidArgument(_)));
    assert!(graph.get_topic_type("x.phrase").unwrap().field_uris().is_empty());

    // the default whole/part pair is fine
    graph.add_association_definition("x.phrase", AssociationDefinitionModel::composition("x.word")).unwrap();
    let phrase = graph
        .create_topic(TopicModel::new("x.phrase", TopicValue::composite().with("x.word", "hi")))
        .unwrap();
    let child = graph.get_topic_by_value("x.word", &Value::from("hi")).unwrap().unwrap();
    assert_eq!(child.type_uri, "x.word");
    assert_eq!(graph.get_topic(phrase.id).unwrap().child("x.word"), Some(&TopicValue::from("hi")));
}

// ============================================================================
// 8. Composition cascade switch
// ============================================================================

#[test]
fn test_children_kept_without_cascade() {
    let config = CoreConfig { cascade_composition_delete: false, ..CoreConfig::default() };
    let graph = TopicGraph::open_memory_with(config).unwrap();
    scalar_types(&graph);
    graph
        .create_topic_type(
            TopicTypeModel::new("x.phrase", "Phrase", uri::COMPOSITE)
                .with_assoc_def(AssociationDefinitionModel::composition("x.word")),
        )
        .unwrap();

    let phrase = graph
        .create_topic(TopicModel::new("x.phrase", TopicValue::composite().with("x.word", "orphan")))
        .unwrap();
    graph.delete_topic(phrase.id).unwrap();

    let left = graph.get_topic_by_value("x.word", &Value::from("orphan")).unwrap().unwrap();
    let parents = graph.get_related_topics(left.id, &TraversalFilter::new()).unwrap();
    assert!(parents.is_empty());
}

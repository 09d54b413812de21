//! End-to-end tests for migrations and configuration.
//!
//! Covers migration directories applied at open, the run-mode rules for
//! clean installs and updates, plugin counters, and field reordering
//! through a migration.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use topicgraph::{
    CoreConfig, Error, MemoryBackend, Migration, RunMode, TopicGraph, TopicModel, TopicValue, Value,
};

fn write_migration(dir: &Path, number: u64, body: &str) {
    fs::write(dir.join(format!("migration{number}.json")), body).unwrap();
}

fn note_migration(number: u64, run_mode: Option<RunMode>, type_uri: &str) -> Migration {
    let mode = run_mode.map(|m| format!(r#""run_mode": "{m}","#)).unwrap_or_default();
    Migration::from_json(&format!(
        r#"{{"number": {number}, {mode} "topic_types": [{{"uri": "{type_uri}", "value": "{type_uri}"}}]}}"#
    ))
    .unwrap()
}

fn core_nr(graph: &TopicGraph<MemoryBackend>) -> u64 {
    graph.read("nr", |tx| tx.core_migration_nr()).unwrap()
}

// ============================================================================
// 1. Migration directory applied at open
// ============================================================================

#[test]
fn test_migrations_dir_applied_at_open() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(
        dir.path(),
        2,
        r#"{
            "number": 2,
            "topic_types": [
                {"uri": "note.title", "value": "Title", "index_modes": ["KEY", "FULLTEXT"]},
                {"uri": "note", "value": "Note", "data_type_uri": "core.composite",
                 "assoc_defs": [{"child_type_uri": "note.title"}]}
            ],
            "topics": [
                {"uri": "note.welcome", "type_uri": "note", "value": {"note.title": "Welcome"}}
            ]
        }"#,
    );
    write_migration(dir.path(), 3, r#"{"number": 3, "run_mode": "UPDATE", "topic_types": [{"uri": "note.tag", "value": "Tag"}]}"#);

    let backend = MemoryBackend::new();
    let config = CoreConfig { migrations_dir: Some(dir.path().to_path_buf()), ..CoreConfig::default() };
    let graph = TopicGraph::open(backend.clone(), config.clone()).unwrap();

    assert_eq!(core_nr(&graph), 3);
    let welcome = graph.get_topic_by_uri("note.welcome").unwrap().unwrap();
    assert_eq!(welcome.child("note.title"), Some(&TopicValue::from("Welcome")));
    assert_eq!(graph.search_topics(None, "welc", false).unwrap().len(), 1);
    // UPDATE migrations are skipped on a clean install
    assert!(matches!(graph.get_topic_type("note.tag").unwrap_err().cause(), Error::NotFound(_)));

    // reopening over the same store applies only what's new
    write_migration(dir.path(), 4, r#"{"number": 4, "run_mode": "UPDATE", "topic_types": [{"uri": "note.label", "value": "Label"}]}"#);
    let reopened = TopicGraph::open(backend, config).unwrap();
    assert_eq!(core_nr(&reopened), 4);
    reopened.get_topic_type("note.label").unwrap();
    assert_eq!(reopened.get_topics_by_type("note").unwrap().len(), 1);
}

#[test]
fn test_bad_migration_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), 2, r#"{"number": 2, "topic_types": [{"uri": "x", "value": "X", "data_type_uri": "core.nope"}]}"#);

    let config = CoreConfig { migrations_dir: Some(dir.path().to_path_buf()), ..CoreConfig::default() };
    let err = TopicGraph::open_memory_with(config).err().unwrap();
    assert!(matches!(err.cause(), Error::InvalidArgument(_)));
}

#[test]
fn test_gap_in_numbers_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), 3, r#"{"number": 3}"#);

    let config = CoreConfig { migrations_dir: Some(dir.path().to_path_buf()), ..CoreConfig::default() };
    let err = TopicGraph::open_memory_with(config).err().unwrap();
    assert!(matches!(err.cause(), Error::InvalidArgument(_)));
}

// ============================================================================
// 2. Plugin migrations and run modes
// ============================================================================

#[test]
fn test_plugin_run_modes() {
    let graph = TopicGraph::open_memory().unwrap();
    let first = [
        note_migration(1, Some(RunMode::CleanInstall), "p.installed"),
        note_migration(2, Some(RunMode::Update), "p.updated"),
        note_migration(3, None, "p.always"),
    ];
    assert_eq!(graph.run_plugin_migrations("notes", &first).unwrap(), 2);
    assert_eq!(graph.read("nr", |tx| tx.plugin_migration_nr("notes")).unwrap(), 3);
    graph.get_topic_type("p.installed").unwrap();
    graph.get_topic_type("p.always").unwrap();
    assert!(graph.get_topic_type("p.updated").is_err());

    // second run is an update; already-applied numbers are skipped
    let second = [
        note_migration(1, Some(RunMode::CleanInstall), "p.installed"),
        note_migration(4, Some(RunMode::CleanInstall), "p.late_install"),
        note_migration(5, Some(RunMode::Update), "p.late_update"),
    ];
    assert_eq!(graph.run_plugin_migrations("notes", &second).unwrap(), 1);
    assert_eq!(graph.read("nr", |tx| tx.plugin_migration_nr("notes")).unwrap(), 5);
    assert!(graph.get_topic_type("p.late_install").is_err());
    graph.get_topic_type("p.late_update").unwrap();

    // counters are per plugin
    assert_eq!(graph.read("nr", |tx| tx.plugin_migration_nr("other")).unwrap(), 0);
    assert_eq!(core_nr(&graph), 1);
}

#[test]
fn test_configured_default_run_mode() {
    let config = CoreConfig { migration_run_mode: Some("UPDATE".into()), ..CoreConfig::default() };
    let graph = TopicGraph::open_memory_with(config).unwrap();

    let ran = graph.run_plugin_migrations("notes", &[note_migration(1, None, "p.first")]).unwrap();
    assert_eq!(ran, 0);
    assert_eq!(graph.read("nr", |tx| tx.plugin_migration_nr("notes")).unwrap(), 1);

    let ran = graph.run_plugin_migrations("notes", &[note_migration(2, None, "p.second")]).unwrap();
    assert_eq!(ran, 1);
    graph.get_topic_type("p.second").unwrap();
}

#[test]
fn test_failed_plugin_migration_keeps_counter() {
    let graph = TopicGraph::open_memory().unwrap();
    let broken = Migration::from_json(
        r#"{"number": 2, "topics": [{"type_uri": "p.missing", "value": "x"}]}"#,
    )
    .unwrap();
    let err = graph
        .run_plugin_migrations("notes", &[note_migration(1, None, "p.ok"), broken])
        .unwrap_err();
    assert!(matches!(err.cause(), Error::NotFound(_)));
    assert_eq!(graph.read("nr", |tx| tx.plugin_migration_nr("notes")).unwrap(), 0);
    assert!(graph.get_topic_type("p.ok").is_err());
}

// ============================================================================
// 3. Field order through a migration
// ============================================================================

#[test]
fn test_field_reorder_migration() {
    let graph = TopicGraph::open_memory().unwrap();
    let setup = Migration::from_json(
        r#"{
            "number": 1,
            "topic_types": [
                {"uri": "c.first", "value": "First"},
                {"uri": "c.last", "value": "Last"},
                {"uri": "c.contact", "value": "Contact", "data_type_uri": "core.composite",
                 "assoc_defs": [{"child_type_uri": "c.first"}, {"child_type_uri": "c.last"}]}
            ]
        }"#,
    )
    .unwrap();
    let reorder = Migration::from_json(
        r#"{"number": 2, "field_orders": [{"type_uri": "c.contact", "fields": ["c.last", "c.first"]}]}"#,
    )
    .unwrap();
    graph.run_plugin_migrations("contacts", &[setup, reorder]).unwrap();

    assert_eq!(graph.get_topic_type("c.contact").unwrap().field_uris(), vec!["c.last", "c.first"]);
    graph.types().clear();
    assert_eq!(graph.get_topic_type("c.contact").unwrap().field_uris(), vec!["c.last", "c.first"]);

    let contact = graph
        .create_topic(TopicModel::new(
            "c.contact",
            TopicValue::composite().with("c.first", "Ada").with("c.last", "Lovelace"),
        ))
        .unwrap();
    assert_eq!(graph.get_child_value(contact.id, "c.last").unwrap(), Some(TopicValue::from("Lovelace")));
}

#[test]
fn test_reorder_with_wrong_fields_rejected() {
    let graph = TopicGraph::open_memory().unwrap();
    let setup = note_migration(1, None, "c.only");
    let bad = Migration::from_json(
        r#"{"number": 2, "field_orders": [{"type_uri": "c.only", "fields": ["c.ghost"]}]}"#,
    )
    .unwrap();
    let err = graph.run_plugin_migrations("contacts", &[setup, bad]).unwrap_err();
    assert!(matches!(err.cause(), Error::InvalidArgument(_)));
}

// ============================================================================
// 4. Configuration file
// ============================================================================

#[test]
fn test_open_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let migrations = dir.path().join("migrations");
    fs::create_dir(&migrations).unwrap();
    write_migration(&migrations, 2, r#"{"number": 2, "topic_types": [{"uri": "cfg.item", "value": "Item", "index_modes": ["KEY"]}]}"#);

    let config_path = dir.path().join("topicgraph.toml");
    fs::write(
        &config_path,
        format!(
            "preload_types = true\nmax_composite_depth = 4\nmigrations_dir = {:?}\n",
            migrations.display().to_string()
        ),
    )
    .unwrap();

    let config = CoreConfig::load(&config_path).unwrap();
    assert_eq!(config.max_composite_depth, 4);
    let graph = TopicGraph::open_memory_with(config).unwrap();
    assert!(graph.types().contains("cfg.item"));

    graph.create_topic(TopicModel::new("cfg.item", "widget")).unwrap();
    assert_eq!(graph.lookup("cfg.item", &Value::from("widget")).unwrap().len(), 1);
}

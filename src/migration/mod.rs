//! Declarative migrations.
//!
//! A migration is a JSON document declaring types, topics and field
//! definitions to create. Migrations are numbered; a graph records the last
//! number it applied on its root node, `core_migration_nr` for the core and
//! `plugin_migration_nr:<plugin>` for each plugin, and only ever moves that
//! number forward one step at a time.
//!
//! Core migration 1 is the built-in bootstrap ([`bootstrap`]). Migrations
//! from a directory continue at 2.

pub mod bootstrap;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result, TopicGraph};

/// Number of built-in core migrations.
pub const CORE_MIGRATION_COUNT: u64 = 1;

/// When a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    /// Only while installing into an empty graph.
    CleanInstall,
    /// Only when updating an existing installation.
    Update,
    /// Both.
    Always,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::CleanInstall => "CLEAN_INSTALL",
            RunMode::Update => "UPDATE",
            RunMode::Always => "ALWAYS",
        }
    }

    pub fn applies(&self, clean_install: bool) -> bool {
        match self {
            RunMode::CleanInstall => clean_install,
            RunMode::Update => !clean_install,
            RunMode::Always => true,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CLEAN_INSTALL" => Ok(RunMode::CleanInstall),
            "UPDATE" => Ok(RunMode::Update),
            "ALWAYS" => Ok(RunMode::Always),
            other => Err(Error::InvalidArgument(format!("unknown migration run mode \"{other}\""))),
        }
    }
}

// ============================================================================
// Migration documents
// ============================================================================

/// A field definition added to an existing type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationAssocDef {
    pub type_uri: String,
    pub def: AssociationDefinitionModel,
}

/// A new field order for a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOrder {
    pub type_uri: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Migration {
    pub number: u64,
    /// Kept as text so an unknown mode surfaces as `InvalidArgument`.
    pub run_mode: Option<String>,
    pub description: String,
    pub topic_types: Vec<TopicTypeModel>,
    pub assoc_types: Vec<TopicTypeModel>,
    pub topics: Vec<TopicModel>,
    pub assoc_defs: Vec<MigrationAssocDef>,
    pub field_orders: Vec<FieldOrder>,
}

impl Migration {
    pub fn from_json(s: &str) -> Result<Self> {
        let migration: Migration = serde_json::from_str(s)?;
        migration.run_mode()?;
        Ok(migration)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// The declared run mode, if any.
    pub fn run_mode(&self) -> Result<Option<RunMode>> {
        self.run_mode.as_deref().map(RunMode::from_str).transpose()
    }

    /// Load every `migrationN.json` in `dir`, ordered by number.
    ///
    /// The number in the file name must match the one in the document.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Migration>> {
        let mut migrations = Vec::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(nr) = name
                .strip_prefix("migration")
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|digits| digits.parse::<u64>().ok())
            else {
                continue;
            };
            let migration = Migration::from_file(&path)?;
            if migration.number != nr {
                return Err(Error::InvalidArgument(format!(
                    "{name} declares migration number {}",
                    migration.number
                )));
            }
            migrations.push(migration);
        }
        migrations.sort_by_key(|m| m.number);
        Ok(migrations)
    }
}

/// Whose migration counter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationTarget<'a> {
    Core,
    Plugin(&'a str),
}

impl MigrationTarget<'_> {
    fn key(&self) -> String {
        match self {
            MigrationTarget::Core => uri::CORE_MIGRATION_NR_KEY.to_string(),
            MigrationTarget::Plugin(name) => format!("{}{name}", uri::PLUGIN_MIGRATION_NR_PREFIX),
        }
    }
}

impl fmt::Display for MigrationTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationTarget::Core => f.write_str("core"),
            MigrationTarget::Plugin(name) => write!(f, "plugin \"{name}\""),
        }
    }
}

// ============================================================================
// Applying migrations
// ============================================================================

impl<B: StorageBackend> CoreTx<'_, B> {
    /// Last applied migration of `target`, `None` if it never ran one.
    pub fn migration_nr(&self, target: MigrationTarget<'_>) -> Result<Option<u64>> {
        let value = self.get_property(ElementRef::Node(NodeId::ROOT), &target.key())?;
        match value {
            None => Ok(None),
            Some(Value::Int(n)) if n >= 0 => Ok(Some(n as u64)),
            Some(other) => Err(Error::Inconsistency(format!(
                "{} migration number is {other}",
                target
            ))),
        }
    }

    pub fn core_migration_nr(&self) -> Result<u64> {
        Ok(self.migration_nr(MigrationTarget::Core)?.unwrap_or(0))
    }

    pub fn plugin_migration_nr(&self, plugin: &str) -> Result<u64> {
        Ok(self.migration_nr(MigrationTarget::Plugin(plugin))?.unwrap_or(0))
    }

    pub(crate) fn set_migration_nr(&mut self, target: MigrationTarget<'_>, nr: u64) -> Result<()> {
        let nr = i64::try_from(nr)
            .map_err(|_| Error::InvalidArgument(format!("migration number {nr} out of range")))?;
        self.set_property(ElementRef::Node(NodeId::ROOT), &target.key(), Value::Int(nr), &[], "")
    }

    /// Create everything `migration` declares.
    pub fn apply_migration(&mut self, migration: &Migration) -> Result<()> {
        let bare = |model: &TopicTypeModel| TopicTypeModel { assoc_defs: Vec::new(), ..model.clone() };
        for model in &migration.topic_types {
            self.create_topic_type(bare(model))?;
        }
        for model in &migration.assoc_types {
            self.create_association_type(bare(model))?;
        }
        // types may refer to each other, so fields go in once all exist
        for model in migration.topic_types.iter().chain(&migration.assoc_types) {
            for def in &model.assoc_defs {
                self.add_association_definition(&model.uri, def.clone())?;
            }
        }
        for topic in &migration.topics {
            self.create_topic(topic.clone())?;
        }
        for item in &migration.assoc_defs {
            self.add_association_definition(&item.type_uri, item.def.clone())?;
        }
        for order in &migration.field_orders {
            self.reorder_fields(&order.type_uri, order.fields.as_slice())?;
        }
        Ok(())
    }

    /// Apply the pending migrations of `target` in number order.
    ///
    /// Migrations already applied are skipped. Numbers must continue the
    /// stored counter without gaps. A migration whose run mode doesn't match
    /// still advances the counter. Returns how many migrations ran.
    pub fn run_migrations(
        &mut self,
        target: MigrationTarget<'_>,
        migrations: &[Migration],
        clean_install: bool,
    ) -> Result<usize> {
        let default_mode = self.graph.config.default_run_mode()?.unwrap_or(RunMode::Always);
        let mut current = self.migration_nr(target)?.unwrap_or(0);
        let mut ran = 0;
        let applied = current;
        for migration in migrations.iter().filter(|m| m.number > applied) {
            if migration.number != current + 1 {
                return Err(Error::InvalidArgument(format!(
                    "{target} migration {} follows {current}; migrations must be consecutive",
                    migration.number
                )));
            }
            let mode = migration.run_mode()?.unwrap_or(default_mode);
            if mode.applies(clean_install) {
                info!(%target, number = migration.number, mode = %mode, "running migration");
                self.apply_migration(migration)?;
                ran += 1;
            } else {
                debug!(%target, number = migration.number, mode = %mode, "migration skipped");
            }
            current = migration.number;
            self.set_migration_nr(target, current)?;
        }
        Ok(ran)
    }
}

/// Install the core types into an empty graph, then apply the configured
/// migration directory.
pub(crate) fn run_core_migrations<B: StorageBackend>(graph: &TopicGraph<B>) -> Result<()> {
    graph.write("core migrations can't be run", |tx| {
        let clean_install = tx.migration_nr(MigrationTarget::Core)?.is_none();
        if clean_install {
            bootstrap::install(tx)?;
            tx.set_migration_nr(MigrationTarget::Core, CORE_MIGRATION_COUNT)?;
            info!(number = CORE_MIGRATION_COUNT, "core types installed");
        }
        if let Some(dir) = &graph.config.migrations_dir {
            let migrations = Migration::load_dir(dir)?;
            tx.run_migrations(MigrationTarget::Core, &migrations, clean_install)?;
        }
        Ok(())
    })
}

impl<B: StorageBackend> TopicGraph<B> {
    /// Apply a plugin's migrations. The first run for a plugin counts as a
    /// clean install.
    pub fn run_plugin_migrations(&self, plugin: &str, migrations: &[Migration]) -> Result<usize> {
        self.write(format!("migrations of plugin \"{plugin}\" can't be run"), |tx| {
            let target = MigrationTarget::Plugin(plugin);
            let clean_install = tx.migration_nr(target)?.is_none();
            tx.run_migrations(target, migrations, clean_install)
        })
    }

    /// Apply a single migration's content outside the numbering scheme.
    pub fn apply_migration(&self, migration: &Migration) -> Result<()> {
        self.write(format!("migration {} can't be applied", migration.number), |tx| {
            tx.apply_migration(migration)
        })
    }
}

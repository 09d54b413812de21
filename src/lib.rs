//! # topicgraph: Typed Hypergraph Core
//!
//! A self-describing typed hypergraph: every topic (node) and association
//! (edge) is typed by another topic stored in the same graph, down to the
//! meta type, whose own type is synthetic.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the engine and storage
//! 2. **Clean DTOs**: `Topic`, `Association`, `TopicType`, `Value` cross all boundaries
//! 3. **Types are data**: instance-of, field definitions and field order are edges
//! 4. **One transaction per operation**: every top-level call commits or rolls back as a unit
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use topicgraph::{TopicGraph, TopicModel, TopicTypeModel, AssociationDefinitionModel, TopicValue};
//! use topicgraph::{IndexMode, uri};
//!
//! # fn example() -> topicgraph::Result<()> {
//! let graph = TopicGraph::open_memory()?;
//!
//! graph.create_topic_type(
//!     TopicTypeModel::new("person.name", "Name", uri::TEXT).with_index_modes([IndexMode::Key]),
//! )?;
//! graph.create_topic_type(
//!     TopicTypeModel::new("person", "Person", uri::COMPOSITE)
//!         .with_assoc_def(AssociationDefinitionModel::composition("person.name")),
//! )?;
//!
//! let ada = graph.create_topic(TopicModel::new(
//!     "person",
//!     TopicValue::composite().with("person.name", "Ada"),
//! ))?;
//! assert_eq!(graph.get_child_value(ada.id, "person.name")?, Some(TopicValue::from("Ada")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (default) | In-memory graph with undo-log rollback |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod index;
pub mod primitive;
pub mod traverse;
pub mod typing;
pub mod schema;
pub mod cache;
pub mod events;
pub mod access;
pub mod config;
pub mod migration;
pub mod service;

use std::sync::Arc;

use tracing::warn;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    NodeId, EdgeId, ElementRef, NodeRecord, EdgeRecord, Role, Roles,
    Value, PropertyMap, props,
    Topic, TopicModel, TopicUpdate, TopicValue, CompositeValue,
    Association, AssociationModel, RoleModel,
    TopicType, TopicTypeModel, TypeKind, TypeOf, TypeRef, DataType,
    AssociationDefinition, AssociationDefinitionModel,
    uri,
};

// ============================================================================
// Re-exports: Storage, transactions, engine surfaces
// ============================================================================

pub use storage::{StorageBackend, MemoryBackend};
pub use tx::{Transaction, TxMode, TxId, CoreTx};
pub use index::IndexMode;
pub use traverse::TraversalFilter;
pub use cache::TypeCache;
pub use events::{CoreEvent, Listener, ListenerRegistry};
pub use access::{Access, AccessPolicy, AllowAll};
pub use config::CoreConfig;
pub use migration::{Migration, RunMode};

// ============================================================================
// Top-level TopicGraph handle
// ============================================================================

/// The primary entry point. A `TopicGraph` wraps a storage backend and owns
/// everything the engine shares between transactions.
pub struct TopicGraph<B: StorageBackend> {
    pub(crate) backend: B,
    pub(crate) config: CoreConfig,
    pub(crate) types: TypeCache,
    pub(crate) listeners: ListenerRegistry<B>,
    pub(crate) access: Arc<dyn AccessPolicy>,
}

impl<B: StorageBackend> TopicGraph<B> {
    /// Open a graph on `backend`: install the core types if missing, apply
    /// pending migrations and optionally warm the type cache.
    pub fn open(backend: B, config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let graph = Self {
            backend,
            config,
            types: TypeCache::new(),
            listeners: ListenerRegistry::new(),
            access: Arc::new(AllowAll),
        };
        migration::run_core_migrations(&graph)?;
        if graph.config.preload_types {
            graph.preload_types()?;
        }
        Ok(graph)
    }

    /// Register a listener. Listeners run in registration order.
    pub fn register_listener(&mut self, listener: Arc<dyn Listener<B>>) {
        self.listeners.register(listener);
    }

    /// Replace the access policy.
    pub fn set_access_policy(&mut self, policy: Arc<dyn AccessPolicy>) {
        self.access = policy;
    }

    /// Begin an explicit transaction.
    pub fn begin_tx(&self, mode: TxMode) -> Result<CoreTx<'_, B>> {
        let tx = self.backend.begin_tx(mode)?;
        Ok(CoreTx::new(self, tx))
    }

    /// Run `f` in one read-write transaction.
    ///
    /// Commits if `f` succeeds. On error everything `f` did is rolled back and
    /// the error comes back wrapped in [`Error::Operation`].
    pub fn write<T>(
        &self,
        operation: impl Into<String>,
        f: impl FnOnce(&mut CoreTx<'_, B>) -> Result<T>,
    ) -> Result<T> {
        self.run(TxMode::ReadWrite, operation.into(), f)
    }

    /// Run `f` in one read-only transaction.
    pub fn read<T>(
        &self,
        operation: impl Into<String>,
        f: impl FnOnce(&mut CoreTx<'_, B>) -> Result<T>,
    ) -> Result<T> {
        self.run(TxMode::ReadOnly, operation.into(), f)
    }

    fn run<T>(
        &self,
        mode: TxMode,
        operation: String,
        f: impl FnOnce(&mut CoreTx<'_, B>) -> Result<T>,
    ) -> Result<T> {
        let outcome = self.begin_tx(mode).and_then(|mut tx| {
            let result = f(&mut tx);
            if result.is_ok() {
                tx.success();
            } else {
                tx.failure();
            }
            let finished = tx.finish();
            match (result, finished) {
                (Ok(value), Ok(())) => Ok(value),
                (Err(err), _) | (Ok(_), Err(err)) => Err(err),
            }
        });
        outcome.map_err(|err| {
            warn!(operation = %operation, error = %err, "operation failed, rolled back");
            Error::Operation { operation, source: Box::new(err) }
        })
    }

    /// Load every type into the cache.
    pub fn preload_types(&self) -> Result<usize> {
        self.read("types can't be preloaded", |tx| {
            let uris = tx.all_type_uris()?;
            for uri in &uris {
                tx.type_definition(uri)?;
            }
            Ok(uris.len())
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn types(&self) -> &TypeCache {
        &self.types
    }

    pub fn listeners(&self) -> &ListenerRegistry<B> {
        &self.listeners
    }

    /// Shut the backend down.
    pub fn shutdown(&self) -> Result<()> {
        self.backend.shutdown()
    }
}

/// In-memory graph for testing and embedding.
impl TopicGraph<MemoryBackend> {
    pub fn open_memory() -> Result<Self> {
        Self::open(MemoryBackend::new(), CoreConfig::default())
    }

    pub fn open_memory_with(config: CoreConfig) -> Result<Self> {
        Self::open(MemoryBackend::new(), config)
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous: {0}")]
    Ambiguous(String),

    #[error("Graph inconsistency: {0}")]
    Inconsistency(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Type {0} not found in cache")]
    CacheMiss(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("{operation}: {source}")]
    Operation {
        operation: String,
        source: Box<Error>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The error underneath any number of [`Error::Operation`] layers.
    pub fn cause(&self) -> &Error {
        match self {
            Error::Operation { source, .. } => source.cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

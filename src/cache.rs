//! Type cache.
//!
//! Materialised [`TopicType`]s keyed by URI, shared by all transactions of a
//! graph. Transactions never write here directly: they stage loads, puts and
//! invalidations in their own overlay (see [`crate::tx::CoreTx`]) and the
//! overlay is published when the transaction commits.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::model::{NodeId, TopicType};
use crate::storage::StorageBackend;
use crate::tx::{CacheOverlay, CoreTx};
use crate::{Error, Result};

/// Process-local cache of type definitions.
#[derive(Debug, Default)]
pub struct TypeCache {
    types: RwLock<HashMap<String, Arc<TopicType>>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed entry for `uri`, without loading.
    pub fn get(&self, uri: &str) -> Option<Arc<TopicType>> {
        self.types.read().get(uri).cloned()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.types.read().contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// URIs of all committed entries.
    pub fn uris(&self) -> Vec<String> {
        self.types.read().keys().cloned().collect()
    }

    /// Drop every entry. The next access reloads from the graph.
    pub fn clear(&self) {
        self.types.write().clear();
    }

    pub(crate) fn lock_for_publish(&self) -> CachePublisher<'_> {
        CachePublisher { types: self.types.write() }
    }
}

/// Write access to the cache for the duration of a commit.
pub(crate) struct CachePublisher<'a> {
    types: RwLockWriteGuard<'a, HashMap<String, Arc<TopicType>>>,
}

impl CachePublisher<'_> {
    pub(crate) fn publish(&mut self, overlay: CacheOverlay) {
        for (uri, entry) in overlay {
            match entry {
                Some(ty) => {
                    self.types.insert(uri, ty);
                }
                None => {
                    self.types.remove(&uri);
                }
            }
        }
    }
}

// ============================================================================
// Transaction view
// ============================================================================

impl<B: StorageBackend> CoreTx<'_, B> {
    /// The cached entry for `uri` as this transaction sees it.
    fn cached_type(&self, uri: &str) -> Option<Arc<TopicType>> {
        match self.overlay.get(uri) {
            Some(entry) => entry.clone(),
            None => self.graph.types.get(uri),
        }
    }

    /// Whether `uri` is cached, as this transaction sees it.
    pub fn is_type_cached(&self, uri: &str) -> bool {
        self.cached_type(uri).is_some()
    }

    /// URIs cached as this transaction sees them.
    pub(crate) fn cached_type_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.graph.types.uris()
            .into_iter()
            .filter(|uri| !matches!(self.overlay.get(uri), Some(None)))
            .collect();
        for (uri, entry) in &self.overlay {
            if entry.is_some() && !uris.contains(uri) {
                uris.push(uri.clone());
            }
        }
        uris
    }

    /// Type definition by URI. Loads on a miss and memoises the result.
    ///
    /// Fails with `NotFound` when no type has that URI.
    pub fn type_definition(&mut self, uri: &str) -> Result<Arc<TopicType>> {
        if let Some(ty) = self.cached_type(uri) {
            return Ok(ty);
        }
        let node = self.type_node(uri)?;
        let ty = Arc::new(self.load_type(node)?);
        debug!(uri, "type loaded");
        self.overlay.insert(uri.to_string(), Some(Arc::clone(&ty)));
        Ok(ty)
    }

    /// Upsert keyed by the type's current URI.
    pub fn put_type(&mut self, ty: TopicType) -> Arc<TopicType> {
        let ty = Arc::new(ty);
        self.overlay.insert(ty.uri.clone(), Some(Arc::clone(&ty)));
        ty
    }

    /// Remove a cached type. Fails with `CacheMiss` if it isn't cached.
    pub fn invalidate_type(&mut self, uri: &str) -> Result<()> {
        if !self.is_type_cached(uri) {
            return Err(Error::CacheMiss(uri.to_string()));
        }
        self.overlay.insert(uri.to_string(), None);
        Ok(())
    }

    /// Reload the type stored at `node` and put it under its current URI.
    pub(crate) fn refresh_type(&mut self, node: NodeId) -> Result<Arc<TopicType>> {
        let ty = self.load_type(node)?;
        Ok(self.put_type(ty))
    }

    /// Drop `uri` from the cache if present.
    pub(crate) fn forget_type(&mut self, uri: &str) {
        if self.is_type_cached(uri) {
            self.overlay.insert(uri.to_string(), None);
        }
    }
}

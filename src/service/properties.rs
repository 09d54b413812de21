//! Indexed property store.
//!
//! A property write updates the stored value and every index the owner's type
//! declares for it. The old value is always read back from storage before it
//! is overwritten, so its index entries can be taken out exactly.

use tracing::debug;

use crate::index::IndexMode;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result, TopicGraph};

impl<B: StorageBackend> CoreTx<'_, B> {
    pub fn get_property(&self, element: ElementRef, key: &str) -> Result<Option<Value>> {
        self.backend().get_property(self.raw()?, element, key)
    }

    /// Store `value` under `key` and maintain the given indexes, keyed by
    /// `index_key`.
    pub fn set_property(
        &mut self,
        element: ElementRef,
        key: &str,
        value: Value,
        modes: &[IndexMode],
        index_key: &str,
    ) -> Result<()> {
        let backend = self.backend();
        let tx = self.raw_mut()?;
        let old = backend.set_property(tx, element, key, value.clone())?;
        for &mode in modes {
            if let Some(old) = &old {
                backend.index_remove(tx, mode, index_key, element, old)?;
            }
            backend.index_add(tx, mode, index_key, element, &value)?;
        }
        Ok(())
    }

    /// Remove a property and its index entries.
    pub fn remove_property(
        &mut self,
        element: ElementRef,
        key: &str,
        modes: &[IndexMode],
        index_key: &str,
    ) -> Result<Option<Value>> {
        let backend = self.backend();
        let tx = self.raw_mut()?;
        let old = backend.remove_property(tx, element, key)?;
        if let Some(old) = &old {
            for &mode in modes {
                backend.index_remove(tx, mode, index_key, element, old)?;
            }
        }
        Ok(old)
    }

    /// Move the index entries of the current `key` value from `from_key` to
    /// `to_key`. The stored value is unchanged.
    pub(crate) fn rekey_index(
        &mut self,
        element: ElementRef,
        key: &str,
        modes: &[IndexMode],
        from_key: &str,
        to_key: &str,
    ) -> Result<()> {
        let Some(value) = self.get_property(element, key)? else {
            return Ok(());
        };
        let backend = self.backend();
        let tx = self.raw_mut()?;
        for &mode in modes {
            backend.index_remove(tx, mode, from_key, element, &value)?;
            backend.index_add(tx, mode, to_key, element, &value)?;
        }
        Ok(())
    }

    /// Swap the index modes of the current `key` value.
    pub(crate) fn change_index_modes(
        &mut self,
        element: ElementRef,
        key: &str,
        old_modes: &[IndexMode],
        new_modes: &[IndexMode],
        index_key: &str,
    ) -> Result<()> {
        let Some(value) = self.get_property(element, key)? else {
            return Ok(());
        };
        let backend = self.backend();
        let tx = self.raw_mut()?;
        for &mode in old_modes {
            backend.index_remove(tx, mode, index_key, element, &value)?;
        }
        for &mode in new_modes {
            backend.index_add(tx, mode, index_key, element, &value)?;
        }
        Ok(())
    }

    /// Exact-match lookup in the KEY index.
    pub fn lookup(&self, key: &str, value: &Value) -> Result<Vec<ElementRef>> {
        self.backend().lookup(self.raw()?, key, value)
    }

    /// Fulltext search. Each token of `term` matches as a prefix unless
    /// `whole_word` is set; a hit must match every token.
    pub fn search(&self, bucket: Option<&str>, term: &str, whole_word: bool) -> Result<Vec<ElementRef>> {
        self.backend().search(self.raw()?, bucket, term, whole_word)
    }

    /// Rebuild every index entry of a topic from its stored properties.
    ///
    /// Entries are purged first, whatever value they were made from.
    pub fn reindex_topic(&mut self, id: NodeId) -> Result<()> {
        self.require_node(id)?;
        let element = ElementRef::Node(id);
        let backend = self.backend();
        backend.index_purge(self.raw_mut()?, element)?;

        let topic_uri = self.node_uri(id)?;
        if !topic_uri.is_empty() {
            let tx = self.raw_mut()?;
            backend.index_add(tx, IndexMode::Key, uri::URI_KEY, element, &Value::from(topic_uri))?;
        }

        let type_uri = self.resolve_type(id)?.uri().to_string();
        if type_uri != uri::META_META_TYPE {
            let ty = self.type_definition(&type_uri)?;
            if let Some(value) = self.get_property(element, uri::VALUE_KEY)? {
                let tx = self.raw_mut()?;
                for &mode in &ty.index_modes {
                    backend.index_add(tx, mode, &ty.uri, element, &value)?;
                }
            }
        }
        debug!(node = id.0, "topic reindexed");
        Ok(())
    }

    /// Index the `uri` property of a new element, rejecting duplicates.
    pub(crate) fn claim_uri(&mut self, element: ElementRef, topic_uri: &str) -> Result<()> {
        if topic_uri.is_empty() {
            return Ok(());
        }
        self.ensure_uri_free(topic_uri)?;
        self.set_property(element, uri::URI_KEY, Value::from(topic_uri), &[IndexMode::Key], uri::URI_KEY)
    }

    /// The node carrying `topic_uri`, if any.
    pub fn node_by_uri(&self, topic_uri: &str) -> Result<Option<NodeId>> {
        let hits = self.lookup(uri::URI_KEY, &Value::from(topic_uri))?;
        match hits.as_slice() {
            [] => Ok(None),
            [ElementRef::Node(id)] => Ok(Some(*id)),
            [ElementRef::Edge(id)] => Err(Error::Inconsistency(format!(
                "URI \"{topic_uri}\" is indexed for edge {id}"
            ))),
            _ => Err(Error::Ambiguous(format!("{} elements have URI \"{topic_uri}\"", hits.len()))),
        }
    }

    pub(crate) fn ensure_uri_free(&self, topic_uri: &str) -> Result<()> {
        if !self.lookup(uri::URI_KEY, &Value::from(topic_uri))?.is_empty() {
            return Err(Error::InvalidArgument(format!("URI \"{topic_uri}\" is not unique")));
        }
        Ok(())
    }
}

// ============================================================================
// One transaction per call
// ============================================================================

impl<B: StorageBackend> TopicGraph<B> {
    pub fn get_property(&self, element: ElementRef, key: &str) -> Result<Option<Value>> {
        self.read(format!("property \"{key}\" of {element} can't be read"), |tx| {
            tx.get_property(element, key)
        })
    }

    pub fn set_property(
        &self,
        element: ElementRef,
        key: &str,
        value: Value,
        modes: &[IndexMode],
        index_key: &str,
    ) -> Result<()> {
        self.write(format!("property \"{key}\" of {element} can't be set"), |tx| {
            tx.set_property(element, key, value, modes, index_key)
        })
    }

    pub fn lookup(&self, key: &str, value: &Value) -> Result<Vec<ElementRef>> {
        self.read(format!("lookup of \"{key}\" = {value} failed"), |tx| tx.lookup(key, value))
    }

    pub fn search(&self, bucket: Option<&str>, term: &str, whole_word: bool) -> Result<Vec<ElementRef>> {
        self.read(format!("search for \"{term}\" failed"), |tx| tx.search(bucket, term, whole_word))
    }

    pub fn reindex_topic(&self, id: NodeId) -> Result<()> {
        self.write(format!("topic {id} can't be reindexed"), |tx| tx.reindex_topic(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn node(graph: &TopicGraph<crate::MemoryBackend>) -> ElementRef {
        graph
            .write("node", |tx| tx.create_node(PropertyMap::new()))
            .map(ElementRef::Node)
            .unwrap()
    }

    #[test]
    fn test_key_index_follows_value() {
        let graph = TopicGraph::open_memory().unwrap();
        let n = node(&graph);
        graph.set_property(n, "code", Value::from("A1"), &[IndexMode::Key], "test.code").unwrap();
        graph.set_property(n, "code", Value::from("B2"), &[IndexMode::Key], "test.code").unwrap();

        assert!(graph.lookup("test.code", &Value::from("A1")).unwrap().is_empty());
        assert_eq!(graph.lookup("test.code", &Value::from("B2")).unwrap(), vec![n]);
    }

    #[test]
    fn test_fulltext_update_removes_old_tokens() {
        let graph = TopicGraph::open_memory().unwrap();
        let n = node(&graph);
        let modes = [IndexMode::Fulltext, IndexMode::FulltextKey];
        graph.set_property(n, "v", Value::from("red apple"), &modes, "test.note").unwrap();
        graph.set_property(n, "v", Value::from("green pear"), &modes, "test.note").unwrap();

        assert!(graph.search(None, "apple", false).unwrap().is_empty());
        assert_eq!(graph.search(None, "gre pe", false).unwrap(), vec![n]);
        assert_eq!(graph.search(Some("test.note"), "pear", true).unwrap(), vec![n]);
        assert!(graph.search(Some("test.note"), "pea", true).unwrap().is_empty());
    }

    #[test]
    fn test_remove_property_drops_entries() {
        let graph = TopicGraph::open_memory().unwrap();
        let n = node(&graph);
        graph.set_property(n, "code", Value::from("X"), &[IndexMode::Key], "k").unwrap();
        let old = graph
            .write("rm", |tx| tx.remove_property(n, "code", &[IndexMode::Key], "k"))
            .unwrap();
        assert_eq!(old, Some(Value::from("X")));
        assert!(graph.lookup("k", &Value::from("X")).unwrap().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_set_twice_moves_key_entry(v1 in "[a-z0-9]{1,10}", v2 in "[a-z0-9]{1,10}") {
            prop_assume!(v1 != v2);
            let graph = TopicGraph::open_memory().unwrap();
            let n = node(&graph);
            graph.set_property(n, "p", Value::from(v1.as_str()), &[IndexMode::Key], "k").unwrap();
            graph.set_property(n, "p", Value::from(v2.as_str()), &[IndexMode::Key], "k").unwrap();
            prop_assert!(graph.lookup("k", &Value::from(v1.as_str())).unwrap().is_empty());
            prop_assert_eq!(graph.lookup("k", &Value::from(v2.as_str())).unwrap(), vec![n]);
        }
    }
}

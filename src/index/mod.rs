//! Index management.
//!
//! Two index families back the property store:
//! - [`KeyIndex`]: exact-match, `(key, value) → elements`;
//! - [`FulltextIndex`]: token postings per bucket, searched by prefix or
//!   whole word.
//!
//! Every mutation returns an [`IndexDelta`] describing what actually changed,
//! so a transaction can undo exactly that and nothing more.

mod fulltext;
mod key;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{ElementRef, Value};
use crate::{Error, Result};

pub use fulltext::{FulltextIndex, tokenize};
pub use key::{KeyIndex, ValueKey};

/// Bucket shared by all `FULLTEXT` fields of all instances.
pub const DEFAULT_FULLTEXT_BUCKET: &str = "_fulltext";

/// How a property is indexed. The serialized names are the wire vocabulary
/// of migration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexMode {
    /// No index.
    Off,
    /// Exact match, one entry per value.
    Key,
    /// Shared fulltext bucket ([`DEFAULT_FULLTEXT_BUCKET`]).
    Fulltext,
    /// Fulltext bucket named after the index key.
    FulltextKey,
}

impl IndexMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexMode::Off => "OFF",
            IndexMode::Key => "KEY",
            IndexMode::Fulltext => "FULLTEXT",
            IndexMode::FulltextKey => "FULLTEXT_KEY",
        }
    }

    /// Encode a mode list for storage in a single property.
    pub fn join(modes: &[IndexMode]) -> String {
        modes.iter().map(IndexMode::as_str).collect::<Vec<_>>().join(",")
    }

    /// Inverse of [`IndexMode::join`].
    pub fn split(s: &str) -> Result<Vec<IndexMode>> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(IndexMode::from_str)
            .collect()
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OFF" => Ok(IndexMode::Off),
            "KEY" => Ok(IndexMode::Key),
            "FULLTEXT" => Ok(IndexMode::Fulltext),
            "FULLTEXT_KEY" => Ok(IndexMode::FulltextKey),
            other => Err(Error::InvalidArgument(format!("unknown index mode \"{other}\""))),
        }
    }
}

// ============================================================================
// Deltas
// ============================================================================

/// A set of index entries, added or removed as one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDelta {
    /// `(key, value, element)`
    pub keys: Vec<(String, ValueKey, ElementRef)>,
    /// `(bucket, token, element, occurrences)`
    pub postings: Vec<(String, String, ElementRef, u32)>,
}

impl IndexDelta {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.postings.is_empty()
    }

    fn extend(&mut self, other: IndexDelta) {
        self.keys.extend(other.keys);
        self.postings.extend(other.postings);
    }
}

// ============================================================================
// IndexStore
// ============================================================================

/// All indexes of one graph.
#[derive(Debug, Default, Clone)]
pub struct IndexStore {
    keys: KeyIndex,
    fulltext: FulltextIndex,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `value` of `element` under `key` according to `mode`.
    pub fn add(&mut self, mode: IndexMode, key: &str, element: ElementRef, value: &Value) -> IndexDelta {
        match mode {
            IndexMode::Off => IndexDelta::default(),
            IndexMode::Key => self.keys.insert(key, element, value),
            IndexMode::Fulltext => self.fulltext.insert(DEFAULT_FULLTEXT_BUCKET, element, value),
            IndexMode::FulltextKey => self.fulltext.insert(key, element, value),
        }
    }

    /// Remove the entries `add` would have created for `value`.
    pub fn remove(&mut self, mode: IndexMode, key: &str, element: ElementRef, value: &Value) -> IndexDelta {
        match mode {
            IndexMode::Off => IndexDelta::default(),
            IndexMode::Key => self.keys.remove(key, element, value),
            IndexMode::Fulltext => self.fulltext.remove(DEFAULT_FULLTEXT_BUCKET, element, value),
            IndexMode::FulltextKey => self.fulltext.remove(key, element, value),
        }
    }

    /// Remove every entry of `element`, whatever value it was indexed by.
    pub fn purge(&mut self, element: ElementRef) -> IndexDelta {
        let mut delta = self.keys.purge(element);
        delta.extend(self.fulltext.purge(element));
        delta
    }

    /// Re-add entries previously returned by `remove` or `purge`.
    pub fn apply_added(&mut self, delta: &IndexDelta) {
        for (key, value, element) in &delta.keys {
            self.keys.insert_raw(key, value.clone(), *element);
        }
        for (bucket, token, element, n) in &delta.postings {
            self.fulltext.insert_raw(bucket, token, *element, *n);
        }
    }

    /// Take back entries previously returned by `add`.
    pub fn apply_removed(&mut self, delta: &IndexDelta) {
        for (key, value, element) in &delta.keys {
            self.keys.remove_raw(key, value, *element);
        }
        for (bucket, token, element, n) in &delta.postings {
            self.fulltext.remove_raw(bucket, token, *element, *n);
        }
    }

    /// Exact-match lookup.
    pub fn lookup(&self, key: &str, value: &Value) -> Vec<ElementRef> {
        self.keys.get(key, value)
    }

    /// Fulltext search. `bucket = None` searches the shared bucket.
    pub fn search(&self, bucket: Option<&str>, term: &str, whole_word: bool) -> Vec<ElementRef> {
        self.fulltext.search(bucket.unwrap_or(DEFAULT_FULLTEXT_BUCKET), term, whole_word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;
    use proptest::prelude::*;

    fn n(id: u64) -> ElementRef {
        ElementRef::Node(NodeId(id))
    }

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(serde_json::to_string(&IndexMode::FulltextKey).unwrap(), "\"FULLTEXT_KEY\"");
        let modes: Vec<IndexMode> = serde_json::from_str(r#"["OFF","KEY","FULLTEXT","FULLTEXT_KEY"]"#).unwrap();
        assert_eq!(IndexMode::split(&IndexMode::join(&modes)).unwrap(), modes);
        assert!(IndexMode::split("KEY,BOGUS").is_err());
        assert!(IndexMode::split("").unwrap().is_empty());
    }

    #[test]
    fn test_key_replace() {
        let mut idx = IndexStore::new();
        idx.add(IndexMode::Key, "person.name", n(1), &Value::from("Alice"));
        idx.remove(IndexMode::Key, "person.name", n(1), &Value::from("Alice"));
        idx.add(IndexMode::Key, "person.name", n(1), &Value::from("Alicia"));

        assert!(idx.lookup("person.name", &Value::from("Alice")).is_empty());
        assert_eq!(idx.lookup("person.name", &Value::from("Alicia")), vec![n(1)]);
    }

    #[test]
    fn test_shared_bucket_keeps_other_field() {
        let mut idx = IndexStore::new();
        idx.add(IndexMode::Fulltext, "a", n(1), &Value::from("red apple"));
        idx.add(IndexMode::Fulltext, "b", n(1), &Value::from("red car"));
        idx.remove(IndexMode::Fulltext, "a", n(1), &Value::from("red apple"));

        assert_eq!(idx.search(None, "red", true), vec![n(1)]);
        assert!(idx.search(None, "apple", false).is_empty());
    }

    #[test]
    fn test_fulltext_key_bucket_is_separate() {
        let mut idx = IndexStore::new();
        idx.add(IndexMode::FulltextKey, "note.text", n(1), &Value::from("hello world"));
        assert!(idx.search(None, "hello", false).is_empty());
        assert_eq!(idx.search(Some("note.text"), "wor", false), vec![n(1)]);
        assert!(idx.search(Some("note.text"), "wor", true).is_empty());
    }

    #[test]
    fn test_purge_and_restore() {
        let mut idx = IndexStore::new();
        idx.add(IndexMode::Key, "uri", n(1), &Value::from("x"));
        idx.add(IndexMode::Fulltext, "v", n(1), &Value::from("alpha beta"));
        idx.add(IndexMode::Fulltext, "v", n(2), &Value::from("alpha"));

        let purged = idx.purge(n(1));
        assert!(idx.lookup("uri", &Value::from("x")).is_empty());
        assert_eq!(idx.search(None, "alpha", true), vec![n(2)]);

        idx.apply_added(&purged);
        assert_eq!(idx.lookup("uri", &Value::from("x")), vec![n(1)]);
        assert_eq!(idx.search(None, "beta", true), vec![n(1)]);
    }

    #[test]
    fn test_removing_unindexed_value_is_empty_delta() {
        let mut idx = IndexStore::new();
        let delta = idx.remove(IndexMode::Key, "k", n(1), &Value::from("never"));
        assert!(delta.is_empty());
    }

    proptest! {
        #[test]
        fn prop_key_index_round_trip(v1 in "[a-z]{1,8}", v2 in "[a-z]{1,8}") {
            prop_assume!(v1 != v2);
            let mut idx = IndexStore::new();
            idx.add(IndexMode::Key, "k", n(7), &Value::from(v1.as_str()));
            idx.remove(IndexMode::Key, "k", n(7), &Value::from(v1.as_str()));
            idx.add(IndexMode::Key, "k", n(7), &Value::from(v2.as_str()));
            prop_assert!(idx.lookup("k", &Value::from(v1.as_str())).is_empty());
            prop_assert_eq!(idx.lookup("k", &Value::from(v2.as_str())), vec![n(7)]);
        }

        #[test]
        fn prop_undo_add_restores_previous_state(words in proptest::collection::vec("[a-z]{1,5}", 1..6)) {
            let mut idx = IndexStore::new();
            idx.add(IndexMode::Fulltext, "k", n(1), &Value::from("seed"));
            let text = words.join(" ");
            let delta = idx.add(IndexMode::Fulltext, "k", n(2), &Value::from(text.as_str()));
            idx.apply_removed(&delta);
            for w in &words {
                prop_assert!(idx.search(None, w, true).iter().all(|e| *e != n(2)));
            }
            prop_assert_eq!(idx.search(None, "seed", true), vec![n(1)]);
        }
    }
}

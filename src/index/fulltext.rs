//! Fulltext postings, one token map per bucket.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;

use super::IndexDelta;
use crate::model::{ElementRef, Value};

/// Lower-cased alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// token → element → occurrence count
type Postings = BTreeMap<String, BTreeMap<ElementRef, u32>>;

#[derive(Debug, Default, Clone)]
pub struct FulltextIndex {
    buckets: HashMap<String, Postings>,
}

impl FulltextIndex {
    pub fn insert(&mut self, bucket: &str, element: ElementRef, value: &Value) -> IndexDelta {
        let mut delta = IndexDelta::default();
        for (token, n) in counted_tokens(value) {
            self.insert_raw(bucket, &token, element, n);
            delta.postings.push((bucket.to_string(), token, element, n));
        }
        delta
    }

    /// Decrement the postings `value` contributed. Counts never go below
    /// zero, and only the decrements actually applied are reported.
    pub fn remove(&mut self, bucket: &str, element: ElementRef, value: &Value) -> IndexDelta {
        let mut delta = IndexDelta::default();
        for (token, n) in counted_tokens(value) {
            let removed = self.remove_raw(bucket, &token, element, n);
            if removed > 0 {
                delta.postings.push((bucket.to_string(), token, element, removed));
            }
        }
        delta
    }

    pub fn purge(&mut self, element: ElementRef) -> IndexDelta {
        let mut delta = IndexDelta::default();
        for (bucket, postings) in self.buckets.iter_mut() {
            for (token, elements) in postings.iter_mut() {
                if let Some(n) = elements.remove(&element) {
                    delta.postings.push((bucket.clone(), token.clone(), element, n));
                }
            }
            postings.retain(|_, elements| !elements.is_empty());
        }
        self.buckets.retain(|_, postings| !postings.is_empty());
        delta
    }

    pub(super) fn insert_raw(&mut self, bucket: &str, token: &str, element: ElementRef, n: u32) {
        *self.buckets
            .entry_ref(bucket)
            .or_default()
            .entry(token.to_string())
            .or_default()
            .entry(element)
            .or_default() += n;
    }

    /// Returns how many occurrences were actually removed.
    pub(super) fn remove_raw(&mut self, bucket: &str, token: &str, element: ElementRef, n: u32) -> u32 {
        let Some(postings) = self.buckets.get_mut(bucket) else {
            return 0;
        };
        let Some(elements) = postings.get_mut(token) else {
            return 0;
        };
        let Some(count) = elements.get_mut(&element) else {
            return 0;
        };
        let removed = n.min(*count);
        *count -= removed;
        if *count == 0 {
            elements.remove(&element);
        }
        if elements.is_empty() {
            postings.remove(token);
        }
        if postings.is_empty() {
            self.buckets.remove(bucket);
        }
        removed
    }

    /// Elements matching every token of `term`. Without `whole_word` each
    /// token is a prefix (implicit trailing wildcard).
    pub fn search(&self, bucket: &str, term: &str, whole_word: bool) -> Vec<ElementRef> {
        let tokens = tokenize(term);
        let Some(postings) = self.buckets.get(bucket) else {
            return Vec::new();
        };
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut result: Option<BTreeSet<ElementRef>> = None;
        for token in &tokens {
            let matches: BTreeSet<ElementRef> = if whole_word {
                postings
                    .get(token)
                    .map(|elements| elements.keys().copied().collect())
                    .unwrap_or_default()
            } else {
                postings
                    .range(token.clone()..)
                    .take_while(|(t, _)| t.starts_with(token.as_str()))
                    .flat_map(|(_, elements)| elements.keys().copied())
                    .collect()
            };
            result = Some(match result {
                None => matches,
                Some(acc) => acc.intersection(&matches).copied().collect(),
            });
        }
        result.map(|set| set.into_iter().collect()).unwrap_or_default()
    }
}

fn counted_tokens(value: &Value) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    if let Some(text) = value.index_text() {
        for token in tokenize(&text) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    fn n(id: u64) -> ElementRef {
        ElementRef::Node(NodeId(id))
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Hello, World-42!"), vec!["hello", "world", "42"]);
        assert!(tokenize("  ,, ").is_empty());
    }

    #[test]
    fn test_prefix_and_conjunction() {
        let mut ft = FulltextIndex::default();
        ft.insert("b", n(1), &Value::from("Ada Lovelace"));
        ft.insert("b", n(2), &Value::from("Ada Byron"));

        assert_eq!(ft.search("b", "ada", false), vec![n(1), n(2)]);
        assert_eq!(ft.search("b", "ada love", false), vec![n(1)]);
        assert!(ft.search("b", "ad", true).is_empty());
        assert!(ft.search("missing", "ada", false).is_empty());
    }

    #[test]
    fn test_repeated_token_counts() {
        let mut ft = FulltextIndex::default();
        ft.insert("b", n(1), &Value::from("echo echo"));
        ft.insert("b", n(1), &Value::from("echo"));
        ft.remove("b", n(1), &Value::from("echo echo"));
        assert_eq!(ft.search("b", "echo", true), vec![n(1)]);
        ft.remove("b", n(1), &Value::from("echo"));
        assert!(ft.search("b", "echo", true).is_empty());
    }
}

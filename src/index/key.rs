//! Exact-match index.

use std::collections::BTreeSet;

use hashbrown::HashMap;

use super::IndexDelta;
use crate::model::{ElementRef, Value};

/// Hashable form of a [`Value`]. Floats are keyed by their bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    String(String),
}

impl ValueKey {
    /// `None` for `Null`, which is never indexed.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ValueKey::Bool(*b)),
            Value::Int(i) => Some(ValueKey::Int(*i)),
            Value::Float(f) => Some(ValueKey::Float(f.to_bits())),
            Value::String(s) => Some(ValueKey::String(s.clone())),
        }
    }
}

/// `key → value → elements`
#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    entries: HashMap<String, HashMap<ValueKey, BTreeSet<ElementRef>>>,
}

impl KeyIndex {
    pub fn insert(&mut self, key: &str, element: ElementRef, value: &Value) -> IndexDelta {
        let mut delta = IndexDelta::default();
        if let Some(vk) = ValueKey::from_value(value) {
            if self.insert_raw(key, vk.clone(), element) {
                delta.keys.push((key.to_string(), vk, element));
            }
        }
        delta
    }

    pub fn remove(&mut self, key: &str, element: ElementRef, value: &Value) -> IndexDelta {
        let mut delta = IndexDelta::default();
        if let Some(vk) = ValueKey::from_value(value) {
            if self.remove_raw(key, &vk, element) {
                delta.keys.push((key.to_string(), vk, element));
            }
        }
        delta
    }

    pub fn purge(&mut self, element: ElementRef) -> IndexDelta {
        let mut delta = IndexDelta::default();
        for (key, values) in self.entries.iter_mut() {
            for (vk, elements) in values.iter_mut() {
                if elements.remove(&element) {
                    delta.keys.push((key.clone(), vk.clone(), element));
                }
            }
            values.retain(|_, elements| !elements.is_empty());
        }
        self.entries.retain(|_, values| !values.is_empty());
        delta
    }

    pub(super) fn insert_raw(&mut self, key: &str, value: ValueKey, element: ElementRef) -> bool {
        self.entries
            .entry_ref(key)
            .or_default()
            .entry(value)
            .or_default()
            .insert(element)
    }

    pub(super) fn remove_raw(&mut self, key: &str, value: &ValueKey, element: ElementRef) -> bool {
        let Some(values) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(elements) = values.get_mut(value) else {
            return false;
        };
        let removed = elements.remove(&element);
        if elements.is_empty() {
            values.remove(value);
        }
        if values.is_empty() {
            self.entries.remove(key);
        }
        removed
    }

    pub fn get(&self, key: &str, value: &Value) -> Vec<ElementRef> {
        let Some(vk) = ValueKey::from_value(value) else {
            return Vec::new();
        };
        self.entries
            .get(key)
            .and_then(|values| values.get(&vk))
            .map(|elements| elements.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    #[test]
    fn test_null_not_indexed() {
        let mut idx = KeyIndex::default();
        assert!(idx.insert("k", ElementRef::Node(NodeId(1)), &Value::Null).is_empty());
        assert!(idx.get("k", &Value::Null).is_empty());
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        let mut idx = KeyIndex::default();
        let e = ElementRef::Node(NodeId(1));
        idx.insert("k", e, &Value::Int(1));
        assert_eq!(idx.get("k", &Value::Int(1)), vec![e]);
        assert!(idx.get("k", &Value::Float(1.0)).is_empty());
    }

    #[test]
    fn test_double_insert_reports_once() {
        let mut idx = KeyIndex::default();
        let e = ElementRef::Node(NodeId(1));
        assert_eq!(idx.insert("k", e, &Value::from("a")).keys.len(), 1);
        assert!(idx.insert("k", e, &Value::from("a")).is_empty());
    }
}

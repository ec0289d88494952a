//! Catalog of known real-world objects
//!
//! The catalog is a set of named buckets ("instances", "files", ...), each a
//! list of JSON objects. The orchestrator never looks inside; it only hands
//! the catalog to deferred values and handlers, and handlers keep their own
//! buckets in sync with what they create and delete.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Bucketed record of everything the handlers know about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    buckets: BTreeMap<String, Vec<Value>>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects in a bucket; empty if the bucket does not exist
    pub fn bucket(&self, name: &str) -> &[Value] {
        self.buckets.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Mutable access to a bucket, creating it if needed
    pub fn bucket_mut(&mut self, name: &str) -> &mut Vec<Value> {
        self.buckets.entry(name.to_string()).or_default()
    }

    /// Append an object to a bucket
    pub fn push(&mut self, bucket: &str, object: Value) {
        self.bucket_mut(bucket).push(object);
    }

    /// Keep only the objects matching `keep`, returning how many were dropped
    pub fn retain<F>(&mut self, bucket: &str, mut keep: F) -> usize
    where
        F: FnMut(&Value) -> bool,
    {
        match self.buckets.get_mut(bucket) {
            Some(objects) => {
                let before = objects.len();
                objects.retain(|o| keep(o));
                before - objects.len()
            }
            None => 0,
        }
    }

    /// First object in a bucket whose `key` field equals `value`
    pub fn find_by(&self, bucket: &str, key: &str, value: &str) -> Option<&Value> {
        self.bucket(bucket)
            .iter()
            .find(|o| o.get(key).and_then(Value::as_str) == Some(value))
    }

    /// Remove every object whose `key` field equals `value`
    pub fn remove_by(&mut self, bucket: &str, key: &str, value: &str) -> usize {
        self.retain(bucket, |o| o.get(key).and_then(Value::as_str) != Some(value))
    }

    /// Replace the object whose `key` field equals `value`, or append it
    pub fn upsert_by(&mut self, bucket: &str, key: &str, object: Value) {
        let id = object.get(key).and_then(Value::as_str).map(str::to_string);
        if let Some(id) = id {
            self.remove_by(bucket, key, &id);
        }
        self.push(bucket, object);
    }

    /// Names of all buckets
    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Total number of objects across buckets
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Check if there are no objects at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_find_remove() {
        let mut catalog = Catalog::new();
        catalog.push("files", json!({"path": "/tmp/a", "hash": "1"}));
        catalog.push("files", json!({"path": "/tmp/b", "hash": "2"}));

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.find_by("files", "path", "/tmp/b"),
            Some(&json!({"path": "/tmp/b", "hash": "2"}))
        );
        assert_eq!(catalog.remove_by("files", "path", "/tmp/a"), 1);
        assert_eq!(catalog.remove_by("files", "path", "/tmp/a"), 0);
        assert_eq!(catalog.bucket("files").len(), 1);
        assert!(catalog.bucket("instances").is_empty());
    }

    #[test]
    fn test_upsert_replaces() {
        let mut catalog = Catalog::new();
        catalog.upsert_by("files", "path", json!({"path": "/a", "hash": "1"}));
        catalog.upsert_by("files", "path", json!({"path": "/a", "hash": "2"}));
        assert_eq!(catalog.bucket("files"), [json!({"path": "/a", "hash": "2"})]);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut catalog = Catalog::new();
        catalog.push("vpcs", json!({"id": "vpc-1"}));
        let text = serde_json::to_string(&catalog).unwrap();
        assert_eq!(text, r#"{"vpcs":[{"id":"vpc-1"}]}"#);

        let back: Catalog = serde_json::from_str(&text).unwrap();
        assert_eq!(back, catalog);
        assert_eq!(back.bucket_names().collect::<Vec<_>>(), vec!["vpcs"]);
    }
}

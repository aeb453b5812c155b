//! In-memory [`DocumentStore`] for exercising fixtures without a server.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::store::{Document, DocumentStore, StoreError};

/// A [`DocumentStore`] keeping collections in process memory.
///
/// Collections keep documents in insertion order. Drop failures can be
/// injected per collection with [`fail_drop_of`](Self::fail_drop_of).
#[derive(Debug)]
pub struct MemoryStore {
    database: String,
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, Vec<Document>>,
    failing_drops: BTreeSet<String>,
}

impl MemoryStore {
    /// Creates an empty store for `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Creates an empty collection if it does not exist yet.
    pub fn create_collection(&self, name: &str) {
        self.state
            .lock()
            .collections
            .entry(name.to_string())
            .or_default();
    }

    /// Documents of `collection` in insertion order, or `None` if the
    /// collection does not exist.
    pub fn documents(&self, collection: &str) -> Option<Vec<Document>> {
        self.state.lock().collections.get(collection).cloned()
    }

    /// Names of all existing collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        self.state.lock().collections.keys().cloned().collect()
    }

    /// Makes every subsequent drop of `collection` fail.
    pub fn fail_drop_of(&self, collection: &str) {
        self.state
            .lock()
            .failing_drops
            .insert(collection.to_string());
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        Ok(())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.collection_names())
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.failing_drops.contains(collection) {
            return Err(StoreError::Drop {
                collection: collection.to_string(),
                source: "injected drop failure".into(),
            });
        }
        state.collections.remove(collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected a JSON object, got {other}"),
        }
    }

    #[tokio::test]
    async fn insert_many_preserves_order_across_calls() {
        //* Given
        let store = MemoryStore::new("test");

        //* When
        store
            .insert_many("users", vec![doc(json!({"n": 1})), doc(json!({"n": 2}))])
            .await
            .expect("insert should succeed");
        store
            .insert_many("users", vec![doc(json!({"n": 3}))])
            .await
            .expect("insert should succeed");

        //* Then
        let numbers: Vec<_> = store
            .documents("users")
            .expect("collection should exist")
            .iter()
            .map(|d| d["n"].clone())
            .collect();
        assert_eq!(numbers, [json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn drop_collection_of_missing_collection_succeeds() {
        let store = MemoryStore::new("test");
        store
            .drop_collection("missing")
            .await
            .expect("dropping a missing collection should succeed");
    }

    #[tokio::test]
    async fn drop_collection_with_injected_failure_keeps_collection() {
        //* Given
        let store = MemoryStore::new("test");
        store.create_collection("sticky");
        store.fail_drop_of("sticky");

        //* When
        let result = store.drop_collection("sticky").await;

        //* Then
        assert!(matches!(result, Err(StoreError::Drop { ref collection, .. }) if collection == "sticky"));
        assert_eq!(store.collection_names(), ["sticky"]);
    }
}

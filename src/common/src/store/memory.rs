use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{
    CollectionPath, Document, DocumentRef, DocumentStore, MAX_BATCH_WRITES, StoreError,
    StoreResult, merge_objects,
};

/// In-memory document store for tests and configless development.
///
/// Collections are keyed by their path string; documents within a
/// collection keep a stable id order so queries are deterministic.
/// Individual collections can be marked unavailable to exercise
/// partial-failure paths.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    collections: Arc<Mutex<HashMap<String, BTreeMap<String, Value>>>>,
    unavailable: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation touching `collection` fail with
    /// [`StoreError::Unavailable`] until [`restore`](Self::restore) is called.
    pub async fn mark_unavailable(&self, collection: &CollectionPath) {
        self.unavailable.lock().await.insert(collection.to_string());
    }

    pub async fn restore(&self, collection: &CollectionPath) {
        self.unavailable.lock().await.remove(&collection.to_string());
    }

    /// Number of documents currently held by `collection`.
    pub async fn count(&self, collection: &CollectionPath) -> usize {
        self.collections
            .lock()
            .await
            .get(&collection.to_string())
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    async fn check_available(&self, key: &str) -> StoreResult<()> {
        if self.unavailable.lock().await.contains(key) {
            return Err(StoreError::Unavailable(key.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &CollectionPath, id: &str) -> StoreResult<Option<Document>> {
        let key = collection.to_string();
        self.check_available(&key).await?;
        let collections = self.collections.lock().await;
        Ok(collections.get(&key).and_then(|docs| {
            docs.get(id).map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            })
        }))
    }

    async fn put(&self, collection: &CollectionPath, id: &str, data: Value) -> StoreResult<()> {
        let key = collection.to_string();
        self.check_available(&key).await?;
        let mut collections = self.collections.lock().await;
        collections
            .entry(key)
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn merge(&self, collection: &CollectionPath, id: &str, data: Value) -> StoreResult<()> {
        let key = collection.to_string();
        self.check_available(&key).await?;
        let mut collections = self.collections.lock().await;
        let docs = collections.entry(key).or_default();
        let merged = match docs.remove(id) {
            Some(existing) => merge_objects(existing, data),
            None => data,
        };
        docs.insert(id.to_string(), merged);
        Ok(())
    }

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>> {
        let key = collection.to_string();
        self.check_available(&key).await?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(&key)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_eq(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        let docs = self.list(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| doc.data.get(field).and_then(Value::as_str) == Some(value))
            .collect())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> StoreResult<()> {
        let key = collection.to_string();
        self.check_available(&key).await?;
        let mut collections = self.collections.lock().await;
        if let Some(docs) = collections.get_mut(&key) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn delete_batch(&self, refs: Vec<DocumentRef>) -> StoreResult<()> {
        if refs.len() > MAX_BATCH_WRITES {
            return Err(StoreError::BatchTooLarge {
                len: refs.len(),
                limit: MAX_BATCH_WRITES,
            });
        }

        // Single lock scope: the batch applies atomically or not at all.
        let unavailable = self.unavailable.lock().await;
        for r in &refs {
            if unavailable.contains(&r.collection.to_string()) {
                return Err(StoreError::Unavailable(r.collection.to_string()));
            }
        }
        let mut collections = self.collections.lock().await;
        for r in &refs {
            if let Some(docs) = collections.get_mut(&r.collection.to_string()) {
                docs.remove(&r.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = InMemoryStore::new();
        let users = CollectionPath::root("users");

        store
            .put(&users, "u1", json!({"role": "dosen"}))
            .await
            .unwrap();

        let doc = store.get(&users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"role": "dosen"}));
        assert!(store.get(&users, "u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_preserves_other_fields() {
        let store = InMemoryStore::new();
        let users = CollectionPath::root("users");

        store
            .put(&users, "u1", json!({"role": "dosen", "name": "A"}))
            .await
            .unwrap();
        store
            .merge(&users, "u1", json!({"name": "B"}))
            .await
            .unwrap();

        let doc = store.get(&users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"role": "dosen", "name": "B"}));
    }

    #[tokio::test]
    async fn test_query_eq_filters_on_string_field() {
        let store = InMemoryStore::new();
        let logs = CollectionPath::root("attendance_records");

        store.put(&logs, "a", json!({"uid": "u1"})).await.unwrap();
        store.put(&logs, "b", json!({"uid": "u2"})).await.unwrap();
        store.put(&logs, "c", json!({"uid": "u1"})).await.unwrap();
        store.put(&logs, "d", json!({"other": "u1"})).await.unwrap();

        let hits = store.query_eq(&logs, "uid", "u1").await.unwrap();
        let ids: Vec<_> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_list_of_unknown_collection_is_empty() {
        let store = InMemoryStore::new();
        let ghosts = CollectionPath::root("ghosts");
        assert!(store.list(&ghosts).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStore::new();
        let users = CollectionPath::root("users");

        store.put(&users, "u1", json!({})).await.unwrap();
        store.delete(&users, "u1").await.unwrap();
        store.delete(&users, "u1").await.unwrap();
        assert_eq!(store.count(&users).await, 0);
    }

    #[tokio::test]
    async fn test_delete_batch_rejects_oversize() {
        let store = InMemoryStore::new();
        let logs = CollectionPath::root("attendance_records");
        let refs: Vec<_> = (0..=MAX_BATCH_WRITES)
            .map(|i| DocumentRef::new(logs.clone(), format!("r{i}")))
            .collect();

        let err = store.delete_batch(refs).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { len: 501, limit: 500 }));
    }

    #[tokio::test]
    async fn test_unavailable_collection_fails_and_recovers() {
        let store = InMemoryStore::new();
        let logs = CollectionPath::root("staff_attendance");

        store.put(&logs, "r1", json!({"uid": "u1"})).await.unwrap();
        store.mark_unavailable(&logs).await;

        assert!(matches!(
            store.list(&logs).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store
                .delete_batch(vec![DocumentRef::new(logs.clone(), "r1")])
                .await,
            Err(StoreError::Unavailable(_))
        ));

        store.restore(&logs).await;
        assert_eq!(store.count(&logs).await, 1);
    }
}

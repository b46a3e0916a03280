//! Document-store port.
//!
//! The portal's records live in an external document database; services
//! only ever see this trait. Collections address either a top-level record
//! set (`users`) or a subcollection nested under a document
//! (`users/{uid}/enrollments`).

use async_trait::async_trait;
use serde_json::Value;

/// Hard per-batch write limit of the backing store. Batches above this are
/// rejected, never silently split.
pub const MAX_BATCH_WRITES: usize = 500;

/// Path to a collection, alternating collection and document segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Subcollection `name` under document `doc_id` of this collection.
    pub fn child(&self, doc_id: &str, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(doc_id.to_string());
        segments.push(name.into());
        Self { segments }
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A document fetched from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|source| StoreError::Malformed {
            id: self.id.clone(),
            source,
        })
    }
}

/// Fully-qualified reference to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub collection: CollectionPath,
    pub id: String,
}

impl DocumentRef {
    pub fn new(collection: CollectionPath, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Error types that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("batch of {len} writes exceeds the {limit}-write limit")]
    BatchTooLarge { len: usize, limit: usize },

    #[error("malformed document {id}: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait implemented by every document-store adapter.
///
/// Reads on absent documents or collections are not errors: `get` returns
/// `None`, `list` and `query_eq` return empty. Deletes are idempotent.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document by id.
    async fn get(&self, collection: &CollectionPath, id: &str) -> StoreResult<Option<Document>>;

    /// Create or replace a document.
    async fn put(&self, collection: &CollectionPath, id: &str, data: Value) -> StoreResult<()>;

    /// Shallow-merge `data` into the document, creating it if absent.
    async fn merge(&self, collection: &CollectionPath, id: &str, data: Value) -> StoreResult<()>;

    /// All documents of a collection. An unknown collection is empty.
    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>>;

    /// Documents whose string field `field` equals `value`.
    async fn query_eq(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>>;

    /// Delete one document. Deleting an absent document succeeds.
    async fn delete(&self, collection: &CollectionPath, id: &str) -> StoreResult<()>;

    /// Atomically delete up to [`MAX_BATCH_WRITES`] documents. Either the
    /// whole batch is applied or none of it.
    async fn delete_batch(&self, refs: Vec<DocumentRef>) -> StoreResult<()>;
}

/// Shallow object merge: top-level keys of `patch` overwrite `base`.
/// Non-object inputs are replaced wholesale.
pub(crate) fn merge_objects(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

pub mod memory;
pub mod sql;
pub use memory::InMemoryStore;
pub use sql::SqlStore;

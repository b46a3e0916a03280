use sqlx::{PgPool, Row, SqlitePool, query};

use async_trait::async_trait;
use serde_json::Value;

use super::{
    CollectionPath, Document, DocumentRef, DocumentStore, MAX_BATCH_WRITES, StoreError,
    StoreResult, merge_objects,
};

/// SQL-backed document store (PostgreSQL or SQLite).
///
/// Documents are rows of a single `documents` table keyed by
/// (collection path, id), with the payload stored as JSON text.
#[derive(Clone)]
pub enum SqlStore {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlStore::Postgres(_) => f.write_str("SqlStore::Postgres"),
            SqlStore::Sqlite(_) => f.write_str("SqlStore::Sqlite"),
        }
    }
}

impl SqlStore {
    /// Connect and initialize the schema.
    pub async fn new(dsn: &str) -> StoreResult<Self> {
        log::info!("Connecting to document database with DSN: {dsn}");

        let store = if dsn.starts_with("sqlite:") {
            // Add mode=rwc to create the database file if it doesn't exist
            let dsn_with_create = if dsn.contains('?') {
                if dsn.contains("mode=") {
                    dsn.to_string()
                } else {
                    format!("{dsn}&mode=rwc")
                }
            } else {
                format!("{dsn}?mode=rwc")
            };

            let pool = SqlitePool::connect(&dsn_with_create).await.map_err(|e| {
                log::error!("Failed to connect to SQLite database with DSN '{dsn_with_create}': {e}");
                e
            })?;
            SqlStore::Sqlite(pool)
        } else {
            let pool = PgPool::connect(dsn).await.map_err(|e| {
                log::error!("Failed to connect to PostgreSQL database with DSN '{dsn}': {e}");
                e
            })?;
            SqlStore::Postgres(pool)
        };

        store.init().await?;
        log::info!("Document store schema initialized");
        Ok(store)
    }

    /// Create the documents table if it does not exist.
    async fn init(&self) -> Result<(), sqlx::Error> {
        let create_documents = r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        )"#;
        match self {
            SqlStore::Sqlite(pool) => {
                query(create_documents).execute(pool).await?;
            }
            SqlStore::Postgres(pool) => {
                query(create_documents).execute(pool).await?;
            }
        }
        Ok(())
    }

    fn decode_row(id: String, data: String) -> StoreResult<Document> {
        let data: Value =
            serde_json::from_str(&data).map_err(|source| StoreError::Malformed {
                id: id.clone(),
                source,
            })?;
        Ok(Document { id, data })
    }
}

#[async_trait]
impl DocumentStore for SqlStore {
    async fn get(&self, collection: &CollectionPath, id: &str) -> StoreResult<Option<Document>> {
        let key = collection.to_string();
        let row: Option<String> = match self {
            SqlStore::Sqlite(pool) => {
                query("SELECT data FROM documents WHERE collection = ? AND id = ?")
                    .bind(&key)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
                    .map(|row| row.get("data"))
            }
            SqlStore::Postgres(pool) => {
                query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                    .bind(&key)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
                    .map(|row| row.get("data"))
            }
        };
        match row {
            Some(data) => Self::decode_row(id.to_string(), data).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, collection: &CollectionPath, id: &str, data: Value) -> StoreResult<()> {
        let key = collection.to_string();
        let payload = data.to_string();
        let stmt_sqlite = r#"
        INSERT INTO documents (collection, id, data)
        VALUES (?, ?, ?)
        ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data
        "#;
        let stmt_pg = r#"
        INSERT INTO documents (collection, id, data)
        VALUES ($1, $2, $3)
        ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data
        "#;
        match self {
            SqlStore::Sqlite(pool) => {
                query(stmt_sqlite)
                    .bind(&key)
                    .bind(id)
                    .bind(&payload)
                    .execute(pool)
                    .await?;
            }
            SqlStore::Postgres(pool) => {
                query(stmt_pg)
                    .bind(&key)
                    .bind(id)
                    .bind(&payload)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn merge(&self, collection: &CollectionPath, id: &str, data: Value) -> StoreResult<()> {
        let existing = self.get(collection, id).await?;
        let merged = match existing {
            Some(doc) => merge_objects(doc.data, data),
            None => data,
        };
        self.put(collection, id, merged).await
    }

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>> {
        let key = collection.to_string();
        let rows: Vec<(String, String)> = match self {
            SqlStore::Sqlite(pool) => {
                query("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")
                    .bind(&key)
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .map(|row| (row.get("id"), row.get("data")))
                    .collect()
            }
            SqlStore::Postgres(pool) => {
                query("SELECT id, data FROM documents WHERE collection = $1 ORDER BY id")
                    .bind(&key)
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .map(|row| (row.get("id"), row.get("data")))
                    .collect()
            }
        };
        rows.into_iter()
            .map(|(id, data)| Self::decode_row(id, data))
            .collect()
    }

    async fn query_eq(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        let key = collection.to_string();
        let rows: Vec<(String, String)> = match self {
            SqlStore::Sqlite(pool) => {
                let path = format!("$.{field}");
                query(
                    r#"
                    SELECT id, data FROM documents
                    WHERE collection = ? AND json_extract(data, ?) = ?
                    ORDER BY id
                    "#,
                )
                .bind(&key)
                .bind(&path)
                .bind(value)
                .fetch_all(pool)
                .await?
                .into_iter()
                .map(|row| (row.get("id"), row.get("data")))
                .collect()
            }
            SqlStore::Postgres(pool) => {
                query(
                    r#"
                    SELECT id, data FROM documents
                    WHERE collection = $1 AND data::jsonb ->> $2 = $3
                    ORDER BY id
                    "#,
                )
                .bind(&key)
                .bind(field)
                .bind(value)
                .fetch_all(pool)
                .await?
                .into_iter()
                .map(|row| (row.get("id"), row.get("data")))
                .collect()
            }
        };
        rows.into_iter()
            .map(|(id, data)| Self::decode_row(id, data))
            .collect()
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> StoreResult<()> {
        let key = collection.to_string();
        match self {
            SqlStore::Sqlite(pool) => {
                query("DELETE FROM documents WHERE collection = ? AND id = ?")
                    .bind(&key)
                    .bind(id)
                    .execute(pool)
                    .await?;
            }
            SqlStore::Postgres(pool) => {
                query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                    .bind(&key)
                    .bind(id)
                    .execute(pool)
                    .await?;
            }
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
        match self {
            SqlStore::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                for r in &refs {
                    query("DELETE FROM documents WHERE collection = ? AND id = ?")
                        .bind(r.collection.to_string())
                        .bind(&r.id)
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
            }
            SqlStore::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                for r in &refs {
                    query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(r.collection.to_string())
                        .bind(&r.id)
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
            }
        }
        Ok(())
    }
}

//! SQLite vector store backend.
//!
//! Provides [`SqliteVectorStore`] which implements [`VectorStore`] using
//! [sqlx](https://docs.rs/sqlx). Embeddings are stored as big-endian `f32`
//! blobs next to an explicit dimension column, and search is a full scan of
//! the `chunks` table joined to `documents`.
//!
//! Writes are serialized through a single mutex and each upsert runs in one
//! transaction; the database uses WAL journaling so concurrent readers see a
//! consistent snapshot. A stored embedding that fails to decode fails the
//! whole query rather than being skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_core::sqlite::SqliteVectorStore;
//!
//! let store = SqliteVectorStore::open("rag.db").await?;
//! store.upsert_document(&document, &chunks).await?;
//! let results = store.search_similar(&query_embedding, 5, 0.0).await?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::document::{Chunk, Document, SearchResult};
use crate::encoding::{decode_embedding, encode_embedding};
use crate::error::{RagError, Result};
use crate::similarity::cosine_similarity;
use crate::vectorstore::{
    VectorStore, check_store_dimension, rank_results, validate_query, validate_upsert,
};

const BACKEND: &str = "sqlite";

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS documents (\
        id TEXT PRIMARY KEY, \
        source TEXT NOT NULL, \
        title TEXT, \
        created_at TEXT NOT NULL, \
        updated_at TEXT NOT NULL\
    )",
    "CREATE TABLE IF NOT EXISTS chunks (\
        id TEXT PRIMARY KEY, \
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE, \
        chunk_index INTEGER NOT NULL, \
        text TEXT NOT NULL, \
        embedding BLOB NOT NULL, \
        embedding_dimension INTEGER NOT NULL, \
        metadata TEXT NOT NULL DEFAULT '{}', \
        created_at TEXT NOT NULL, \
        UNIQUE (document_id, chunk_index)\
    )",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)",
];

const CHUNK_COLUMNS: &str =
    "id, document_id, chunk_index, text, embedding, embedding_dimension, metadata";

/// A [`VectorStore`] persisted in a SQLite database.
///
/// Construct one per database and pass it to the components that need it;
/// several stores may coexist in one process.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteVectorStore {
    /// Open (creating if missing) a database file and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool =
            SqlitePoolOptions::new().max_connections(5).connect_with(options).await.map_err(map_err)?;
        Self::from_pool(pool).await
    }

    /// Create a private in-memory database.
    ///
    /// The pool holds exactly one connection for its whole lifetime, since
    /// each SQLite in-memory connection is a separate database.
    pub async fn in_memory() -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(map_err)?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(map_err)?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and apply the schema.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(map_err)?;
        }
        debug!("sqlite vector store schema ready");
        Ok(Self { pool, write_lock: Mutex::new(()) })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_err(e: sqlx::Error) -> RagError {
    RagError::store(BACKEND, e.to_string())
}

fn to_db_index(index: usize) -> Result<i64> {
    i64::try_from(index).map_err(|_| RagError::store(BACKEND, format!("index {index} overflows")))
}

fn from_db_count(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| RagError::store(BACKEND, format!("invalid {field} stored: {value}")))
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id").map_err(map_err)?,
        source: row.try_get("source").map_err(map_err)?,
        title: row.try_get("title").map_err(map_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(map_err)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(map_err)?,
    })
}

/// Columns shared by chunk listing and search rows.
struct ChunkRow {
    id: String,
    document_id: String,
    index: usize,
    text: String,
    embedding: Vec<f32>,
    metadata: HashMap<String, String>,
}

fn chunk_from_row(row: &SqliteRow) -> Result<ChunkRow> {
    let id: String = row.try_get("id").map_err(map_err)?;
    let dimension =
        from_db_count(row.try_get("embedding_dimension").map_err(map_err)?, "embedding_dimension")?;
    let bytes: Vec<u8> = row.try_get("embedding").map_err(map_err)?;
    let embedding = decode_embedding(&bytes, dimension)
        .map_err(|e| RagError::store(BACKEND, format!("chunk '{id}': {e}")))?;
    let metadata_json: String = row.try_get("metadata").map_err(map_err)?;
    let metadata = serde_json::from_str(&metadata_json).map_err(|e| {
        RagError::store(BACKEND, format!("chunk '{id}' has invalid metadata: {e}"))
    })?;

    Ok(ChunkRow {
        id,
        document_id: row.try_get("document_id").map_err(map_err)?,
        index: from_db_count(row.try_get("chunk_index").map_err(map_err)?, "chunk_index")?,
        text: row.try_get("text").map_err(map_err)?,
        embedding,
        metadata,
    })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert_document(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
        let dimension = validate_upsert(BACKEND, document, chunks)?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let stored: Option<i64> = sqlx::query_scalar(
            "SELECT embedding_dimension FROM chunks WHERE document_id != ?1 LIMIT 1",
        )
        .bind(&document.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_err)?;
        let stored = stored.map(|d| from_db_count(d, "embedding_dimension")).transpose()?;
        check_store_dimension(BACKEND, stored, dimension)?;

        sqlx::query(
            "INSERT INTO documents (id, source, title, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (id) DO UPDATE SET \
                source = excluded.source, \
                title = excluded.title, \
                updated_at = excluded.updated_at",
        )
        .bind(&document.id)
        .bind(&document.source)
        .bind(document.title.as_deref())
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
            .bind(&document.id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        let now = Utc::now();
        for chunk in chunks {
            let metadata = serde_json::to_string(&chunk.metadata).map_err(|e| {
                RagError::store(BACKEND, format!("failed to serialize metadata: {e}"))
            })?;

            sqlx::query(
                "INSERT INTO chunks \
                    (id, document_id, chunk_index, text, embedding, embedding_dimension, metadata, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(to_db_index(chunk.index)?)
            .bind(&chunk.text)
            .bind(encode_embedding(&chunk.embedding))
            .bind(to_db_index(chunk.embedding.len())?)
            .bind(metadata)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;

        debug!(document.id = %document.id, count = chunks.len(), "upserted document to sqlite");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, source, title, created_at, updated_at FROM documents WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, source, title, created_at, updated_at FROM documents ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        rows.iter().map(document_from_row).collect()
    }

    async fn count_documents(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        from_db_count(count, "document count")
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        let deleted = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?
            .rows_affected();

        tx.commit().await.map_err(map_err)?;

        debug!(document.id = id, existed = deleted > 0, "deleted document from sqlite");
        Ok(deleted > 0)
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let sql =
            format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE document_id = ?1 ORDER BY chunk_index");
        let rows =
            sqlx::query(&sql).bind(document_id).fetch_all(&self.pool).await.map_err(map_err)?;

        rows.iter()
            .map(|row| {
                let row = chunk_from_row(row)?;
                Ok(Chunk {
                    id: row.id,
                    document_id: row.document_id,
                    index: row.index,
                    text: row.text,
                    embedding: row.embedding,
                    metadata: row.metadata,
                })
            })
            .collect()
    }

    async fn search_similar(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        validate_query(query)?;

        let sql = "SELECT c.id, c.document_id, c.chunk_index, c.text, c.embedding, \
                          c.embedding_dimension, c.metadata, d.source, d.title \
                   FROM chunks c JOIN documents d ON d.id = c.document_id";
        let mut rows = sqlx::query(sql).fetch(&self.pool);

        let mut scored = Vec::new();
        while let Some(row) = rows.try_next().await.map_err(map_err)? {
            let source: String = row.try_get("source").map_err(map_err)?;
            let title: Option<String> = row.try_get("title").map_err(map_err)?;
            let chunk = chunk_from_row(&row)?;

            if chunk.embedding.len() != query.len() {
                return Err(RagError::ValidationError(format!(
                    "query has dimension {}, stored vectors have {}",
                    query.len(),
                    chunk.embedding.len()
                )));
            }
            let similarity = cosine_similarity(query, &chunk.embedding)?;
            if similarity < min_similarity {
                continue;
            }

            scored.push(SearchResult {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                chunk_index: chunk.index,
                text: chunk.text,
                source,
                title,
                similarity,
                metadata: chunk.metadata,
            });
        }

        debug!(candidates = scored.len(), limit, "sqlite similarity scan complete");
        Ok(rank_results(scored, limit, min_similarity))
    }
}

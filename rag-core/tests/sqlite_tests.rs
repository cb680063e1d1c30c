//! Tests for the SQLite vector store.

#![cfg(feature = "sqlite")]

use std::collections::HashMap;
use std::sync::Arc;

use rag_core::document::{Chunk, Document};
use rag_core::error::RagError;
use rag_core::sqlite::SqliteVectorStore;
use rag_core::vectorstore::VectorStore;

fn chunks_for(document_id: &str, embeddings: &[&[f32]]) -> Vec<Chunk> {
    embeddings
        .iter()
        .enumerate()
        .map(|(index, embedding)| Chunk {
            id: Chunk::make_id(document_id, index),
            document_id: document_id.to_string(),
            index,
            text: format!("{document_id} chunk {index}"),
            embedding: embedding.to_vec(),
            metadata: HashMap::from([("lang".to_string(), "en".to_string())]),
        })
        .collect()
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rag.db");

    {
        let store = SqliteVectorStore::open(&path).await.unwrap();
        let doc = Document::new("guide", "guide.md", Some("Guide".to_string()));
        let chunks = chunks_for("guide", &[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]]);
        store.upsert_document(&doc, &chunks).await.unwrap();
        store.pool().close().await;
    }

    let store = SqliteVectorStore::open(&path).await.unwrap();
    assert_eq!(store.count_documents().await.unwrap(), 1);

    let doc = store.get_document("guide").await.unwrap().unwrap();
    assert_eq!(doc.source, "guide.md");
    assert_eq!(doc.title.as_deref(), Some("Guide"));

    let chunks = store.get_chunks("guide").await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].embedding, vec![0.0, 1.0, 0.0]);
    assert_eq!(chunks[1].metadata.get("lang").map(String::as_str), Some("en"));

    let results = store.search_similar(&[0.0, 1.0, 0.0], 1, 0.0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_index, 1);
    assert_eq!(results[0].title.as_deref(), Some("Guide"));
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn search_orders_filters_and_limits() {
    let store = SqliteVectorStore::in_memory().await.unwrap();
    let doc = Document::new("doc", "doc.md", None);
    let chunks = chunks_for("doc", &[&[1.0, 0.0], &[0.8, 0.6], &[0.0, 1.0], &[-1.0, 0.0]]);
    store.upsert_document(&doc, &chunks).await.unwrap();

    let results = store.search_similar(&[1.0, 0.0], 10, 0.0).await.unwrap();
    let indices: Vec<usize> = results.iter().map(|r| r.chunk_index).collect();
    assert_eq!(indices, [0, 1, 2]);

    let results = store.search_similar(&[1.0, 0.0], 2, -1.0).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].similarity >= results[1].similarity);
}

#[tokio::test]
async fn failed_upsert_rolls_back() {
    let store = SqliteVectorStore::in_memory().await.unwrap();
    let original = Document::new("doc", "v1.md", None);
    store
        .upsert_document(&original, &chunks_for("doc", &[&[1.0, 0.0], &[0.0, 1.0]]))
        .await
        .unwrap();

    // Duplicate chunk ids violate the primary key after the old chunks were deleted.
    let mut chunks = chunks_for("doc", &[&[1.0, 1.0], &[1.0, -1.0], &[0.5, 0.5]]);
    chunks[2].id = chunks[1].id.clone();
    let replacement = Document::new("doc", "v2.md", None);
    let err = store.upsert_document(&replacement, &chunks).await.unwrap_err();
    assert!(matches!(err, RagError::StoreError { .. }));

    let doc = store.get_document("doc").await.unwrap().unwrap();
    assert_eq!(doc.source, "v1.md");
    let stored = store.get_chunks("doc").await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].embedding, vec![1.0, 0.0]);
}

#[tokio::test]
async fn dimension_mismatch_on_write_is_a_store_error() {
    let store = SqliteVectorStore::in_memory().await.unwrap();
    store
        .upsert_document(&Document::new("a", "a.md", None), &chunks_for("a", &[&[1.0, 0.0, 0.0]]))
        .await
        .unwrap();

    let err = store
        .upsert_document(&Document::new("b", "b.md", None), &chunks_for("b", &[&[1.0, 0.0]]))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::StoreError { .. }));
    assert!(store.get_document("b").await.unwrap().is_none());

    let err = store.search_similar(&[1.0, 0.0], 5, 0.0).await.unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));
}

#[tokio::test]
async fn undecodable_embedding_fails_the_query() {
    let store = SqliteVectorStore::in_memory().await.unwrap();
    store
        .upsert_document(&Document::new("doc", "doc.md", None), &chunks_for("doc", &[&[1.0, 0.0]]))
        .await
        .unwrap();

    sqlx::query("UPDATE chunks SET embedding = x'010203' WHERE document_id = 'doc'")
        .execute(store.pool())
        .await
        .unwrap();

    let err = store.search_similar(&[1.0, 0.0], 5, 0.0).await.unwrap_err();
    assert!(matches!(err, RagError::StoreError { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn corrupted_dimension_column_is_a_store_error() {
    let store = SqliteVectorStore::in_memory().await.unwrap();
    store
        .upsert_document(&Document::new("doc", "doc.md", None), &chunks_for("doc", &[&[1.0, 0.0]]))
        .await
        .unwrap();

    for dimension in [i64::MAX, -1] {
        sqlx::query("UPDATE chunks SET embedding_dimension = ?1 WHERE document_id = 'doc'")
            .bind(dimension)
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.search_similar(&[1.0, 0.0], 5, 0.0).await.unwrap_err();
        assert!(matches!(err, RagError::StoreError { .. }), "dimension {dimension}: {err:?}");
        let err = store.get_chunks("doc").await.unwrap_err();
        assert!(matches!(err, RagError::StoreError { .. }), "dimension {dimension}: {err:?}");
    }
}

#[tokio::test]
async fn delete_cascades_to_chunks() {
    let store = SqliteVectorStore::in_memory().await.unwrap();
    for id in ["a", "b"] {
        store
            .upsert_document(&Document::new(id, "test", None), &chunks_for(id, &[&[1.0, 0.0]]))
            .await
            .unwrap();
    }

    assert!(store.delete_document("a").await.unwrap());
    assert!(!store.delete_document("a").await.unwrap());
    assert!(store.get_chunks("a").await.unwrap().is_empty());

    let orphans: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = 'a'")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(orphans, 0);

    let results = store.search_similar(&[1.0, 0.0], 10, -1.0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, "b");
}

#[tokio::test]
async fn list_documents_is_ordered_by_id() {
    let store = SqliteVectorStore::in_memory().await.unwrap();
    for id in ["zeta", "alpha", "mu"] {
        store
            .upsert_document(&Document::new(id, "test", None), &chunks_for(id, &[&[1.0]]))
            .await
            .unwrap();
    }
    let ids: Vec<String> = store.list_documents().await.unwrap().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, ["alpha", "mu", "zeta"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_old_or_new_chunk_set() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteVectorStore::open(dir.path().join("rag.db")).await.unwrap());
    let doc = Document::new("doc", "doc.md", None);
    let old = chunks_for("doc", &[&[1.0, 0.0], &[1.0, 0.1], &[1.0, 0.2]]);
    let new = chunks_for("doc", &[&[0.0, 1.0], &[0.1, 1.0], &[0.2, 1.0], &[0.3, 1.0], &[0.4, 1.0]]);
    store.upsert_document(&doc, &old).await.unwrap();

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 0..50 {
                let chunks = if i % 2 == 0 { &new } else { &old };
                store.upsert_document(&doc, chunks).await.unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let chunks = store.get_chunks("doc").await.unwrap();
                    let leaning_x = chunks.iter().filter(|c| c.embedding[0] >= 1.0).count();
                    assert!(
                        (chunks.len() == 3 && leaning_x == 3) || (chunks.len() == 5 && leaning_x == 0),
                        "mixed chunk set of {} chunks",
                        chunks.len()
                    );
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

//! Retrieval orchestrator: question in, ranked and cited passages out.
//!
//! The orchestrator embeds the question once, issues a single scoped query
//! against a [`PassageStore`], and resolves every hit back to page-local
//! citations using the owning document's offset table. It never inspects or
//! rewrites the ranking it receives.
//!
//! # Failure model
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | `top_k == 0` | empty result, no collaborator called |
//! | embedder fails | [`CoreError::EmbeddingUnavailable`] |
//! | store or repository fails | [`CoreError::Store`] with the original error |
//! | hit references unknown document | [`CoreError::DocumentNotFound`] |
//! | no passages match | empty result |

use std::collections::HashMap;

use serde::Serialize;

use crate::citation::cite;
use crate::embedding::{embed_one, EmbeddingProvider};
use crate::error::{CoreError, Result};
use crate::models::{Citation, Passage};
use crate::offsets::OffsetTable;
use crate::store::{DocumentRepository, PassageStore};

/// Inputs for a single retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalRequest<'a> {
    pub question: &'a str,
    /// Restrict the search to these documents. Empty means every document.
    pub candidate_document_ids: &'a [String],
    pub top_k: usize,
}

/// A ranked passage with its similarity score and resolved citations.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub passage: Passage,
    pub score: f32,
    pub citations: Vec<Citation>,
}

/// Run retrieval for `req`, preserving the store's rank order.
pub async fn retrieve<E, S, D>(
    embedder: &E,
    store: &S,
    documents: &D,
    req: &RetrievalRequest<'_>,
) -> Result<Vec<RetrievedPassage>>
where
    E: EmbeddingProvider + ?Sized,
    S: PassageStore + ?Sized,
    D: DocumentRepository + ?Sized,
{
    if req.top_k == 0 {
        return Ok(Vec::new());
    }

    let query_vec = embed_one(embedder, req.question)
        .await
        .map_err(CoreError::EmbeddingUnavailable)?;

    let hits = store
        .query(&query_vec, req.candidate_document_ids, req.top_k)
        .await
        .map_err(CoreError::Store)?;

    let mut tables: HashMap<String, OffsetTable> = HashMap::new();
    let mut results = Vec::with_capacity(hits.len());

    for hit in hits {
        let doc_id = hit.passage.document_id.clone();
        if !tables.contains_key(&doc_id) {
            let table = documents
                .offset_table(&doc_id)
                .await
                .map_err(CoreError::Store)?
                .ok_or_else(|| CoreError::DocumentNotFound(doc_id.clone()))?;
            tables.insert(doc_id.clone(), table);
        }
        let table = &tables[&doc_id];
        let citations = cite(&hit.passage, table)?;
        results.push(RetrievedPassage {
            passage: hit.passage,
            score: hit.score,
            citations,
        });
    }

    tracing::debug!(
        question_chars = req.question.chars().count(),
        candidates = req.candidate_document_ids.len(),
        top_k = req.top_k,
        hits = results.len(),
        "retrieval complete"
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::index_document;
    use crate::models::Document;
    use crate::segment::ChunkingParams;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds by counting a few marker words, so similarity is predictable.
    struct Keywords {
        calls: AtomicUsize,
    }

    impl Keywords {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for Keywords {
        fn model_name(&self) -> &str {
            "keywords"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("liability").count() as f32 + 0.01,
                        t.matches("termination").count() as f32 + 0.01,
                        t.matches("payment").count() as f32 + 0.01,
                    ]
                })
                .collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl EmbeddingProvider for Broken {
        fn model_name(&self) -> &str {
            "broken"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("connection refused")
        }
    }

    async fn seeded(embedder: &Keywords) -> InMemoryStore {
        let store = InMemoryStore::new();
        let doc = Document::from_pages(
            "msa",
            "msa.pdf",
            "h1",
            1,
            &[
                "Payment is due within 30 days. Payment terms are net 30. ",
                "Liability is capped at fees paid. Liability excludes fraud. ",
                "Termination requires 60 days notice. Termination for cause. ",
            ],
        )
        .unwrap();
        let params = ChunkingParams::new(60, 10).unwrap();
        index_document(embedder, &store, &store, &doc, &params, 8)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_retrieve_ranks_and_cites() {
        let embedder = Keywords::new();
        let store = seeded(&embedder).await;
        let req = RetrievalRequest {
            question: "What is the liability cap?",
            candidate_document_ids: &[],
            top_k: 2,
        };
        let results = retrieve(&embedder, &store, &store, &req).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert!(results[0].passage.text.contains("Liability"));
        assert!(!results[0].citations.is_empty());
        for r in &results {
            for c in &r.citations {
                assert_eq!(c.passage_id, r.passage.id);
                assert!(c.char_start < c.char_end);
            }
        }
    }

    #[tokio::test]
    async fn test_top_k_zero_calls_nothing() {
        let embedder = Keywords::new();
        let store = InMemoryStore::new();
        let req = RetrievalRequest {
            question: "anything",
            candidate_document_ids: &[],
            top_k: 0,
        };
        assert!(retrieve(&embedder, &store, &store, &req).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_candidate_scope_is_empty() {
        let embedder = Keywords::new();
        let store = seeded(&embedder).await;
        let scope = vec!["other".to_string()];
        let req = RetrievalRequest {
            question: "payment",
            candidate_document_ids: &scope,
            top_k: 5,
        };
        assert!(retrieve(&embedder, &store, &store, &req).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedder_failure_is_embedding_unavailable() {
        let store = InMemoryStore::new();
        let req = RetrievalRequest {
            question: "payment",
            candidate_document_ids: &[],
            top_k: 5,
        };
        let err = retrieve(&Broken, &store, &store, &req).await.unwrap_err();
        assert!(matches!(err, CoreError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_orphaned_passage_is_document_not_found() {
        let embedder = Keywords::new();
        let store = InMemoryStore::new();
        let orphan = Passage {
            id: "ghost_page1_chunk0".to_string(),
            document_id: "ghost".to_string(),
            page: 1,
            ordinal: 0,
            index: 0,
            char_start: 0,
            char_end: 5,
            text: "ghost".to_string(),
            hash: String::new(),
        };
        store.persist(&orphan, &[1.0, 1.0, 1.0]).await.unwrap();
        let req = RetrievalRequest {
            question: "payment",
            candidate_document_ids: &[],
            top_k: 5,
        };
        let err = retrieve(&embedder, &store, &store, &req).await.unwrap_err();
        assert!(matches!(err, CoreError::DocumentNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_preserves_store_order() {
        let embedder = Keywords::new();
        let store = seeded(&embedder).await;
        let query_vec = embed_one(&embedder, "termination").await.unwrap();
        let direct = store.query(&query_vec, &[], 10).await.unwrap();

        let req = RetrievalRequest {
            question: "termination",
            candidate_document_ids: &[],
            top_k: 10,
        };
        let results = retrieve(&embedder, &store, &store, &req).await.unwrap();
        let a: Vec<&str> = direct.iter().map(|h| h.passage.id.as_str()).collect();
        let b: Vec<&str> = results.iter().map(|r| r.passage.id.as_str()).collect();
        assert_eq!(a, b);
    }
}

//! In-memory [`PassageStore`] and [`DocumentRepository`] for tests and embedding.
//!
//! Uses `BTreeMap`s behind `std::sync::RwLock`. Vector search is brute-force
//! cosine similarity over every stored vector in scope. Guards are never held
//! across an `.await`.

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Document, Passage};

use super::{rank, DocumentRepository, DocumentSummary, PassageStore, ScoredPassage};

struct StoredPassage {
    passage: Passage,
    vector: Vec<f32>,
}

/// In-memory store implementing both storage traits.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<BTreeMap<String, Document>>,
    passages: RwLock<BTreeMap<String, StoredPassage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored passages.
    pub fn passage_count(&self) -> Result<usize> {
        Ok(read(&self.passages)?.len())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl PassageStore for InMemoryStore {
    async fn persist(&self, passage: &Passage, embedding: &[f32]) -> Result<()> {
        write(&self.passages)?.insert(
            passage.id.clone(),
            StoredPassage {
                passage: passage.clone(),
                vector: embedding.to_vec(),
            },
        );
        Ok(())
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        candidate_document_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>> {
        let scope: HashSet<&str> = candidate_document_ids.iter().map(String::as_str).collect();
        let stored = read(&self.passages)?;
        let candidates = stored
            .values()
            .filter(|sp| scope.is_empty() || scope.contains(sp.passage.document_id.as_str()))
            .map(|sp| ScoredPassage {
                passage: sp.passage.clone(),
                score: cosine_similarity(query_embedding, &sp.vector),
            })
            .collect();
        Ok(rank(candidates, top_k))
    }

    async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let mut stored = write(&self.passages)?;
        let before = stored.len();
        stored.retain(|_, sp| sp.passage.document_id != document_id);
        Ok(before - stored.len())
    }

    async fn passages_for(&self, document_id: &str) -> Result<Vec<Passage>> {
        let stored = read(&self.passages)?;
        let mut passages: Vec<Passage> = stored
            .values()
            .filter(|sp| sp.passage.document_id == document_id)
            .map(|sp| sp.passage.clone())
            .collect();
        passages.sort_by_key(|p| p.index);
        Ok(passages)
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn put_document(&self, document: &Document) -> Result<()> {
        write(&self.docs)?.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(read(&self.docs)?.get(id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let docs = read(&self.docs)?;
        let mut summaries: Vec<DocumentSummary> = docs.values().map(DocumentSummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }
}

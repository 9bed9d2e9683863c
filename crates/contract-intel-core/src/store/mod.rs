//! Storage abstraction for Contract Intelligence.
//!
//! Two collaborator traits back the pipeline:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`PassageStore`] | Passages + embedding vectors, scoped similarity search |
//! | [`DocumentRepository`] | Documents and their page-offset tables, by id |
//!
//! Both are keyed by identifier and overwrite on re-insert, so re-ingesting
//! a document is replace-by-identifier rather than in-place mutation.
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Errors are `anyhow::Error` and reach callers unmodified.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Document, Passage};
use crate::offsets::OffsetTable;

/// A passage returned from similarity search with its cosine score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Lightweight listing entry for a stored document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub page_count: usize,
    pub total_chars: usize,
    pub created_at: i64,
}

/// Persists passages with their vectors and answers scoped similarity queries.
#[async_trait]
pub trait PassageStore: Send + Sync {
    /// Store a passage and its vector. Re-persisting the same passage id
    /// overwrites the previous entry.
    async fn persist(&self, passage: &Passage, embedding: &[f32]) -> Result<()>;

    /// Up to `top_k` passages by descending similarity to `query_embedding`,
    /// restricted to `candidate_document_ids` (empty = all documents).
    /// Equal scores are ordered by passage id ascending.
    async fn query(
        &self,
        query_embedding: &[f32],
        candidate_document_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>>;

    /// Delete every passage belonging to a document. Returns the count removed.
    async fn remove_document(&self, document_id: &str) -> Result<usize>;

    /// Passages of a document in segmentation order.
    async fn passages_for(&self, document_id: &str) -> Result<Vec<Passage>>;
}

/// Lookup of documents and their offset tables.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert or replace a document by id.
    async fn put_document(&self, document: &Document) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// The document's page-offset table, without loading its text.
    async fn offset_table(&self, id: &str) -> Result<Option<OffsetTable>> {
        match self.get_document(id).await? {
            Some(doc) => Ok(Some(doc.offset_table()?)),
            None => Ok(None),
        }
    }

    /// All documents, newest first.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
            page_count: doc.pages.len(),
            total_chars: doc.total_chars(),
            created_at: doc.created_at,
        }
    }
}

/// Order candidates by descending score, then passage id ascending, and keep `top_k`.
///
/// Shared by every backend so tie-breaking is identical across stores.
pub fn rank(mut candidates: Vec<ScoredPassage>, top_k: usize) -> Vec<ScoredPassage> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.passage.id.cmp(&b.passage.id))
    });
    candidates.truncate(top_k);
    candidates
}

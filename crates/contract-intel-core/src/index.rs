//! Indexing pipeline: document in, embedded passages stored.
//!
//! Every passage is embedded before the store is touched, so a failed
//! embedding call leaves the previous index of the document intact. The
//! document is then written to the [`DocumentRepository`] ahead of its
//! passages, so a concurrent retrieval can never observe a passage whose
//! offset table is missing.

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::{CoreError, Result};
use crate::models::{Document, Passage};
use crate::segment::{segment_with, ChunkingParams};
use crate::store::{DocumentRepository, PassageStore};

/// Summary of one indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub document_id: String,
    pub pages: usize,
    pub total_chars: usize,
    pub passages: usize,
    /// Passages removed before re-indexing (0 for a fresh document).
    pub replaced: usize,
}

/// Segment, embed and store `document`.
///
/// Any passages previously stored for the same document id are removed
/// once all new embeddings exist, so re-indexing with different chunking
/// parameters never leaves stale windows behind and an embedding failure
/// changes nothing. A document with no text is rejected with
/// [`CoreError::MalformedInput`].
pub async fn index_document<E, S, D>(
    embedder: &E,
    store: &S,
    documents: &D,
    document: &Document,
    params: &ChunkingParams,
    batch_size: usize,
) -> Result<IndexReport>
where
    E: EmbeddingProvider + ?Sized,
    S: PassageStore + ?Sized,
    D: DocumentRepository + ?Sized,
{
    if document.total_chars() == 0 {
        return Err(CoreError::MalformedInput(format!(
            "document {} ({}) contains no extractable text",
            document.id, document.filename
        )));
    }

    let table = document.offset_table()?;
    let passages = segment_with(&document.id, &document.text, &table, params)?;

    let mut embedded: Vec<(&Passage, Vec<f32>)> = Vec::with_capacity(passages.len());
    for batch in passages.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .await
            .map_err(CoreError::EmbeddingUnavailable)?;
        if vectors.len() != batch.len() {
            return Err(CoreError::EmbeddingUnavailable(anyhow::anyhow!(
                "embedder returned {} vectors for {} passages",
                vectors.len(),
                batch.len()
            )));
        }
        embedded.extend(batch.iter().zip(vectors));
    }

    documents
        .put_document(document)
        .await
        .map_err(CoreError::Store)?;
    let replaced = store
        .remove_document(&document.id)
        .await
        .map_err(CoreError::Store)?;

    for (passage, vector) in &embedded {
        store
            .persist(passage, vector)
            .await
            .map_err(CoreError::Store)?;
    }

    tracing::debug!(
        document_id = %document.id,
        passages = passages.len(),
        replaced,
        model = embedder.model_name(),
        "indexed document"
    );

    Ok(IndexReport {
        document_id: document.id.clone(),
        pages: document.pages.len(),
        total_chars: document.total_chars(),
        passages: passages.len(),
        replaced,
    })
}

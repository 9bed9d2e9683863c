//! Core data models used throughout Contract Intelligence.
//!
//! These types represent the documents, pages, passages and citations that
//! flow through the indexing and retrieval pipeline. All character offsets
//! count Unicode scalar values, not bytes.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::offsets::{self, OffsetTable, PageSpan};

/// One page of an ingested document, positioned in global offset space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    /// Raw extracted text of the page.
    pub text: String,
    /// Global character start within the document text.
    pub char_start: usize,
    /// Global character end (exclusive).
    pub char_end: usize,
}

/// An ingested document. Immutable once created; re-ingestion produces a
/// new document with a new identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    /// SHA-256 of the source bytes, hex encoded.
    pub content_hash: String,
    /// Unix timestamp (seconds) of ingestion.
    pub created_at: i64,
    /// Concatenated text of every page, in order.
    pub text: String,
    pub pages: Vec<Page>,
}

impl Document {
    /// Build a document from raw page texts in reading order.
    ///
    /// Fails with [`CoreError::MalformedInput`](crate::error::CoreError::MalformedInput)
    /// when `pages` is empty.
    pub fn from_pages<S: AsRef<str>>(
        id: impl Into<String>,
        filename: impl Into<String>,
        content_hash: impl Into<String>,
        created_at: i64,
        pages: &[S],
    ) -> Result<Self> {
        let (text, table) = offsets::build(pages)?;
        let pages = table
            .spans()
            .iter()
            .zip(pages)
            .map(|(span, raw)| Page {
                number: span.page,
                text: raw.as_ref().to_string(),
                char_start: span.start,
                char_end: span.end,
            })
            .collect();

        Ok(Self {
            id: id.into(),
            filename: filename.into(),
            content_hash: content_hash.into(),
            created_at,
            text,
            pages,
        })
    }

    /// Total character count of the concatenated text.
    pub fn total_chars(&self) -> usize {
        self.pages.last().map(|p| p.char_end).unwrap_or(0)
    }

    /// Rebuild the page-offset table from the stored pages.
    pub fn offset_table(&self) -> Result<OffsetTable> {
        OffsetTable::from_spans(
            self.pages
                .iter()
                .map(|p| PageSpan {
                    page: p.number,
                    start: p.char_start,
                    end: p.char_end,
                })
                .collect(),
        )
    }
}

/// A contiguous, possibly overlapping substring of a document's text: the
/// unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// `{document_id}_page{page}_chunk{ordinal}`.
    pub id: String,
    pub document_id: String,
    /// Page the passage starts on.
    pub page: u32,
    /// Zero-based position among passages starting on `page`.
    pub ordinal: usize,
    /// Zero-based position among all passages of the document.
    pub index: usize,
    /// Global character start.
    pub char_start: usize,
    /// Global character end (exclusive).
    pub char_end: usize,
    pub text: String,
    /// SHA-256 of `text`, used for embedding staleness detection.
    pub hash: String,
}

/// Exact source location backing a retrieved passage, relative to one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub passage_id: String,
    pub page: u32,
    /// Character start within the page's raw text.
    pub char_start: usize,
    /// Character end (exclusive) within the page's raw text.
    pub char_end: usize,
}

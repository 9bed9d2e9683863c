//! Overlapping fixed-window passage segmenter.
//!
//! Splits concatenated document text into [`Passage`]s of `chunk_size`
//! characters, advancing by `chunk_size - overlap` characters each step.
//! Every passage carries its global character span, the page it starts on,
//! and a deterministic identifier, so segmenting the same document with the
//! same parameters always yields identical passages.
//!
//! # Algorithm
//!
//! 1. Validate `0 < overlap < chunk_size`.
//! 2. If the text is no longer than `chunk_size`, emit one passage covering it.
//! 3. Otherwise place windows at `0, stride, 2·stride, …` while the start lies
//!    inside the text. The last window is truncated to the remaining text and
//!    is never padded or empty.
//! 4. Tag each passage with the page containing its first character and an
//!    ordinal counting passages that start on that page.
//!
//! A passage may physically continue onto later pages; splitting its span
//! per page is the job of [`crate::citation`].
//!
//! # Example
//!
//! ```rust
//! use contract_intel_core::offsets::build;
//! use contract_intel_core::segment::segment;
//!
//! let page1 = "a".repeat(1200);
//! let page2 = "b".repeat(600);
//! let (text, table) = build(&[page1, page2]).unwrap();
//! let passages = segment("doc", &text, &table, 1000, 200).unwrap();
//!
//! let starts: Vec<usize> = passages.iter().map(|p| p.char_start).collect();
//! assert_eq!(starts, vec![0, 800, 1600]);
//! assert_eq!(passages[2].id, "doc_page2_chunk0");
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::models::Passage;
use crate::offsets::OffsetTable;

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default number of characters shared by consecutive windows.
pub const DEFAULT_OVERLAP: usize = 200;

/// Validated window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkingParams")]
pub struct ChunkingParams {
    chunk_size: usize,
    overlap: usize,
}

#[derive(Deserialize)]
struct RawChunkingParams {
    chunk_size: usize,
    overlap: usize,
}

impl TryFrom<RawChunkingParams> for ChunkingParams {
    type Error = CoreError;

    fn try_from(raw: RawChunkingParams) -> Result<Self> {
        Self::new(raw.chunk_size, raw.overlap)
    }
}

impl ChunkingParams {
    /// Fails with [`CoreError::InvalidConfiguration`] unless
    /// `0 < overlap < chunk_size`. Values are never clamped.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if overlap == 0 || overlap >= chunk_size {
            return Err(CoreError::InvalidConfiguration(format!(
                "chunking requires 0 < overlap < chunk_size (got chunk_size={}, overlap={})",
                chunk_size, overlap
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Segment `text` with raw parameters, validating them first.
pub fn segment(
    document_id: &str,
    text: &str,
    table: &OffsetTable,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Passage>> {
    let params = ChunkingParams::new(chunk_size, overlap)?;
    segment_with(document_id, text, table, &params)
}

/// Segment `text` into overlapping passages.
///
/// `table` must be the offset table built alongside `text`; a length
/// mismatch is reported as [`CoreError::MalformedInput`]. Empty text yields
/// no passages.
pub fn segment_with(
    document_id: &str,
    text: &str,
    table: &OffsetTable,
    params: &ChunkingParams,
) -> Result<Vec<Passage>> {
    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    if total != table.total_chars() {
        return Err(CoreError::MalformedInput(format!(
            "document {} has {} characters but its offset table covers {}",
            document_id,
            total,
            table.total_chars()
        )));
    }

    let mut passages = Vec::new();
    let mut current_page = 0u32;
    let mut ordinal = 0usize;

    for start in window_starts(total, params) {
        let end = (start + params.chunk_size()).min(total);
        let (page, _) = table.locate(start).ok_or(CoreError::OffsetOutOfRange {
            start,
            end,
            total,
        })?;

        if page == current_page {
            ordinal += 1;
        } else {
            current_page = page;
            ordinal = 0;
        }

        passages.push(make_passage(
            document_id,
            page,
            ordinal,
            passages.len(),
            start,
            end,
            &text[bounds[start]..bounds[end]],
        ));
    }

    tracing::debug!(
        document_id,
        total_chars = total,
        chunk_size = params.chunk_size(),
        overlap = params.overlap(),
        passages = passages.len(),
        "segmented document"
    );

    Ok(passages)
}

/// Window start positions for a text of `total` characters.
fn window_starts(total: usize, params: &ChunkingParams) -> impl Iterator<Item = usize> {
    let stride = params.stride();
    let single = total <= params.chunk_size();
    (0..total)
        .step_by(stride)
        .take(if single { 1 } else { usize::MAX })
}

/// Deterministic passage identifier.
pub fn passage_id(document_id: &str, page: u32, ordinal: usize) -> String {
    format!("{}_page{}_chunk{}", document_id, page, ordinal)
}

fn make_passage(
    document_id: &str,
    page: u32,
    ordinal: usize,
    index: usize,
    char_start: usize,
    char_end: usize,
    text: &str,
) -> Passage {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Passage {
        id: passage_id(document_id, page, ordinal),
        document_id: document_id.to_string(),
        page,
        ordinal,
        index,
        char_start,
        char_end,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offsets::build;

    fn filled(c: char, n: usize) -> String {
        std::iter::repeat(c).take(n).collect()
    }

    #[test]
    fn test_invalid_params_rejected() {
        for (size, overlap) in [(1000, 0), (1000, 1000), (100, 200), (0, 0)] {
            let err = ChunkingParams::new(size, overlap).unwrap_err();
            assert!(matches!(err, CoreError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn test_two_page_scenario() {
        let (text, table) = build(&[filled('a', 1200), filled('b', 600)]).unwrap();
        let passages = segment("doc", &text, &table, 1000, 200).unwrap();

        let spans: Vec<(usize, usize)> =
            passages.iter().map(|p| (p.char_start, p.char_end)).collect();
        assert_eq!(spans, vec![(0, 1000), (800, 1800), (1600, 1800)]);

        let ids: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["doc_page1_chunk0", "doc_page1_chunk1", "doc_page2_chunk0"]
        );
        assert_eq!(passages[2].page, 2);
        assert_eq!(passages[2].text, filled('b', 200));
    }

    #[test]
    fn test_short_document_single_passage() {
        let (text, table) = build(&["short contract"]).unwrap();
        for overlap in [1, 5, 999] {
            let passages = segment("d", &text, &table, 1000, overlap).unwrap();
            assert_eq!(passages.len(), 1);
            assert_eq!(passages[0].char_start, 0);
            assert_eq!(passages[0].char_end, 14);
            assert_eq!(passages[0].text, text);
        }
    }

    #[test]
    fn test_exact_chunk_size_is_single_passage() {
        let (text, table) = build(&[filled('x', 1000)]).unwrap();
        let passages = segment("d", &text, &table, 1000, 900).unwrap();
        assert_eq!(passages.len(), 1);
    }

    #[test]
    fn test_exact_multiple_of_stride_has_no_empty_tail() {
        let (text, table) = build(&[filled('x', 1600)]).unwrap();
        let passages = segment("d", &text, &table, 1000, 200).unwrap();
        let starts: Vec<usize> = passages.iter().map(|p| p.char_start).collect();
        assert_eq!(starts, vec![0, 800]);
        assert!(passages.iter().all(|p| p.char_end > p.char_start));
    }

    #[test]
    fn test_spans_contained_and_stride_respected() {
        let (text, table) = build(&[filled('a', 333), filled('b', 0), filled('c', 2417)]).unwrap();
        let total = table.total_chars();
        let passages = segment("d", &text, &table, 256, 64).unwrap();
        for p in &passages {
            assert!(p.char_start < p.char_end);
            assert!(p.char_end <= total);
            assert_eq!(p.text.chars().count(), p.char_end - p.char_start);
        }
        for pair in passages.windows(2) {
            assert!(pair[1].char_start - pair[0].char_start <= 192);
        }
        assert_eq!(passages.last().unwrap().char_end, total);
    }

    #[test]
    fn test_idempotent() {
        let (text, table) = build(&[filled('a', 1500), filled('b', 1500)]).unwrap();
        let a = segment("doc", &text, &table, 500, 100).unwrap();
        let b = segment("doc", &text, &table, 500, 100).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordinals_restart_per_page() {
        let (text, table) = build(&[filled('a', 1000), filled('b', 1000)]).unwrap();
        let passages = segment("d", &text, &table, 400, 150).unwrap();
        for p in &passages {
            let expected = passages
                .iter()
                .filter(|q| q.page == p.page && q.index < p.index)
                .count();
            assert_eq!(p.ordinal, expected);
        }
        assert!(passages.iter().any(|p| p.id == "d_page2_chunk0"));
    }

    #[test]
    fn test_multibyte_text() {
        let page = "Ärger über Öl — ß".repeat(40);
        let (text, table) = build(&[page.as_str()]).unwrap();
        let passages = segment("d", &text, &table, 100, 10).unwrap();
        for p in &passages {
            assert_eq!(p.text.chars().count(), p.char_end - p.char_start);
        }
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let (text, table) = build(&["", ""]).unwrap();
        assert!(segment("d", &text, &table, 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_table_is_malformed() {
        let (_, table) = build(&["abcdef"]).unwrap();
        let err = segment("d", "abc", &table, 10, 2).unwrap_err();
        assert!(matches!(err, CoreError::MalformedInput(_)));
    }

    #[test]
    fn test_hash_changes_with_text() {
        let (t1, tab1) = build(&["alpha beta"]).unwrap();
        let (t2, tab2) = build(&["alpha gamma"]).unwrap();
        let a = segment("d", &t1, &tab1, 100, 10).unwrap();
        let b = segment("d", &t2, &tab2, 100, 10).unwrap();
        assert_eq!(a[0].id, b[0].id);
        assert_ne!(a[0].hash, b[0].hash);
    }
}

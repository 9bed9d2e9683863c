//! Page-offset tracking.
//!
//! Concatenates per-page text into one document string and records, for each
//! page, the half-open range of global character positions it occupies. The
//! table is the single source of truth for mapping a global position back to
//! `(page, local offset)`.
//!
//! No separator is inserted between pages: every character of the document
//! text belongs to exactly one page, and a page's tracked length is exactly
//! the length of its raw text. Pages with empty text occupy a zero-width entry.
//!
//! # Example
//!
//! ```rust
//! use contract_intel_core::offsets::build;
//!
//! let (text, table) = build(&["Page one. ", "Page two."]).unwrap();
//! assert_eq!(text, "Page one. Page two.");
//! assert_eq!(table.total_chars(), 19);
//! assert_eq!(table.locate(12), Some((2, 2)));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The global range `[start, end)` occupied by one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    /// 1-based page number.
    pub page: u32,
    pub start: usize,
    pub end: usize,
}

impl PageSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Ordered, gap-free, non-overlapping page spans covering `[0, total_chars)`.
///
/// Only constructible through [`build`] or the validating
/// [`OffsetTable::from_spans`]; deserialization goes through the same check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PageSpan>", into = "Vec<PageSpan>")]
pub struct OffsetTable {
    spans: Vec<PageSpan>,
}

/// Concatenate page texts and build the matching offset table.
///
/// Fails with [`CoreError::MalformedInput`] when `pages` is empty.
pub fn build<S: AsRef<str>>(pages: &[S]) -> Result<(String, OffsetTable)> {
    if pages.is_empty() {
        return Err(CoreError::MalformedInput(
            "extraction produced zero pages".to_string(),
        ));
    }

    let byte_len = pages.iter().map(|p| p.as_ref().len()).sum();
    let mut text = String::with_capacity(byte_len);
    let mut spans = Vec::with_capacity(pages.len());
    let mut cursor = 0usize;

    for (i, page) in pages.iter().enumerate() {
        let page = page.as_ref();
        let len = page.chars().count();
        spans.push(PageSpan {
            page: (i + 1) as u32,
            start: cursor,
            end: cursor + len,
        });
        text.push_str(page);
        cursor += len;
    }

    Ok((text, OffsetTable { spans }))
}

impl OffsetTable {
    /// Rebuild a table from persisted spans, checking every invariant.
    ///
    /// Spans must be numbered `1..=n` in order, start at 0, and each must
    /// begin exactly where the previous one ended.
    pub fn from_spans(spans: Vec<PageSpan>) -> Result<Self> {
        if spans.is_empty() {
            return Err(CoreError::MalformedInput(
                "offset table has no pages".to_string(),
            ));
        }

        let mut expected_start = 0usize;
        for (i, span) in spans.iter().enumerate() {
            let expected_page = (i + 1) as u32;
            if span.page != expected_page {
                return Err(CoreError::MalformedInput(format!(
                    "offset table entry {} is page {}, expected page {}",
                    i, span.page, expected_page
                )));
            }
            if span.start != expected_start || span.end < span.start {
                return Err(CoreError::MalformedInput(format!(
                    "page {} spans [{}, {}) but must start at {}",
                    span.page, span.start, span.end, expected_start
                )));
            }
            expected_start = span.end;
        }

        Ok(Self { spans })
    }

    pub fn spans(&self) -> &[PageSpan] {
        &self.spans
    }

    pub fn page_count(&self) -> usize {
        self.spans.len()
    }

    /// Total characters covered, i.e. the final page's end.
    pub fn total_chars(&self) -> usize {
        self.spans.last().map(|s| s.end).unwrap_or(0)
    }

    /// Span of a 1-based page number.
    pub fn span(&self, page: u32) -> Option<&PageSpan> {
        (page as usize)
            .checked_sub(1)
            .and_then(|i| self.spans.get(i))
    }

    /// Map a global position to `(page, local offset)`.
    ///
    /// Returns `None` for positions at or beyond `total_chars`. Zero-width
    /// pages never own a position.
    pub fn locate(&self, position: usize) -> Option<(u32, usize)> {
        if position >= self.total_chars() {
            return None;
        }
        let idx = self.spans.partition_point(|s| s.end <= position);
        let span = &self.spans[idx];
        Some((span.page, position - span.start))
    }

    /// Spans intersecting `[start, end)`, in page order. May include
    /// zero-width pages lying strictly inside the range.
    pub(crate) fn overlapping(&self, start: usize, end: usize) -> &[PageSpan] {
        let first = self.spans.partition_point(|s| s.end <= start);
        let last = self.spans.partition_point(|s| s.start < end);
        &self.spans[first..last.max(first)]
    }
}

impl TryFrom<Vec<PageSpan>> for OffsetTable {
    type Error = CoreError;

    fn try_from(spans: Vec<PageSpan>) -> Result<Self> {
        Self::from_spans(spans)
    }
}

impl From<OffsetTable> for Vec<PageSpan> {
    fn from(table: OffsetTable) -> Self {
        table.spans
    }
}

/// Slice `text` by character positions `[start, end)`.
///
/// Positions past the end are clamped to the text length.
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |pos: usize| {
        text.char_indices()
            .nth(pos)
            .map(|(i, _)| i)
            .unwrap_or(text.len())
    };
    let from = byte_at(start);
    let to = if end <= start { from } else { byte_at(end) };
    &text[from..to]
}

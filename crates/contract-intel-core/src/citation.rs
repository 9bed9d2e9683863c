//! Citation resolution.
//!
//! Maps a global character span back onto the pages it covers. A span that
//! crosses a page boundary produces one entry per page, each clipped to that
//! page and expressed in page-local offsets, so callers can present a
//! multi-page citation as an ordered list.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::{Citation, Passage};
use crate::offsets::OffsetTable;

/// A page-local character range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub page: u32,
    pub start: usize,
    pub end: usize,
}

/// Resolve `[global_start, global_end)` into page-local ranges.
///
/// Fails with [`CoreError::OffsetOutOfRange`] when the span is empty or
/// inverted, starts at or past `total_chars`, or ends past `total_chars`.
/// Zero-width pages inside the span are skipped.
pub fn resolve(global_start: usize, global_end: usize, table: &OffsetTable) -> Result<Vec<PageRange>> {
    let total = table.total_chars();
    if global_end <= global_start || global_start >= total || global_end > total {
        return Err(CoreError::OffsetOutOfRange {
            start: global_start,
            end: global_end,
            total,
        });
    }

    Ok(table
        .overlapping(global_start, global_end)
        .iter()
        .filter(|span| !span.is_empty())
        .map(|span| PageRange {
            page: span.page,
            start: global_start.max(span.start) - span.start,
            end: global_end.min(span.end) - span.start,
        })
        .collect())
}

/// Resolve a passage's span into [`Citation`]s tagged with its identifier.
pub fn cite(passage: &Passage, table: &OffsetTable) -> Result<Vec<Citation>> {
    Ok(resolve(passage.char_start, passage.char_end, table)?
        .into_iter()
        .map(|r| Citation {
            passage_id: passage.id.clone(),
            page: r.page,
            char_start: r.start,
            char_end: r.end,
        })
        .collect())
}

//! Error taxonomy for the indexing and retrieval core.
//!
//! Every variant is surfaced to the immediate caller. Nothing in the core
//! converts one of these into a degraded result: a wrong citation is worse
//! than a visible failure. The only soft outcome is an empty retrieval.

use thiserror::Error;

/// Errors raised by the core pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Extraction produced no usable pages, or persisted offsets are inconsistent.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Chunk size and overlap violate `0 < overlap < chunk_size`.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A citation span falls outside the tracked range of its offset table.
    #[error("offset out of range: [{start}, {end}) not within [0, {total})")]
    OffsetOutOfRange {
        start: usize,
        end: usize,
        total: usize,
    },

    /// The embedding collaborator failed or is unreachable.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[source] anyhow::Error),

    /// A stored passage references a document the repository does not know.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// Storage collaborator failure, passed through unmodified.
    #[error(transparent)]
    Store(anyhow::Error),
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, CoreError>;

//! # Contract Intelligence Core
//!
//! Citation-accurate indexing and retrieval for paginated documents:
//! offset tracking across pages, overlapping passage segmentation,
//! citation resolution, the storage and embedding abstractions, and the
//! retrieval and indexing pipelines built on them.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Concrete embedders, the SQLite store, PDF
//! extraction and the CLI/HTTP surfaces live in the `contract-intel` crate.
//!
//! # Pipeline
//!
//! ```text
//! pages ─► offsets::build ─► segment ─► EmbeddingProvider ─► PassageStore
//!                                                                │
//! question ─► retrieve ─► PassageStore::query ─► citation::cite ─┘
//! ```

pub mod citation;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod offsets;
pub mod retrieve;
pub mod segment;
pub mod store;

pub use error::{CoreError, Result};

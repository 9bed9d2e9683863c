//! # Contract Intelligence
//!
//! **Question answering over PDF contracts with page-accurate citations.**
//!
//! PDFs are split into pages, concatenated into one text with a page-offset
//! table, segmented into overlapping passages and embedded. Questions are
//! answered from the most similar passages, and every passage is cited back
//! to the pages and page-local character ranges it came from. Structured
//! field extraction and a clause audit run over the same stored text.
//!
//! The indexing and retrieval core lives in `contract-intel-core`; this
//! crate wires it to SQLite, PDF extraction, embedding and LLM providers,
//! a CLI and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────┐   ┌──────────┐
//! │   PDF    │──▶│ extract_pages│──▶│ index_document │──▶│  SQLite  │
//! │  upload  │   │ (per page)   │   │ segment+embed  │   │ passages │
//! └──────────┘   └──────────────┘   └────────────────┘   └────┬─────┘
//!                                                             │
//!                       ┌─────────────────────────────────────┤
//!                       ▼                                     ▼
//!                ┌─────────────┐                     ┌──────────────┐
//!                │  retrieve   │──▶ synthesizer      │ extract/audit│
//!                │  + citations│    (answer)         │ (fields)     │
//!                └─────────────┘                     └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Idempotent schema creation |
//! | [`sqlite_store`] | SQLite passage store and document repository |
//! | [`extract`] | Per-page PDF text extraction |
//! | [`embedding`] | Embedding providers: hash, OpenAI, Ollama, local |
//! | [`llm`] | OpenAI chat-completions client |
//! | [`text`] | Sentence and term helpers |
//! | [`synthesis`] | Answer synthesizers: OpenAI and extractive |
//! | [`fields`] | Field extractors: OpenAI and keyword |
//! | [`audit`] | Risk rules and LLM audit with cited evidence |
//! | [`webhook`] | Signed background webhook delivery |
//! | [`context`] | Shared application state |
//! | [`ingest`] | PDF ingestion and re-indexing |
//! | [`ask`] | Retrieval and question answering |
//! | [`analysis`] | Document-level extraction and audit |
//! | [`get`] | Document lookup |
//! | [`stats`] | Index statistics |
//! | [`server`] | HTTP API (Axum) |

pub mod analysis;
pub mod ask;
pub mod audit;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod fields;
pub mod get;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod synthesis;
pub mod text;
pub mod webhook;

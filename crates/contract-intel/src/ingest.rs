//! PDF ingestion.
//!
//! ```text
//! bytes ──► sha256 ──► upload_dir/<id>.pdf ──► extract_pages ──► Document
//!                                                                  │
//!                          index_document (segment → embed → persist)
//! ```
//!
//! Every ingestion mints a fresh UUID, so uploading the same file twice
//! yields two documents. The content hash is recorded for reference only.
//! Use [`reindex`] to rebuild an existing document in place. Every
//! ingestion, successful or not, emits an `ingest_complete` webhook event.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use contract_intel_core::index::{index_document, IndexReport};
use contract_intel_core::models::Document;
use contract_intel_core::CoreError;

use crate::config::Config;
use crate::context::AppContext;
use crate::extract::extract_pages;
use crate::webhook::{WebhookEvent, INGEST_COMPLETE};

/// Outcome of ingesting one file.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestOutcome {
    pub filename: String,
    #[serde(flatten)]
    pub report: IndexReport,
}

fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Ingest one PDF from memory.
///
/// Unreadable PDFs and PDFs without pages fail with
/// [`CoreError::MalformedInput`].
pub async fn ingest_bytes(ctx: &AppContext, filename: &str, bytes: Vec<u8>) -> Result<IngestOutcome> {
    let hash = content_hash(&bytes);
    let document_id = Uuid::new_v4().to_string();

    match ingest_as(ctx, &document_id, filename, &hash, bytes).await {
        Ok(report) => {
            ctx.webhook.emit(WebhookEvent::success(
                INGEST_COMPLETE,
                &document_id,
                format!(
                    "Ingested {} pages into {} passages",
                    report.pages, report.passages
                ),
            ));
            Ok(IngestOutcome {
                filename: filename.to_string(),
                report,
            })
        }
        Err(e) => {
            ctx.webhook
                .emit(WebhookEvent::error(INGEST_COMPLETE, &document_id, e.to_string()));
            Err(e)
        }
    }
}

async fn ingest_as(
    ctx: &AppContext,
    document_id: &str,
    filename: &str,
    hash: &str,
    bytes: Vec<u8>,
) -> Result<IndexReport> {
    let upload_dir = &ctx.config.storage.upload_dir;
    tokio::fs::create_dir_all(upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir: {}", upload_dir.display()))?;
    let upload_path = upload_dir.join(format!("{}.pdf", document_id));
    tokio::fs::write(&upload_path, &bytes)
        .await
        .with_context(|| format!("Failed to store upload: {}", upload_path.display()))?;

    let pages = tokio::task::spawn_blocking(move || extract_pages(&bytes))
        .await?
        .map_err(|e| CoreError::MalformedInput(format!("{}: {}", filename, e)))?;

    let document = Document::from_pages(
        document_id,
        filename,
        hash,
        chrono::Utc::now().timestamp(),
        &pages,
    )?;

    index(ctx, &document).await
}

async fn index(ctx: &AppContext, document: &Document) -> Result<IndexReport> {
    let params = ctx.config.chunking.params()?;
    let report = index_document(
        ctx.embedder.as_ref(),
        &ctx.store,
        &ctx.store,
        document,
        &params,
        ctx.config.embedding.batch_size,
    )
    .await?;

    tracing::info!(
        document_id = %report.document_id,
        filename = %document.filename,
        pages = report.pages,
        passages = report.passages,
        replaced = report.replaced,
        "document indexed"
    );
    Ok(report)
}

/// Re-segment and re-embed a stored document with the current chunking
/// parameters and embedding provider.
pub async fn reindex(ctx: &AppContext, document_id: &str) -> Result<IndexReport> {
    let document = ctx.document(document_id).await?;
    index(ctx, &document).await
}

/// Every `.pdf` file under `paths`, walking directories recursively.
pub fn collect_pdfs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && is_pdf(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    files
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// CLI entry point for `cintel ingest <paths…>`.
pub async fn run_ingest(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let files = collect_pdfs(paths);
    if files.is_empty() {
        anyhow::bail!("No PDF files found");
    }

    let ctx = AppContext::open(config).await?;
    let mut ingested = 0usize;
    let mut failed = 0usize;

    for file in &files {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        let result = match tokio::fs::read(file).await {
            Ok(bytes) => ingest_bytes(&ctx, &filename, bytes).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(outcome) => {
                ingested += 1;
                println!(
                    "{}  {}  pages={} passages={}",
                    outcome.report.document_id,
                    file.display(),
                    outcome.report.pages,
                    outcome.report.passages
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("Error: {}: {:#}", file.display(), e);
            }
        }
    }

    println!("ingest");
    println!("  files: {}", files.len());
    println!("  ingested: {}", ingested);
    println!("  failed: {}", failed);
    println!("ok");

    ctx.close().await;
    if failed > 0 && ingested == 0 {
        anyhow::bail!("All {} file(s) failed to ingest", failed);
    }
    Ok(())
}

/// CLI entry point for `cintel reindex <id>`.
pub async fn run_reindex(config: &Config, document_id: &str) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let report = reindex(&ctx, document_id).await;
    ctx.close().await;
    let report = report?;
    println!("reindex {}", report.document_id);
    println!("  pages: {}", report.pages);
    println!("  passages: {}", report.passages);
    println!("  replaced: {}", report.replaced);
    println!("ok");
    Ok(())
}

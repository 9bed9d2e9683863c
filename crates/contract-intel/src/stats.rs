//! Index statistics.
//!
//! A quick summary of what is indexed: document, page and passage counts,
//! embedding coverage, the embedding models present in the index and the
//! most recent documents. Backs `cintel stats` and `GET /stats`.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use contract_intel_core::store::{DocumentRepository, DocumentSummary};

use crate::config::Config;
use crate::context::AppContext;

#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub model: String,
    pub dims: i64,
    pub vectors: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: i64,
    pub pages: i64,
    pub passages: i64,
    pub embedded: i64,
    pub models: Vec<ModelStats>,
    pub embedder: String,
    pub synthesizer: String,
    pub extractor: String,
    pub recent: Vec<DocumentSummary>,
}

async fn count(pool: &SqlitePool, table: &str) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(n)
}

pub async fn index_stats(ctx: &AppContext, recent: usize) -> Result<IndexStats> {
    let pool = ctx.store.pool();

    let models: Vec<ModelStats> = sqlx::query(
        "SELECT model, dims, COUNT(*) AS vectors FROM passage_vectors GROUP BY model, dims ORDER BY vectors DESC",
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(|r| ModelStats {
        model: r.get("model"),
        dims: r.get("dims"),
        vectors: r.get("vectors"),
    })
    .collect();

    let mut documents = ctx.store.list_documents().await?;
    documents.truncate(recent);

    Ok(IndexStats {
        documents: count(pool, "documents").await?,
        pages: count(pool, "pages").await?,
        passages: count(pool, "passages").await?,
        embedded: count(pool, "passage_vectors").await?,
        models,
        embedder: ctx.embedder.model_name().to_string(),
        synthesizer: ctx.synthesizer.name().to_string(),
        extractor: ctx.extractor.name().to_string(),
        recent: documents,
    })
}

/// CLI entry point for `cintel stats`.
pub async fn run_stats(config: &Config) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let stats = index_stats(&ctx, 10).await?;
    ctx.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Contract Intelligence - Index Stats");
    println!("===================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", stats.documents);
    println!("  Pages:       {}", stats.pages);
    println!("  Passages:    {}", stats.passages);
    println!(
        "  Embedded:    {} / {} ({}%)",
        stats.embedded,
        stats.passages,
        if stats.passages > 0 {
            (stats.embedded * 100) / stats.passages
        } else {
            0
        }
    );
    println!();
    println!("  Embedder:    {}", stats.embedder);
    println!("  Answers:     {}", stats.synthesizer);
    println!("  Extraction:  {}", stats.extractor);

    if !stats.models.is_empty() {
        println!();
        println!("  By model:");
        println!("  {:<32} {:>6} {:>8}", "MODEL", "DIMS", "VECTORS");
        println!("  {}", "-".repeat(48));
        for m in &stats.models {
            println!("  {:<32} {:>6} {:>8}", m.model, m.dims, m.vectors);
        }
    }

    if !stats.recent.is_empty() {
        println!();
        println!("  Recent documents:");
        println!("  {:<36}  {:>5}  {:<16}  {}", "ID", "PAGES", "INGESTED", "FILENAME");
        println!("  {}", "-".repeat(76));
        for d in &stats.recent {
            println!(
                "  {:<36}  {:>5}  {:<16}  {}",
                d.id,
                d.page_count,
                format_ts(d.created_at),
                d.filename
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::memory_context;
    use crate::extract::fixtures::pdf_with_pages;
    use crate::ingest::ingest_bytes;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[tokio::test]
    async fn test_index_stats_counts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = memory_context(dir.path()).await;
        let empty = index_stats(&ctx, 10).await.unwrap();
        assert_eq!(empty.documents, 0);
        assert!(empty.models.is_empty());

        ingest_bytes(&ctx, "a.pdf", pdf_with_pages(&["Alpha.", "Beta."]))
            .await
            .unwrap();
        let stats = index_stats(&ctx, 10).await.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.passages, stats.embedded);
        assert_eq!(stats.models.len(), 1);
        assert_eq!(stats.models[0].model, "hash-bow-256");
        assert_eq!(stats.models[0].dims, 256);
        assert_eq!(stats.recent[0].filename, "a.pdf");
    }
}

//! Document lookup by id.
//!
//! Used by both `cintel get <id>` and `GET /documents/{id}`. The response
//! carries the document metadata, its page table and its passages in
//! segmentation order; the full text is only included on request.

use anyhow::Result;
use serde::Serialize;

use contract_intel_core::store::PassageStore;

use crate::config::Config;
use crate::context::AppContext;

#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub number: u32,
    pub char_start: usize,
    pub char_end: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassageInfo {
    pub id: String,
    pub page: u32,
    pub char_start: usize,
    pub char_end: usize,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub filename: String,
    pub content_hash: String,
    pub created_at: i64,
    pub total_chars: usize,
    pub pages: Vec<PageInfo>,
    pub passages: Vec<PassageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

pub async fn get_document(
    ctx: &AppContext,
    id: &str,
    include_text: bool,
) -> Result<DocumentResponse> {
    let doc = ctx.document(id).await?;
    let passages = ctx.store.passages_for(id).await?;

    Ok(DocumentResponse {
        total_chars: doc.total_chars(),
        pages: doc
            .pages
            .iter()
            .map(|p| PageInfo {
                number: p.number,
                char_start: p.char_start,
                char_end: p.char_end,
            })
            .collect(),
        passages: passages
            .into_iter()
            .map(|p| PassageInfo {
                id: p.id,
                page: p.page,
                char_start: p.char_start,
                char_end: p.char_end,
                hash: p.hash,
            })
            .collect(),
        text: include_text.then_some(doc.text),
        id: doc.id,
        filename: doc.filename,
        content_hash: doc.content_hash,
        created_at: doc.created_at,
    })
}

/// CLI entry point for `cintel get <id>`.
pub async fn run_get(config: &Config, id: &str, show_text: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let doc = get_document(&ctx, id, show_text).await?;
    ctx.close().await;

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("filename:     {}", doc.filename);
    println!("sha256:       {}", doc.content_hash);
    println!("created_at:   {}", doc.created_at);
    println!("total_chars:  {}", doc.total_chars);
    println!();

    println!("--- Pages ({}) ---", doc.pages.len());
    for p in &doc.pages {
        println!("  page {:<4} chars {}..{}", p.number, p.char_start, p.char_end);
    }
    println!();

    println!("--- Passages ({}) ---", doc.passages.len());
    for p in &doc.passages {
        println!(
            "  {}  page {}  chars {}..{}",
            p.id, p.page, p.char_start, p.char_end
        );
    }

    if let Some(text) = &doc.text {
        println!();
        println!("--- Text ---");
        println!("{}", text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::memory_context;
    use crate::extract::fixtures::pdf_with_pages;
    use crate::ingest::ingest_bytes;

    #[tokio::test]
    async fn test_get_document_lists_pages_and_passages() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = memory_context(dir.path()).await;
        let pdf = pdf_with_pages(&["First page.", "Second page."]);
        let id = ingest_bytes(&ctx, "two.pdf", pdf)
            .await
            .unwrap()
            .report
            .document_id;

        let doc = get_document(&ctx, &id, false).await.unwrap();
        assert_eq!(doc.filename, "two.pdf");
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].char_start, 0);
        assert_eq!(doc.pages[0].char_end, doc.pages[1].char_start);
        assert_eq!(doc.pages[1].char_end, doc.total_chars);
        assert_eq!(doc.passages.len(), 1);
        assert_eq!(doc.passages[0].id, format!("{}_page1_chunk0", id));
        assert!(doc.text.is_none());

        let with_text = get_document(&ctx, &id, true).await.unwrap();
        assert!(with_text.text.unwrap().contains("Second page."));
    }
}

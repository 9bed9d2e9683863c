//! Question answering over ingested contracts.
//!
//! [`search`] runs the core retrieval orchestrator and returns ranked,
//! cited passages. [`ask`] hands those passages to the configured
//! [`AnswerSynthesizer`](crate::synthesis::AnswerSynthesizer) and flattens
//! their citations into the response.

use anyhow::Result;
use serde::Serialize;

use contract_intel_core::offsets::char_slice;
use contract_intel_core::retrieve::{retrieve, RetrievalRequest, RetrievedPassage};

use crate::audit::CharRange;
use crate::config::Config;
use crate::context::AppContext;

pub const NO_ANSWER: &str = "No relevant information found in the uploaded documents.";

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct AnswerCitation {
    pub document_id: String,
    pub passage_id: String,
    pub page: u32,
    /// Page-local character range.
    pub char_range: CharRange,
    /// First 200 characters of the cited passage.
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<AnswerCitation>,
}

/// Retrieve cited passages for `question`. `top_k` defaults to `[retrieval] top_k`.
pub async fn search(
    ctx: &AppContext,
    question: &str,
    document_ids: &[String],
    top_k: Option<usize>,
) -> Result<Vec<RetrievedPassage>> {
    let request = RetrievalRequest {
        question,
        candidate_document_ids: document_ids,
        top_k: top_k.unwrap_or(ctx.config.retrieval.top_k),
    };
    let passages = retrieve(ctx.embedder.as_ref(), &ctx.store, &ctx.store, &request).await?;
    tracing::debug!(
        question,
        scope = document_ids.len(),
        hits = passages.len(),
        "retrieval complete"
    );
    Ok(passages)
}

pub async fn ask(
    ctx: &AppContext,
    question: &str,
    document_ids: &[String],
    top_k: Option<usize>,
) -> Result<AskResponse> {
    let passages = search(ctx, question, document_ids, top_k).await?;
    if passages.is_empty() {
        return Ok(AskResponse {
            answer: NO_ANSWER.to_string(),
            citations: Vec::new(),
        });
    }

    let answer = ctx.synthesizer.synthesize(question, &passages).await?;
    tracing::info!(
        synthesizer = ctx.synthesizer.name(),
        passages = passages.len(),
        "question answered"
    );

    Ok(AskResponse {
        answer,
        citations: flatten_citations(&passages),
    })
}

fn flatten_citations(passages: &[RetrievedPassage]) -> Vec<AnswerCitation> {
    passages
        .iter()
        .flat_map(|rp| {
            let preview = char_slice(&rp.passage.text, 0, PREVIEW_CHARS).to_string();
            rp.citations.iter().map(move |c| AnswerCitation {
                document_id: rp.passage.document_id.clone(),
                passage_id: c.passage_id.clone(),
                page: c.page,
                char_range: CharRange {
                    start: c.char_start,
                    end: c.char_end,
                },
                text: preview.clone(),
            })
        })
        .collect()
}

/// CLI entry point for `cintel search`.
pub async fn run_search(
    config: &Config,
    question: &str,
    document_ids: &[String],
    top_k: Option<usize>,
) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let passages = search(&ctx, question, document_ids, top_k).await?;
    ctx.close().await;

    if passages.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, rp) in passages.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, rp.score, rp.passage.id);
        for c in &rp.citations {
            println!(
                "    page {}  chars {}..{}",
                c.page, c.char_start, c.char_end
            );
        }
        println!(
            "    {}",
            char_slice(&rp.passage.text, 0, PREVIEW_CHARS)
                .replace('\n', " ")
                .trim()
        );
        println!();
    }
    Ok(())
}

/// CLI entry point for `cintel ask`.
pub async fn run_ask(
    config: &Config,
    question: &str,
    document_ids: &[String],
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let response = ask(&ctx, question, document_ids, top_k).await?;
    ctx.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer);
    if !response.citations.is_empty() {
        println!();
        println!("Citations:");
        for c in &response.citations {
            println!(
                "  [{}] page {}, chars {}..{}",
                c.document_id, c.page, c.char_range.start, c.char_range.end
            );
        }
    }
    Ok(())
}

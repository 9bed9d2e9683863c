//! Answer synthesis from cited passages.
//!
//! The retrieval pipeline hands ranked passages to an [`AnswerSynthesizer`]
//! and never looks at the answer it produces. Two implementations are
//! selected by `[llm] provider`:
//!
//! | Provider | Implementation |
//! |----------|----------------|
//! | `"openai"` | [`OpenAiSynthesizer`]: chat completion grounded in the passages |
//! | `"extractive"` | [`ExtractiveSynthesizer`]: quotes the best-matching sentences |

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use contract_intel_core::retrieve::RetrievedPassage;

use crate::config::LlmConfig;
use crate::llm::ChatClient;
use crate::text::{sentences, terms};

#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// Produce an answer to `question` from `passages` (already ranked, never empty).
    async fn synthesize(&self, question: &str, passages: &[RetrievedPassage]) -> Result<String>;
}

// ============ Extractive ============

/// Offline synthesizer: picks the sentences sharing the most terms with the
/// question and quotes them in passage rank order.
pub struct ExtractiveSynthesizer {
    max_sentences: usize,
}

impl Default for ExtractiveSynthesizer {
    fn default() -> Self {
        Self { max_sentences: 3 }
    }
}

#[async_trait]
impl AnswerSynthesizer for ExtractiveSynthesizer {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn synthesize(&self, question: &str, passages: &[RetrievedPassage]) -> Result<String> {
        let wanted = terms(question);
        let mut scored: Vec<(usize, usize, &str)> = Vec::new();
        let mut seen = HashSet::new();

        for (rank, rp) in passages.iter().enumerate() {
            for m in sentences(&rp.passage.text) {
                let sentence = m.as_str().trim();
                if !seen.insert(sentence) {
                    continue;
                }
                let overlap = terms(sentence).intersection(&wanted).count();
                if overlap > 0 {
                    scored.push((overlap, rank, sentence));
                }
            }
        }

        if scored.is_empty() {
            let best = passages
                .first()
                .map(|rp| rp.passage.text.trim())
                .unwrap_or_default();
            return Ok(format!("Most relevant excerpt: \"{}\"", best));
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(self.max_sentences);
        scored.sort_by_key(|(_, rank, _)| *rank);

        let quoted: Vec<&str> = scored.iter().map(|(_, _, s)| *s).collect();
        Ok(format!(
            "Based on the uploaded documents: {}",
            quoted.join(" ")
        ))
    }
}

// ============ OpenAI ============

const ANSWER_SYSTEM_PROMPT: &str =
    "You are a contract analysis assistant. Answer questions based only on the provided contract text.";

/// Chat-completion synthesizer. Falls back to [`ExtractiveSynthesizer`]
/// with a warning when the model call fails.
pub struct OpenAiSynthesizer {
    client: Arc<ChatClient>,
    fallback: ExtractiveSynthesizer,
}

impl OpenAiSynthesizer {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self {
            client,
            fallback: ExtractiveSynthesizer::default(),
        }
    }
}

/// Numbered context block with page markers for the model.
pub fn build_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, rp)| {
            format!(
                "[{}] (document {}, page {})\n{}",
                i + 1,
                rp.passage.document_id,
                rp.passage.page,
                rp.passage.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl AnswerSynthesizer for OpenAiSynthesizer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(&self, question: &str, passages: &[RetrievedPassage]) -> Result<String> {
        let prompt = format!(
            "Answer the following question based only on the provided contract context. \
             If the answer cannot be found in the context, say so.\n\n\
             Context:\n{}\n\nQuestion: {}\n\nAnswer:",
            build_context(passages),
            question
        );

        match self.client.complete(ANSWER_SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => Ok(answer.trim().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, model = self.client.model(), "answer synthesis failed, using extractive fallback");
                self.fallback.synthesize(question, passages).await
            }
        }
    }
}

/// Build the synthesizer selected by `[llm] provider`.
pub fn create_synthesizer(
    config: &LlmConfig,
    client: Option<Arc<ChatClient>>,
) -> Arc<dyn AnswerSynthesizer> {
    match (config.is_openai(), client) {
        (true, Some(client)) => Arc::new(OpenAiSynthesizer::new(client)),
        _ => Arc::new(ExtractiveSynthesizer::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_intel_core::models::Passage;

    fn retrieved(id: &str, text: &str) -> RetrievedPassage {
        RetrievedPassage {
            passage: Passage {
                id: id.to_string(),
                document_id: "msa".to_string(),
                page: 1,
                ordinal: 0,
                index: 0,
                char_start: 0,
                char_end: text.chars().count(),
                text: text.to_string(),
                hash: String::new(),
            },
            score: 0.5,
            citations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_extractive_quotes_matching_sentences() {
        let passages = vec![
            retrieved("a", "Payment is due in 30 days. The liability cap is one million dollars."),
            retrieved("b", "Either party may terminate. Liability for fraud is unlimited."),
        ];
        let answer = ExtractiveSynthesizer::default()
            .synthesize("What is the liability cap?", &passages)
            .await
            .unwrap();
        assert!(answer.contains("The liability cap is one million dollars."));
        assert!(!answer.contains("Payment is due"));
    }

    #[tokio::test]
    async fn test_extractive_without_overlap_quotes_top_passage() {
        let passages = vec![retrieved("a", "Schedule A lists deliverables.")];
        let answer = ExtractiveSynthesizer::default()
            .synthesize("zebra?", &passages)
            .await
            .unwrap();
        assert!(answer.contains("Schedule A lists deliverables."));
    }

    #[test]
    fn test_build_context_numbers_passages() {
        let ctx = build_context(&[retrieved("a", "alpha"), retrieved("b", "beta")]);
        assert!(ctx.starts_with("[1] (document msa, page 1)\nalpha"));
        assert!(ctx.contains("[2] (document msa, page 1)\nbeta"));
    }

    #[test]
    fn test_create_synthesizer_defaults_to_extractive() {
        let synth = create_synthesizer(&LlmConfig::default(), None);
        assert_eq!(synth.name(), "extractive");
    }
}

//! Structured field extraction from contract text.
//!
//! [`FieldExtractor`] has two implementations selected by `[llm] provider`:
//! [`OpenAiExtractor`] asks the model for a JSON object, and
//! [`KeywordExtractor`] uses regular expressions and keyword sentences.
//! The OpenAI extractor falls back to the keyword extractor whenever the
//! model call or its JSON fails.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::config::LlmConfig;
use crate::llm::{truncate_chars, ChatClient};
use crate::text::find_sentence;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signatory {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiabilityCap {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Fields extracted from one contract. Absent values are `None` / empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractFields {
    #[serde(default)]
    pub parties: Vec<Party>,
    #[serde(default)]
    pub effective_date: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub governing_law: Option<String>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub termination: Option<String>,
    #[serde(default)]
    pub auto_renewal: Option<bool>,
    #[serde(default)]
    pub confidentiality: Option<String>,
    #[serde(default)]
    pub indemnity: Option<String>,
    #[serde(default)]
    pub liability_cap: Option<LiabilityCap>,
    #[serde(default)]
    pub signatories: Vec<Signatory>,
}

#[async_trait]
pub trait FieldExtractor: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self, text: &str) -> Result<ContractFields>;
}

// ============ Keyword ============

/// Offline extractor built on regular expressions.
#[derive(Default)]
pub struct KeywordExtractor;

struct Patterns {
    parties: Regex,
    effective_date: Regex,
    term: Regex,
    governing_law: Regex,
    liability_cap: Regex,
    signatory: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        parties: Regex::new(
            r#"\b[Bb]etween\s+([A-Z][\w&.,' -]*?)\s*(?:\((?:the\s+)?["“]?(\w+)["”]?\))?,?\s+and\s+([A-Z][\w&.,' -]*?)\s*(?:\((?:the\s+)?["“]?(\w+)["”]?\))?[.,;\n]"#,
        )
        .expect("valid parties regex"),
        effective_date: Regex::new(
            r"(?i)effective(?:\s+as\s+of|\s+date(?:\s+is)?[:\s])\s*([A-Z][a-z]+\s+\d{1,2},\s+\d{4}|\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4})",
        )
        .expect("valid effective date regex"),
        term: Regex::new(r"(?i)\bterm\s+of\s+([^.;\n]+)").expect("valid term regex"),
        governing_law: Regex::new(
            r"(?i)governed\s+by\s+(?:and\s+construed\s+in\s+accordance\s+with\s+)?the\s+laws?\s+of\s+(?:the\s+)?([^.,;\n]+)",
        )
        .expect("valid governing law regex"),
        liability_cap: Regex::new(
            r"(?i)liability[^.]*?(?:shall\s+not\s+exceed|capped\s+at|limited\s+to)[^.\d$€£]*?([$€£])?\s?(\d[\d,]*(?:\.\d+)?)\s*(USD|EUR|GBP|dollars|euros)?",
        )
        .expect("valid liability cap regex"),
        signatory: Regex::new(r"(?i)name:\s*([^\n,]+?)\s*,?\s*title:\s*([^\n,]+)")
            .expect("valid signatory regex"),
    })
}

fn sentence_with(text: &str, keywords: &[&str]) -> Option<String> {
    find_sentence(text, keywords).map(|m| m.as_str().trim().to_string())
}

fn currency_code(symbol: Option<&str>, word: Option<&str>) -> Option<String> {
    let code = match (symbol, word.map(|w| w.to_lowercase())) {
        (Some("$"), _) => "USD",
        (Some("€"), _) => "EUR",
        (Some("£"), _) => "GBP",
        (_, Some(w)) if w == "usd" || w == "dollars" => "USD",
        (_, Some(w)) if w == "eur" || w == "euros" => "EUR",
        (_, Some(w)) if w == "gbp" => "GBP",
        _ => return None,
    };
    Some(code.to_string())
}

impl KeywordExtractor {
    pub fn extract_sync(&self, text: &str) -> ContractFields {
        let p = patterns();
        let lower = text.to_lowercase();

        let parties = p
            .parties
            .captures(text)
            .map(|c| {
                vec![
                    Party {
                        name: c[1].trim().to_string(),
                        role: c.get(2).map(|r| r.as_str().to_string()),
                    },
                    Party {
                        name: c[3].trim().to_string(),
                        role: c.get(4).map(|r| r.as_str().to_string()),
                    },
                ]
            })
            .unwrap_or_default();

        let liability_cap = p.liability_cap.captures(text).and_then(|c| {
            let amount = c[2].replace(',', "").parse::<f64>().ok()?;
            Some(LiabilityCap {
                amount: Some(amount),
                currency: currency_code(
                    c.get(1).map(|m| m.as_str()),
                    c.get(3).map(|m| m.as_str()),
                ),
            })
        });

        let signatories = p
            .signatory
            .captures_iter(text)
            .map(|c| Signatory {
                name: c[1].trim().to_string(),
                title: Some(c[2].trim().to_string()),
            })
            .collect();

        ContractFields {
            parties,
            effective_date: p
                .effective_date
                .captures(text)
                .map(|c| c[1].trim().to_string()),
            term: p.term.captures(text).map(|c| c[1].trim().to_string()),
            governing_law: p
                .governing_law
                .captures(text)
                .map(|c| c[1].trim().to_string()),
            payment_terms: sentence_with(text, &["payment"])
                .or_else(|| sentence_with(text, &["payable"])),
            termination: sentence_with(text, &["terminat"]),
            auto_renewal: (lower.contains("auto") && lower.contains("renew")).then_some(true),
            confidentiality: sentence_with(text, &["confidential"]),
            indemnity: sentence_with(text, &["indemnif"]),
            liability_cap,
            signatories,
        }
    }
}

#[async_trait]
impl FieldExtractor for KeywordExtractor {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn extract(&self, text: &str) -> Result<ContractFields> {
        Ok(self.extract_sync(text))
    }
}

// ============ OpenAI ============

const EXTRACT_SYSTEM_PROMPT: &str = "You are a contract analysis expert. Extract structured information from contracts and return only valid JSON.";

pub struct OpenAiExtractor {
    client: Arc<ChatClient>,
    max_context_chars: usize,
    fallback: KeywordExtractor,
}

impl OpenAiExtractor {
    pub fn new(client: Arc<ChatClient>, max_context_chars: usize) -> Self {
        Self {
            client,
            max_context_chars,
            fallback: KeywordExtractor,
        }
    }

    async fn extract_with_model(&self, text: &str) -> Result<ContractFields> {
        let prompt = format!(
            "Extract the following structured information from this contract text. Return a JSON object with these fields:\n\
             - parties: array of objects with \"name\" and \"role\" (e.g., \"Buyer\", \"Seller\", \"Licensor\", \"Licensee\")\n\
             - effective_date: string date\n\
             - term: string describing the contract term/duration\n\
             - governing_law: string describing governing law/jurisdiction\n\
             - payment_terms: string describing payment terms\n\
             - termination: string describing termination conditions\n\
             - auto_renewal: boolean indicating if contract auto-renews\n\
             - confidentiality: string describing confidentiality obligations\n\
             - indemnity: string describing indemnity provisions\n\
             - liability_cap: object with \"amount\" (number) and \"currency\" (string) if there's a liability cap, null otherwise\n\
             - signatories: array of objects with \"name\" and \"title\"\n\n\
             Contract text:\n{}\n\n\
             Return only valid JSON, no markdown formatting.",
            truncate_chars(text, self.max_context_chars)
        );
        let value = self
            .client
            .complete_json(EXTRACT_SYSTEM_PROMPT, &prompt)
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl FieldExtractor for OpenAiExtractor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(&self, text: &str) -> Result<ContractFields> {
        match self.extract_with_model(text).await {
            Ok(fields) => Ok(fields),
            Err(e) => {
                tracing::warn!(error = %e, "LLM field extraction failed, using keyword extractor");
                self.fallback.extract(text).await
            }
        }
    }
}

/// Build the extractor selected by `[llm] provider`.
pub fn create_extractor(
    config: &LlmConfig,
    client: Option<Arc<ChatClient>>,
) -> Arc<dyn FieldExtractor> {
    match (config.is_openai(), client) {
        (true, Some(client)) => Arc::new(OpenAiExtractor::new(client, config.max_context_chars)),
        _ => Arc::new(KeywordExtractor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSA: &str = "This Master Services Agreement is entered into between Acme Corp (the \"Supplier\") and Globex LLC (the \"Customer\").\n\
        This Agreement is effective as of January 15, 2024 and continues for a term of three (3) years.\n\
        This Agreement shall automatically renew for successive one-year periods unless either party gives 15 days notice.\n\
        Payment is due within thirty (30) days of invoice.\n\
        Either party may terminate this Agreement for material breach.\n\
        Each party shall keep the other's Confidential Information secret.\n\
        The Supplier shall indemnify the Customer against any and all claims.\n\
        The Supplier's total liability shall not exceed $1,000,000.\n\
        This Agreement is governed by the laws of the State of Delaware.\n\
        Name: Jane Roe, Title: Chief Executive Officer\n";

    #[test]
    fn test_keyword_extraction() {
        let fields = KeywordExtractor.extract_sync(MSA);

        assert_eq!(fields.parties.len(), 2);
        assert_eq!(fields.parties[0].name, "Acme Corp");
        assert_eq!(fields.parties[0].role.as_deref(), Some("Supplier"));
        assert_eq!(fields.parties[1].name, "Globex LLC");
        assert_eq!(fields.parties[1].role.as_deref(), Some("Customer"));

        assert_eq!(fields.effective_date.as_deref(), Some("January 15, 2024"));
        assert_eq!(fields.term.as_deref(), Some("three (3) years"));
        assert_eq!(fields.governing_law.as_deref(), Some("State of Delaware"));
        assert_eq!(fields.auto_renewal, Some(true));
        assert!(fields.payment_terms.unwrap().starts_with("Payment is due"));
        assert!(fields.termination.unwrap().contains("terminate"));
        assert!(fields.confidentiality.unwrap().contains("Confidential"));
        assert!(fields.indemnity.unwrap().contains("indemnify"));

        let cap = fields.liability_cap.unwrap();
        assert_eq!(cap.amount, Some(1_000_000.0));
        assert_eq!(cap.currency.as_deref(), Some("USD"));

        assert_eq!(fields.signatories.len(), 1);
        assert_eq!(fields.signatories[0].name, "Jane Roe");
        assert_eq!(
            fields.signatories[0].title.as_deref(),
            Some("Chief Executive Officer")
        );
    }

    #[test]
    fn test_keyword_extraction_on_sparse_text() {
        let fields = KeywordExtractor.extract_sync("Schedule A. Deliverables.");
        assert_eq!(fields, ContractFields::default());
    }

    #[test]
    fn test_fields_deserialize_from_partial_json() {
        let value = serde_json::json!({
            "parties": [{ "name": "Acme", "role": "Seller" }],
            "auto_renewal": false,
            "liability_cap": { "amount": 5000, "currency": "EUR" }
        });
        let fields: ContractFields = serde_json::from_value(value).unwrap();
        assert_eq!(fields.parties[0].role.as_deref(), Some("Seller"));
        assert_eq!(fields.auto_renewal, Some(false));
        assert_eq!(fields.liability_cap.unwrap().amount, Some(5000.0));
        assert!(fields.signatories.is_empty());
    }

    #[tokio::test]
    async fn test_create_extractor_defaults_to_keyword() {
        let extractor = create_extractor(&LlmConfig::default(), None);
        assert_eq!(extractor.name(), "keyword");
        let fields = extractor.extract(MSA).await.unwrap();
        assert_eq!(fields.auto_renewal, Some(true));
    }
}

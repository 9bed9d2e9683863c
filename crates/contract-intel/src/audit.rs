//! Contract risk audit.
//!
//! Four rules run over the document text and its extracted fields:
//!
//! | Category | Severity | Trigger |
//! |----------|----------|---------|
//! | `auto_renewal` | high | auto-renewal with a notice period under 30 days |
//! | `liability` | high | text mentions unlimited liability |
//! | `liability` | medium | no liability cap, or a cap of zero |
//! | `indemnity` | high | indemnity clause covering all/any/every claim, or unlimited |
//!
//! When an LLM is configured its findings are appended. Evidence that can be
//! located in the document carries a global character range, resolved into
//! page-local citations through the document's offset table.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use contract_intel_core::citation::{resolve, PageRange};
use contract_intel_core::models::Document;
use contract_intel_core::offsets::OffsetTable;

use crate::fields::ContractFields;
use crate::llm::{truncate_chars, ChatClient};
use crate::text::{char_offset, char_range, find_sentence};

const EVIDENCE_NOT_FOUND: &str = "Evidence not found in text";
const MAX_EVIDENCE_CHARS: usize = 200;
const MIN_NOTICE_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Lenient parse for model output; anything unrecognised is `Medium`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" => Severity::High,
            "low" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

/// Character range `[start, end)`. Whether it is global to the document
/// text or local to a page depends on the field that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub evidence: String,
    /// Global range of the evidence in the document text.
    pub char_range: Option<CharRange>,
    /// Pages the evidence spans, in page-local offsets. Empty when the
    /// evidence could not be located.
    pub citations: Vec<PageRange>,
}

impl Finding {
    fn new(severity: Severity, category: &str, description: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.to_string(),
            description: description.into(),
            evidence: EVIDENCE_NOT_FOUND.to_string(),
            char_range: None,
            citations: Vec::new(),
        }
    }

    fn located(mut self, evidence: Option<Evidence>, table: &OffsetTable) -> Result<Self> {
        if let Some(ev) = evidence {
            self.citations = resolve(ev.start, ev.end, table)?;
            self.char_range = Some(CharRange {
                start: ev.start,
                end: ev.end,
            });
            self.evidence = ev.text;
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub document_id: String,
    pub findings: Vec<Finding>,
}

struct Evidence {
    text: String,
    start: usize,
    end: usize,
}

fn sentence_evidence(text: &str, keywords: &[&str]) -> Option<Evidence> {
    let m = find_sentence(text, keywords)?;
    let (start, end) = char_range(text, &m);
    Some(Evidence {
        text: m.as_str().trim().to_string(),
        start,
        end,
    })
}

/// Locate a verbatim excerpt in the document text.
fn excerpt_evidence(text: &str, excerpt: &str) -> Option<Evidence> {
    let excerpt = excerpt.trim();
    if excerpt.is_empty() {
        return None;
    }
    let byte = text.find(excerpt)?;
    let start = char_offset(text, byte);
    Some(Evidence {
        text: excerpt.to_string(),
        start,
        end: start + excerpt.chars().count(),
    })
}

fn notice_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*(?:days?|d)\b").expect("valid notice regex"))
}

/// First notice period in `text` shorter than 30 days.
fn short_notice_days(text: &str) -> Option<u32> {
    notice_regex()
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .find(|days| *days < MIN_NOTICE_DAYS)
}

fn is_broad_indemnity(indemnity: &str) -> bool {
    indemnity
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .any(|w| matches!(w.as_str(), "all" | "any" | "every" | "unlimited"))
}

/// Findings from the built-in rules.
pub fn rule_findings(document: &Document, fields: &ContractFields) -> Result<Vec<Finding>> {
    let text = &document.text;
    let table = document.offset_table()?;
    let lower = text.to_lowercase();
    let mut findings = Vec::new();

    if fields.auto_renewal == Some(true) {
        if let Some(days) = short_notice_days(text) {
            findings.push(
                Finding::new(
                    Severity::High,
                    "auto_renewal",
                    format!("Auto-renewal with only {} days notice", days),
                )
                .located(sentence_evidence(text, &["auto", "renew"]), &table)?,
            );
        }
    }

    if lower.contains("unlimited") && lower.contains("liability") {
        let evidence = sentence_evidence(text, &["unlimited", "liability"])
            .or_else(|| sentence_evidence(text, &["unlimited"]));
        findings.push(
            Finding::new(
                Severity::High,
                "liability",
                "Unlimited liability clause detected",
            )
            .located(evidence, &table)?,
        );
    }

    let capped = fields
        .liability_cap
        .as_ref()
        .and_then(|cap| cap.amount)
        .is_some_and(|amount| amount > 0.0);
    if !capped {
        let mut finding = Finding::new(Severity::Medium, "liability", "No liability cap specified");
        finding.evidence = "Liability cap field is null or zero".to_string();
        findings.push(finding);
    }

    if let Some(indemnity) = fields.indemnity.as_deref() {
        if is_broad_indemnity(indemnity) {
            let excerpt = truncate_chars(indemnity, MAX_EVIDENCE_CHARS);
            let mut finding = Finding::new(
                Severity::High,
                "indemnity",
                "Broad indemnity clause detected",
            )
            .located(excerpt_evidence(text, excerpt), &table)?;
            finding.evidence = excerpt.to_string();
            findings.push(finding);
        }
    }

    Ok(findings)
}

// ============ LLM ============

const AUDIT_SYSTEM_PROMPT: &str =
    "You are a contract risk analyst. Identify risky clauses and return JSON.";

#[derive(Deserialize)]
struct ModelFinding {
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    evidence: Option<String>,
}

fn audit_prompt(text: &str, fields: &ContractFields, max_context_chars: usize) -> Result<String> {
    Ok(format!(
        "Analyze this contract for risky clauses. Check for:\n\
         1. Auto-renewal with less than 30 days notice\n\
         2. Unlimited liability\n\
         3. Broad indemnity clauses\n\
         4. Unfavorable termination terms\n\
         5. Missing confidentiality protections\n\n\
         Contract text:\n{}\n\n\
         Extracted fields:\n{}\n\n\
         Return a JSON object with a \"findings\" array, each finding with:\n\
         - severity: \"high\", \"medium\", or \"low\"\n\
         - category: string describing the category\n\
         - description: string describing the issue\n\
         - evidence: string with a verbatim excerpt of the contract text",
        truncate_chars(text, max_context_chars),
        serde_json::to_string_pretty(fields)?
    ))
}

/// Convert the model's `findings` array, locating verbatim evidence.
fn model_findings(
    value: &serde_json::Value,
    document: &Document,
    table: &OffsetTable,
) -> Result<Vec<Finding>> {
    let raw: Vec<ModelFinding> = match value.get("findings") {
        Some(findings) => serde_json::from_value(findings.clone())?,
        None => Vec::new(),
    };

    raw.into_iter()
        .map(|f| {
            let evidence = f.evidence.unwrap_or_default();
            let mut finding = Finding::new(
                f.severity.as_deref().map(Severity::parse).unwrap_or(Severity::Medium),
                f.category.as_deref().unwrap_or("unknown"),
                f.description.unwrap_or_default(),
            )
            .located(excerpt_evidence(&document.text, &evidence), table)?;
            finding.evidence = evidence;
            Ok(finding)
        })
        .collect()
}

/// Rule findings followed by model findings when `llm` is set. A failed
/// model call is logged and contributes nothing.
pub async fn audit_document(
    document: &Document,
    fields: &ContractFields,
    llm: Option<&ChatClient>,
    max_context_chars: usize,
) -> Result<AuditReport> {
    let mut findings = rule_findings(document, fields)?;

    if let Some(client) = llm {
        let prompt = audit_prompt(&document.text, fields, max_context_chars)?;
        let table = document.offset_table()?;
        match client.complete_json(AUDIT_SYSTEM_PROMPT, &prompt).await {
            Ok(value) => match model_findings(&value, document, &table) {
                Ok(extra) => findings.extend(extra),
                Err(e) => tracing::warn!(error = %e, "ignoring malformed LLM audit findings"),
            },
            Err(e) => tracing::warn!(error = %e, "LLM audit failed, returning rule findings only"),
        }
    }

    tracing::info!(
        document_id = %document.id,
        findings = findings.len(),
        "audit complete"
    );

    Ok(AuditReport {
        document_id: document.id.clone(),
        findings,
    })
}

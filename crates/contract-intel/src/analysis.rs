//! Document-level field extraction and audit, with webhook notification.
//!
//! Both operations load the stored document text, so they work on any
//! ingested contract without re-reading the PDF. Each emits an
//! `extract_complete` / `audit_complete` event whether it succeeds or not.

use anyhow::Result;
use serde::Serialize;

use crate::audit::{audit_document, AuditReport, Severity};
use crate::config::Config;
use crate::context::AppContext;
use crate::fields::ContractFields;
use crate::webhook::{WebhookEvent, AUDIT_COMPLETE, EXTRACT_COMPLETE};

#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    pub document_id: String,
    #[serde(flatten)]
    pub fields: ContractFields,
}

pub async fn extract_fields(ctx: &AppContext, document_id: &str) -> Result<ExtractResponse> {
    let result = async {
        let document = ctx.document(document_id).await?;
        ctx.extractor.extract(&document.text).await
    }
    .await;

    match result {
        Ok(fields) => {
            ctx.webhook.emit(WebhookEvent::success(
                EXTRACT_COMPLETE,
                document_id,
                "Fields extracted successfully",
            ));
            Ok(ExtractResponse {
                document_id: document_id.to_string(),
                fields,
            })
        }
        Err(e) => {
            ctx.webhook
                .emit(WebhookEvent::error(EXTRACT_COMPLETE, document_id, e.to_string()));
            Err(e)
        }
    }
}

/// Extract fields, then run the rule and model audit over them.
pub async fn audit(ctx: &AppContext, document_id: &str) -> Result<AuditReport> {
    let result = async {
        let document = ctx.document(document_id).await?;
        let fields = ctx.extractor.extract(&document.text).await?;
        audit_document(
            &document,
            &fields,
            ctx.llm.as_deref(),
            ctx.config.llm.max_context_chars,
        )
        .await
    }
    .await;

    match result {
        Ok(report) => {
            ctx.webhook.emit(WebhookEvent::success(
                AUDIT_COMPLETE,
                document_id,
                format!("Audit completed with {} findings", report.findings.len()),
            ));
            Ok(report)
        }
        Err(e) => {
            ctx.webhook
                .emit(WebhookEvent::error(AUDIT_COMPLETE, document_id, e.to_string()));
            Err(e)
        }
    }
}

fn print_field(name: &str, value: Option<&str>) {
    println!("{:<16} {}", format!("{}:", name), value.unwrap_or("-"));
}

/// CLI entry point for `cintel extract <id>`.
pub async fn run_extract(config: &Config, document_id: &str, json: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let response = extract_fields(&ctx, document_id).await;
    ctx.close().await;
    let response = response?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let f = &response.fields;
    println!("--- Fields: {} ---", response.document_id);
    for party in &f.parties {
        println!(
            "party:           {}{}",
            party.name,
            party
                .role
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );
    }
    print_field("effective_date", f.effective_date.as_deref());
    print_field("term", f.term.as_deref());
    print_field("governing_law", f.governing_law.as_deref());
    print_field("payment_terms", f.payment_terms.as_deref());
    print_field("termination", f.termination.as_deref());
    print_field(
        "auto_renewal",
        f.auto_renewal.map(|b| if b { "yes" } else { "no" }),
    );
    print_field("confidentiality", f.confidentiality.as_deref());
    print_field("indemnity", f.indemnity.as_deref());
    let cap = f.liability_cap.as_ref().and_then(|c| {
        c.amount.map(|amount| {
            format!("{} {}", amount, c.currency.as_deref().unwrap_or("")).trim().to_string()
        })
    });
    print_field("liability_cap", cap.as_deref());
    for s in &f.signatories {
        println!(
            "signatory:       {}{}",
            s.name,
            s.title
                .as_deref()
                .map(|t| format!(", {}", t))
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// CLI entry point for `cintel audit <id>`.
pub async fn run_audit(config: &Config, document_id: &str, json: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let report = audit(&ctx, document_id).await;
    ctx.close().await;
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.findings.is_empty() {
        println!("No findings.");
        return Ok(());
    }

    for finding in &report.findings {
        let severity = match finding.severity {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        };
        println!("[{}] {}: {}", severity, finding.category, finding.description);
        for c in &finding.citations {
            println!("    page {}  chars {}..{}", c.page, c.start, c.end);
        }
        println!("    {}", finding.evidence.replace('\n', " "));
        println!();
    }
    Ok(())
}

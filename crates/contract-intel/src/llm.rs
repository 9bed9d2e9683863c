//! OpenAI chat-completions client shared by answer synthesis, field
//! extraction and the audit.
//!
//! Requests go through the same retry policy as the embedding providers.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::embedding::post_json_with_retry;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Thin chat-completions client. Construct with [`ChatClient::from_config`].
pub struct ChatClient {
    model: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatClient {
    /// Fails when `OPENAI_API_KEY` is not set.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Plain-text completion for a system + user prompt pair.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = self.request_body(system, user, false);
        let json = post_json_with_retry(
            &self.client,
            CHAT_URL,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        message_content(&json)
    }

    /// Completion in JSON mode, parsed into a value.
    pub async fn complete_json(&self, system: &str, user: &str) -> Result<serde_json::Value> {
        let body = self.request_body(system, user, true);
        let json = post_json_with_retry(
            &self.client,
            CHAT_URL,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        let content = message_content(&json)?;
        serde_json::from_str(strip_code_fence(&content)).context("model returned invalid JSON")
    }

    fn request_body(&self, system: &str, user: &str, json_mode: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": 0.1,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        if json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

fn message_content(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

/// Models occasionally wrap JSON in a Markdown fence even in JSON mode.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

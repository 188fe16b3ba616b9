use crate::capability::{GenerationError, TextGenerate};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(client: Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn extract_message_text(raw: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(raw).ok()?;

    if let Some(err) = root.get("error") {
        if let Some(message) = err.get("message").and_then(|v| v.as_str()) {
            warn!("generation API error message: {message}");
        }
        return None;
    }

    root.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|text| text.trim().to_string())
}

#[async_trait]
impl TextGenerate for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt},
            ],
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let snippet = raw.chars().take(400).collect::<String>();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: snippet,
            });
        }

        match extract_message_text(&raw) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(GenerationError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  hello  "}}]}"#;
        assert_eq!(extract_message_text(raw), Some("hello".to_string()));
    }

    #[test]
    fn error_payloads_yield_none() {
        let raw = r#"{"error":{"message":"rate limited","type":"rate_limit"}}"#;
        assert_eq!(extract_message_text(raw), None);
        assert_eq!(extract_message_text("not json"), None);
    }
}

//! Completion provider seam and the HTTP chat client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Result of one completion attempt.
///
/// The per-attempt state machine is `Requesting → Ok | RateLimited |
/// Failed`; transport errors and timeouts are `Failed`, never a crash.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// The provider returned text.
    Ok(String),
    /// The provider rejected the request due to rate limiting. Rate
    /// limits are global to the account, not prompt-specific.
    RateLimited,
    /// Transport failure, timeout or non-success status.
    Failed(String),
}

/// A completion provider for one prompt at a time.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str) -> CompletionOutcome;
}

/// OpenAI-compatible chat-completions client.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CompletionBackend for ChatClient {
    async fn complete(&self, model: &str, prompt: &str) -> CompletionOutcome {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(model, error = %e, "Completion transport failure");
                return CompletionOutcome::Failed(e.to_string());
            }
        };

        let status = resp.status();
        if status.as_u16() == 429 {
            warn!(model, "Completion rate limited");
            return CompletionOutcome::RateLimited;
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(model, status = status.as_u16(), "Completion API error");
            return CompletionOutcome::Failed(format!("{status} - {text}"));
        }

        let json: serde_json::Value = match resp.json().await {
            Ok(json) => json,
            Err(e) => return CompletionOutcome::Failed(e.to_string()),
        };

        match json["choices"][0]["message"]["content"].as_str() {
            Some(content) => {
                debug!(model, chars = content.len(), "Completion succeeded");
                CompletionOutcome::Ok(content.to_string())
            }
            None => CompletionOutcome::Failed("response missing message content".into()),
        }
    }
}

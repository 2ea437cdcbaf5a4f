//! Generation clients for the pipeline stages.
//!
//! Each stage talks to an OpenAI-compatible `chat/completions` endpoint
//! through its own [`ChatClient`], gated by a stage-owned [`RateLimiter`].
//! The [`Generate`] trait is the seam the pipeline depends on, so tests run
//! against deterministic stubs instead of the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;
use crate::rate_limit::RateLimiter;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const ERROR_BODY_LIMIT: usize = 300;

/// Capability interface for one generation stage: prompt in, text out.
#[async_trait]
pub trait Generate: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// One chat-completions client with its own model, endpoint, and bucket.
pub struct ChatClient {
    client: Client,
    url: String,
    model: String,
    api_key: String,
    limiter: RateLimiter,
}

impl ChatClient {
    pub fn new(url: String, model: String, api_key: String, limiter: RateLimiter) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .pool_max_idle_per_host(8)
                .build()
                .expect("Failed to create HTTP client"),
            url,
            model,
            api_key,
            limiter,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generate for ChatClient {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.limiter.acquire().await;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status,
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| {
                UpstreamError::MalformedResponse("response has no message content".to_string())
            })
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

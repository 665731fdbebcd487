/// LLM Client — the single point of entry for chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the completion endpoint directly.
/// Every call is ONE upstream request. Retry belongs to the reply pipeline so each
/// attempt stays individually observable and rate-limited by the admission queue.
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::reply::sanitizer::redact_secret;

pub mod prompts;
#[cfg(test)]
pub mod testing;

pub const DEFAULT_CHAT_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 100;
const TEMPERATURE: f64 = 0.7;
const TOP_P: f64 = 0.9;
const FREQUENCY_PENALTY: f64 = 0.5;
const PRESENCE_PENALTY: f64 = 0.5;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Classified result of exactly one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Success { raw_text: String },
    /// Non-200 response. `status` is `None` when the request never got a response.
    UpstreamError { status: Option<u16>, body: String },
    Timeout,
    Malformed { reason: String },
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionOutcome::Success { raw_text } => {
                write!(f, "success ({} chars)", raw_text.chars().count())
            }
            CompletionOutcome::UpstreamError {
                status: Some(status),
                body,
            } => write!(f, "upstream returned {status}: {body}"),
            CompletionOutcome::UpstreamError { status: None, body } => {
                write!(f, "upstream unreachable: {body}")
            }
            CompletionOutcome::Timeout => write!(f, "upstream timed out"),
            CompletionOutcome::Malformed { reason } => write!(f, "malformed response: {reason}"),
        }
    }
}

/// Seam between the pipeline and the upstream endpoint.
///
/// Carried as `Arc<dyn Completer>` so the pipeline and admission queue can be
/// driven by a scripted backend in tests.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, system: &str, user: &str, credential: &str) -> CompletionOutcome;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    url: String,
    model: String,
}

impl CompletionClient {
    pub fn new(url: String, model: String) -> Result<Self, LlmError> {
        Self::with_timeout(url, model, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: String, model: String, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Completer for CompletionClient {
    async fn complete(&self, system: &str, user: &str, credential: &str) -> CompletionOutcome {
        let request_body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            frequency_penalty: FREQUENCY_PENALTY,
            presence_penalty: PRESENCE_PENALTY,
        };

        let response = match self
            .client
            .post(&self.url)
            .bearer_auth(credential)
            .json(&request_body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!("Completion request timed out");
                return CompletionOutcome::Timeout;
            }
            Err(e) => {
                let body = redact_secret(&e.to_string(), credential);
                warn!("Completion request failed: {body}");
                return CompletionOutcome::UpstreamError { status: None, body };
            }
        };

        let status = response.status();
        debug!("Completion API response status: {status}");

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let body = redact_secret(&body, credential);
            warn!("Completion API returned {status}: {body}");
            return CompletionOutcome::UpstreamError {
                status: Some(status.as_u16()),
                body,
            };
        }

        match response.text().await {
            Ok(body) => parse_completion(&body),
            Err(e) if e.is_timeout() => CompletionOutcome::Timeout,
            Err(e) => CompletionOutcome::Malformed {
                reason: format!("failed to read response body: {e}"),
            },
        }
    }
}

/// Extracts `choices[0].message.content` from a raw response body.
fn parse_completion(body: &str) -> CompletionOutcome {
    let parsed: ChatResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => {
            return CompletionOutcome::Malformed {
                reason: format!("invalid JSON: {e}"),
            }
        }
    };

    let Some(first) = parsed.choices.and_then(|c| c.into_iter().next()) else {
        return CompletionOutcome::Malformed {
            reason: "response has no choices".to_string(),
        };
    };

    match first.message.and_then(|m| m.content) {
        Some(content) => CompletionOutcome::Success {
            raw_text: trim_reply(&content).to_string(),
        },
        None => CompletionOutcome::Malformed {
            reason: "first choice has no message content".to_string(),
        },
    }
}

/// Strips surrounding whitespace and quote characters the model tends to wrap replies in.
fn trim_reply(text: &str) -> &str {
    text.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”'))
        .trim()
}

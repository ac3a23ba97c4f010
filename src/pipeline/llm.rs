//! Model interaction: send a flyer plus prompt, get completion text back.
//!
//! Extraction sits behind the [`Extractor`] trait so the service can be
//! swapped or mocked; the orchestrator only ever sees
//! "document + prompt → text". All prompt engineering lives in
//! [`crate::prompts`] and all output repair in
//! [`crate::pipeline::normalize`], keeping this module to request plumbing.
//!
//! There is no retry loop: any transport, auth or rate-limit failure is
//! returned as a [`FileError`] and the orchestrator moves on to the next
//! flyer.

use crate::config::ExtractionConfig;
use crate::error::{DealsError, FileError};
use crate::pipeline::encode::DocumentPayload;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Text returned by the model for one flyer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Raw completion text, expected to hold a JSON array.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// True when the model stopped because it ran out of output tokens.
    pub hit_token_limit: bool,
}

impl Completion {
    /// A completion with no usage accounting, for mocks and tests.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// The capability "given document bytes and a prompt, return completion text".
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Send one document and the prompt, returning the completion.
    async fn complete(
        &self,
        document: &DocumentPayload,
        prompt: &str,
    ) -> Result<Completion, FileError>;

    /// Short provider name used in logs and error messages.
    fn name(&self) -> &str;
}

/// Anthropic Messages API client with PDF `document` support.
pub struct AnthropicExtractor {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Document { source: DocumentSource<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct DocumentSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicExtractor {
    const PROVIDER: &'static str = "anthropic";
    const API_VERSION: &'static str = "2023-06-01";

    /// Build a client from the run configuration and an API key.
    pub fn new(api_key: &str, config: &ExtractionConfig) -> Result<Self, DealsError> {
        if api_key.trim().is_empty() {
            return Err(DealsError::ExtractorNotConfigured {
                hint: "The Anthropic API key is empty. Pass --api-key or set ANTHROPIC_API_KEY."
                    .into(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| DealsError::ExtractorNotConfigured {
                hint: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn transport_error(&self, e: reqwest::Error) -> FileError {
        if e.is_timeout() {
            FileError::Timeout {
                provider: Self::PROVIDER.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            FileError::Transport {
                provider: Self::PROVIDER.to_string(),
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Extractor for AnthropicExtractor {
    async fn complete(
        &self,
        document: &DocumentPayload,
        prompt: &str,
    ) -> Result<Completion, FileError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Document {
                        source: DocumentSource {
                            kind: "base64",
                            media_type: document.media_type,
                            data: &document.data,
                        },
                    },
                    ContentBlock::Text { text: prompt },
                ],
            }],
        };

        debug!(
            "Sending {} byte document to {} ({})",
            document.byte_len, self.model, Self::PROVIDER
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after_secs, body));
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|e| self.transport_error(e))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .find_map(|b| b.text)
            .ok_or_else(|| FileError::EmptyCompletion {
                provider: Self::PROVIDER.to_string(),
            })?;

        let hit_token_limit = parsed.stop_reason.as_deref() == Some("max_tokens");
        if hit_token_limit {
            warn!(
                "Completion stopped at the {} token limit; output is likely truncated",
                self.max_tokens
            );
        }

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or_default();
        debug!(
            "{} input tokens, {} output tokens",
            input_tokens, output_tokens
        );

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
            hit_token_limit,
        })
    }

    fn name(&self) -> &str {
        Self::PROVIDER
    }
}

/// Map a non-success HTTP status to the matching [`FileError`].
fn status_error(status: StatusCode, retry_after_secs: Option<u64>, body: String) -> FileError {
    let provider = AnthropicExtractor::PROVIDER.to_string();
    let detail = api_error_message(&body).unwrap_or(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FileError::Auth { provider, detail },
        StatusCode::TOO_MANY_REQUESTS => FileError::RateLimited {
            provider,
            retry_after_secs,
        },
        _ => FileError::Api {
            provider,
            status: status.as_u16(),
            detail,
        },
    }
}

/// Pull `error.message` out of an API error body, if it has one.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

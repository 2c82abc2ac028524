//! Vision model transports.
//!
//! Two hosted backends are supported behind one [`VisionModel`] trait:
//!
//! * **Gemini** — Google's `generateContent` API, document attached as
//!   base64 `inline_data`. Handles PDFs natively, so a multi-page bill goes
//!   up in a single call.
//! * **OpenRouter** — OpenAI-style chat completions, document attached as a
//!   base64 data URI `image_url` part.
//!
//! [`resolve_model`] picks a backend from configuration plus the
//! environment (`GEMINI_API_KEY` / `OPENROUTER_API_KEY`). Request and
//! response envelopes are typed out fully below; only the fields we read
//! are declared, serde ignores the rest.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::schema::TokenUsage;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";
const OPENROUTER_DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

/// A model's answer: the raw text plus token accounting when reported.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// A vision-capable model that can read a document and answer a prompt.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Backend name for logs and the health endpoint ("gemini", "openrouter").
    fn name(&self) -> &str;

    /// Model identifier as sent to the backend.
    fn model_id(&self) -> &str;

    /// Send the prompt and document, return the model's text reply.
    async fn extract(
        &self,
        prompt: &str,
        mime_type: &str,
        content: &[u8],
    ) -> Result<ModelReply, ExtractError>;
}

/// Resolve a usable backend from config and environment.
///
/// Resolution order: an explicit `provider_name` wins; otherwise whichever
/// of `GEMINI_API_KEY` / `OPENROUTER_API_KEY` is set (Gemini first). No key
/// at all is a configuration error with a hint naming both variables.
pub fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn VisionModel>, ExtractError> {
    let gemini_key = non_empty_env("GEMINI_API_KEY");
    let openrouter_key = non_empty_env("OPENROUTER_API_KEY");

    let provider = match config.provider_name.as_deref() {
        Some(name) => name.to_ascii_lowercase(),
        None if gemini_key.is_some() => "gemini".to_string(),
        None if openrouter_key.is_some() => "openrouter".to_string(),
        None => {
            return Err(ExtractError::ProviderNotConfigured {
                provider: "auto".into(),
                hint: "Set GEMINI_API_KEY or OPENROUTER_API_KEY.".into(),
            })
        }
    };

    match provider.as_str() {
        "gemini" => {
            let key = gemini_key.ok_or_else(|| ExtractError::ProviderNotConfigured {
                provider: "gemini".into(),
                hint: "Set GEMINI_API_KEY.".into(),
            })?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string());
            Ok(Arc::new(GeminiModel::new(
                key,
                model,
                config.model_timeout_secs,
            )?))
        }
        "openrouter" => {
            let key = openrouter_key.ok_or_else(|| ExtractError::ProviderNotConfigured {
                provider: "openrouter".into(),
                hint: "Set OPENROUTER_API_KEY.".into(),
            })?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| OPENROUTER_DEFAULT_MODEL.to_string());
            Ok(Arc::new(OpenRouterModel::new(
                key,
                model,
                config.model_timeout_secs,
            )?))
        }
        other => Err(ExtractError::ProviderNotConfigured {
            provider: other.to_string(),
            hint: "Known providers: gemini, openrouter.".into(),
        }),
    }
}

/// True when at least one provider API key is present in the environment.
pub fn any_key_configured() -> bool {
    non_empty_env("GEMINI_API_KEY").is_some() || non_empty_env("OPENROUTER_API_KEY").is_some()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ExtractError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::Internal(format!("failed to build HTTP client: {e}")))
}

fn map_transport_error(e: reqwest::Error, timeout_secs: u64) -> ExtractError {
    if e.is_timeout() {
        ExtractError::ModelTimeout { secs: timeout_secs }
    } else {
        ExtractError::ModelInvocationFailed {
            detail: e.to_string(),
        }
    }
}

// ── Gemini ───────────────────────────────────────────────────────────────

pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl GeminiModel {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self, ExtractError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            model,
            timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inline_data")]
        inline_data: GeminiInlineData<'a>,
    },
}

#[derive(Serialize)]
struct GeminiInlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<i64>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<i64>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<i64>,
}

#[async_trait]
impl VisionModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn extract(
        &self,
        prompt: &str,
        mime_type: &str,
        content: &[u8],
    ) -> Result<ModelReply, ExtractError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text { text: prompt },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type,
                            data: base64::engine::general_purpose::STANDARD.encode(content),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::ModelInvocationFailed {
                detail: format!("Gemini returned HTTP {status}: {detail}"),
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::ModelInvocationFailed {
                detail: format!("malformed Gemini response envelope: {e}"),
            })?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| ExtractError::ModelInvocationFailed {
                detail: "Gemini response contained no candidates".into(),
            })?;

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                total: u.total_token_count,
                input: u.prompt_token_count,
                output: u.candidates_token_count,
            })
            .unwrap_or_default();

        debug!(model = %self.model, chars = text.len(), "gemini reply received");
        Ok(ModelReply { text, usage })
    }
}

// ── OpenRouter ───────────────────────────────────────────────────────────

pub struct OpenRouterModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenRouterModel {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self, ExtractError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            model,
            timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ChatPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ChatImageUrl },
}

#[derive(Serialize)]
struct ChatImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    total_tokens: Option<i64>,
}

#[async_trait]
impl VisionModel for OpenRouterModel {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn extract(
        &self,
        prompt: &str,
        mime_type: &str,
        content: &[u8],
    ) -> Result<ModelReply, ExtractError> {
        let data_uri = format!(
            "data:{mime_type};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(content)
        );
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ChatPart::Text { text: prompt },
                    ChatPart::ImageUrl {
                        image_url: ChatImageUrl { url: data_uri },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post("https://openrouter.ai/api/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::ModelInvocationFailed {
                detail: format!("OpenRouter returned HTTP {status}: {detail}"),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::ModelInvocationFailed {
                detail: format!("malformed OpenRouter response envelope: {e}"),
            })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ExtractError::ModelInvocationFailed {
                detail: "OpenRouter response contained no choices".into(),
            })?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                total: u.total_tokens,
                input: u.prompt_tokens,
                output: u.completion_tokens,
            })
            .unwrap_or_default();

        debug!(model = %self.model, chars = text.len(), "openrouter reply received");
        Ok(ModelReply { text, usage })
    }
}

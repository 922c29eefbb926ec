//! HTTP client for the hosted Gemini `generateContent` endpoint.
//!
//! Two deployments speak the same request body:
//!
//! | Auth | Endpoint |
//! |------|----------|
//! | API key (`x-goog-api-key`) | `generativelanguage.googleapis.com/v1beta/models/{model}:generateContent` |
//! | Vertex AI bearer token | `{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent` |
//!
//! Binary parts (the PDF, previous-step files) travel base64-encoded as
//! `inlineData`. Only the first candidate is read.

use crate::error::ExtractError;
use crate::pipeline::model::{
    ContentPart, GenerationPolicy, GenerativeModel, ModelRequest, ModelResponse, SafetySetting,
    TokenUsage,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// How requests are authenticated, which also selects the URL scheme.
#[derive(Clone)]
pub enum GeminiAuth {
    /// Gemini Developer API key.
    ApiKey(String),
    /// Vertex AI with an OAuth access token.
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
}

impl fmt::Debug for GeminiAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeminiAuth::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            GeminiAuth::Vertex {
                project, location, ..
            } => f
                .debug_struct("Vertex")
                .field("project", project)
                .field("location", location)
                .field("access_token", &"<redacted>")
                .finish(),
        }
    }
}

/// [`GenerativeModel`] backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    model: String,
    auth: GeminiAuth,
    url: String,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Build a client. `endpoint` replaces the default API base URL.
    pub fn new(
        model: impl Into<String>,
        auth: GeminiAuth,
        endpoint: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, ExtractError> {
        let model = model.into();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;
        let url = generate_content_url(&model, &auth, endpoint);
        debug!("Gemini endpoint: {}", url);

        Ok(Self {
            http,
            model,
            auth,
            url,
            timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn generate_content_url(model: &str, auth: &GeminiAuth, endpoint: Option<&str>) -> String {
    match auth {
        GeminiAuth::ApiKey(_) => {
            let base = endpoint.unwrap_or(GEMINI_API_BASE).trim_end_matches('/');
            format!("{base}/models/{model}:generateContent")
        }
        GeminiAuth::Vertex {
            project, location, ..
        } => {
            let base = match endpoint {
                Some(e) => e.trim_end_matches('/').to_string(),
                None => format!("https://{location}-aiplatform.googleapis.com/v1"),
            };
            format!(
                "{base}/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
            )
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_content(&self, request: &ModelRequest) -> Result<ModelResponse, ExtractError> {
        let body = WireRequest::from_request(request);
        let builder = self.http.post(&self.url).json(&body);
        let builder = match &self.auth {
            GeminiAuth::ApiKey(key) => builder.header("x-goog-api-key", key),
            GeminiAuth::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        };

        let response = builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out after {}s", self.timeout_secs)
            } else {
                e.to_string()
            };
            ExtractError::ModelInvocation { message }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::ModelInvocation {
                message: format!("HTTP {status}: {}", detail.trim()),
            });
        }

        let wire: WireResponse =
            response
                .json()
                .await
                .map_err(|e| ExtractError::ModelInvocation {
                    message: format!("unreadable response body: {e}"),
                })?;
        wire.into_model_response()
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    generation_config: &'a GenerationPolicy,
    safety_settings: &'a [SafetySetting],
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a ModelRequest) -> Self {
        let system_instruction = if request.system_instruction.is_empty() {
            None
        } else {
            Some(WireContent {
                role: None,
                parts: request
                    .system_instruction
                    .iter()
                    .map(|t| WirePart::text(t.clone()))
                    .collect(),
            })
        };

        Self {
            system_instruction,
            contents: vec![WireContent {
                role: Some("user"),
                parts: request.contents.iter().map(WirePart::from).collect(),
            }],
            generation_config: &request.generation,
            safety_settings: &request.safety.settings,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireBlob>,
}

impl WirePart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }
}

impl From<&ContentPart> for WirePart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text(t) => WirePart::text(t.clone()),
            ContentPart::InlineData { mime_type, data } => Self {
                text: None,
                inline_data: Some(WireBlob {
                    mime_type: mime_type.clone(),
                    data: STANDARD.encode(data),
                }),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    usage_metadata: Option<WireUsage>,
    #[serde(default)]
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireCandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Value,
}

#[derive(Debug, Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<WireResponsePart>,
}

#[derive(Debug, Deserialize)]
struct WireResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl WireResponse {
    fn into_model_response(self) -> Result<ModelResponse, ExtractError> {
        let usage = self
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "NO_CANDIDATES".to_string());
            warn!("Model returned no candidates: {}", reason);
            return Err(ExtractError::EmptyResponse {
                finish_reason: reason,
            });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ExtractError::EmptyResponse {
                finish_reason: candidate
                    .finish_reason
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
            });
        }

        Ok(ModelResponse {
            text,
            finish_reason: candidate.finish_reason,
            safety_ratings: candidate.safety_ratings,
            usage,
        })
    }
}

//! Model-call wrapper: every interaction with the generative model goes
//! through [`generate`].
//!
//! The request carries two explicit policy objects built once per call:
//!
//! * [`GenerationPolicy`] — deterministic decoding (temperature 0, top-p 0,
//!   top-k 1, one candidate), an output-token bound, and a JSON response
//!   constrained by the stage's response schema.
//! * [`SafetyPolicy`] — every harm category set to `BLOCK_NONE`.
//!
//! There is no retry and no streaming: one call, one answer, or an error that
//! aborts the stage.

use crate::error::ExtractError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info};

/// MIME type of the source document part.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// MIME type used to attach a previous step's saved output.
pub const TEXT_MIME_TYPE: &str = "text/plain";

/// Response MIME type that switches the model into JSON mode.
pub const JSON_MIME_TYPE: &str = "application/json";

// ── Policies ─────────────────────────────────────────────────────────────

/// Decoding configuration sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPolicy {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub candidate_count: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
    pub response_schema: Value,
}

impl GenerationPolicy {
    /// Greedy, single-candidate decoding returning JSON that conforms to
    /// `response_schema`.
    pub fn deterministic(response_schema: Value, max_output_tokens: u32) -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.0,
            top_k: 1,
            candidate_count: 1,
            max_output_tokens,
            response_mime_type: JSON_MIME_TYPE.to_string(),
            response_schema,
        }
    }
}

/// Harm categories recognised by the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 5] = [
        HarmCategory::Unspecified,
        HarmCategory::DangerousContent,
        HarmCategory::HateSpeech,
        HarmCategory::Harassment,
        HarmCategory::SexuallyExplicit,
    ];
}

/// Blocking threshold applied to a harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// One category → threshold entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Content-filter settings sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyPolicy {
    pub settings: Vec<SafetySetting>,
}

impl SafetyPolicy {
    /// Disable blocking for every recognised harm category.
    pub fn block_none() -> Self {
        Self {
            settings: HarmCategory::ALL
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: HarmBlockThreshold::BlockNone,
                })
                .collect(),
        }
    }

    pub fn threshold(&self, category: HarmCategory) -> Option<HarmBlockThreshold> {
        self.settings
            .iter()
            .find(|s| s.category == category)
            .map(|s| s.threshold)
    }
}

// ── Request / response ───────────────────────────────────────────────────

/// One element of the ordered request content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }

    /// The source document.
    pub fn pdf(bytes: Vec<u8>) -> Self {
        ContentPart::InlineData {
            mime_type: PDF_MIME_TYPE.to_string(),
            data: bytes,
        }
    }

    /// A saved step output attached as a plain-text file.
    pub fn plain_text_file(bytes: Vec<u8>) -> Self {
        ContentPart::InlineData {
            mime_type: TEXT_MIME_TYPE.to_string(),
            data: bytes,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            ContentPart::Text(_) => TEXT_MIME_TYPE,
            ContentPart::InlineData { mime_type, .. } => mime_type,
        }
    }

    /// Text carried by this part, if it is text (inline `text/plain` included).
    pub fn as_text(&self) -> Option<String> {
        match self {
            ContentPart::Text(t) => Some(t.clone()),
            ContentPart::InlineData { mime_type, data } if mime_type == TEXT_MIME_TYPE => {
                Some(String::from_utf8_lossy(data).into_owned())
            }
            ContentPart::InlineData { .. } => None,
        }
    }
}

/// A complete model call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: Vec<String>,
    pub contents: Vec<ContentPart>,
    pub generation: GenerationPolicy,
    pub safety: SafetyPolicy,
}

/// Token accounting reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub output_tokens: u64,
}

/// The first candidate of a model answer plus its auxiliary metadata.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub text: String,
    pub finish_reason: Option<String>,
    /// Passed through verbatim for logging.
    pub safety_ratings: Value,
    pub usage: TokenUsage,
}

/// A hosted generative model that can answer one request.
///
/// Implementations must be `Send + Sync` so a model can be shared through an
/// `Arc` in [`crate::config::ExtractionConfig`]. The pipeline never issues two
/// calls at once.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Send one request and return the first candidate.
    async fn generate_content(&self, request: &ModelRequest) -> Result<ModelResponse, ExtractError>;
}

/// Invoke the model once and parse its answer as JSON.
///
/// # Errors
/// * [`ExtractError::ResponseDecode`] — the answer text is not valid JSON
/// * anything the model implementation returns (invocation failures)
pub async fn generate(
    model: &dyn GenerativeModel,
    system_instruction: Vec<String>,
    contents: Vec<ContentPart>,
    response_schema: Value,
    max_output_tokens: u32,
) -> Result<Value, ExtractError> {
    let request = ModelRequest {
        system_instruction,
        contents,
        generation: GenerationPolicy::deterministic(response_schema, max_output_tokens),
        safety: SafetyPolicy::block_none(),
    };

    info!(
        "Calling {} with {} content parts",
        model.model_name(),
        request.contents.len()
    );
    let start = Instant::now();

    let response = model.generate_content(&request).await.map_err(|e| {
        error!("Error generating response: {}", e);
        e
    })?;

    let output = parse_json_response(&response.text)?;

    debug!("Response generated: {}", output);
    info!(
        "Model answered in {}ms ({} prompt / {} output tokens)",
        start.elapsed().as_millis(),
        response.usage.prompt_tokens,
        response.usage.output_tokens
    );
    info!(
        "Finish reason: {}",
        response.finish_reason.as_deref().unwrap_or("unknown")
    );
    info!("Safety ratings: {}", response.safety_ratings);

    Ok(output)
}

/// Parse the model's text answer as JSON, ignoring surrounding whitespace.
pub fn parse_json_response(text: &str) -> Result<Value, ExtractError> {
    serde_json::from_str(text.trim()).map_err(|source| {
        error!("Error decoding JSON response: {}", source);
        ExtractError::ResponseDecode {
            source,
            snippet: text.trim().chars().take(120).collect(),
        }
    })
}

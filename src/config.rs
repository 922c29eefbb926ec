//! Configuration types for document extraction runs.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The config is passed into each component when
//! it is constructed; nothing reads a process-wide settings object.
//!
//! Path conventions live in [`DataLayout`], derived from `data_dir`, so every
//! component agrees on where documents, templates and outputs are.

use crate::error::ExtractError;
use crate::pipeline::model::GenerativeModel;
use crate::progress::ProgressCallback;
use crate::workflow::{Stage, Workflow};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-002";

/// Vertex AI region used when none is configured.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use edgequake_docextract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .data_dir("data")
///     .model("gemini-1.5-flash-002")
///     .max_output_tokens(4096)
///     .build()
///     .unwrap();
/// assert_eq!(config.layout().docs_dir(), std::path::Path::new("data/docs"));
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Root of the data tree (documents, templates, outputs). Default: `data`.
    pub data_dir: PathBuf,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Pre-constructed model. Takes precedence over every credential field.
    pub provider: Option<Arc<dyn GenerativeModel>>,

    /// Gemini Developer API key.
    pub api_key: Option<String>,

    /// Google Cloud project; selects the Vertex AI endpoint when set.
    pub project: Option<String>,

    /// Vertex AI region. Default: [`DEFAULT_LOCATION`].
    pub location: String,

    /// OAuth bearer token for Vertex AI.
    pub access_token: Option<String>,

    /// Base URL override for the model endpoint (proxies, test servers).
    pub endpoint: Option<String>,

    /// Upper bound on generated tokens per call. Default: 8192.
    pub max_output_tokens: u32,

    /// Per-call HTTP timeout in seconds. Default: 300.
    ///
    /// A dense multi-page PDF can take minutes to answer; the service's own
    /// deadline is the only other bound.
    pub api_timeout_secs: u64,

    /// Optional observer for run, step and batch events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            api_key: None,
            project: None,
            location: DEFAULT_LOCATION.to_string(),
            access_token: None,
            endpoint: None,
            max_output_tokens: 8192,
            api_timeout_secs: 300,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("data_dir", &self.data_dir)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn GenerativeModel>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("project", &self.project)
            .field("location", &self.location)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Path conventions rooted at `data_dir`.
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn GenerativeModel>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.config.project = Some(project.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = location.into();
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = Some(url.into());
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_output_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.location.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("location must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Data layout ──────────────────────────────────────────────────────────

/// Where documents, templates and run artefacts live under the data root.
///
/// ```text
/// <root>/docs/<file_id>.pdf
/// <root>/templates/<workflow>/...
/// <root>/output/<workflow>/<file_id>/out_step[_<n>].txt
/// <root>/validation/generated/<workflow>/<file_id>.jsonl
/// <root>/validation/expected/<file_id>.jsonl
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join("docs")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn document_path(&self, file_id: &str) -> PathBuf {
        self.docs_dir().join(format!("{file_id}.pdf"))
    }

    /// Where a stage persists the model's raw JSON answer.
    pub fn step_output_path(&self, stage: Stage, file_id: &str) -> PathBuf {
        let dir = self
            .root
            .join("output")
            .join(stage.workflow().as_str())
            .join(file_id);
        match stage {
            Stage::SingleStep => dir.join("out_step.txt"),
            Stage::MultiStep(step) => dir.join(format!("out_step_{}.txt", step.index())),
        }
    }

    pub fn generated_jsonl_path(&self, workflow: Workflow, file_id: &str) -> PathBuf {
        self.root
            .join("validation")
            .join("generated")
            .join(workflow.as_str())
            .join(format!("{file_id}.jsonl"))
    }

    pub fn expected_jsonl_path(&self, file_id: &str) -> PathBuf {
        self.root
            .join("validation")
            .join("expected")
            .join(format!("{file_id}.jsonl"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Step;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.data_dir, PathBuf::from("data"));
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.max_output_tokens, 8192);
        assert_eq!(c.location, "us-central1");
        assert!(c.provider.is_none());
    }

    #[test]
    fn builder_rejects_zero_tokens() {
        let err = ExtractionConfig::builder()
            .max_output_tokens(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_empty_model() {
        assert!(ExtractionConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn debug_redacts_credentials() {
        let c = ExtractionConfig::builder()
            .api_key("sk-very-secret")
            .access_token("ya29.token")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-very-secret"));
        assert!(!dbg.contains("ya29.token"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn layout_paths() {
        let l = DataLayout::new("/srv/data");
        assert_eq!(
            l.document_path("845"),
            PathBuf::from("/srv/data/docs/845.pdf")
        );
        assert_eq!(
            l.step_output_path(Stage::MultiStep(Step::Two), "845"),
            PathBuf::from("/srv/data/output/multi_step/845/out_step_2.txt")
        );
        assert_eq!(
            l.step_output_path(Stage::SingleStep, "845"),
            PathBuf::from("/srv/data/output/single_step/845/out_step.txt")
        );
        assert_eq!(
            l.generated_jsonl_path(Workflow::MultiStep, "845"),
            PathBuf::from("/srv/data/validation/generated/multi_step/845.jsonl")
        );
        assert_eq!(
            l.expected_jsonl_path("845"),
            PathBuf::from("/srv/data/validation/expected/845.jsonl")
        );
    }
}

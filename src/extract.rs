//! Pipeline runners: single-step and multi-step extraction for one document.
//!
//! ## Stage chain
//!
//! ```text
//! single_step:  PDF ──▶ [extract] ──▶ out_step.txt ──▶ <file_id>.jsonl ("metrics")
//!
//! multi_step:   PDF ──▶ [step 0] ──▶ out_step_0.txt
//!               PDF ──▶ [step 1] ──▶ out_step_1.txt ─┐
//!               PDF + out_step_1 ──▶ [step 2] ──▶ out_step_2.txt ─┐
//!               PDF + out_step_2 ──▶ [step 3] ──▶ out_step_3.txt ──▶ <file_id>.jsonl
//! ```
//!
//! Every stage loads its own templates, sends `[pdf, previous output?, user
//! instruction]` to the model, and persists the JSON answer before the next
//! stage starts. The previous output is re-read from disk, so what the model
//! sees is exactly the audit artefact left behind. Any failure aborts the run;
//! there is no resume-from-step.

use crate::config::{DataLayout, ExtractionConfig};
use crate::error::ExtractError;
use crate::io::{convert_json_to_jsonl, require_binary, save_json};
use crate::output::RunOutput;
use crate::pipeline::gemini::{GeminiAuth, GeminiClient};
use crate::pipeline::model::{generate, ContentPart, GenerativeModel};
use crate::templates::TemplateLoader;
use crate::workflow::{Stage, Workflow};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Runs extraction workflows against one configured model.
pub struct Extractor {
    config: ExtractionConfig,
    layout: DataLayout,
    templates: TemplateLoader,
    model: Arc<dyn GenerativeModel>,
}

impl Extractor {
    /// Build an extractor, resolving the model from config or environment.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let model = resolve_model(&config)?;
        Ok(Self::with_model(config, model))
    }

    /// Build an extractor around an already-constructed model.
    pub fn with_model(config: ExtractionConfig, model: Arc<dyn GenerativeModel>) -> Self {
        let layout = config.layout();
        let templates = TemplateLoader::new(layout.templates_dir());
        Self {
            config,
            layout,
            templates,
            model,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Run `workflow` on `<data_dir>/docs/<file_id>.pdf`.
    pub async fn run(&self, workflow: Workflow, file_id: &str) -> Result<RunOutput, ExtractError> {
        let pdf_path = self.layout.document_path(file_id);
        self.run_document(workflow, file_id, &pdf_path).await
    }

    pub async fn run_single_step(&self, file_id: &str) -> Result<RunOutput, ExtractError> {
        self.run(Workflow::SingleStep, file_id).await
    }

    pub async fn run_multi_step(&self, file_id: &str) -> Result<RunOutput, ExtractError> {
        self.run(Workflow::MultiStep, file_id).await
    }

    /// Run `workflow` on an explicit PDF path; outputs are keyed by `file_id`.
    pub async fn run_document(
        &self,
        workflow: Workflow,
        file_id: &str,
        pdf_path: &std::path::Path,
    ) -> Result<RunOutput, ExtractError> {
        info!("Running {} extraction for file: {}", workflow, file_id);
        let start = Instant::now();

        let result = self.run_stages(workflow, file_id, pdf_path).await;
        match result {
            Ok((step_outputs, jsonl_path, record_count)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    "Extraction of {} completed in {:.2}s ({} records)",
                    file_id,
                    duration_ms as f64 / 1000.0,
                    record_count
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_run_complete(file_id, record_count);
                }
                Ok(RunOutput {
                    file_id: file_id.to_string(),
                    workflow,
                    step_outputs,
                    jsonl_path,
                    record_count,
                    duration_ms,
                })
            }
            Err(e) => {
                error!("Error in {} run for {}: {}", workflow, file_id, e);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        workflow: Workflow,
        file_id: &str,
        pdf_path: &std::path::Path,
    ) -> Result<(Vec<PathBuf>, PathBuf, usize), ExtractError> {
        let pdf = require_binary(pdf_path)?;
        debug!("Loaded PDF {} ({} bytes)", pdf_path.display(), pdf.len());

        let stages = workflow.stages();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(file_id, workflow, stages.len());
        }

        let mut step_outputs = Vec::with_capacity(stages.len());
        for stage in stages {
            step_outputs.push(self.run_stage(stage, file_id, &pdf).await?);
        }

        let final_output = self.layout.step_output_path(workflow.final_stage(), file_id);
        let jsonl_path = self.layout.generated_jsonl_path(workflow, file_id);
        let record_count = convert_json_to_jsonl(&final_output, &jsonl_path, workflow)?;

        Ok((step_outputs, jsonl_path, record_count))
    }

    /// Execute one stage and return the path of its persisted output.
    async fn run_stage(&self, stage: Stage, file_id: &str, pdf: &[u8]) -> Result<PathBuf, ExtractError> {
        info!("Stage {} for {}", stage, file_id);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_step_start(file_id, stage);
        }

        let templates = self.templates.load_stage(stage)?;

        let mut contents = vec![ContentPart::pdf(pdf.to_vec())];
        if let Some(previous) = stage.step().and_then(|s| s.chained_input()) {
            let previous_path = self.layout.step_output_path(Stage::MultiStep(previous), file_id);
            debug!("Chaining output of step {}: {}", previous, previous_path.display());
            contents.push(ContentPart::plain_text_file(require_binary(&previous_path)?));
        }
        contents.push(ContentPart::text(templates.user_instruction));

        let output = generate(
            self.model.as_ref(),
            templates.system_instruction,
            contents,
            templates.response_schema,
            self.config.max_output_tokens,
        )
        .await?;

        let output_path = self.layout.step_output_path(stage, file_id);
        save_json(&output, &output_path)?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_step_complete(file_id, stage, &output_path);
        }
        Ok(output_path)
    }
}

/// Run one workflow for one document.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Any stage failure aborts the run: missing PDF or template, model
/// invocation failure, undecodable model answer, or a final answer that
/// cannot be converted to JSONL.
pub async fn run(
    file_id: impl AsRef<str>,
    workflow: Workflow,
    config: &ExtractionConfig,
) -> Result<RunOutput, ExtractError> {
    Extractor::new(config.clone())?
        .run(workflow, file_id.as_ref())
        .await
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    file_id: impl AsRef<str>,
    workflow: Workflow,
    config: &ExtractionConfig,
) -> Result<RunOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(file_id, workflow, config))
}

// ── Model resolution ─────────────────────────────────────────────────────

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the model, from most-specific to least-specific.
///
/// 1. **Pre-built model** (`config.provider`) — used as-is.
/// 2. **Vertex AI** (`config.project`) — needs `config.access_token` or
///    `GOOGLE_ACCESS_TOKEN`.
/// 3. **API key** (`config.api_key`).
/// 4. **Environment** — `GEMINI_API_KEY` / `GOOGLE_API_KEY`, then
///    `GOOGLE_CLOUD_PROJECT` + `GOOGLE_ACCESS_TOKEN` (+ optional
///    `GOOGLE_CLOUD_LOCATION`).
pub fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn GenerativeModel>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let auth = if let Some(ref project) = config.project {
        let access_token = config
            .access_token
            .clone()
            .or_else(|| non_empty_env("GOOGLE_ACCESS_TOKEN"))
            .ok_or_else(|| ExtractError::ProviderNotConfigured {
                hint: format!(
                    "Vertex AI project '{project}' is set but no access token was given.\n\
                     Set GOOGLE_ACCESS_TOKEN (e.g. from `gcloud auth print-access-token`)."
                ),
            })?;
        GeminiAuth::Vertex {
            project: project.clone(),
            location: config.location.clone(),
            access_token,
        }
    } else if let Some(ref key) = config.api_key {
        GeminiAuth::ApiKey(key.clone())
    } else if let Some(key) = non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")) {
        GeminiAuth::ApiKey(key)
    } else if let (Some(project), Some(access_token)) = (
        non_empty_env("GOOGLE_CLOUD_PROJECT"),
        non_empty_env("GOOGLE_ACCESS_TOKEN"),
    ) {
        GeminiAuth::Vertex {
            project,
            location: non_empty_env("GOOGLE_CLOUD_LOCATION").unwrap_or_else(|| config.location.clone()),
            access_token,
        }
    } else {
        return Err(ExtractError::ProviderNotConfigured {
            hint: "No model credentials found.\n\
                   Set GEMINI_API_KEY, or GOOGLE_CLOUD_PROJECT + GOOGLE_ACCESS_TOKEN for Vertex AI."
                .to_string(),
        });
    };

    let client = GeminiClient::new(
        config.model.clone(),
        auth,
        config.endpoint.as_deref(),
        config.api_timeout_secs,
    )?;
    Ok(Arc::new(client))
}

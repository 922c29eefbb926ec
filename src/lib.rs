//! # edgequake-docextract
//!
//! Extract structured records from PDF documents with a hosted Gemini model,
//! and score the extracted records against ground truth.
//!
//! The model receives the raw PDF plus prompt templates and answers with JSON
//! constrained by a response schema. Generation is fully deterministic
//! (temperature 0, top-k 1) so reruns of the same inputs are comparable.
//!
//! ## Workflows
//!
//! ```text
//! single_step   PDF ─▶ [extract] ─▶ {"metrics": [...]} ─▶ JSONL
//!
//! multi_step    PDF ─▶ [step 0]                          (independent)
//!               PDF ─▶ [step 1] ─▶ out_step_1 ─┐
//!               PDF + out_step_1 ─▶ [step 2] ─▶ out_step_2 ─┐
//!               PDF + out_step_2 ─▶ [step 3] ─▶ [...] ─▶ JSONL
//! ```
//!
//! Every intermediate answer is written to `<data_dir>/output/...` before the
//! next stage runs, so a failed run leaves an inspectable trail.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docextract::{run, evaluate_run, ExtractionConfig, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from GEMINI_API_KEY, or GOOGLE_CLOUD_PROJECT + GOOGLE_ACCESS_TOKEN
//!     let config = ExtractionConfig::builder().data_dir("data").build()?;
//!     let output = run("report_2023", Workflow::MultiStep, &config).await?;
//!     eprintln!("{} records -> {}", output.record_count, output.jsonl_path.display());
//!
//!     let eval = evaluate_run(&config.layout(), Workflow::MultiStep, "report_2023")?;
//!     eprintln!("recall {:.1}%", eval.recall() * 100.0);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docextract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docextract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod io;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod templates;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::run_directory;
pub use config::{DataLayout, ExtractionConfig, ExtractionConfigBuilder};
pub use error::ExtractError;
pub use evaluate::{compare_jsonl_files, compare_record_sets, compare_records, evaluate_run, RecordComparison};
pub use extract::{resolve_model, run, run_sync, Extractor};
pub use io::convert_json_to_jsonl;
pub use output::{BatchReport, Evaluation, FileFailure, Match, RunOutput};
pub use pipeline::gemini::{GeminiAuth, GeminiClient};
pub use pipeline::model::{ContentPart, GenerativeModel, ModelRequest, ModelResponse};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use templates::TemplateLoader;
pub use workflow::{Stage, Step, Workflow};

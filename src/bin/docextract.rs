//! CLI binary for edgequake-docextract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_docextract::{
    compare_jsonl_files, convert_json_to_jsonl, evaluate_run, DataLayout, Evaluation, ExtractionConfig,
    ExtractionProgressCallback, Extractor, ProgressCallback, Stage, Workflow,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback.
///
/// For a single run the bar counts stages; for a batch it counts files and
/// stage events only update the message line.
struct CliProgressCallback {
    bar: ProgressBar,
    batch: bool,
}

impl CliProgressCallback {
    fn new(batch: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            batch,
        })
    }

    fn activate_bar(&self, total: usize, unit: &str, prefix: &'static str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  {{msg}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, file_id: &str, workflow: Workflow, total_stages: usize) {
        if self.batch {
            self.bar.set_message(format!("{file_id} ({workflow})"));
        } else {
            self.activate_bar(total_stages, "stages", "Extracting");
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("{workflow} extraction of {file_id}…"))
            ));
        }
    }

    fn on_step_start(&self, file_id: &str, stage: Stage) {
        self.bar.set_message(format!("{file_id}: {stage}"));
    }

    fn on_step_complete(&self, _file_id: &str, stage: Stage, output_path: &Path) {
        if !self.batch {
            self.bar.println(format!(
                "  {} {:<22} {}",
                green("✓"),
                stage.to_string(),
                dim(&output_path.display().to_string())
            ));
            self.bar.inc(1);
        }
    }

    fn on_run_complete(&self, _file_id: &str, _record_count: usize) {
        if !self.batch {
            self.bar.finish_and_clear();
        }
    }

    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files, "files", "Batch");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} PDF files…"))
        ));
    }

    fn on_file_complete(&self, file_id: &str, index: usize, total_files: usize) {
        self.bar
            .println(format!("  {} {:>3}/{:<3}  {}", green("✓"), index, total_files, file_id));
        self.bar.inc(1);
    }

    fn on_file_error(&self, file_id: &str, index: usize, total_files: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total_files,
            file_id,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} files extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files extracted  ({} failed)",
                if failed == total_files { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Four-step extraction of data/docs/report_2023.pdf
  docextract run report_2023 --workflow multi-step

  # Single-step extraction of every PDF in data/docs
  docextract batch

  # Score the generated records against data/validation/expected/report_2023.jsonl
  docextract evaluate report_2023 --workflow multi-step --show-matches

  # Compare two arbitrary JSONL files
  docextract evaluate --generated out.jsonl --expected truth.jsonl

  # Turn a saved single-step answer into JSONL
  docextract convert data/output/single_step/x/out_step.txt x.jsonl

DATA LAYOUT (under --data-dir, default ./data):
  docs/<file_id>.pdf
  templates/single_step/{system_instruction.txt,user_instruction.txt,response_schema.json}
  templates/multi_step/<kind>/<kind-prefix>_step_<n>.{txt,json}
  output/<workflow>/<file_id>/out_step[_<n>].txt
  validation/generated/<workflow>/<file_id>.jsonl
  validation/expected/<file_id>.jsonl

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Gemini Developer API key (GOOGLE_API_KEY also accepted)
  GOOGLE_CLOUD_PROJECT    Use Vertex AI in this project when no API key is set
  GOOGLE_CLOUD_LOCATION   Vertex AI region (default us-central1)
  GOOGLE_ACCESS_TOKEN     Bearer token for Vertex AI (gcloud auth print-access-token)
  DOCEXTRACT_MODEL        Override model ID
  DOCEXTRACT_DATA_DIR     Override data directory
"#;

/// Extract structured records from PDFs with Gemini and evaluate them.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Extract structured records from PDFs with Gemini and evaluate them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root of the data tree (docs, templates, output, validation).
    #[arg(long, global = true, env = "DOCEXTRACT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Model ID (e.g. gemini-1.5-pro-002, gemini-1.5-flash-002).
    #[arg(long, global = true, env = "DOCEXTRACT_MODEL")]
    model: Option<String>,

    /// Gemini Developer API key.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Google Cloud project; selects Vertex AI.
    ///
    /// GOOGLE_CLOUD_PROJECT is only consulted when no API key is available.
    #[arg(long, global = true)]
    project: Option<String>,

    /// Vertex AI region.
    #[arg(long, global = true)]
    location: Option<String>,

    /// Vertex AI bearer token. Falls back to GOOGLE_ACCESS_TOKEN.
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Base URL override for the model endpoint.
    #[arg(long, global = true, env = "DOCEXTRACT_ENDPOINT")]
    endpoint: Option<String>,

    /// Max generated tokens per model call.
    #[arg(long, global = true, env = "DOCEXTRACT_MAX_OUTPUT_TOKENS", default_value_t = 8192)]
    max_output_tokens: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, global = true, env = "DOCEXTRACT_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Print results as JSON.
    #[arg(long, global = true, env = "DOCEXTRACT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOCEXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCEXTRACT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract records from <data-dir>/docs/<FILE_ID>.pdf.
    Run {
        file_id: String,
        #[arg(long, value_enum, default_value = "single-step")]
        workflow: WorkflowArg,
    },
    /// Extract records from every PDF in a directory.
    Batch {
        /// Directory to scan. Default: <data-dir>/docs.
        dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "single-step")]
        workflow: WorkflowArg,
    },
    /// Compare generated records against ground truth.
    Evaluate {
        /// Evaluate the stored run for this file id.
        #[arg(required_unless_present_all = ["generated", "expected"])]
        file_id: Option<String>,
        #[arg(long, value_enum, default_value = "single-step")]
        workflow: WorkflowArg,
        /// Explicit generated JSONL file.
        #[arg(long, requires = "expected", conflicts_with = "file_id")]
        generated: Option<PathBuf>,
        /// Explicit expected JSONL file.
        #[arg(long, requires = "generated", conflicts_with = "file_id")]
        expected: Option<PathBuf>,
        /// List every matching pair.
        #[arg(long)]
        show_matches: bool,
    },
    /// Convert a saved JSON answer into JSONL records.
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_enum, default_value = "single-step")]
        workflow: WorkflowArg,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum WorkflowArg {
    SingleStep,
    MultiStep,
}

impl From<WorkflowArg> for Workflow {
    fn from(v: WorkflowArg) -> Self {
        match v {
            WorkflowArg::SingleStep => Workflow::SingleStep,
            WorkflowArg::MultiStep => Workflow::MultiStep,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs for run and batch.
    let uses_bar = matches!(cli.command, Command::Run { .. } | Command::Batch { .. });
    let show_progress = uses_bar && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run { ref file_id, workflow } => {
            let progress = show_progress
                .then(|| CliProgressCallback::new(false) as ProgressCallback);
            let config = build_config(&cli, progress)?;
            let extractor = Extractor::new(config).context("Cannot set up the model")?;
            let output = extractor
                .run(workflow.into(), file_id)
                .await
                .with_context(|| format!("Extraction of '{file_id}' failed"))?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} records  {}ms  →  {}",
                    green("✔"),
                    output.record_count,
                    output.duration_ms,
                    bold(&output.jsonl_path.display().to_string()),
                );
            }
        }
        Command::Batch { ref dir, workflow } => {
            let progress = show_progress.then(|| CliProgressCallback::new(true) as ProgressCallback);
            let config = build_config(&cli, progress)?;
            let dir = dir.clone().unwrap_or_else(|| config.layout().docs_dir());
            let extractor = Extractor::new(config).context("Cannot set up the model")?;
            let report = extractor
                .run_batch(workflow.into(), &dir)
                .await
                .with_context(|| format!("Cannot process directory {}", dir.display()))?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            } else if !cli.quiet && !show_progress {
                eprintln!(
                    "Extracted {}/{} files",
                    report.success_count(),
                    report.total
                );
                for failure in &report.failed {
                    eprintln!("  {} {}: {}", red("✗"), failure.file_id, failure.error);
                }
            }
        }
        Command::Evaluate {
            ref file_id,
            workflow,
            ref generated,
            ref expected,
            show_matches,
        } => {
            let evaluation = match (file_id, generated, expected) {
                (_, Some(generated), Some(expected)) => compare_jsonl_files(generated, expected)
                    .context("Evaluation failed")?,
                (Some(file_id), _, _) => {
                    let layout = DataLayout::new(&cli.data_dir);
                    evaluate_run(&layout, workflow.into(), file_id)
                        .with_context(|| format!("Evaluation of '{file_id}' failed"))?
                }
                _ => anyhow::bail!("Give a FILE_ID or both --generated and --expected"),
            };
            print_evaluation(&evaluation, cli.json, show_matches)?;
        }
        Command::Convert {
            ref input,
            ref output,
            workflow,
        } => {
            let count = convert_json_to_jsonl(input, output, workflow.into())
                .with_context(|| format!("Cannot convert {}", input.display()))?;
            if cli.json {
                println!("{}", serde_json::json!({ "records": count, "output": output }));
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} records  →  {}",
                    green("✔"),
                    count,
                    bold(&output.display().to_string())
                );
            }
        }
    }

    Ok(())
}

fn print_evaluation(evaluation: &Evaluation, json: bool, show_matches: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(evaluation).context("Failed to serialise evaluation")?
        );
        return Ok(());
    }

    println!(
        "Matches:   {} pairs ({} of {} expected records)",
        evaluation.matched_count(),
        evaluation.matched_expected_count(),
        evaluation.expected_count
    );
    println!("Generated: {} records", evaluation.generated_count);
    println!("Recall:    {:.1}%", evaluation.recall() * 100.0);

    if show_matches {
        for m in &evaluation.matches {
            println!(
                "  {} expected #{} ↔ generated #{}  {}",
                green("✓"),
                m.expected_index,
                m.generated_index,
                dim(&m.expected.to_string())
            );
        }
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .data_dir(&cli.data_dir)
        .max_output_tokens(cli.max_output_tokens)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref project) = cli.project {
        builder = builder.project(project);
    }
    if let Some(ref location) = cli.location {
        builder = builder.location(location);
    }
    if let Some(ref token) = cli.access_token {
        builder = builder.access_token(token);
    }
    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_not_shadowed_by_ambient_project() {
        let cli = Cli::try_parse_from(["docextract", "--api-key", "k", "run", "doc1"]).unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert!(config.project.is_none());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn explicit_project_is_forwarded() {
        let cli = Cli::try_parse_from([
            "docextract",
            "batch",
            "--project",
            "acme",
            "--location",
            "europe-west4",
        ])
        .unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.project.as_deref(), Some("acme"));
        assert_eq!(config.location, "europe-west4");
    }
}

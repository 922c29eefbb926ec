//! Directory batch runner.
//!
//! Runs one workflow over every PDF in a directory, sequentially and in
//! sorted filename order. A failing file is logged, reported and skipped;
//! the batch always attempts every file.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::Extractor;
use crate::io::{file_id_of, list_pdf_files};
use crate::output::{BatchReport, FileFailure};
use crate::workflow::Workflow;
use std::path::Path;
use tracing::{error, info, warn};

impl Extractor {
    /// Run `workflow` over every `*.pdf` in `dir`.
    ///
    /// Each file's stem is its file id, so step outputs and JSONL records
    /// land under the usual `<data_dir>` layout.
    ///
    /// # Errors
    /// Only a directory that cannot be listed fails the whole batch.
    pub async fn run_batch(&self, workflow: Workflow, dir: impl AsRef<Path>) -> Result<BatchReport, ExtractError> {
        let dir = dir.as_ref();
        let files = list_pdf_files(dir).inspect_err(|e| {
            error!("Cannot list PDF files in {}: {}", dir.display(), e);
        })?;

        let total = files.len();
        info!("Batch {}: {} PDF file(s) in {}", workflow, total, dir.display());
        if total == 0 {
            warn!("No PDF files found in {}", dir.display());
        }
        if let Some(ref cb) = self.config().progress_callback {
            cb.on_batch_start(total);
        }

        let mut report = BatchReport {
            total,
            ..Default::default()
        };

        for (i, path) in files.iter().enumerate() {
            let index = i + 1;
            let Some(file_id) = file_id_of(path) else {
                let file_id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let message = "file name is not valid UTF-8".to_string();
                warn!("Skipping {}: {}", path.display(), message);
                if let Some(ref cb) = self.config().progress_callback {
                    cb.on_file_error(&file_id, index, total, &message);
                }
                report.failed.push(FileFailure {
                    file_id,
                    path: path.clone(),
                    error: message,
                });
                continue;
            };
            info!("[{}/{}] Processing {}", index, total, path.display());

            match self.run_document(workflow, &file_id, path).await {
                Ok(output) => {
                    if let Some(ref cb) = self.config().progress_callback {
                        cb.on_file_complete(&file_id, index, total);
                    }
                    report.succeeded.push(output);
                }
                Err(e) => {
                    error!("Error processing file {}: {}", path.display(), e);
                    let message = e.to_string();
                    if let Some(ref cb) = self.config().progress_callback {
                        cb.on_file_error(&file_id, index, total, &message);
                    }
                    report.failed.push(FileFailure {
                        file_id,
                        path: path.clone(),
                        error: message,
                    });
                }
            }
        }

        info!(
            "Batch complete: {}/{} succeeded, {} failed",
            report.success_count(),
            total,
            report.failed.len()
        );
        if let Some(ref cb) = self.config().progress_callback {
            cb.on_batch_complete(total, report.success_count());
        }
        Ok(report)
    }
}

/// Run the single-step workflow over every PDF in `dir`.
pub async fn run_directory(dir: impl AsRef<Path>, config: &ExtractionConfig) -> Result<BatchReport, ExtractError> {
    Extractor::new(config.clone())?
        .run_batch(Workflow::SingleStep, dir)
        .await
}

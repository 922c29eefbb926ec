//! Result types returned by the runners and the evaluator.
//!
//! Everything here is `Serialize` so the CLI can print it with `--json`.

use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Outcome of one successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub file_id: String,
    pub workflow: Workflow,
    /// Per-stage JSON outputs in execution order.
    pub step_outputs: Vec<PathBuf>,
    /// Converted records of the final stage.
    pub jsonl_path: PathBuf,
    pub record_count: usize,
    pub duration_ms: u64,
}

/// A file the batch runner could not process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub file_id: String,
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a directory batch. Per-file failures never abort the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: Vec<RunOutput>,
    pub failed: Vec<FileFailure>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// An expected record paired with a generated record that agrees with it on
/// `code` and `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Position of the expected record in the expected file.
    pub expected_index: usize,
    /// Position of the generated record in the generated file.
    pub generated_index: usize,
    pub expected: Value,
    pub generated: Value,
}

/// Result of comparing a generated JSONL file against ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// All matching pairs, expected-major order. An expected record may appear
    /// several times and a generated record may serve several expected ones.
    pub matches: Vec<Match>,
    /// Number of records in the expected file.
    pub expected_count: usize,
    /// Number of records in the generated file.
    pub generated_count: usize,
}

impl Evaluation {
    /// Number of match pairs (may exceed `expected_count`).
    pub fn matched_count(&self) -> usize {
        self.matches.len()
    }

    /// Number of distinct expected records with at least one match.
    pub fn matched_expected_count(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.expected_index)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Share of expected records matched at least once, in `[0, 1]`.
    pub fn recall(&self) -> f64 {
        if self.expected_count == 0 {
            return 0.0;
        }
        (self.matched_expected_count() as f64 / self.expected_count as f64).min(1.0)
    }
}

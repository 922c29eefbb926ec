//! Error types for the edgequake-docextract library.
//!
//! [`ExtractError`] is the single fatal error type. Inside one pipeline run
//! every failure is fatal: a step that cannot load its template, reach the
//! model, or decode the model's JSON aborts the run with no resume point.
//!
//! Two failure classes deliberately never become an `ExtractError`:
//!
//! * A missing file in [`crate::io::load_text`] / [`crate::io::load_binary`]
//!   is reported as `Ok(None)` so callers can decide whether absence matters.
//! * A value that cannot be coerced to an integer during comparison is
//!   downgraded to "no match" by [`crate::evaluate::compare_records`].
//!
//! The batch runner isolates `ExtractError`s per file and records them in
//! [`crate::output::FileFailure`] instead of propagating them.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docextract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A file the caller cannot proceed without does not exist.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but reading it failed for another reason.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A prompt or schema template required by a workflow stage is missing.
    #[error("Template not found: '{path}'\nEvery stage needs a system instruction, a user instruction and a response schema.")]
    TemplateMissing { path: PathBuf },

    // ── JSON errors ───────────────────────────────────────────────────────
    /// A file that should hold a JSON document could not be parsed.
    #[error("Malformed JSON in '{path}': {source}")]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required key is absent from a JSON document.
    #[error("Key '{key}' not found in '{path}'")]
    MissingKey { path: PathBuf, key: String },

    /// A JSON value that should be an array of records is something else.
    #[error("Expected a JSON array of records in '{path}'")]
    NotAnArray { path: PathBuf },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No model could be resolved from config or environment.
    #[error("Generative model is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    /// The model service rejected or failed the request (network, quota,
    /// malformed request, non-2xx status).
    #[error("Model invocation failed: {message}")]
    ModelInvocation { message: String },

    /// The model answered but produced no text candidate.
    #[error("Model returned no content (finish reason: {finish_reason})")]
    EmptyResponse { finish_reason: String },

    /// The model's text response is not valid JSON.
    #[error("Failed to decode model response as JSON: {source}\nResponse starts with: {snippet:?}")]
    ResponseDecode {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the parent directory or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Classify an `std::io::Error` raised while reading `path`.
    pub(crate) fn from_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => ExtractError::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => ExtractError::PermissionDenied { path },
            _ => ExtractError::ReadFailed { path, source },
        }
    }
}

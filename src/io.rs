//! File I/O helpers: text/binary loads, JSON saves, JSONL reads and the
//! JSON → JSONL conversion that turns a model answer into comparable records.
//!
//! ## Failure policy
//!
//! | Helper | Missing file | Other failure |
//! |--------|--------------|---------------|
//! | [`load_text`], [`load_binary`] | `Ok(None)`, logged | `Err` |
//! | [`save_json`] | n/a | `Err` (mkdir or write) |
//! | [`load_jsonl`] | `Err` | bad lines skipped and logged |
//! | [`convert_json_to_jsonl`] | `Err` | `Err` |
//!
//! All helpers are blocking; the pipeline is strictly sequential, so there is
//! nothing to gain from async file access here.

use crate::error::ExtractError;
use crate::workflow::Workflow;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Key holding the record array in a single-step model answer.
pub const METRICS_KEY: &str = "metrics";

/// Load a UTF-8 text file.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_text(path: impl AsRef<Path>) -> Result<Option<String>, ExtractError> {
    let path = path.as_ref();
    debug!("Loading text file: {}", path.display());
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!("File not found: {}", path.display());
            Ok(None)
        }
        Err(e) => {
            error!("I/O error reading {}: {}", path.display(), e);
            Err(ExtractError::from_read(path, e))
        }
    }
}

/// Load a file as raw bytes.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_binary(path: impl AsRef<Path>) -> Result<Option<Vec<u8>>, ExtractError> {
    let path = path.as_ref();
    debug!("Loading binary file: {}", path.display());
    match fs::read(path) {
        Ok(bytes) => {
            debug!("Loaded {} bytes from {}", bytes.len(), path.display());
            Ok(Some(bytes))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!("File not found: {}", path.display());
            Ok(None)
        }
        Err(e) => {
            error!("I/O error reading {}: {}", path.display(), e);
            Err(ExtractError::from_read(path, e))
        }
    }
}

/// Load a file that must exist, turning `Ok(None)` into `FileNotFound`.
pub fn require_binary(path: impl AsRef<Path>) -> Result<Vec<u8>, ExtractError> {
    let path = path.as_ref();
    load_binary(path)?.ok_or_else(|| ExtractError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// Serialise `data` as indented JSON to `path`, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(data: &T, path: impl AsRef<Path>) -> Result<(), ExtractError> {
    let path = path.as_ref();
    let write_err = |source: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            error!("Cannot create directory {}: {}", parent.display(), e);
            write_err(e)
        })?;
    }

    let json = serde_json::to_string_pretty(data)
        .map_err(|e| ExtractError::Internal(format!("JSON serialisation failed: {e}")))?;
    fs::write(path, json).map_err(|e| {
        error!("Error saving JSON data to {}: {}", path.display(), e);
        write_err(e)
    })?;

    info!("Saved JSON to {}", path.display());
    Ok(())
}

/// Read a JSONL file, one record per non-empty line.
///
/// Lines that are not valid JSON are logged and skipped. A missing file is an
/// error.
pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Vec<Value>, ExtractError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| {
        error!("Cannot open JSONL file {}: {}", path.display(), e);
        ExtractError::from_read(path, e)
    })?;

    let mut records = Vec::new();
    for (idx, raw) in BufReader::new(file).split(b'\n').enumerate() {
        let raw = raw.map_err(|e| ExtractError::from_read(path, e))?;
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line,
            Err(e) => {
                warn!(
                    "Skipping non-UTF-8 JSONL line {} in {}: {}",
                    idx + 1,
                    path.display(),
                    e
                );
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => records.push(value),
            Err(e) => warn!(
                "Skipping malformed JSONL line {} in {}: {}",
                idx + 1,
                path.display(),
                e
            ),
        }
    }

    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Write records as JSONL (compact JSON, one per line), creating parent dirs.
pub fn save_jsonl<'a, I>(records: I, path: impl AsRef<Path>) -> Result<usize, ExtractError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let path = path.as_ref();
    let write_err = |source: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut out = BufWriter::new(fs::File::create(path).map_err(write_err)?);
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut out, record)
            .map_err(|e| ExtractError::Internal(format!("JSON serialisation failed: {e}")))?;
        out.write_all(b"\n").map_err(write_err)?;
        count += 1;
    }
    out.flush().map_err(write_err)?;
    Ok(count)
}

/// Convert a saved model answer into a JSONL record file.
///
/// * [`Workflow::SingleStep`]: records are the array under `"metrics"`.
/// * [`Workflow::MultiStep`]: the document itself is the record array.
///
/// Returns the number of records written. Fails on a missing input, malformed
/// JSON, a missing `"metrics"` key, or a value that is not an array; in every
/// failure case no output file is created.
pub fn convert_json_to_jsonl(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    workflow: Workflow,
) -> Result<usize, ExtractError> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    let text = load_text(input_path)?.ok_or_else(|| ExtractError::FileNotFound {
        path: input_path.to_path_buf(),
    })?;
    let document: Value =
        serde_json::from_str(&text).map_err(|source| ExtractError::MalformedJson {
            path: input_path.to_path_buf(),
            source,
        })?;

    let records = match workflow {
        Workflow::SingleStep => document.get(METRICS_KEY).ok_or_else(|| ExtractError::MissingKey {
            path: input_path.to_path_buf(),
            key: METRICS_KEY.to_string(),
        })?,
        Workflow::MultiStep => &document,
    };
    let records = records.as_array().ok_or_else(|| ExtractError::NotAnArray {
        path: input_path.to_path_buf(),
    })?;

    let count = save_jsonl(records, output_path)?;
    info!(
        "Converted {} → {} ({} records)",
        input_path.display(),
        output_path.display(),
        count
    );
    Ok(count)
}

/// List the PDF files directly inside `dir`, sorted by file name.
///
/// The extension match is case-insensitive; subdirectories are not walked.
pub fn list_pdf_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ExtractError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| ExtractError::from_read(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ExtractError::from_read(dir, e))?;
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// The identifier used for a document's outputs: its file stem.
pub fn file_id_of(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn load_text_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_text(dir.path().join("nope.txt")).unwrap(), None);
    }

    #[test]
    fn load_text_directory_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_text(dir.path()).is_err());
    }

    #[test]
    fn load_binary_roundtrip() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("doc.pdf");
        fs::write(&p, b"%PDF-1.7\x00\xff").unwrap();
        assert_eq!(load_binary(&p).unwrap().unwrap(), b"%PDF-1.7\x00\xff");
        assert!(load_binary(dir.path().join("missing.pdf")).unwrap().is_none());
    }

    #[test]
    fn require_binary_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = require_binary(dir.path().join("missing.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn save_json_creates_parents_and_indents() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("a/b/c/out.txt");
        save_json(&json!({"metrics": [1, 2]}), &p).unwrap();
        let text = fs::read_to_string(&p).unwrap();
        assert!(text.contains('\n'), "expected indented JSON, got {text}");
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, json!({"metrics": [1, 2]}));
    }

    #[test]
    fn save_json_fails_when_parent_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let err = save_json(&json!({}), blocker.join("out.json")).unwrap_err();
        assert!(matches!(err, ExtractError::OutputWriteFailed { .. }));
    }

    #[test]
    fn load_jsonl_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("g.jsonl");
        fs::write(&p, "{\"code\": 1}\n{not json\n\n{\"code\": 2}\n").unwrap();
        let records = load_jsonl(&p).unwrap();
        assert_eq!(records, vec![json!({"code": 1}), json!({"code": 2})]);
    }

    #[test]
    fn load_jsonl_skips_non_utf8_lines() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("g.jsonl");
        fs::write(&p, b"{\"code\": 1}\n\"\xff\xfe\"\r\n{\"code\": 2}\r\n").unwrap();
        let records = load_jsonl(&p).unwrap();
        assert_eq!(records, vec![json!({"code": 1}), json!({"code": 2})]);
    }

    #[test]
    fn load_jsonl_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = load_jsonl(dir.path().join("missing.jsonl")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn convert_single_step_reads_metrics() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("out_step.txt");
        let output = dir.path().join("gen/x.jsonl");
        fs::write(&input, r#"{"metrics": [{"code": 1, "value": 2}]}"#).unwrap();

        let n = convert_json_to_jsonl(&input, &output, Workflow::SingleStep).unwrap();
        assert_eq!(n, 1);
        let text = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let rec: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(rec, json!({"code": 1, "value": 2}));
    }

    #[test]
    fn convert_multi_step_iterates_top_level_array() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("out_step_3.txt");
        let output = dir.path().join("x.jsonl");
        fs::write(&input, r#"[{"a":1},{"a":2}]"#).unwrap();

        assert_eq!(
            convert_json_to_jsonl(&input, &output, Workflow::MultiStep).unwrap(),
            2
        );
        let records = load_jsonl(&output).unwrap();
        assert_eq!(records, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn convert_single_step_without_metrics_fails_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("out_step.txt");
        let output = dir.path().join("x.jsonl");
        fs::write(&input, r#"{"records": []}"#).unwrap();

        let err = convert_json_to_jsonl(&input, &output, Workflow::SingleStep).unwrap_err();
        assert!(matches!(err, ExtractError::MissingKey { ref key, .. } if key == "metrics"));
        assert!(!output.exists());
    }

    #[test]
    fn convert_malformed_json_fails() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.txt");
        fs::write(&input, "{ nope").unwrap();
        let err =
            convert_json_to_jsonl(&input, dir.path().join("x.jsonl"), Workflow::MultiStep).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedJson { .. }));
    }

    #[test]
    fn convert_missing_input_fails() {
        let dir = TempDir::new().unwrap();
        let err = convert_json_to_jsonl(
            dir.path().join("missing.txt"),
            dir.path().join("x.jsonl"),
            Workflow::SingleStep,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn convert_multi_step_object_is_not_an_array() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("obj.txt");
        fs::write(&input, r#"{"metrics": []}"#).unwrap();
        let err =
            convert_json_to_jsonl(&input, dir.path().join("x.jsonl"), Workflow::MultiStep).unwrap_err();
        assert!(matches!(err, ExtractError::NotAnArray { .. }));
    }

    #[test]
    fn list_pdf_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let names: Vec<String> = list_pdf_files(dir.path())
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn file_id_is_stem() {
        assert_eq!(
            file_id_of("data/docs/84535104943034784.pdf").as_deref(),
            Some("84535104943034784")
        );
    }
}

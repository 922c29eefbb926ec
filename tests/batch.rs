//! Multi-step batch over a directory where one document breaks mid-chain.

use async_trait::async_trait;
use edgequake_docextract::{
    ContentPart, ExtractError, ExtractionConfig, Extractor, GenerativeModel, ModelRequest, ModelResponse,
    Workflow,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Answers every step, except that any request whose PDF contains "TRUNCATED"
/// gets a non-JSON answer once a previous step output is attached.
struct StepAwareModel;

#[async_trait]
impl GenerativeModel for StepAwareModel {
    fn model_name(&self) -> &str {
        "step-aware"
    }

    async fn generate_content(&self, request: &ModelRequest) -> Result<ModelResponse, ExtractError> {
        let truncated = match &request.contents[0] {
            ContentPart::InlineData { data, .. } => data.windows(9).any(|w| w == b"TRUNCATED"),
            ContentPart::Text(_) => false,
        };
        let chained = request.contents.len() == 3;
        let user = request.contents.last().and_then(|p| p.as_text()).unwrap_or_default();

        let text = if chained && truncated {
            "I could not read this document".to_string()
        } else if user == "user 3" {
            r#"[{"code": 1, "value": 1}]"#.to_string()
        } else {
            format!(r#"{{"step": "{user}"}}"#)
        };
        Ok(ModelResponse {
            text,
            ..Default::default()
        })
    }
}

fn fixture(root: &Path) {
    for n in 0..4 {
        for (kind, prefix, ext, body) in [
            ("system_instruction", "system_instructions_step_", "txt", format!("system {n}")),
            ("user_instruction", "user_instructions_step_", "txt", format!("user {n}")),
            ("response_schema", "response_schema_step_", "json", "{}".to_string()),
        ] {
            let dir = root.join("templates/multi_step").join(kind);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{prefix}{n}.{ext}")), body).unwrap();
        }
    }
    let docs = root.join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("alpha.pdf"), "%PDF alpha").unwrap();
    fs::write(docs.join("beta.pdf"), "%PDF TRUNCATED").unwrap();
    fs::write(docs.join("gamma.pdf"), "%PDF gamma").unwrap();
}

#[tokio::test]
async fn broken_document_is_isolated() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fixture(root);

    let config = ExtractionConfig::builder().data_dir(root).build().unwrap();
    let extractor = Extractor::with_model(config, Arc::new(StepAwareModel));
    let report = extractor
        .run_batch(Workflow::MultiStep, root.join("docs"))
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    let ok: Vec<_> = report.succeeded.iter().map(|r| r.file_id.as_str()).collect();
    assert_eq!(ok, ["alpha", "gamma"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].file_id, "beta");
    assert!(report.failed[0].path.ends_with("docs/beta.pdf"));

    // beta got through steps 0 and 1 before the chain broke.
    let beta = root.join("output/multi_step/beta");
    assert!(beta.join("out_step_0.txt").exists());
    assert!(beta.join("out_step_1.txt").exists());
    assert!(!beta.join("out_step_2.txt").exists());

    for id in ["alpha", "gamma"] {
        let jsonl = root.join(format!("validation/generated/multi_step/{id}.jsonl"));
        assert_eq!(fs::read_to_string(jsonl).unwrap().lines().count(), 1);
    }
}

//! Full runs against a local HTTP server speaking the generateContent API.

use edgequake_docextract::{ExtractError, ExtractionConfig, Extractor, Workflow};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-1.5-flash-002";

fn single_step_fixture(root: &Path) {
    let tpl = root.join("templates/single_step");
    fs::create_dir_all(&tpl).unwrap();
    fs::write(tpl.join("system_instruction.txt"), "You extract metrics.").unwrap();
    fs::write(tpl.join("user_instruction.txt"), "Extract all metrics.").unwrap();
    fs::write(
        tpl.join("response_schema.json"),
        r#"{"type": "OBJECT", "properties": {"metrics": {"type": "ARRAY"}}}"#,
    )
    .unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/report.pdf"), b"%PDF-1.7 report").unwrap();
}

fn answer(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP",
            "safetyRatings": []
        }],
        "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 40}
    })
}

fn config(root: &Path, server: &MockServer) -> ExtractionConfig {
    ExtractionConfig::builder()
        .data_dir(root)
        .model(MODEL)
        .api_key("test-key")
        .endpoint(server.uri())
        .api_timeout_secs(5)
        .build()
        .unwrap()
}

#[tokio::test]
async fn single_step_run_over_http() {
    let dir = TempDir::new().unwrap();
    single_step_fixture(dir.path());

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{MODEL}:generateContent")))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer(
            r#"{"metrics": [{"code": 1, "value": 10, "unit": "t", "year": 2023}]}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = Extractor::new(config(dir.path(), &server)).unwrap();
    let output = extractor.run(Workflow::SingleStep, "report").await.unwrap();
    assert_eq!(output.record_count, 1);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["generationConfig"]["temperature"], 0.0);
    assert_eq!(body["generationConfig"]["topK"], 1);
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(body["safetySettings"].as_array().unwrap().len(), 5);
    assert_eq!(
        body["contents"][0]["parts"][0]["inlineData"]["mimeType"],
        "application/pdf"
    );
    assert_eq!(
        body["contents"][0]["parts"][1]["text"],
        "Extract all metrics."
    );
}

#[tokio::test]
async fn service_error_fails_the_run() {
    let dir = TempDir::new().unwrap();
    single_step_fixture(dir.path());

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config(dir.path(), &server)).unwrap();
    let err = extractor.run(Workflow::SingleStep, "report").await.unwrap_err();

    assert!(matches!(err, ExtractError::ModelInvocation { .. }));
    assert!(err.to_string().contains("429"));
    assert!(!dir.path().join("output/single_step/report/out_step.txt").exists());
}

#[tokio::test]
async fn blocked_prompt_is_an_empty_response() {
    let dir = TempDir::new().unwrap();
    single_step_fixture(dir.path());

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "OTHER"}
        })))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config(dir.path(), &server)).unwrap();
    let err = extractor.run(Workflow::SingleStep, "report").await.unwrap_err();
    assert!(matches!(err, ExtractError::EmptyResponse { .. }));
}

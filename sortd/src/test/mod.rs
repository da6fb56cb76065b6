//! End-to-end tests: the full application against a mocked Gemini API.

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::Application;
use crate::classifier::CLASSIFY_PROMPT;
use crate::config::Config;
use crate::test_utils::{create_test_config, scratch_entries};

const MODEL_PATH: &str = "/v1beta/models/gemini-1.5-pro-002:generateContent";

fn config_for(server: &MockServer, scratch: &std::path::Path) -> Config {
    let mut config = create_test_config(scratch);
    config.gemini.base_url = server.uri().parse().unwrap();
    config
}

/// Mount a resumable upload that hands out a fresh file per upload.
async fn mount_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-goog-upload-url", format!("{}/upload-session/1", server.uri())))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload-session/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {
                "name": "files/bin-1",
                "mimeType": "image/jpeg",
                "uri": format!("{}/v1beta/files/bin-1", server.uri())
            }
        })))
        .mount(server)
        .await;
}

fn jpeg_form() -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(b"\xff\xd8\xff\xe0capture".to_vec()).file_name("capture.jpg").mime_type("image/jpeg"))
}

/// Camera posts a photo, the service relays it to Gemini and answers with the model's text
#[test_log::test(tokio::test)]
async fn test_e2e_classify_with_mocked_gemini() {
    let gemini = MockServer::start().await;
    mount_upload(&gemini).await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "metal"}]}, "finishReason": "STOP"}]
        })))
        .expect(1)
        .mount(&gemini)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let server = Application::new(config_for(&gemini, scratch.path()))
        .await
        .expect("Failed to create application")
        .into_test_server();

    let response = server.post("/classify").multipart(jpeg_form()).await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({"category": "metal"}));
    assert_eq!(scratch_entries(scratch.path()), 0);

    // Exactly one generate call, referencing the uploaded file with the fixed prompt
    let requests = gemini.received_requests().await.unwrap();
    let generate = requests.iter().find(|r| r.url.path() == MODEL_PATH).unwrap();
    let body: Value = serde_json::from_slice(&generate.body).unwrap();
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["fileData"]["fileUri"], format!("{}/v1beta/files/bin-1", gemini.uri()));
    assert_eq!(parts[1]["text"], CLASSIFY_PROMPT);
    assert_eq!(generate.headers.get("x-goog-api-key").unwrap(), "test-api-key");
}

#[test_log::test(tokio::test)]
async fn test_e2e_provider_failure_is_500_and_service_keeps_serving() {
    let gemini = MockServer::start().await;
    mount_upload(&gemini).await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .up_to_n_times(1)
        .mount(&gemini)
        .await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "paper"}]}}]
        })))
        .mount(&gemini)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let server = Application::new(config_for(&gemini, scratch.path()))
        .await
        .unwrap()
        .into_test_server();

    let failed = server.post("/classify").multipart(jpeg_form()).await;
    failed.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let error = failed.json::<Value>()["error"].as_str().unwrap().to_string();
    assert!(error.contains("429"), "error was {error}");
    assert_eq!(scratch_entries(scratch.path()), 0);

    server.get("/health").await.assert_status(StatusCode::OK);

    let retried = server.post("/classify").multipart(jpeg_form()).await;
    retried.assert_status(StatusCode::OK);
    assert_eq!(retried.json::<Value>(), json!({"category": "paper"}));
}

#[test_log::test(tokio::test)]
async fn test_e2e_zero_candidates() {
    let gemini = MockServer::start().await;
    mount_upload(&gemini).await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&gemini)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let server = Application::new(config_for(&gemini, scratch.path()))
        .await
        .unwrap()
        .into_test_server();

    let response = server.post("/classify").multipart(jpeg_form()).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>(), json!({"error": "empty response received"}));
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_e2e_missing_file_never_reaches_provider() {
    let gemini = MockServer::start().await;
    Mock::given(path_regex(".*"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&gemini)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let server = Application::new(config_for(&gemini, scratch.path()))
        .await
        .unwrap()
        .into_test_server();

    let response = server
        .post("/classify")
        .multipart(MultipartForm::new().add_text("note", "no image"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>(), json!({"error": "No file part"}));
}

/// Uploaded files are removed from the provider when configured to do so
#[test_log::test(tokio::test)]
async fn test_e2e_remote_file_deleted_when_enabled() {
    let gemini = MockServer::start().await;
    mount_upload(&gemini).await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "clothes"}]}}]
        })))
        .mount(&gemini)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1beta/files/bin-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&gemini)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let mut config = config_for(&gemini, scratch.path());
    config.gemini.delete_uploaded_files = true;
    let server = Application::new(config).await.unwrap().into_test_server();

    let response = server.post("/classify").multipart(jpeg_form()).await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({"category": "clothes"}));
}

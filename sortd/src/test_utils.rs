//! Test utilities: in-process servers and scripted classifiers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use tempfile::TempDir;

use crate::classifier::{Classifier, ClassifyError, ImageUpload};
use crate::config::Config;

/// Configuration suitable for tests: dummy key, scratch files under `scratch_dir`.
pub fn create_test_config(scratch_dir: &Path) -> Config {
    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.gemini.api_key = Some("test-api-key".to_string());
    config.scratch.dir = scratch_dir.to_path_buf();
    config
}

/// Test server backed by `classifier`, with a fresh scratch directory.
///
/// Keep the returned [`TempDir`] alive for as long as the server is used.
pub async fn create_test_server(classifier: impl Classifier + 'static) -> (TestServer, TempDir) {
    let scratch = tempfile::tempdir().expect("Failed to create scratch dir");
    let server = create_test_server_with_config(create_test_config(scratch.path()), classifier).await;
    (server, scratch)
}

pub async fn create_test_server_with_config(config: Config, classifier: impl Classifier + 'static) -> TestServer {
    crate::Application::new_with_classifier(config, Arc::new(classifier))
        .await
        .expect("Failed to create application")
        .into_test_server()
}

/// Number of entries left in a scratch directory.
pub fn scratch_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

enum Outcome {
    Label(String),
    Empty,
    Provider { status: u16, body: String },
}

/// Answers every request the same way.
pub struct StaticClassifier {
    outcome: Outcome,
}

impl StaticClassifier {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Label(label.into()),
        }
    }

    pub fn empty() -> Self {
        Self { outcome: Outcome::Empty }
    }

    pub fn provider_error(status: u16, body: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Provider {
                status,
                body: body.into(),
            },
        }
    }
}

#[async_trait]
impl Classifier for StaticClassifier {
    async fn classify(&self, _image: ImageUpload<'_>) -> Result<String, ClassifyError> {
        match &self.outcome {
            Outcome::Label(label) => Ok(label.clone()),
            Outcome::Empty => Err(ClassifyError::EmptyResponse),
            Outcome::Provider { status, body } => Err(ClassifyError::Provider {
                status: reqwest::StatusCode::from_u16(*status).expect("valid status code"),
                body: body.clone(),
            }),
        }
    }
}

/// What an [`EchoClassifier`] saw for one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: PathBuf,
    pub existed: bool,
    pub mime_type: String,
    pub display_name: String,
}

/// Answers with the uploaded bytes as text, recording each call.
#[derive(Clone, Default)]
pub struct EchoClassifier {
    delay: Duration,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl EchoClassifier {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl Classifier for EchoClassifier {
    async fn classify(&self, image: ImageUpload<'_>) -> Result<String, ClassifyError> {
        let existed = tokio::fs::try_exists(image.path).await.unwrap_or(false);
        self.calls.lock().expect("calls lock poisoned").push(RecordedCall {
            path: image.path.to_path_buf(),
            existed,
            mime_type: image.mime_type.to_string(),
            display_name: image.display_name.to_string(),
        });

        let content = tokio::fs::read(image.path).await.map_err(|source| ClassifyError::ReadImage {
            path: image.path.to_path_buf(),
            source,
        })?;

        tokio::time::sleep(self.delay).await;

        // Still ours after the delay
        let after = tokio::fs::read(image.path).await.map_err(|source| ClassifyError::ReadImage {
            path: image.path.to_path_buf(),
            source,
        })?;
        assert_eq!(content, after, "scratch file changed while classifying");

        Ok(String::from_utf8_lossy(&content).into_owned())
    }
}

/// Never answers within any reasonable deadline.
pub struct SlowClassifier(pub Duration);

#[async_trait]
impl Classifier for SlowClassifier {
    async fn classify(&self, _image: ImageUpload<'_>) -> Result<String, ClassifyError> {
        tokio::time::sleep(self.0).await;
        Ok("metal".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_classifier_records_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");
        let classifier = EchoClassifier::default();

        let image = ImageUpload {
            path: &missing,
            mime_type: "image/jpeg",
            display_name: "gone.jpg",
        };
        let result = classifier.classify(image).await;

        assert!(matches!(result, Err(ClassifyError::ReadImage { .. })));
        let calls = classifier.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].existed);
    }
}

//! Gemini-backed [`Classifier`].
//!
//! One classification is three calls against the Generative Language API:
//!
//! ```text
//! POST /upload/v1beta/files                    (resumable upload: start)
//!   └─ x-goog-upload-url ──► POST <session>    (upload, finalize) ──► file.uri
//! POST /v1beta/models/{model}:generateContent  (fileData(uri) + prompt) ──► candidates[0]
//! ```
//!
//! plus an optional `DELETE /v1beta/{file.name}` when `delete_uploaded_files` is set.

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::types::{Content, FileMetadata, GenerateContentRequest, GenerateContentResponse, StartUploadRequest, UploadFileResponse, UploadedFile};
use super::{CLASSIFY_PROMPT, Classifier, ClassifyError, ImageUpload};
use crate::config::GeminiConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Client for the Gemini Files and `generateContent` APIs.
///
/// Holds a single `reqwest::Client`, so cloning the surrounding `Arc` is all that is needed to
/// share it between request tasks.
pub struct GeminiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    request_timeout: Duration,
    delete_uploaded_files: bool,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key()
            .ok_or_else(|| anyhow::anyhow!("Gemini API key is not configured"))?
            .to_string();

        // reqwest is built without a bundled provider; a no-op if main already installed it
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let client = Client::builder().timeout(config.request_timeout).build()?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            timeout = ?config.request_timeout,
            "Gemini client configured"
        );

        Ok(Self {
            client,
            base_url: ensure_slash(&config.base_url),
            api_key,
            model: config.model.clone(),
            request_timeout: config.request_timeout,
            delete_uploaded_files: config.delete_uploaded_files,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassifyError {
        if e.is_timeout() {
            ClassifyError::Timeout(self.request_timeout)
        } else {
            ClassifyError::Transport(e)
        }
    }

    /// Upload the image with the resumable protocol and return the provider's file handle.
    #[instrument(skip_all, fields(display_name = image.display_name, mime_type = image.mime_type, bytes = data.len()))]
    async fn upload(&self, image: &ImageUpload<'_>, data: Vec<u8>) -> Result<UploadedFile, ClassifyError> {
        let url = self.base_url.join("upload/v1beta/files")?;

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len())
            .header("X-Goog-Upload-Header-Content-Type", image.mime_type)
            .json(&StartUploadRequest {
                file: FileMetadata {
                    display_name: image.display_name.to_string(),
                },
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = ensure_success(response).await?;

        let session_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ClassifyError::Upload {
                message: "provider did not return an upload URL".to_string(),
            })?;

        debug!("Upload session opened, sending bytes");

        let response = self
            .client
            .post(session_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(data)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = ensure_success(response).await?;

        let uploaded: UploadFileResponse = self.decode(response).await?;
        if uploaded.file.uri.is_empty() {
            return Err(ClassifyError::Upload {
                message: "provider returned a file without a URI".to_string(),
            });
        }

        debug!(name = %uploaded.file.name, uri = %uploaded.file.uri, "File uploaded");
        Ok(uploaded.file)
    }

    /// Ask the model to classify an uploaded file.
    #[instrument(skip_all, fields(model = %self.model, file = %file.name))]
    async fn generate(&self, file: &UploadedFile, mime_type: &str) -> Result<String, ClassifyError> {
        let url = self.base_url.join(&format!("v1beta/models/{}:generateContent", self.model))?;

        let request = GenerateContentRequest {
            contents: vec![Content::user_file_prompt(file, mime_type, CLASSIFY_PROMPT)],
        };

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = ensure_success(response).await?;

        let generated: GenerateContentResponse = self.decode(response).await?;
        if let Some(reason) = generated.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            debug!(finish_reason = reason, "Model finished");
        }

        generated.first_candidate_text().ok_or(ClassifyError::EmptyResponse)
    }

    /// Best-effort removal of an uploaded file. Failures are logged and otherwise ignored.
    async fn delete_file(&self, file: &UploadedFile) {
        let url = match self.base_url.join(&format!("v1beta/{}", file.name)) {
            Ok(url) => url,
            Err(e) => {
                warn!(file = %file.name, error = %e, "Cannot build delete URL for uploaded file");
                return;
            }
        };

        match self.client.delete(url).header(API_KEY_HEADER, &self.api_key).send().await {
            Ok(response) if response.status().is_success() => debug!(file = %file.name, "Deleted uploaded file"),
            Ok(response) => warn!(file = %file.name, status = %response.status(), "Provider refused to delete uploaded file"),
            Err(e) => warn!(file = %file.name, error = %e, "Failed to delete uploaded file"),
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(&self, response: Response) -> Result<T, ClassifyError> {
        // Get the response body as text first for logging
        let body_text = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!("Gemini response body: {}", body_text);

        serde_json::from_str(&body_text).map_err(|e| {
            tracing::error!(error = %e, body = %body_text, "Failed to parse Gemini response as JSON");
            ClassifyError::Decode(e)
        })
    }
}

#[async_trait]
impl Classifier for GeminiClient {
    #[instrument(skip_all, fields(path = %image.path.display()))]
    async fn classify(&self, image: ImageUpload<'_>) -> Result<String, ClassifyError> {
        let data = tokio::fs::read(image.path).await.map_err(|source| ClassifyError::ReadImage {
            path: image.path.to_path_buf(),
            source,
        })?;

        let file = self.upload(&image, data).await?;
        let result = self.generate(&file, image.mime_type).await;

        if self.delete_uploaded_files {
            self.delete_file(&file).await;
        }

        result
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClassifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(%status, body = %excerpt(&body), "Gemini request failed");
    Err(ClassifyError::Provider { status, body })
}

/// First 200 characters, for log lines. Error bodies are sometimes whole HTML pages.
fn excerpt(body: &str) -> &str {
    let end = body.char_indices().nth(200).map(|(i, _)| i).unwrap_or(body.len());
    &body[..end]
}

/// Makes sure a url has a trailing slash.
///
/// `Url::join` replaces the last path segment unless the base ends with '/', so a base like
/// `https://proxy.example.com/gemini` would otherwise lose its `gemini` segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

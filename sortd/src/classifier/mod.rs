//! Image classification against a remote multimodal model.
//!
//! The HTTP layer only sees the [`Classifier`] trait. In production it is backed by
//! [`GeminiClient`], which uploads the staged image to the Gemini Files API and asks the model
//! for one of the four [`Category`] labels. Tests swap in their own implementations.

mod gemini;
mod label;
pub mod types;

pub use gemini::GeminiClient;
pub use label::{Category, LabelPolicy};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error as ThisError;

/// Instruction sent alongside every image.
pub const CLASSIFY_PROMPT: &str = "Classify this image as 'metal', 'clothes', 'paper', 'plastic'. DON'T GIVE ANYTHING ELSE AS ANSWER.";

/// Media type declared when the upload does not carry a usable one.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// An image staged on local disk, ready to be sent to the provider.
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub path: &'a Path,
    pub mime_type: &'a str,
    /// Name shown for the file on the provider side
    pub display_name: &'a str,
}

#[derive(ThisError, Debug)]
pub enum ClassifyError {
    /// The staged image could not be read back
    #[error("error reading image {}: {source}", .path.display())]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The upload handshake did not produce a usable file reference
    #[error("error uploading file: {message}")]
    Upload { message: String },

    /// Network or protocol failure talking to the provider
    #[error("error sending message: {0}")]
    Transport(#[source] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Provider { status: reqwest::StatusCode, body: String },

    #[error("error decoding provider response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),

    /// No candidate, no content, or no text in the first candidate
    #[error("empty response received")]
    EmptyResponse,

    #[error("classification timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    /// Rejected by [`LabelPolicy::Strict`]
    #[error("model answered with an unknown category: {0:?}")]
    UnknownLabel(String),
}

/// Turns a staged image into a category label.
///
/// Implementations are shared across all request tasks, so they must be cheap to call
/// concurrently and hold no per-request state.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the image and return the model's answer as text.
    async fn classify(&self, image: ImageUpload<'_>) -> Result<String, ClassifyError>;
}

//! Request and response bodies for the Gemini REST API (`v1beta`).
//!
//! Only the fields this service reads or writes are modelled; everything else in provider
//! responses is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Body of the resumable upload `start` request.
#[derive(Debug, Serialize)]
pub struct StartUploadRequest {
    pub file: FileMetadata,
}

#[derive(Debug, Serialize)]
pub struct FileMetadata {
    pub display_name: String,
}

/// Body returned when an upload is finalized.
#[derive(Debug, Deserialize)]
pub struct UploadFileResponse {
    pub file: UploadedFile,
}

/// Provider-side handle for an uploaded file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, e.g. `files/abc-123`
    #[serde(default)]
    pub name: String,
    /// URI referenced from `fileData` parts
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn referencing an uploaded file followed by a text instruction.
    pub fn user_file_prompt(file: &UploadedFile, mime_type: &str, prompt: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![
                Part {
                    file_data: Some(FileData {
                        mime_type: mime_type.to_string(),
                        file_uri: file.uri.clone(),
                    }),
                    ..Default::default()
                },
                Part {
                    text: Some(prompt.to_string()),
                    ..Default::default()
                },
            ],
        }
    }
}

/// A piece of content. Parts of kinds we do not model (inline data, function calls, ...)
/// deserialize with both fields empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated in order.
    ///
    /// `None` when there is no candidate, the first candidate has no content, or that content
    /// holds no text at all.
    pub fn first_candidate_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|part| part.text).collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

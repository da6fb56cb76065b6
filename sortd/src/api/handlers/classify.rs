//! HTTP handler for image classification.

use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use tracing::{debug, info};

use crate::AppState;
use crate::api::models::ClassifyResponse;
use crate::classifier::{ClassifyError, DEFAULT_MIME_TYPE, ImageUpload};
use crate::errors::{Error, Result};

const FILE_FIELD: &str = "file";

/// The `file` part of the form, fully buffered.
struct FileUpload {
    data: Vec<u8>,
    mime_type: String,
    file_name: Option<String>,
}

#[utoipa::path(
    post,
    path = "/classify",
    tag = "classify",
    summary = "Classify an image",
    description = "Upload an image as the `file` part of a multipart form. The image is forwarded to the configured \
model, which is asked to answer with one of `metal`, `clothes`, `paper` or `plastic`.

The answer is returned as `category`. Depending on `classify.label_policy` it is passed through verbatim (default), \
normalised, or rejected when it is not one of the four categories.",
    request_body(
        content_type = "multipart/form-data",
        description = "Form with a `file` part holding the image (JPEG unless the part says otherwise)"
    ),
    responses(
        (status = 200, description = "Image classified", body = ClassifyResponse),
        (status = 400, description = "No `file` part in the request", body = crate::api::models::ErrorResponse),
        (status = 413, description = "Upload larger than `classify.max_upload_bytes`", body = crate::api::models::ErrorResponse),
        (status = 500, description = "Upload could not be staged, or classification failed", body = crate::api::models::ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn classify_image(State(state): State<AppState>, multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Json<ClassifyResponse>> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "Request is not a multipart form");
        no_file_part()
    })?;

    let upload = read_file_field(&mut multipart).await?;
    debug!(
        file_name = ?upload.file_name,
        mime_type = %upload.mime_type,
        size = upload.data.len(),
        "Received upload"
    );

    // Dropping `scratch` removes the file, on every path out of this function
    let scratch = state
        .scratch
        .write(&upload.data, extension_for(&upload.mime_type))
        .await
        .map_err(|source| Error::Storage { source })?;

    let image = ImageUpload {
        path: scratch.path(),
        mime_type: &upload.mime_type,
        display_name: upload.file_name.as_deref().unwrap_or_else(|| scratch.file_name()),
    };

    let deadline = state.config.gemini.request_timeout;
    let raw = tokio::time::timeout(deadline, state.classifier.classify(image))
        .await
        .map_err(|_| ClassifyError::Timeout(deadline))??;

    let category = state.config.classify.label_policy.apply(raw)?;
    info!(category = %category, "Image classified");

    Ok(Json(ClassifyResponse { category }))
}

/// Find the `file` part and buffer it. Other parts are skipped.
async fn read_file_field(multipart: &mut Multipart) -> Result<FileUpload> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let mime_type = field
            .content_type()
            .filter(|content_type| content_type.starts_with("image/"))
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        return Ok(FileUpload {
            data: data.to_vec(),
            mime_type,
            file_name,
        });
    }

    Err(no_file_part())
}

fn no_file_part() -> Error {
    Error::BadRequest {
        message: "No file part".to_string(),
    }
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { message: e.body_text() }
    } else {
        debug!(error = %e, "Failed to parse multipart data");
        no_file_part()
    }
}

/// Scratch file extension for an image media type.
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        "image/heif" => "heif",
        _ => "img",
    }
}

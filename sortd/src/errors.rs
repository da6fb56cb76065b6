use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

use crate::api::models::ErrorResponse;
use crate::classifier::ClassifyError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data, e.g. no `file` part in the upload
    #[error("{message}")]
    BadRequest { message: String },

    /// Upload exceeds the configured body limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// The upload could not be staged on disk
    #[error("Failed to save file: {source}")]
    Storage {
        #[source]
        source: std::io::Error,
    },

    /// The remote classification failed or returned nothing usable
    #[error(transparent)]
    Classification(#[from] ClassifyError),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Classification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `error` field of the response body.
    ///
    /// Classification errors are passed through as-is: callers are trusted devices on the
    /// local network and the provider's message is the useful part.
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } | Error::PayloadTooLarge { message } => message.clone(),
            Error::Storage { .. } => "Failed to save file".to_string(),
            Error::Classification(e) => e.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Storage { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Classification(_) => {
                tracing::warn!("Classification failed: {:#}", self);
            }
            Error::BadRequest { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = ErrorResponse { error: self.user_message() };
        (status, Json(body)).into_response()
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;

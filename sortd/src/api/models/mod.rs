//! Response bodies shared by the handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Successful classification
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassifyResponse {
    /// Label chosen by the model, normally one of `metal`, `clothes`, `paper`, `plastic`
    #[schema(example = "plastic")]
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "No file part")]
    pub error: String,
}

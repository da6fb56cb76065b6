//! OpenAPI documentation, served as JSON at `/api-docs/openapi.json` and rendered at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "sortd",
        description = "Classifies photos of waste into `metal`, `clothes`, `paper` or `plastic` using a multimodal model.

Post an image as the `file` part of a multipart form to `/classify`. Errors are returned as `{\"error\": \"...\"}`."
    ),
    paths(
        api::handlers::classify::classify_image,
        api::handlers::health::health,
    ),
    components(schemas(
        api::models::ClassifyResponse,
        api::models::HealthResponse,
        api::models::ErrorResponse,
    )),
    tags(
        (name = "classify", description = "Image classification"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

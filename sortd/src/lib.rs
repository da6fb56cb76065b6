//! # sortd: image classification relay
//!
//! `sortd` accepts photos from a waste-sorting camera over HTTP, hands each one to a multimodal
//! model (Google Gemini), and answers with the category the model picked: `metal`, `clothes`,
//! `paper` or `plastic`.
//!
//! ## Request Flow
//!
//! A client posts a multipart form with a `file` part to `/classify`. The handler buffers the
//! part, stages it as a uniquely named file in the scratch directory, and passes it to the
//! configured [`Classifier`](classifier::Classifier). The Gemini implementation uploads the file
//! through the resumable Files API, asks the model to classify it with a fixed prompt, and returns
//! the text of the first candidate. The scratch file is removed once the request finishes, whether
//! it succeeded, failed, or the client went away.
//!
//! Requests are independent. Nothing is shared between them apart from the HTTP client and the
//! read-only configuration, so they are served concurrently.
//!
//! ## Modules
//!
//! - [`api`]: HTTP handlers and response bodies
//! - [`classifier`]: the [`Classifier`](classifier::Classifier) seam and the Gemini client
//! - [`config`]: YAML and environment configuration
//! - [`errors`]: error type and its HTTP mapping
//! - [`scratch`]: temporary storage for uploads
//! - [`telemetry`]: tracing and OpenTelemetry setup
//!
//! ## Running
//!
//! ```bash
//! GEMINI_API_KEY=... sortd -f sortd.yaml
//! ```
//!
//! The server listens on `0.0.0.0:5000` by default. See [`config`] for the full list of settings.

pub mod api;
pub mod classifier;
pub mod config;
pub mod errors;
mod openapi;
pub mod scratch;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod test;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::classifier::{Classifier, GeminiClient};
use crate::config::CorsOrigin;
pub use crate::config::Config;
use crate::openapi::ApiDoc;
use crate::scratch::ScratchDir;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .classifier(Arc::new(GeminiClient::new(&config.gemini)?))
///     .scratch(ScratchDir::new(&config.scratch.dir))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub classifier: Arc<dyn Classifier>,
    pub scratch: ScratchDir,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    // A wildcard anywhere in the list allows every origin
    let allow_origin = if config.cors.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: the classify and health endpoints, the OpenAPI document and
/// its rendered docs, wrapped in CORS and tracing layers.
///
/// # Errors
///
/// Returns an error if the CORS configuration holds an origin that is not a valid header value.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let upload_limit = state.config.classify.max_upload_bytes;
    let cors = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route(
            "/classify",
            post(api::handlers::classify::classify_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/health", get(api::handlers::health::health))
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct.
///
/// 1. **Create**: [`Application::new`] builds the Gemini client, prepares the scratch directory
///    and the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application backed by the Gemini client described in `config`.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let classifier = GeminiClient::new(&config.gemini)?;
        info!(model = classifier.model(), "Using Gemini classifier");
        Self::new_with_classifier(config, Arc::new(classifier)).await
    }

    /// Create a new application with a caller-supplied classifier.
    pub async fn new_with_classifier(config: Config, classifier: Arc<dyn Classifier>) -> anyhow::Result<Self> {
        debug!("Starting sortd with configuration: {:#?}", config);

        let scratch = ScratchDir::new(&config.scratch.dir);
        scratch
            .ensure_exists()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create scratch directory {}: {e}", scratch.path().display()))?;

        let state = AppState::builder().config(config.clone()).classifier(classifier).scratch(scratch).build();
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("sortd listening on http://{}, available at http://localhost:{}", bind_addr, self.config.port);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

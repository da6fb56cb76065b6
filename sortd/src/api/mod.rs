//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response bodies
//!
//! # API Structure
//!
//! - `POST /classify`: multipart upload with a `file` part, answers `{"category": ...}`
//! - `GET /health`: liveness probe, answers `{"status": "ok"}`
//!
//! Errors are JSON objects with a single `error` field. The OpenAPI document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;

//! HTTP route handlers.
//!
//! Every route is served at the root (the paths the clients call) and again
//! under `/api`.

pub mod events;
pub mod files;
pub mod fingerprint;
pub mod identify;
pub mod privacy;
pub mod recipients;
pub mod stats;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use whisperprint_core::Error;

use crate::state::AppState;

/// Status plus JSON body, the shape every handler returns.
pub type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let routes = api_routes();
    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(fingerprint::routes())
        .merge(identify::routes())
        .merge(privacy::routes())
        .merge(recipients::routes())
        .merge(stats::routes())
        .merge(events::routes())
        .merge(files::routes())
}

pub fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::UnsupportedContent(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Revoked(_) | Error::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(e: Error) -> ApiResponse {
    let status = status_for(&e);
    if !e.is_client_error() {
        error!("Request failed: {}", e);
    }
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

pub fn bad_request(message: impl Into<String>) -> ApiResponse {
    error_response(Error::Validation(message.into()))
}

/// `200` with the serialized value, or the mapped error.
pub fn respond<T: Serialize>(result: whisperprint_core::Result<T>) -> ApiResponse {
    match result.and_then(|v| serde_json::to_value(v).map_err(Error::from)) {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => error_response(e),
    }
}

/// Unwrap a JSON body, turning malformed or incomplete bodies into `400`.
pub fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiResponse> {
    body.map(|Json(v)| v)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

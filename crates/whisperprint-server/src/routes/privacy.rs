//! Privacy guardian routes: content checks and reviewer feedback.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use whisperprint_runtime::{CheckRequest, FeedbackRequest};

use super::{parse_body, respond, ApiResponse};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/check", post(check_content))
        .route("/feedback", post(record_feedback))
        .route("/risk-config", get(risk_config))
}

/// POST /check: `{content, content_type?, metadata?}`.
async fn check_content(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CheckRequest>, JsonRejection>,
) -> ApiResponse {
    match parse_body(body) {
        Ok(req) => respond(state.orchestrator.check(&state.store, &req)),
        Err(resp) => resp,
    }
}

/// POST /feedback: `{detection_id, action, was_correct, comments?}`.
async fn record_feedback(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> ApiResponse {
    match parse_body(body) {
        Ok(req) => respond(state.orchestrator.feedback(&state.store, &req)),
        Err(resp) => resp,
    }
}

/// GET /risk-config: effective weights and bands.
async fn risk_config(State(state): State<Arc<AppState>>) -> ApiResponse {
    respond(Ok(state.orchestrator.scorer().config()))
}

//! Leak identification route.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use whisperprint_runtime::IdentifyRequest;

use super::{parse_body, respond, ApiResponse};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/identify", post(identify))
}

/// POST /identify: `{leaked_text}` → `{recipient_id, confidence, metadata}`.
///
/// No match is a `200` with `recipient_id: null`.
async fn identify(
    State(state): State<Arc<AppState>>,
    body: Result<Json<IdentifyRequest>, JsonRejection>,
) -> ApiResponse {
    match parse_body(body) {
        Ok(req) => respond(state.orchestrator.identify(&state.store, &req)),
        Err(resp) => resp,
    }
}

//! Stats, health, analytics and audit log routes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{respond, ApiResponse};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/health", get(health))
        .route("/analytics", get(analytics))
        .route("/audit-logs", get(audit_logs))
}

#[derive(Deserialize)]
struct AnalyticsParams {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    30
}

#[derive(Deserialize)]
struct AuditParams {
    #[serde(default = "default_audit_limit")]
    limit: usize,
    event_type: Option<String>,
}

fn default_audit_limit() -> usize {
    100
}

/// GET /stats: `{fingerprinted_documents, total_recipients, content_checks,
/// identified_leaks, feedback_count}`.
async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResponse {
    respond(state.orchestrator.stats(&state.store))
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> ApiResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "redundancy": state.orchestrator.codec().redundancy(),
            "event_subscribers": state.orchestrator.events().subscriber_count(),
        })),
    )
}

/// GET /analytics?days: activity over the last `days` days (1..=365).
async fn analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResponse {
    respond(state.store.analytics(params.days.clamp(1, 365)))
}

/// GET /audit-logs?limit&event_type: newest first.
async fn audit_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditParams>,
) -> ApiResponse {
    let limit = params.limit.clamp(1, 1000);
    let event_type = params.event_type.as_deref().filter(|t| !t.is_empty());
    respond(state.store.audit_events(limit, event_type).map(|logs| {
        serde_json::json!({
            "logs": logs,
            "count": logs.len(),
        })
    }))
}

//! Recipient administration: list, inspect, rename, revoke.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use whisperprint_core::{require_non_empty, Error, Result};
use whisperprint_store::{Recipient, RegistryStore};

use super::{parse_body, respond, ApiResponse};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipients", get(list_recipients))
        .route(
            "/recipients/{recipient_id}",
            get(get_recipient).put(rename_recipient).delete(revoke_recipient),
        )
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(Deserialize)]
struct RenameBody {
    recipient_id: String,
}

fn lookup(store: &RegistryStore, recipient_id: &str) -> Result<Recipient> {
    store
        .get_recipient(recipient_id)?
        .ok_or_else(|| Error::NotFound(format!("recipient {}", recipient_id)))
}

/// GET /recipients?limit&offset
async fn list_recipients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResponse {
    let limit = params.limit.clamp(1, 1000);
    respond(
        state
            .store
            .list_recipients(limit, params.offset)
            .and_then(|recipients| {
                let total = state.store.count_recipients()?;
                Ok(serde_json::json!({
                    "recipients": recipients,
                    "count": recipients.len(),
                    "total": total,
                }))
            }),
    )
}

/// GET /recipients/{recipient_id}: the recipient and its fingerprint records.
async fn get_recipient(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<String>,
) -> ApiResponse {
    respond(lookup(&state.store, &recipient_id).and_then(|recipient| {
        let fingerprints = state.store.fingerprints_for(&recipient.uuid)?;
        Ok(serde_json::json!({
            "recipient": recipient,
            "fingerprints": fingerprints,
        }))
    }))
}

/// PUT /recipients/{recipient_id}: `{recipient_id}`; the uuid is kept.
async fn rename_recipient(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<String>,
    body: std::result::Result<Json<RenameBody>, JsonRejection>,
) -> ApiResponse {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    respond(
        require_non_empty("recipient_id", &body.recipient_id)
            .and_then(|_| lookup(&state.store, &recipient_id))
            .and_then(|recipient| {
                state
                    .store
                    .rename_recipient(&recipient.uuid, body.recipient_id.trim())
            }),
    )
}

/// DELETE /recipients/{recipient_id}: revoke; later leaks no longer resolve.
async fn revoke_recipient(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<String>,
) -> ApiResponse {
    respond(lookup(&state.store, &recipient_id).and_then(|recipient| {
        let revoked = state.store.revoke_recipient(&recipient.uuid)?;
        Ok(serde_json::json!({
            "status": if revoked { "revoked" } else { "already_revoked" },
            "recipient_id": recipient.recipient_id,
            "uuid": recipient.uuid,
        }))
    }))
}

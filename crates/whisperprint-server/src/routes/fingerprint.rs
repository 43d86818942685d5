//! Fingerprint routes: watermark text or an uploaded file for a recipient.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use whisperprint_runtime::{FileUpload, FingerprintRequest};

use super::{bad_request, parse_body, respond, ApiResponse};
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fingerprint", post(fingerprint_text))
        .route(
            "/fingerprint/file",
            post(fingerprint_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

/// POST /fingerprint: `{text, recipient_id, metadata?}`.
async fn fingerprint_text(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FingerprintRequest>, JsonRejection>,
) -> ApiResponse {
    let req = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    respond(state.orchestrator.fingerprint(&state.store, &req))
}

/// POST /fingerprint/file: multipart `file`, `recipient_id`,
/// `preserve_metadata`, `metadata` (JSON string).
async fn fingerprint_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResponse {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut recipient_id = String::new();
    let mut preserve_metadata = false;
    let mut metadata = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(format!("Invalid multipart body: {}", e)),
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("document.txt").to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes.to_vec())),
                    Err(e) => return bad_request(format!("Failed to read file: {}", e)),
                }
            }
            "recipient_id" => recipient_id = field.text().await.unwrap_or_default(),
            "preserve_metadata" => {
                preserve_metadata = field
                    .text()
                    .await
                    .map(|v| v.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false)
            }
            "metadata" => {
                let raw = field.text().await.unwrap_or_default();
                if !raw.trim().is_empty() {
                    match serde_json::from_str(&raw) {
                        Ok(value) => metadata = Some(value),
                        Err(e) => return bad_request(format!("metadata is not valid JSON: {}", e)),
                    }
                }
            }
            _ => {}
        }
    }

    let Some((filename, bytes)) = file else {
        return bad_request("file is required");
    };
    let upload = FileUpload {
        filename,
        bytes,
        recipient_id,
        preserve_metadata,
        metadata,
    };
    respond(state.orchestrator.fingerprint_file(&state.store, &upload))
}

//! Download of fingerprinted files.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use whisperprint_ingest::{sanitize_filename, FileType};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/files/fingerprinted/{tracking_id}/{filename}",
        get(download_fingerprinted),
    )
}

fn content_type_for(filename: &str) -> &'static str {
    match FileType::from_filename(filename) {
        FileType::Docx => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        FileType::Json => "application/json",
        FileType::Markdown => "text/markdown; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    }
}

/// GET /files/fingerprinted/{tracking_id}/{filename}
async fn download_fingerprinted(
    State(state): State<Arc<AppState>>,
    Path((tracking_id, filename)): Path<(String, String)>,
) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "File not found" })),
        )
            .into_response()
    };

    // Both segments must already be safe path components.
    if uuid::Uuid::parse_str(&tracking_id).is_err() || sanitize_filename(&filename) != filename {
        return not_found();
    }

    let path = state
        .orchestrator
        .output_dir()
        .join(&tracking_id)
        .join(&filename);
    match std::fs::read(&path) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type_for(&filename).to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => not_found(),
    }
}

//! Live activity stream over server-sent events.
//!
//! A new subscriber first receives a `history` event holding the recent
//! events as a JSON array, then one unnamed event per completed operation.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::state::AppState;

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(stream_events))
}

/// GET /events
async fn stream_events(State(state): State<Arc<AppState>>) -> Sse<KeepAliveStream<SseStream>> {
    let (history, mut rx) = state.orchestrator.events().subscribe();

    let stream: SseStream = Box::pin(async_stream::stream! {
        yield Ok::<_, Infallible>(
            Event::default()
                .event("history")
                .data(serde_json::to_string(&history).unwrap_or_default()),
        );

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().data(data));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

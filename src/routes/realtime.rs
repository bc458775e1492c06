use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{extract::State, Router};
use futures::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::response::AppError;
use crate::routes::session::SessionStatus;
use crate::state::AppState;

static SSE_CONNECTION_COUNT: AtomicUsize = AtomicUsize::new(0);

struct SseGuard;
impl Drop for SseGuard {
    fn drop(&mut self) {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(sse_handler))
}

/// Display collaborator feed: a `status` snapshot on connect, then every
/// session event (`session_started`, `frame`, `alarm`, `session_stopped`).
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let max_sse = state.config().limits.max_sse_connections;
    let current = SSE_CONNECTION_COUNT.fetch_add(1, Ordering::SeqCst);
    if current >= max_sse {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
        return Err(AppError::too_many_requests("Too many SSE connections"));
    }
    let guard = SseGuard;

    // subscribe before the snapshot so nothing falls between the two
    let mut events = BroadcastStream::new(state.sessions().subscribe());
    let mut shutdown_rx = state.shutdown_rx();

    let session = match state.sessions().current().await {
        Some(s) => Some(s.summary().await),
        None => None,
    };
    let snapshot = SessionStatus {
        active: session.is_some(),
        session,
    };

    let stream = async_stream::stream! {
        let _guard = guard;

        if let Ok(json) = serde_json::to_string(&snapshot) {
            yield Ok(Event::default().event("status").data(json));
        }

        loop {
            tokio::select! {
                item = events.next() => match item {
                    Some(Ok(event)) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            yield Ok(Event::default().event(event.kind()).data(json));
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        tracing::warn!(skipped, "SSE subscriber lagging, events dropped");
                        yield Ok(Event::default().event("lagged").data(skipped.to_string()));
                    }
                    None => break,
                },
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}

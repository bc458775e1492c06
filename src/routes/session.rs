use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

use crate::detection::{DetectionOverrides, FrameLandmarks};
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::session::SessionSummary;
use crate::state::AppState;

/// Upper bound on faces accepted in a single frame.
const MAX_FACES_PER_FRAME: usize = 16;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/frames", post(submit_frame))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub active: bool,
    pub session: Option<SessionSummary>,
}

pub async fn status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let session = match state.sessions().current().await {
        Some(s) => Some(s.summary().await),
        None => None,
    };
    Ok(ok(SessionStatus {
        active: session.is_some(),
        session,
    }))
}

pub async fn start(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // an empty body starts a session with the server defaults
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        DetectionOverrides::default()
    } else {
        serde_json::from_slice::<DetectionOverrides>(&body).map_err(|e| {
            tracing::warn!(error = %e, "Invalid session overrides");
            AppError::bad_request("INVALID_REQUEST_BODY", &e.to_string())
        })?
    };
    let session = state.sessions().start(&overrides).await?;
    Ok(created(session.info().clone()))
}

pub async fn stop(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let summary = state.sessions().stop().await?;
    Ok(ok(summary))
}

pub async fn submit_frame(
    State(state): State<AppState>,
    JsonBody(frame): JsonBody<FrameLandmarks>,
) -> Result<impl IntoResponse, AppError> {
    if frame.faces.len() > MAX_FACES_PER_FRAME {
        return Err(AppError::bad_request(
            "TOO_MANY_FACES",
            &format!("At most {MAX_FACES_PER_FRAME} faces per frame"),
        ));
    }
    let session = state.sessions().active().await?;
    let report = session.process(&frame).await?;
    Ok(ok(report))
}

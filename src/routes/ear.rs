use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::Serialize;

use crate::detection::face::evaluate_face;
use crate::detection::{round_display, FaceLandmarks};
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(compute))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarResponse {
    pub left: Option<f64>,
    pub right: Option<f64>,
    /// Combined EAR rounded for display
    pub ear: Option<f64>,
    pub raw_ear: Option<f64>,
    pub no_eyes_detected: bool,
}

/// Stateless EAR evaluation of a single face; does not touch any session.
pub async fn compute(
    JsonBody(face): JsonBody<FaceLandmarks>,
) -> Result<impl IntoResponse, AppError> {
    let signal = evaluate_face(&face);
    let raw = signal.ear();
    Ok(ok(EarResponse {
        left: signal.eyes.left,
        right: signal.eyes.right,
        ear: raw.map(round_display),
        raw_ear: raw,
        no_eyes_detected: raw.is_none(),
    }))
}

//! Live pipeline status and control

use std::sync::Arc;

use axum::{extract::State, Json};
use emotion::DetectionSnapshot;
use serde::Serialize;

use crate::{ApiError, SharedState};

/// Current detection with the derived `face_detected` flag
#[derive(Debug, Serialize)]
pub struct EmotionsResponse {
    #[serde(flatten)]
    pub snapshot: DetectionSnapshot,
    pub face_detected: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Latest detection snapshot; never touches the pipeline itself
pub async fn emotions(State(state): State<SharedState>) -> Json<EmotionsResponse> {
    let snapshot = state.pipeline.snapshot();
    let face_detected = snapshot.face_detected();
    Json(EmotionsResponse {
        snapshot,
        face_detected,
    })
}

pub async fn start(State(state): State<SharedState>) -> Result<Json<StatusResponse>, ApiError> {
    let pipeline = Arc::clone(&state.pipeline);
    let started = tokio::task::spawn_blocking(move || pipeline.start())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let status = if started { "started" } else { "already running" };
    Ok(Json(StatusResponse { status }))
}

/// Stop the live run; returns once the camera is released
pub async fn stop(State(state): State<SharedState>) -> Result<Json<StatusResponse>, ApiError> {
    let pipeline = Arc::clone(&state.pipeline);
    let stopped = tokio::task::spawn_blocking(move || pipeline.stop())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let status = if stopped { "stopped" } else { "not running" };
    Ok(Json(StatusResponse { status }))
}

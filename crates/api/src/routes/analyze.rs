//! Single-shot analysis of an uploaded image

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use camera_capture::codec;
use emotion::{EmotionLabel, EmotionScores};
use frame_pipeline::{analyze_image, Analysis, PipelineError, RenderOptions};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{ApiError, SharedState};

/// Analyze request body
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 image, usually a `data:image/...;base64,` URI
    pub image: Option<String>,
}

/// Analyze response body
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub emotions: EmotionScores,
    pub dominant: Option<EmotionLabel>,
    pub confidence: f32,
    pub face_detected: bool,
    pub processed_image: String,
}

impl From<Analysis> for AnalyzeResponse {
    fn from(analysis: Analysis) -> Self {
        let processed_image = analysis.data_uri();
        let face_detected = analysis.face_detected();
        Self {
            success: true,
            emotions: analysis.snapshot.emotions,
            dominant: analysis.snapshot.dominant,
            confidence: analysis.snapshot.confidence,
            face_detected,
            processed_image,
        }
    }
}

/// Decode, detect, annotate and return the image.
///
/// The work runs on the blocking pool; waiting for it is bounded by
/// `server.analyze_timeout_ms`.
pub async fn analyze(
    State(state): State<SharedState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) = payload?;
    let image = request
        .image
        .filter(|image| !image.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No image provided".to_string()))?;

    let pipeline = Arc::clone(&state.pipeline);
    let quality = pipeline.config().jpeg_quality;
    let task = tokio::task::spawn_blocking(move || -> Result<Analysis, PipelineError> {
        let frame = codec::decode_data_uri(&image)?;
        let model = pipeline.model()?;
        analyze_image(model.as_ref(), frame, &RenderOptions::default(), quality)
    });

    let timeout = Duration::from_millis(state.config.server.analyze_timeout_ms);
    let analysis = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_error)) => {
            return Err(ApiError::Internal(format!("Analysis task failed: {join_error}")));
        }
        Err(_) => {
            warn!(timeout_ms = state.config.server.analyze_timeout_ms, "Analysis timed out");
            return Err(ApiError::Unavailable("Analysis timed out".to_string()));
        }
    };

    info!(
        face_detected = analysis.face_detected(),
        dominant = ?analysis.snapshot.dominant,
        confidence = analysis.snapshot.confidence,
        "Image analyzed"
    );
    Ok(Json(analysis.into()))
}

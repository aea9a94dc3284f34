//! MJPEG video feed

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use frame_pipeline::MULTIPART_CONTENT_TYPE;
use tracing::{info, warn};

use crate::{ApiError, SharedState};

/// Attach to the live stream, starting the pipeline if it is idle
pub async fn video_feed(State(state): State<SharedState>) -> Result<Response, ApiError> {
    if !state.pipeline.is_running() {
        let pipeline = Arc::clone(&state.pipeline);
        let started = tokio::task::spawn_blocking(move || pipeline.start())
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        if let Err(e) = started {
            warn!(error = %e, "Could not start pipeline for video feed");
            return Err(ApiError::Unavailable(format!("Video feed unavailable: {e}")));
        }
    }

    let publisher = state.pipeline.publisher();
    info!(consumers = publisher.consumers() + 1, "Video feed consumer attached");

    Ok((
        [
            (header::CONTENT_TYPE, MULTIPART_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(publisher.subscribe()),
    )
        .into_response())
}

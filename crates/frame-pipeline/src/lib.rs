//! Frame Pipeline
//!
//! Live emotion detection over a frame source:
//! - Counter-based detection throttle
//! - Shared latest-detection state (one writer, many readers)
//! - Deterministic overlay renderer with a built-in bitmap font
//! - Producer loop feeding an MJPEG stream publisher
//! - Single-shot analysis of uploaded images
//! - Pipeline manager owning the model slot and the producer thread

pub mod config;
pub mod font;
pub mod manager;
pub mod overlay;
pub mod pipeline;
pub mod publisher;
pub mod single_shot;
pub mod state;
pub mod throttle;

pub use config::PipelineConfig;
pub use manager::{PipelineManager, SourceFactory};
pub use overlay::{render, RenderOptions};
pub use pipeline::{CycleOutcome, CycleStage, DetectionStep, FramePipeline};
pub use publisher::{EncodedFrame, MjpegStream, StreamPublisher, MULTIPART_CONTENT_TYPE};
pub use single_shot::{analyze_data_uri, analyze_image, Analysis};
pub use state::SharedDetection;
pub use throttle::DetectionThrottle;

#[cfg(test)]
mod testing;

use camera_capture::{CameraError, CodecError};
use emotion::EmotionError;
use thiserror::Error;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Frame acquisition failed: {0}")]
    Acquisition(#[from] CameraError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Model(#[from] EmotionError),

    #[error("Failed to spawn pipeline thread: {0}")]
    ThreadSpawn(String),
}

impl PipelineError {
    /// Whether the error was caused by the caller's input rather than the server
    pub fn is_input_error(&self) -> bool {
        match self {
            PipelineError::Codec(e) => e.is_input_error(),
            _ => false,
        }
    }
}

//! Emotion Detection
//!
//! Face detection and facial expression classification:
//! - Closed set of emotion labels with display metadata
//! - Face and detection snapshot types shared by the pipeline and the API
//! - The `EmotionModel` seam, with an ONNX (tract) implementation and a mock
//! - A process-wide model slot that loads the model exactly once

pub mod config;
pub mod face;
pub mod label;
pub mod model;
pub mod onnx;

pub use config::EmotionConfig;
pub use face::{dominant_emotion, DetectionSnapshot, EmotionScores, Face, FaceBox};
pub use label::EmotionLabel;
pub use model::{load_model, EmotionModel, MockEmotionModel, ModelSlot};
pub use onnx::OnnxEmotionModel;

use thiserror::Error;

/// Emotion detection error types
#[derive(Error, Debug)]
pub enum EmotionError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}

//! Emotion model configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Emotion model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Face detector (UltraFace 320x240 layout)
    pub detector_model_path: Option<PathBuf>,

    /// Expression classifier (FER+ 64x64 grayscale layout)
    pub classifier_model_path: Option<PathBuf>,

    /// Face detection confidence threshold
    pub face_confidence: f32,

    /// IoU above which overlapping detections are suppressed
    pub nms_iou_threshold: f32,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            detector_model_path: None,
            classifier_model_path: None,
            face_confidence: 0.7,
            nms_iou_threshold: 0.3,
        }
    }
}

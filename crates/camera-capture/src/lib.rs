//! Camera Capture Library for the Emotion Pipeline
//!
//! Provides frame acquisition and the image codec used by the pipeline.
//! Supports:
//! - V4L2 webcams (MJPG or YUYV, behind the `v4l` feature)
//! - Replay of a directory of still images at a fixed frame rate
//! - JPEG encode / image decode, including base64 data URIs

pub mod codec;
pub mod frame;
pub mod source;

#[cfg(feature = "v4l")]
pub mod camera;

pub use codec::{CodecError, DEFAULT_JPEG_QUALITY};
pub use frame::VideoFrame;
pub use source::{open_source, FrameSource, ImageSequenceSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
///
/// Every variant means the source did not yield a frame. Only `CorruptFrame`
/// leaves the source usable; the others end a live run.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Camera disconnected: {0}")]
    Disconnected(String),

    #[error("End of stream")]
    EndOfStream,

    #[error("Unsupported source: {0}")]
    Unsupported(String),

    #[error("Corrupt frame: {0}")]
    CorruptFrame(String),
}

impl CameraError {
    /// Whether the next `next_frame` call can still succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CameraError::CorruptFrame(_))
    }
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or a directory of images to replay
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS (also the replay rate for image directories, 0 = unpaced)
    pub fps: u32,
    /// Restart image replay from the first file once exhausted
    pub loop_playback: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::webcam()
    }
}

impl CameraConfig {
    /// Create a 720p webcam config
    pub fn webcam() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            fps: 30,
            loop_playback: false,
        }
    }

    /// Create a looping replay config over a directory of images
    pub fn replay(directory: impl Into<String>, fps: u32) -> Self {
        Self {
            device: directory.into(),
            fps,
            loop_playback: true,
            ..Self::webcam()
        }
    }
}

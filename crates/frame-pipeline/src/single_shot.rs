//! Single-shot analysis of an uploaded image
//!
//! Exactly one cycle with detection forced and no mirroring. Runs on the
//! caller's thread and never touches the live pipeline's state.

use camera_capture::{codec, VideoFrame};
use emotion::{DetectionSnapshot, EmotionModel};
use tracing::debug;

use crate::overlay::{render, RenderOptions};
use crate::PipelineError;

/// Annotated image plus the detection it was rendered from
#[derive(Debug, Clone)]
pub struct Analysis {
    pub snapshot: DetectionSnapshot,
    /// Faces found; only the first one is annotated
    pub faces: usize,
    /// Annotated image, JPEG encoded
    pub jpeg: Vec<u8>,
}

impl Analysis {
    pub fn face_detected(&self) -> bool {
        self.snapshot.face_detected()
    }

    /// Annotated image as a `data:image/jpeg;base64,` URI
    pub fn data_uri(&self) -> String {
        codec::encode_data_uri(&self.jpeg)
    }
}

/// Detect, annotate and re-encode one frame.
///
/// Finding no face is a valid result with an empty snapshot.
pub fn analyze_image(
    model: &dyn EmotionModel,
    mut frame: VideoFrame,
    options: &RenderOptions,
    jpeg_quality: u8,
) -> Result<Analysis, PipelineError> {
    let faces = model.detect_emotions(&frame)?;
    let snapshot = DetectionSnapshot::from_faces(&faces);
    debug!(
        model = model.name(),
        faces = faces.len(),
        dominant = ?snapshot.dominant,
        "Single image analyzed"
    );

    render(&mut frame, &snapshot, options);
    let jpeg = codec::encode_jpeg(&frame, jpeg_quality)?;

    Ok(Analysis {
        snapshot,
        faces: faces.len(),
        jpeg,
    })
}

/// Decode a data URI (or bare base64) and analyze it
pub fn analyze_data_uri(
    model: &dyn EmotionModel,
    payload: &str,
    options: &RenderOptions,
    jpeg_quality: u8,
) -> Result<Analysis, PipelineError> {
    let frame = codec::decode_data_uri(payload)?;
    analyze_image(model, frame, options, jpeg_quality)
}

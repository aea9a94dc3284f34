//! ONNX emotion model running on tract
//!
//! Two graphs: an UltraFace-style face detector and a FER+-style expression
//! classifier applied to each detected face crop.

use std::path::Path;

use camera_capture::VideoFrame;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::{EmotionConfig, EmotionError, EmotionLabel, EmotionModel, EmotionScores, Face, FaceBox};

type Plan = TypedRunnableModel<TypedModel>;

const DETECTOR_WIDTH: usize = 320;
const DETECTOR_HEIGHT: usize = 240;
const CLASSIFIER_SIZE: usize = 64;

/// FER+ output order. `contempt` has no counterpart and is dropped.
const FERPLUS_CLASSES: [Option<EmotionLabel>; 8] = [
    Some(EmotionLabel::Neutral),
    Some(EmotionLabel::Happy),
    Some(EmotionLabel::Surprise),
    Some(EmotionLabel::Sad),
    Some(EmotionLabel::Angry),
    Some(EmotionLabel::Disgust),
    Some(EmotionLabel::Fear),
    None,
];

/// Detector candidate in normalized corner coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub corners: [f32; 4],
    pub score: f32,
}

/// Face detector + expression classifier
pub struct OnnxEmotionModel {
    detector: Plan,
    classifier: Plan,
    face_confidence: f32,
    nms_iou_threshold: f32,
    name: String,
}

impl OnnxEmotionModel {
    /// Load and optimize both graphs
    pub fn load(
        detector_path: &Path,
        classifier_path: &Path,
        config: &EmotionConfig,
    ) -> Result<Self, EmotionError> {
        info!("Loading face detection model from {}", detector_path.display());
        let detector = load_plan(detector_path, [1, 3, DETECTOR_HEIGHT, DETECTOR_WIDTH])?;

        info!("Loading emotion classifier from {}", classifier_path.display());
        let classifier = load_plan(classifier_path, [1, 1, CLASSIFIER_SIZE, CLASSIFIER_SIZE])?;

        let name = format!(
            "onnx:{}+{}",
            file_stem(detector_path),
            file_stem(classifier_path)
        );

        Ok(Self {
            detector,
            classifier,
            face_confidence: config.face_confidence,
            nms_iou_threshold: config.nms_iou_threshold,
            name,
        })
    }

    fn detect_faces(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, EmotionError> {
        let resized = frame.resize(DETECTOR_WIDTH as u32, DETECTOR_HEIGHT as u32);
        let input: Tensor = tract_ndarray::Array4::from_shape_fn(
            (1, 3, DETECTOR_HEIGHT, DETECTOR_WIDTH),
            |(_, c, y, x)| (resized.image.get_pixel(x as u32, y as u32)[c] as f32 - 127.0) / 128.0,
        )
        .into();

        let outputs = self.detector.run(tvec!(input.into())).map_err(inference_error)?;
        if outputs.len() < 2 {
            return Err(EmotionError::Inference(format!(
                "detector returned {} outputs, expected scores and boxes",
                outputs.len()
            )));
        }

        let scores = outputs[0]
            .to_array_view::<f32>()
            .map_err(inference_error)?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(inference_error)?;
        let boxes = outputs[1]
            .to_array_view::<f32>()
            .map_err(inference_error)?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(inference_error)?;

        let mut candidates = Vec::new();
        for i in 0..scores.shape()[1].min(boxes.shape()[1]) {
            let score = scores[[0, i, 1]];
            if score < self.face_confidence {
                continue;
            }
            candidates.push(Candidate {
                corners: [boxes[[0, i, 0]], boxes[[0, i, 1]], boxes[[0, i, 2]], boxes[[0, i, 3]]],
                score,
            });
        }

        let kept = non_max_suppression(candidates, self.nms_iou_threshold);
        debug!(faces = kept.len(), "face detection finished");

        Ok(kept
            .iter()
            .filter_map(|c| to_pixel_box(c.corners, frame.width(), frame.height()))
            .collect())
    }

    fn classify(&self, frame: &VideoFrame, bbox: FaceBox) -> Result<EmotionScores, EmotionError> {
        let crop = frame
            .crop(bbox.x as u32, bbox.y as u32, bbox.width as u32, bbox.height as u32)
            .ok_or_else(|| EmotionError::ImageProcessing(format!("face box {bbox:?} outside frame")))?;

        let gray = crop
            .resize(CLASSIFIER_SIZE as u32, CLASSIFIER_SIZE as u32)
            .to_grayscale();
        let input: Tensor = tract_ndarray::Array4::from_shape_fn(
            (1, 1, CLASSIFIER_SIZE, CLASSIFIER_SIZE),
            |(_, _, y, x)| gray[y * CLASSIFIER_SIZE + x] as f32,
        )
        .into();

        let outputs = self.classifier.run(tvec!(input.into())).map_err(inference_error)?;
        let logits: Vec<f32> = outputs
            .first()
            .ok_or_else(|| EmotionError::Inference("classifier returned no output".into()))?
            .to_array_view::<f32>()
            .map_err(inference_error)?
            .iter()
            .copied()
            .collect();

        ferplus_scores(&logits)
    }
}

impl EmotionModel for OnnxEmotionModel {
    fn detect_emotions(&self, frame: &VideoFrame) -> Result<Vec<Face>, EmotionError> {
        let boxes = self.detect_faces(frame)?;
        boxes
            .into_iter()
            .map(|bbox| self.classify(frame, bbox).map(|scores| Face::new(bbox, scores)))
            .collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn load_plan(path: &Path, shape: [usize; 4]) -> Result<Plan, EmotionError> {
    tract_onnx::onnx()
        .model_for_path(path)
        .and_then(|model| model.with_input_fact(0, f32::fact(shape).into()))
        .and_then(|model| model.into_optimized())
        .and_then(|model| model.into_runnable())
        .map_err(|e| EmotionError::ModelLoad(format!("{}: {e}", path.display())))
}

fn inference_error(e: impl std::fmt::Display) -> EmotionError {
    EmotionError::Inference(e.to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}

/// Softmax over FER+ logits, mapped onto the seven labels and renormalized
pub(crate) fn ferplus_scores(logits: &[f32]) -> Result<EmotionScores, EmotionError> {
    if logits.len() < FERPLUS_CLASSES.len() {
        return Err(EmotionError::Inference(format!(
            "classifier returned {} logits, expected {}",
            logits.len(),
            FERPLUS_CLASSES.len()
        )));
    }

    let logits = &logits[..FERPLUS_CLASSES.len()];
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();

    let kept: f32 = FERPLUS_CLASSES
        .iter()
        .zip(&exps)
        .filter(|(label, _)| label.is_some())
        .map(|(_, &e)| e)
        .sum();
    if kept.is_nan() || kept <= 0.0 {
        return Err(EmotionError::Inference("degenerate classifier output".into()));
    }

    Ok(FERPLUS_CLASSES
        .iter()
        .zip(exps)
        .filter_map(|(label, e)| label.map(|label| (label, e / kept)))
        .collect())
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy NMS; the result is sorted by descending score
pub(crate) fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| iou(&k.corners, &candidate.corners) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

/// Normalized corners to a pixel box clamped inside the frame
pub(crate) fn to_pixel_box(corners: [f32; 4], width: u32, height: u32) -> Option<FaceBox> {
    let (w, h) = (width as f32, height as f32);
    let left = (corners[0] * w).clamp(0.0, w);
    let top = (corners[1] * h).clamp(0.0, h);
    let right = (corners[2] * w).clamp(0.0, w);
    let bottom = (corners[3] * h).clamp(0.0, h);

    let bbox = FaceBox::new(
        left as i32,
        top as i32,
        (right - left) as i32,
        (bottom - top) as i32,
    );
    (bbox.width > 0 && bbox.height > 0).then_some(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ferplus_drops_contempt() {
        let logits = [0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 9.0];
        let scores = ferplus_scores(&logits).unwrap();

        assert_eq!(scores.len(), 7);
        let total: f32 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(scores[&EmotionLabel::Happy] > 0.9);
    }

    #[test]
    fn test_ferplus_rejects_short_output() {
        assert!(matches!(ferplus_scores(&[1.0, 2.0]), Err(EmotionError::Inference(_))));
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let candidates = vec![
            Candidate { corners: [0.1, 0.1, 0.5, 0.5], score: 0.8 },
            Candidate { corners: [0.12, 0.1, 0.52, 0.5], score: 0.95 },
            Candidate { corners: [0.6, 0.6, 0.9, 0.9], score: 0.75 },
        ];
        let kept = non_max_suppression(candidates, 0.3);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.95);
        assert_eq!(kept[1].score, 0.75);
    }

    #[test]
    fn test_pixel_box_clamped() {
        let bbox = to_pixel_box([-0.1, 0.5, 0.5, 1.2], 200, 100).unwrap();
        assert_eq!(bbox, FaceBox::new(0, 50, 100, 50));
        assert!(to_pixel_box([0.5, 0.5, 0.5, 0.9], 200, 100).is_none());
    }

    #[test]
    fn test_missing_model_file() {
        let result = OnnxEmotionModel::load(
            Path::new("/nonexistent/detector.onnx"),
            Path::new("/nonexistent/classifier.onnx"),
            &EmotionConfig::default(),
        );
        assert!(matches!(result, Err(EmotionError::ModelLoad(_))));
    }
}

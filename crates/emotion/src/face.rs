//! Face and detection snapshot types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::EmotionLabel;

/// Per-emotion scores in [0, 1], iterated in enumeration order
pub type EmotionScores = BTreeMap<EmotionLabel, f32>;

/// Face bounding box in source-frame pixels.
///
/// Not guaranteed to lie inside the frame; renderers clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

/// A detected face with its emotion scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    #[serde(rename = "box")]
    pub bbox: FaceBox,
    pub emotions: EmotionScores,
}

impl Face {
    /// Build a face, clamping scores into [0, 1] (NaN becomes 0)
    pub fn new(bbox: FaceBox, emotions: impl IntoIterator<Item = (EmotionLabel, f32)>) -> Self {
        let emotions = emotions
            .into_iter()
            .map(|(label, score)| {
                let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
                (label, score)
            })
            .collect();
        Self { bbox, emotions }
    }

    /// Highest scoring emotion and its score
    pub fn dominant(&self) -> Option<(EmotionLabel, f32)> {
        dominant_emotion(&self.emotions)
    }
}

/// Arg-max over the scores.
///
/// Ties go to the label that comes first in enumeration order.
pub fn dominant_emotion(scores: &EmotionScores) -> Option<(EmotionLabel, f32)> {
    let mut best: Option<(EmotionLabel, f32)> = None;
    for (&label, &score) in scores {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((label, score)),
        }
    }
    best
}

/// Latest detection result shared between the producer and its readers.
///
/// Replaced whole on every detection, never updated field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    pub emotions: EmotionScores,
    #[serde(rename = "box")]
    pub bbox: Option<FaceBox>,
    pub dominant: Option<EmotionLabel>,
    pub confidence: f32,
}

impl DetectionSnapshot {
    /// Snapshot with no face
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot describing a single face
    pub fn from_face(face: &Face) -> Self {
        let dominant = face.dominant();
        Self {
            emotions: face.emotions.clone(),
            bbox: Some(face.bbox),
            dominant: dominant.map(|(label, _)| label),
            confidence: dominant.map(|(_, score)| score).unwrap_or(0.0),
        }
    }

    /// Snapshot of the primary (first) face, or empty when there is none
    pub fn from_faces(faces: &[Face]) -> Self {
        faces.first().map(Self::from_face).unwrap_or_default()
    }

    pub fn face_detected(&self) -> bool {
        self.bbox.is_some()
    }

    /// Scores sorted descending; equal scores keep enumeration order
    pub fn ranked(&self) -> Vec<(EmotionLabel, f32)> {
        let mut ranked: Vec<(EmotionLabel, f32)> =
            self.emotions.iter().map(|(&label, &score)| (label, score)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

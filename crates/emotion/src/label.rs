//! Emotion labels

use std::fmt;

use serde::{Deserialize, Serialize};

/// Facial expression classes, in their fixed enumeration order.
///
/// The derived `Ord` follows declaration order, so ordered maps keyed by
/// label iterate in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Surprise,
    Fear,
    Disgust,
    Neutral,
}

impl EmotionLabel {
    /// Every label, in enumeration order
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Surprise,
        EmotionLabel::Fear,
        EmotionLabel::Disgust,
        EmotionLabel::Neutral,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Neutral => "neutral",
        }
    }

    /// Parse a label emitted by a model. Unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(label))
    }

    /// ASCII emoticon shown next to the label in the score panel
    pub fn emoticon(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => ":)",
            EmotionLabel::Sad => ":(",
            EmotionLabel::Angry => ">:(",
            EmotionLabel::Surprise => ":O",
            EmotionLabel::Fear => "D:",
            EmotionLabel::Disgust => ":P",
            EmotionLabel::Neutral => ":|",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

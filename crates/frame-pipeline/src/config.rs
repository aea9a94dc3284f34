//! Pipeline configuration

use serde::{Deserialize, Serialize};

/// Live pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames between model invocations
    pub detection_interval: u32,

    /// JPEG quality of emitted frames (1-100)
    pub jpeg_quality: u8,

    /// Mirror live frames horizontally
    pub mirror: bool,

    /// Draw the ranked score panel
    pub score_panel: bool,

    /// Hint drawn at the bottom-left corner
    pub footer: Option<String>,

    /// Start the live pipeline with the server
    pub autostart: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_interval: 3,
            jpeg_quality: camera_capture::DEFAULT_JPEG_QUALITY,
            mirror: true,
            score_panel: false,
            footer: None,
            autostart: false,
        }
    }
}

impl PipelineConfig {
    /// Standalone presentation: score panel and quit hint
    pub fn standalone() -> Self {
        Self {
            score_panel: true,
            footer: Some("CTRL-C TO QUIT".to_string()),
            ..Default::default()
        }
    }

    /// Detect on every frame
    pub fn realtime() -> Self {
        Self {
            detection_interval: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.detection_interval, 3);
        assert_eq!(config.jpeg_quality, 85);
        assert!(config.mirror);
        assert!(!config.score_panel);
    }

    #[test]
    fn test_standalone_config() {
        let config = PipelineConfig::standalone();
        assert!(config.score_panel);
        assert_eq!(config.footer.as_deref(), Some("CTRL-C TO QUIT"));
    }
}

//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, an optional TOML file,
//! `EMOTION_LENS_*` environment variables (`__` separates sections), and
//! finally `PORT`.

use std::env;
use std::path::{Path, PathBuf};

use camera_capture::CameraConfig;
use config::{Config, ConfigError, Environment, File};
use emotion::EmotionConfig;
use frame_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;

/// Config file read when `EMOTION_LENS_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "emotion-lens.toml";
/// Names an alternative config file
pub const CONFIG_PATH_ENV: &str = "EMOTION_LENS_CONFIG";
pub const ENV_PREFIX: &str = "EMOTION_LENS";

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on waiting for a single-shot analysis
    pub analyze_timeout_ms: u64,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            analyze_timeout_ms: 30_000,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Standalone demo settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Where the latest rendered frame is written
    pub output_path: PathBuf,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("emotion-demo.jpg"),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub pipeline: PipelineConfig,
    pub model: EmotionConfig,
    pub log: LogConfig,
    pub rate_limit: RateLimitConfig,
    pub demo: DemoConfig,
}

impl AppConfig {
    /// Load from the default file, the process environment and `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);

        Self::from_sources(Some(&path), Some(environment), env::var("PORT").ok())
    }

    /// Layer the given sources over the defaults and validate the result
    pub fn from_sources(
        file: Option<&Path>,
        environment: Option<Environment>,
        port: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        if let Some(environment) = environment {
            builder = builder.add_source(environment);
        }
        if let Some(port) = port {
            builder = builder.set_override("server.port", port)?;
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.detection_interval == 0 {
            return Err(invalid("pipeline.detection_interval must be at least 1"));
        }
        if !(1..=100).contains(&self.pipeline.jpeg_quality) {
            return Err(invalid("pipeline.jpeg_quality must be between 1 and 100"));
        }
        if self.server.analyze_timeout_ms == 0 {
            return Err(invalid("server.analyze_timeout_ms must be positive"));
        }
        if !(0.0..=1.0).contains(&self.model.face_confidence) {
            return Err(invalid("model.face_confidence must be between 0 and 1"));
        }
        if self.rate_limit.enabled && (self.rate_limit.per_second == 0 || self.rate_limit.burst_size == 0) {
            return Err(invalid("rate_limit.per_second and rate_limit.burst_size must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Message(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_sources(None, None, None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.pipeline.detection_interval, 3);
        assert_eq!(config.server.address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_file_then_env_then_port() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 8000\n\n[pipeline]\ndetection_interval = 5\nscore_panel = true\n\n[log]\nformat = \"json\""
        )
        .unwrap();

        let config = AppConfig::from_sources(
            Some(file.path()),
            Some(environment(&[("EMOTION_LENS_PIPELINE__DETECTION_INTERVAL", "2")])),
            Some("9000".to_string()),
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.pipeline.detection_interval, 2);
        assert!(config.pipeline.score_panel);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let config =
            AppConfig::from_sources(Some(Path::new("/nonexistent/emotion-lens.toml")), None, None).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = AppConfig::from_sources(
            None,
            Some(environment(&[("EMOTION_LENS_PIPELINE__DETECTION_INTERVAL", "0")])),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(AppConfig::from_sources(None, None, Some("not-a-port".to_string())).is_err());
    }
}

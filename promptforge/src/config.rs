//! Configuration types for the pipeline, client and media ingestion.
//!
//! Every field has a serde default so a partial JSON document (or none at
//! all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agents::DEFAULT_SYSTEM_DIRECTIVE;
use crate::core::ModelTier;
use crate::errors::ConfigError;
use crate::pipeline::{FailureMode, RetryConfig};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Generation service client settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Media ingestion settings.
    #[serde(default)]
    pub media: MediaConfig,
    /// Orchestrator settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl ForgeConfig {
    /// Parses configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(2..=31).contains(&self.media.jpeg_qscale) {
            return Err(ConfigError::Invalid {
                key: "media.jpeg_qscale".to_string(),
                reason: "must be between 2 and 31".to_string(),
            });
        }
        if let Some(seconds) = self.media.load_timeout_seconds {
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(ConfigError::Invalid {
                    key: "media.load_timeout_seconds".to_string(),
                    reason: "must be a positive number or null".to_string(),
                });
            }
        }
        if !self.client.timeout_seconds.is_finite() || self.client.timeout_seconds <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "client.timeout_seconds".to_string(),
                reason: "must be a positive number".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for the generation service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for independent-perspective stages.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    /// Model used for synthesis stages.
    #[serde(default = "default_reasoning_model")]
    pub reasoning_model: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: f64,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_fast_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_reasoning_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_client_timeout() -> f64 {
    120.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fast_model: default_fast_model(),
            reasoning_model: default_reasoning_model(),
            timeout_seconds: default_client_timeout(),
        }
    }
}

impl ClientConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Returns the model name serving `tier`.
    #[must_use]
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Reasoning => &self.reasoning_model,
        }
    }

    /// Gets the timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

/// Settings for media ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path or name of the `ffprobe` binary.
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: PathBuf,
    /// Path or name of the `ffmpeg` binary.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,
    /// ffmpeg JPEG quality scale (2 best, 31 worst).
    #[serde(default = "default_jpeg_qscale")]
    pub jpeg_qscale: u8,
    /// Upper bound on probing and sampling a video. `null` waits forever.
    #[serde(default = "default_load_timeout")]
    pub load_timeout_seconds: Option<f64>,
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_jpeg_qscale() -> u8 {
    3
}

#[allow(clippy::unnecessary_wraps)]
fn default_load_timeout() -> Option<f64> {
    Some(30.0)
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: default_ffprobe(),
            ffmpeg_path: default_ffmpeg(),
            jpeg_qscale: default_jpeg_qscale(),
            load_timeout_seconds: default_load_timeout(),
        }
    }
}

impl MediaConfig {
    /// Gets the video load timeout as a Duration.
    #[must_use]
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Settings for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directive every run is seeded with unless the caller overrides it.
    #[serde(default = "default_base_directive")]
    pub base_directive: String,
    /// What happens to later stages when one fails.
    #[serde(default)]
    pub failure_mode: FailureMode,
}

fn default_base_directive() -> String {
    DEFAULT_SYSTEM_DIRECTIVE.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_directive: default_base_directive(),
            failure_mode: FailureMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ForgeConfig::from_json_str("{}").unwrap();
        assert_eq!(config.client.fast_model, "gemini-3-flash-preview");
        assert_eq!(config.client.reasoning_model, "gemini-3-pro-preview");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.base_delay_ms, 2000);
        assert_eq!(config.media.load_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.pipeline.failure_mode, FailureMode::HaltOnError);
        assert_eq!(config.pipeline.base_directive, DEFAULT_SYSTEM_DIRECTIVE);
    }

    #[test]
    fn test_partial_override() {
        let config = ForgeConfig::from_json_str(
            r#"{
                "client": {"fast_model": "flash-lite"},
                "media": {"load_timeout_seconds": null},
                "pipeline": {"failure_mode": "continue_on_error"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.client.model_for(ModelTier::Fast), "flash-lite");
        assert_eq!(
            config.client.model_for(ModelTier::Reasoning),
            "gemini-3-pro-preview"
        );
        assert_eq!(config.media.load_timeout(), None);
        assert_eq!(config.pipeline.failure_mode, FailureMode::ContinueOnError);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let err = ForgeConfig::from_json_str(r#"{"retry": {"max_attempts": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "retry.max_attempts"));
    }

    #[test]
    fn test_validate_rejects_bad_qscale() {
        let err = ForgeConfig::from_json_str(r#"{"media": {"jpeg_qscale": 99}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = ForgeConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"client": {{"timeout_seconds": 5.0}}}}"#).unwrap();

        let config = ForgeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file() {
        let err = ForgeConfig::from_json_file("/nonexistent/forge.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

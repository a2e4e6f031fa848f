//! Error types for the promptforge pipeline.
//!
//! Failures coming back from the generation service are classified into a
//! small taxonomy ([`FailureKind`]) so the orchestrator can decide between
//! retrying, halting and surfacing a diagnostic to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core::StageStatus;

/// The main error type for promptforge operations.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A pipeline dispatch or state error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// A media preprocessing error.
    #[error("{0}")]
    Media(#[from] MediaError),

    /// An analysis client error.
    #[error("{0}")]
    Analysis(#[from] AnalysisError),

    /// A configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a failed call to the generation service is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rate limiting, quota or resource exhaustion. Retried.
    TransientCapacity,
    /// The configured credential was rejected or the resource was not found.
    CredentialInvalid,
    /// Anything else: network, malformed response, server errors.
    Generic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientCapacity => write!(f, "transient_capacity"),
            Self::CredentialInvalid => write!(f, "credential_invalid"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Errors produced by an analysis client call.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// The service signalled rate limiting or quota exhaustion.
    #[error("Rate limited by generation service: {message}")]
    RateLimited {
        /// The message returned by the service.
        message: String,
    },

    /// The service rejected the credential or could not find the resource.
    #[error("Credential rejected by generation service: {message}")]
    CredentialRejected {
        /// The message returned by the service.
        message: String,
    },

    /// The request never produced a usable response.
    #[error("Transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The service answered with something that could not be decoded.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Description of the failure.
        message: String,
    },

    /// The service returned a non-success status not covered above.
    #[error("Generation service error {status}: {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// The message returned by the service.
        message: String,
    },

    /// Every attempt failed transiently.
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of invocations made.
        attempts: usize,
        /// The last transient failure.
        last: Box<AnalysisError>,
    },

    /// The run that issued the call was reset or replaced before the call
    /// went out.
    #[error("Run superseded before the call was issued")]
    Superseded,
}

impl AnalysisError {
    /// Creates a rate limited error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Creates a credential rejected error.
    #[must_use]
    pub fn credential_rejected(message: impl Into<String>) -> Self {
        Self::CredentialRejected {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Returns the failure classification.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } | Self::RetriesExhausted { .. } => {
                FailureKind::TransientCapacity
            }
            Self::CredentialRejected { .. } => FailureKind::CredentialInvalid,
            Self::Transport { .. }
            | Self::MalformedResponse { .. }
            | Self::Service { .. }
            | Self::Superseded => FailureKind::Generic,
        }
    }

    /// Returns true if the retry policy may attempt the call again.
    ///
    /// An exhausted error is terminal even though its kind is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Human-readable diagnostic recorded as the failed stage's output.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match self {
            Self::RetriesExhausted { attempts, .. } => format!(
                "Capacity exhausted after {attempts} attempts; consider switching to an alternate API key."
            ),
            Self::RateLimited { .. } => {
                "Capacity exhausted; consider switching to an alternate API key.".to_string()
            }
            Self::CredentialRejected { .. } => {
                "Credential rejected by the generation service; re-select an API key before re-running."
                    .to_string()
            }
            other => format!("Link severed: neural node failed to respond ({other})."),
        }
    }
}

/// Errors raised while turning a file into a media payload.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The source file could not be read.
    #[error("Failed to read media '{path}': {source}")]
    Read {
        /// The path that failed.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The video never became seekable within the configured window.
    #[error("Video '{path}' did not load within {timeout:?}")]
    LoadTimeout {
        /// The video path.
        path: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// The probed duration is unusable.
    #[error("Invalid video duration: {0}")]
    InvalidDuration(f64),

    /// The frame sampler failed.
    #[error("Frame sampler failed: {0}")]
    Sampler(String),

    /// The media contained no bytes.
    #[error("Media '{0}' is empty")]
    Empty(String),
}

/// Errors raised by the orchestrator and state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A dispatch was attempted while another run is active.
    #[error("A pipeline run is already in progress (run_id: {run_id})")]
    AlreadyRunning {
        /// The active run.
        run_id: String,
    },

    /// A dispatch was attempted before any media was ingested.
    #[error("No media has been ingested")]
    NoMedia,

    /// The caller's credential is missing or was rejected.
    #[error("A valid credential is required before dispatching: {reason}")]
    CredentialRequired {
        /// Why the credential is unusable.
        reason: String,
    },

    /// A stage was referenced that the directory does not define.
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// A stage status change broke the state machine.
    #[error("Invalid transition for stage '{stage}': {from} -> {to}")]
    InvalidTransition {
        /// The stage id.
        stage: String,
        /// Current status.
        from: StageStatus,
        /// Requested status.
        to: StageStatus,
    },

    /// The agent directory table is unusable.
    #[error("Invalid agent directory: {0}")]
    InvalidDirectory(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config '{path}': {source}")]
    Read {
        /// The path that failed.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config value for '{key}': {reason}")]
    Invalid {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_kinds() {
        assert_eq!(
            AnalysisError::rate_limited("429").kind(),
            FailureKind::TransientCapacity
        );
        assert_eq!(
            AnalysisError::credential_rejected("nope").kind(),
            FailureKind::CredentialInvalid
        );
        assert_eq!(AnalysisError::transport("reset").kind(), FailureKind::Generic);
        assert_eq!(
            AnalysisError::Service {
                status: 500,
                message: "boom".to_string()
            }
            .kind(),
            FailureKind::Generic
        );
    }

    #[test]
    fn test_only_rate_limit_is_transient() {
        assert!(AnalysisError::rate_limited("slow down").is_transient());
        assert!(!AnalysisError::credential_rejected("bad key").is_transient());
        assert!(!AnalysisError::malformed("eof").is_transient());

        let exhausted = AnalysisError::RetriesExhausted {
            attempts: 4,
            last: Box::new(AnalysisError::rate_limited("429")),
        };
        assert!(!exhausted.is_transient());
        assert_eq!(exhausted.kind(), FailureKind::TransientCapacity);
    }

    #[test]
    fn test_diagnostics_by_kind() {
        let exhausted = AnalysisError::RetriesExhausted {
            attempts: 4,
            last: Box::new(AnalysisError::rate_limited("429")),
        };
        assert!(exhausted.diagnostic().contains("Capacity exhausted after 4 attempts"));
        assert!(exhausted.diagnostic().contains("alternate API key"));

        assert!(AnalysisError::credential_rejected("x")
            .diagnostic()
            .contains("re-select an API key"));

        let generic = AnalysisError::transport("connection reset").diagnostic();
        assert!(generic.starts_with("Link severed"));
        assert!(generic.contains("connection reset"));
    }

    #[test]
    fn test_failure_kind_serialize() {
        let json = serde_json::to_string(&FailureKind::CredentialInvalid).unwrap();
        assert_eq!(json, r#""credential_invalid""#);
        assert_eq!(FailureKind::TransientCapacity.to_string(), "transient_capacity");
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::InvalidTransition {
            stage: "analyst".to_string(),
            from: StageStatus::Completed,
            to: StageStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for stage 'analyst': completed -> processing"
        );
    }

    #[test]
    fn test_forge_error_from() {
        let err: ForgeError = PipelineError::NoMedia.into();
        assert!(matches!(err, ForgeError::Pipeline(PipelineError::NoMedia)));
    }
}

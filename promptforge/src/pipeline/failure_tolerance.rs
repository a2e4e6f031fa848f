//! Failure handling policy for the stage sequence.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{AnalysisError, FailureKind};

/// How to handle a stage that fails after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop the run on the first failure; later stages stay idle.
    #[default]
    HaltOnError,
    /// Record the failure and move on to the next stage.
    ///
    /// A rejected credential still halts, since every later call would be
    /// rejected the same way.
    ContinueOnError,
}

impl FailureMode {
    /// Returns true if a failure of `kind` should end the run.
    #[must_use]
    pub fn halts_on(self, kind: FailureKind) -> bool {
        match self {
            Self::HaltOnError => true,
            Self::ContinueOnError => kind == FailureKind::CredentialInvalid,
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HaltOnError => write!(f, "halt_on_error"),
            Self::ContinueOnError => write!(f, "continue_on_error"),
        }
    }
}

/// Record of a stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Stage id.
    pub stage: String,
    /// Failure classification.
    pub kind: FailureKind,
    /// The diagnostic recorded as the stage output.
    pub diagnostic: String,
    /// The underlying error message.
    pub error: String,
    /// When the failure was recorded (ISO 8601).
    pub timestamp: String,
}

impl StageFailure {
    /// Builds a failure record from the client error.
    #[must_use]
    pub fn from_error(stage: impl Into<String>, error: &AnalysisError) -> Self {
        Self {
            stage: stage.into(),
            kind: error.kind(),
            diagnostic: error.diagnostic(),
            error: error.to_string(),
            timestamp: crate::utils::iso_timestamp(),
        }
    }
}

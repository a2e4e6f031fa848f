//! Stage status and model tier enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not been dispatched in the current run.
    Idle,
    /// Stage is waiting on the generation service.
    Processing,
    /// Stage settled successfully.
    Completed,
    /// Stage settled with an unrecoverable failure.
    Error,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a settled stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Returns true if moving to `next` is allowed within a run.
    ///
    /// Returning to idle is only possible through a reset, which bypasses
    /// this check.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
        )
    }
}

/// Which class of model a stage is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// High-throughput vision model for independent perspectives.
    Fast,
    /// Higher-reasoning model for synthesis stages.
    Reasoning,
}

impl Default for ModelTier {
    fn default() -> Self {
        Self::Fast
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Reasoning => write!(f, "reasoning"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Idle.to_string(), "idle");
        assert_eq!(StageStatus::Processing.to_string(), "processing");
        assert_eq!(StageStatus::Completed.to_string(), "completed");
        assert_eq!(StageStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Completed.is_terminal());
        assert!(StageStatus::Error.is_terminal());
        assert!(!StageStatus::Idle.is_terminal());
        assert!(!StageStatus::Processing.is_terminal());
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(StageStatus::Idle.can_transition_to(StageStatus::Processing));
        assert!(StageStatus::Processing.can_transition_to(StageStatus::Completed));
        assert!(StageStatus::Processing.can_transition_to(StageStatus::Error));

        assert!(!StageStatus::Idle.can_transition_to(StageStatus::Completed));
        assert!(!StageStatus::Completed.can_transition_to(StageStatus::Processing));
        assert!(!StageStatus::Error.can_transition_to(StageStatus::Idle));
        assert!(!StageStatus::Processing.can_transition_to(StageStatus::Processing));
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Processing).unwrap();
        assert_eq!(json, r#""processing""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::Processing);
    }

    #[test]
    fn test_model_tier_serialize() {
        let json = serde_json::to_string(&ModelTier::Reasoning).unwrap();
        assert_eq!(json, r#""reasoning""#);
        assert_eq!(ModelTier::default(), ModelTier::Fast);
    }
}

//! A single pipeline position with its live status and output.

use serde::{Deserialize, Serialize};

use super::StageStatus;
use crate::errors::PipelineError;

/// Identifier of the non-agent ingest stage.
pub const INGEST_STAGE_ID: &str = "input";

/// One step of the analysis pipeline as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the stage does.
    pub description: String,
    /// Current status.
    pub status: StageStatus,
    /// Result text, retry notice or diagnostic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Stage {
    /// Creates an idle stage with no output.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            status: StageStatus::Idle,
            output: None,
        }
    }

    /// Creates the media ingest stage.
    #[must_use]
    pub fn ingest() -> Self {
        Self::new(
            INGEST_STAGE_ID,
            "Media Ingest",
            "Analyzing source encoding and extracting visual keyframes.",
        )
    }

    /// Moves the stage to `next`, rejecting transitions the state machine
    /// does not allow.
    pub fn transition(&mut self, next: StageStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                stage: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Returns the stage to idle and drops its output.
    pub fn reset(&mut self) {
        self.status = StageStatus::Idle;
        self.output = None;
    }
}

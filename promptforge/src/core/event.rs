//! Pipeline event type emitted to event sinks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::RunRecord;
use crate::errors::FailureKind;

/// An event emitted by the orchestrator during a run.
///
/// Events are the progress channel for observers: UI shells, loggers and
/// history recorders all consume the same stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type (e.g., "stage.started", "pipeline.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns a string field from the payload.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Creates a "media.ingested" event.
    #[must_use]
    pub fn media_ingested(kind: &str, digest: &str, frames: usize) -> Self {
        Self::new("media.ingested")
            .add_data("kind", serde_json::json!(kind))
            .add_data("digest", serde_json::json!(digest))
            .add_data("frames", serde_json::json!(frames))
    }

    /// Creates a "pipeline.started" event.
    #[must_use]
    pub fn pipeline_started(run_id: &str, stage_count: usize) -> Self {
        Self::new("pipeline.started")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage_count", serde_json::json!(stage_count))
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn stage_started(run_id: &str, stage: &str) -> Self {
        Self::new("stage.started")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
    }

    /// Creates a "stage.retrying" event.
    #[must_use]
    pub fn stage_retrying(
        run_id: &str,
        stage: &str,
        attempt: usize,
        attempts_remaining: usize,
        delay_ms: u64,
    ) -> Self {
        Self::new("stage.retrying")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
            .add_data("attempt", serde_json::json!(attempt))
            .add_data("attempts_remaining", serde_json::json!(attempts_remaining))
            .add_data("delay_ms", serde_json::json!(delay_ms))
    }

    /// Creates a "stage.completed" event.
    #[must_use]
    pub fn stage_completed(run_id: &str, stage: &str, duration_ms: f64) -> Self {
        Self::new("stage.completed")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "stage.failed" event.
    #[must_use]
    pub fn stage_failed(run_id: &str, stage: &str, kind: FailureKind, diagnostic: &str) -> Self {
        Self::new("stage.failed")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
            .add_data("kind", serde_json::json!(kind))
            .add_data("diagnostic", serde_json::json!(diagnostic))
    }

    /// Creates a "pipeline.completed" event carrying the run record.
    #[must_use]
    pub fn pipeline_completed(record: &RunRecord) -> Self {
        Self::new("pipeline.completed")
            .add_data("run_id", serde_json::json!(record.run_id))
            .add_data(
                "record",
                serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
            )
    }

    /// Creates a "pipeline.degraded" event for a run that finished with
    /// failed stages and no artifact.
    #[must_use]
    pub fn pipeline_degraded(run_id: &str, failed_stages: &[&str]) -> Self {
        Self::new("pipeline.degraded")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("failed_stages", serde_json::json!(failed_stages))
    }

    /// Creates a "pipeline.halted" event.
    #[must_use]
    pub fn pipeline_halted(run_id: &str, stage: &str, kind: FailureKind) -> Self {
        Self::new("pipeline.halted")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
            .add_data("kind", serde_json::json!(kind))
    }

    /// Creates a "pipeline.reset" event.
    #[must_use]
    pub fn pipeline_reset(previous_run_id: &str) -> Self {
        Self::new("pipeline.reset").add_data("previous_run_id", serde_json::json!(previous_run_id))
    }
}

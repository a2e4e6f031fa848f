//! Assertions over pipeline snapshots.

use crate::core::StageStatus;
use crate::pipeline::PipelineSnapshot;

/// Asserts that `stage_id` has the expected status.
pub fn assert_stage_status(snapshot: &PipelineSnapshot, stage_id: &str, expected: StageStatus) {
    let actual = snapshot.status(stage_id);
    assert_eq!(
        actual,
        Some(expected),
        "Expected stage '{stage_id}' to be {expected}, got {actual:?}"
    );
}

/// Asserts that `stage_id` recorded exactly `expected` as output.
pub fn assert_stage_output(snapshot: &PipelineSnapshot, stage_id: &str, expected: &str) {
    let actual = snapshot.stage(stage_id).and_then(|s| s.output.as_deref());
    assert_eq!(
        actual,
        Some(expected),
        "Unexpected output for stage '{stage_id}'"
    );
}

/// Asserts that every stage after `stage_id` is idle with no output.
pub fn assert_idle_after(snapshot: &PipelineSnapshot, stage_id: &str) {
    let position = snapshot
        .stages
        .iter()
        .position(|s| s.id == stage_id)
        .unwrap_or_else(|| panic!("Stage '{stage_id}' not in snapshot"));

    for stage in &snapshot.stages[position + 1..] {
        assert!(
            stage.status == StageStatus::Idle && stage.output.is_none(),
            "Expected stage '{}' to be idle, got {} with output {:?}",
            stage.id,
            stage.status,
            stage.output
        );
    }
}

/// Asserts that no more than one stage is processing.
pub fn assert_single_processing(snapshot: &PipelineSnapshot) {
    assert!(
        snapshot.processing_count() <= 1,
        "Expected at most one processing stage, got {}",
        snapshot.processing_count()
    );
}

//! Test doubles and helpers for code built on promptforge.
//!
//! This module provides:
//! - A scripted analysis client with per-stage results and call gates
//! - A static frame sampler
//! - Snapshot assertions
//! - An orchestrator harness wired to both

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_idle_after, assert_single_processing, assert_stage_output, assert_stage_status,
};
pub use fixtures::{image_media, ready_credential, video_media, TestPipeline, TestPipelineBuilder};
pub use mocks::{RecordedCall, ScriptedClient, StageGate, StaticFrameSampler};

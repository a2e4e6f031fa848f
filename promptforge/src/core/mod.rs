//! Core domain model types for promptforge.
//!
//! This module contains the fundamental types shared by the pipeline:
//! - Stage status and model tier enums
//! - The observable stage record
//! - The delivered artifact and its completion record
//! - Pipeline events

mod artifact;
mod event;
mod stage;
mod status;

pub use artifact::{Artifact, RunRecord, ARTIFACT_FILE_NAME};
pub use event::PipelineEvent;
pub use stage::{Stage, INGEST_STAGE_ID};
pub use status::{ModelTier, StageStatus};

//! # Promptforge
//!
//! A multi-agent pipeline that analyses an image or short video and
//! synthesizes a generative-model prompt "blueprint".
//!
//! Promptforge provides:
//!
//! - **Media ingest**: images are sent as-is, videos are sampled into three stills
//! - **Sequential agents**: each stage sees the media plus every earlier stage's output
//! - **Failure classification**: rate limits are retried, rejected credentials halt
//! - **Stale-write protection**: a reset or new upload silently supersedes a running pass
//! - **Event-driven observability**: every transition is emitted to an event sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use promptforge::prelude::*;
//!
//! let client = Arc::new(GeminiClient::new(ClientConfig::default())?);
//! let orchestrator = PipelineOrchestrator::new(client, AgentDirectory::standard());
//!
//! orchestrator.ingest_file("clip.mp4", MediaKind::Video).await?;
//! let outcome = orchestrator
//!     .run(orchestrator.directive(Some("noir")), &CredentialStatus::from_env())
//!     .await?;
//!
//! if let Some(artifact) = orchestrator.artifact() {
//!     artifact.export(".").await?;
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agents;
pub mod client;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod media;
pub mod observability;
pub mod pipeline;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agents::{AgentDirectory, AgentDirectoryEntry};
    #[cfg(feature = "gemini")]
    pub use crate::client::GeminiClient;
    pub use crate::client::{AnalysisClient, AnalysisRequest, ApiKey, CredentialStatus};
    pub use crate::config::{ClientConfig, ForgeConfig, MediaConfig, PipelineConfig};
    pub use crate::core::{
        Artifact, ModelTier, PipelineEvent, RunRecord, Stage, StageStatus,
    };
    pub use crate::errors::{
        AnalysisError, FailureKind, ForgeError, MediaError, PipelineError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::media::{IngestedMedia, MediaKind, MediaPayload, MediaReference};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        FailureMode, GlobalDirective, PipelineOrchestrator, PipelineSnapshot, RetryConfig,
        RunOutcome,
    };
    pub use crate::utils::{generate_run_id, iso_timestamp};
    pub use std::sync::Arc;
}

//! Pipeline execution.
//!
//! This module provides:
//! - The directive and accumulated context a run threads through its stages
//! - The shared state store with run-ticket stale-write protection
//! - Retry and failure tolerance policies
//! - The orchestrator that drives stages in directory order

mod context;
mod failure_tolerance;
mod orchestrator;
mod retry;
mod state;


pub use context::{AccumulatedContext, GlobalDirective};
pub use failure_tolerance::{FailureMode, StageFailure};
pub use orchestrator::{PipelineOrchestrator, RunOutcome};
pub use retry::{
    BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryNotice, RetryPolicy,
    RetryState,
};
pub use state::{PipelineSnapshot, PipelineStateStore, RunTicket, WriteOutcome};

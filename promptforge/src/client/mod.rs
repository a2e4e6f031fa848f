//! Client for the external generation service.
//!
//! One [`AnalysisClient::analyze`] call is one outbound request. Retrying is
//! the caller's concern; see [`crate::pipeline::RetryPolicy`].

mod classify;
mod credential;
#[cfg(feature = "gemini")]
mod gemini;
mod prompt;

pub use classify::classify_failure;
pub use credential::{ApiKey, CredentialStatus, API_KEY_ENV, API_KEY_ENV_FALLBACK};
#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
pub use prompt::{compose_prompt, FALLBACK_DIRECTIVE};

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::ModelTier;
use crate::errors::AnalysisError;
use crate::media::MediaPayload;

/// Text returned in place of an empty service response.
pub const SILENT_SENTINEL: &str = "NODE_SILENT";

/// Everything a single stage request needs.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// The stage issuing the request.
    pub stage_id: String,
    /// Media sent as inline parts.
    pub media: Arc<MediaPayload>,
    /// The stage's role instructions.
    pub instructions: String,
    /// Accumulated context at the time of the request.
    pub context: String,
    /// Which model tier serves the request.
    pub tier: ModelTier,
    /// Credential forwarded with the request.
    pub api_key: ApiKey,
}

impl AnalysisRequest {
    /// Returns the composed prompt text for this request.
    #[must_use]
    pub fn prompt(&self) -> String {
        compose_prompt(&self.context, &self.instructions)
    }
}

/// A client that can run one analysis request against the service.
///
/// Implementations return [`SILENT_SENTINEL`] rather than an error when the
/// service answers with no text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Sends one request and returns the generated text.
    async fn analyze(&self, request: AnalysisRequest) -> Result<String, AnalysisError>;
}

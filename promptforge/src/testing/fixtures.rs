//! Ready-made media, credentials and orchestrator harnesses.

use std::sync::Arc;

use super::mocks::ScriptedClient;
use crate::agents::AgentDirectory;
use crate::client::{ApiKey, CredentialStatus};
use crate::events::CollectingEventSink;
use crate::media::{EncodedStill, IngestedMedia, MediaKind, MediaPayload, MediaReference};
use crate::pipeline::{FailureMode, PipelineOrchestrator, RetryConfig};

/// A single-still image payload.
#[must_use]
pub fn image_media() -> IngestedMedia {
    IngestedMedia::new(
        MediaPayload::Image(EncodedStill::from_bytes("image/png", b"png-bytes")),
        MediaReference::from_bytes("still.png", MediaKind::Image, b"png-bytes"),
    )
}

/// A three-frame video payload.
#[must_use]
pub fn video_media() -> IngestedMedia {
    IngestedMedia::new(
        MediaPayload::Frames(vec![
            EncodedStill::jpeg(b"f0"),
            EncodedStill::jpeg(b"f1"),
            EncodedStill::jpeg(b"f2"),
        ]),
        MediaReference::from_bytes("clip.mp4", MediaKind::Video, b"video-bytes"),
    )
}

/// A usable credential.
#[must_use]
pub fn ready_credential() -> CredentialStatus {
    CredentialStatus::Ready(ApiKey::new("test-api-key"))
}

/// Orchestrator wired to a [`ScriptedClient`] and a
/// [`CollectingEventSink`].
pub struct TestPipeline {
    /// The orchestrator under test.
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// The scripted client it calls.
    pub client: Arc<ScriptedClient>,
    /// Every event it emitted.
    pub events: Arc<CollectingEventSink>,
}

/// Builder for [`TestPipeline`].
#[derive(Debug)]
pub struct TestPipelineBuilder {
    client: ScriptedClient,
    directory: AgentDirectory,
    retry: RetryConfig,
    failure_mode: FailureMode,
    base_directive: Option<String>,
}

impl TestPipeline {
    /// Starts a builder with the standard directory and a 10 ms retry base.
    #[must_use]
    pub fn builder() -> TestPipelineBuilder {
        TestPipelineBuilder {
            client: ScriptedClient::new(),
            directory: AgentDirectory::standard(),
            retry: RetryConfig::default().with_base_delay_ms(10),
            failure_mode: FailureMode::default(),
            base_directive: None,
        }
    }
}

impl TestPipelineBuilder {
    /// Uses a pre-scripted client.
    #[must_use]
    pub fn client(mut self, client: ScriptedClient) -> Self {
        self.client = client;
        self
    }

    /// Uses a custom directory.
    #[must_use]
    pub fn directory(mut self, directory: AgentDirectory) -> Self {
        self.directory = directory;
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the failure mode.
    #[must_use]
    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Overrides the base directive.
    #[must_use]
    pub fn base_directive(mut self, base: impl Into<String>) -> Self {
        self.base_directive = Some(base.into());
        self
    }

    /// Builds the harness.
    #[must_use]
    pub fn build(self) -> TestPipeline {
        let client = Arc::new(self.client);
        let events = Arc::new(CollectingEventSink::new());

        let mut orchestrator = PipelineOrchestrator::new(client.clone(), self.directory)
            .with_retry_config(self.retry)
            .with_failure_mode(self.failure_mode)
            .with_event_sink(events.clone());
        if let Some(base) = self.base_directive {
            orchestrator = orchestrator.with_base_directive(base);
        }

        TestPipeline {
            orchestrator: Arc::new(orchestrator),
            client,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_fixtures() {
        assert_eq!(image_media().payload.len(), 1);
        assert_eq!(video_media().payload.len(), 3);
        assert!(ready_credential().is_ready());
    }

    #[tokio::test]
    async fn test_harness_runs() {
        let harness = TestPipeline::builder().build();
        harness.orchestrator.ingest(image_media()).await;
        let outcome = harness
            .orchestrator
            .run(harness.orchestrator.directive(None), &ready_credential())
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(harness.client.calls().len(), 7);
        assert!(!harness.events.is_empty());
    }
}

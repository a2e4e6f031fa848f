//! Drives the agent stages in directory order.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use super::context::{AccumulatedContext, GlobalDirective};
use super::failure_tolerance::{FailureMode, StageFailure};
use super::retry::{RetryConfig, RetryPolicy};
use super::state::{PipelineSnapshot, PipelineStateStore, RunTicket};
use crate::agents::{AgentDirectory, AgentDirectoryEntry, DEFAULT_SYSTEM_DIRECTIVE};
use crate::client::{AnalysisClient, AnalysisRequest, ApiKey, CredentialStatus};
use crate::config::ForgeConfig;
use crate::core::{Artifact, PipelineEvent, RunRecord};
use crate::errors::{AnalysisError, ForgeError, PipelineError};
use crate::events::{EventSink, NoOpEventSink};
use crate::media::{IngestedMedia, MediaKind, MediaPreprocessor, MediaReference};
use crate::observability::SpanTimer;

/// How a dispatched run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage completed.
    Completed(RunRecord),
    /// The run reached the end with failed stages skipped.
    ///
    /// `record` is present when the final stage still completed.
    Degraded {
        /// Completion record, if an artifact was produced.
        record: Option<RunRecord>,
        /// Every stage that failed, in order.
        failures: Vec<StageFailure>,
    },
    /// A stage failed and the run stopped; later stages stayed idle.
    Halted(StageFailure),
    /// A reset or new ingest replaced this run before it finished.
    Superseded,
}

impl RunOutcome {
    /// The completion record, if the run produced an artifact.
    #[must_use]
    pub fn record(&self) -> Option<&RunRecord> {
        match self {
            Self::Completed(record) => Some(record),
            Self::Degraded { record, .. } => record.as_ref(),
            Self::Halted(_) | Self::Superseded => None,
        }
    }

    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Runs ingested media through the agent directory.
pub struct PipelineOrchestrator {
    client: Arc<dyn AnalysisClient>,
    directory: AgentDirectory,
    store: PipelineStateStore,
    retry: RetryPolicy,
    failure_mode: FailureMode,
    event_sink: Arc<dyn EventSink>,
    preprocessor: MediaPreprocessor,
    base_directive: String,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("stages", &self.directory.ids())
            .field("retry", self.retry.config())
            .field("failure_mode", &self.failure_mode)
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    /// Creates an orchestrator with default policies.
    #[must_use]
    pub fn new(client: Arc<dyn AnalysisClient>, directory: AgentDirectory) -> Self {
        let store = PipelineStateStore::new(&directory);
        Self {
            client,
            directory,
            store,
            retry: RetryPolicy::default(),
            failure_mode: FailureMode::default(),
            event_sink: Arc::new(NoOpEventSink),
            preprocessor: MediaPreprocessor::default(),
            base_directive: DEFAULT_SYSTEM_DIRECTIVE.to_string(),
        }
    }

    /// Creates an orchestrator configured from `config`.
    #[must_use]
    pub fn from_config(
        client: Arc<dyn AnalysisClient>,
        directory: AgentDirectory,
        config: &ForgeConfig,
    ) -> Self {
        Self::new(client, directory)
            .with_retry_config(config.retry.clone())
            .with_failure_mode(config.pipeline.failure_mode)
            .with_preprocessor(MediaPreprocessor::from_config(&config.media))
            .with_base_directive(config.pipeline.base_directive.clone())
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryPolicy::new(config);
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the media preprocessor used by [`Self::ingest_file`].
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: MediaPreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Sets the base directive used by [`Self::directive`].
    #[must_use]
    pub fn with_base_directive(mut self, base: impl Into<String>) -> Self {
        self.base_directive = base.into();
        self
    }

    /// The agent directory driving this orchestrator.
    #[must_use]
    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    /// The shared state store, for observers.
    #[must_use]
    pub fn store(&self) -> &PipelineStateStore {
        &self.store
    }

    /// Current state of every stage.
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.store.snapshot()
    }

    /// The final stage's output, once it has completed.
    #[must_use]
    pub fn artifact(&self) -> Option<Artifact> {
        self.store.artifact()
    }

    /// Builds a directive from the configured base and an optional modifier.
    #[must_use]
    pub fn directive(&self, modifier: Option<&str>) -> GlobalDirective {
        let directive = GlobalDirective::new(&self.base_directive);
        match modifier {
            Some(m) => directive.with_modifier(m),
            None => directive,
        }
    }

    /// Binds already prepared media. Any in-flight run is superseded.
    pub async fn ingest(&self, media: IngestedMedia) -> MediaReference {
        let reference = media.reference.clone();
        let frames = media.payload.len();
        let previous = self.store.ingest(media);

        info!(
            source = %reference.source,
            kind = %reference.kind,
            frames,
            superseded = %previous,
            "Media ingested"
        );
        self.event_sink
            .emit(&PipelineEvent::media_ingested(
                &reference.kind.to_string(),
                &reference.digest,
                frames,
            ))
            .await;
        reference
    }

    /// Reads and samples a file, then binds it.
    pub async fn ingest_file(
        &self,
        path: impl AsRef<Path>,
        kind: MediaKind,
    ) -> Result<MediaReference, ForgeError> {
        let media = self.preprocessor.prepare(path.as_ref(), kind).await?;
        Ok(self.ingest(media).await)
    }

    /// Dispatches a full run over the bound media.
    ///
    /// Rejected without touching any stage when the credential is unusable,
    /// no media is bound, or a run is already active.
    pub async fn run(
        &self,
        directive: GlobalDirective,
        credential: &CredentialStatus,
    ) -> Result<RunOutcome, PipelineError> {
        let api_key = credential.usable_key()?.clone();
        let (ticket, media) = self.store.begin_run(directive.clone())?;

        let span = info_span!("pipeline_run", run_id = %ticket.run_id());
        let result = self
            .execute(ticket, media, directive, api_key)
            .instrument(span)
            .await;

        if let Err(e) = &result {
            if !self.store.finish(&ticket).is_stale() {
                error!(run_id = %ticket.run_id(), error = %e, "Run aborted by a state error");
            }
        }
        result
    }

    /// Runs again on the same media with a new steering modifier, keeping
    /// the previous run's base directive.
    pub async fn rerun(
        &self,
        modifier: Option<&str>,
        credential: &CredentialStatus,
    ) -> Result<RunOutcome, PipelineError> {
        let base = self
            .store
            .last_directive()
            .map_or_else(|| self.base_directive.clone(), |d| d.base);
        let directive = match modifier {
            Some(m) => GlobalDirective::new(base).with_modifier(m),
            None => GlobalDirective::new(base),
        };
        self.run(directive, credential).await
    }

    /// Discards media and all stage state. An in-flight run keeps its
    /// network call but its settlement is ignored.
    pub async fn reset(&self) {
        let previous = self.store.reset();
        info!(previous_run_id = %previous, "Pipeline reset");
        self.event_sink
            .emit(&PipelineEvent::pipeline_reset(&previous.to_string()))
            .await;
    }

    async fn execute(
        &self,
        ticket: RunTicket,
        media: Arc<IngestedMedia>,
        directive: GlobalDirective,
        api_key: ApiKey,
    ) -> Result<RunOutcome, PipelineError> {
        let run_id = ticket.run_id().to_string();
        let payload = Arc::new(media.payload.clone());
        let mut context = AccumulatedContext::seeded(directive.compose());
        let mut failures = Vec::new();
        let mut artifact = None;

        info!(stages = self.directory.len(), "Pipeline started");
        self.event_sink
            .emit(&PipelineEvent::pipeline_started(&run_id, self.directory.len()))
            .await;

        for entry in self.directory.iter() {
            if self.store.mark_processing(&ticket, &entry.id)?.is_stale() {
                return Ok(self.superseded(&run_id, &entry.id));
            }
            self.event_sink
                .emit(&PipelineEvent::stage_started(&run_id, &entry.id))
                .await;

            let timer = SpanTimer::start(&entry.id);
            let request = AnalysisRequest {
                stage_id: entry.id.clone(),
                media: Arc::clone(&payload),
                instructions: entry.instructions.clone(),
                context: context.as_str().to_string(),
                tier: entry.tier,
                api_key: api_key.clone(),
            };

            let result = self
                .analyze_stage(&ticket, &run_id, entry, request)
                .instrument(info_span!("stage", stage = %entry.id, tier = %entry.tier))
                .await;

            match result {
                Ok(text) => {
                    if self
                        .store
                        .mark_completed(&ticket, &entry.id, text.clone())?
                        .is_stale()
                    {
                        return Ok(self.superseded(&run_id, &entry.id));
                    }
                    context.append(&entry.id, &text);

                    let duration_ms = timer.finish();
                    info!(stage = %entry.id, duration_ms, "Stage completed");
                    self.event_sink
                        .emit(&PipelineEvent::stage_completed(&run_id, &entry.id, duration_ms))
                        .await;

                    if entry.id == self.directory.final_entry().id {
                        artifact = Some(text);
                    }
                }
                Err(err) => {
                    let failure = StageFailure::from_error(&entry.id, &err);
                    if self
                        .store
                        .mark_error(&ticket, &entry.id, failure.diagnostic.clone())?
                        .is_stale()
                    {
                        return Ok(self.superseded(&run_id, &entry.id));
                    }

                    error!(stage = %entry.id, kind = %failure.kind, error = %err, "Stage failed");
                    self.event_sink
                        .emit(&PipelineEvent::stage_failed(
                            &run_id,
                            &entry.id,
                            failure.kind,
                            &failure.diagnostic,
                        ))
                        .await;

                    if self.failure_mode.halts_on(failure.kind) {
                        if self.store.finish(&ticket).is_stale() {
                            return Ok(self.superseded(&run_id, &entry.id));
                        }
                        self.event_sink
                            .emit(&PipelineEvent::pipeline_halted(&run_id, &entry.id, failure.kind))
                            .await;
                        return Ok(RunOutcome::Halted(failure));
                    }
                    failures.push(failure);
                }
            }
        }

        if self.store.finish(&ticket).is_stale() {
            return Ok(self.superseded(&run_id, self.directory.final_entry().id.as_str()));
        }

        let record = artifact.map(|text| {
            RunRecord::new(&run_id, media.reference.clone(), text, directive.compose())
        });

        match &record {
            Some(record) => {
                info!(failed = failures.len(), "Pipeline completed");
                self.event_sink
                    .emit(&PipelineEvent::pipeline_completed(record))
                    .await;
            }
            None => {
                let failed: Vec<&str> = failures.iter().map(|f| f.stage.as_str()).collect();
                warn!(?failed, "Pipeline finished without an artifact");
                self.event_sink
                    .emit(&PipelineEvent::pipeline_degraded(&run_id, &failed))
                    .await;
            }
        }

        Ok(match record {
            Some(record) if failures.is_empty() => RunOutcome::Completed(record),
            record => RunOutcome::Degraded { record, failures },
        })
    }

    /// One stage's call through the retry policy. Retry notices become
    /// interim stage output. Once the run is superseded no further attempt
    /// is issued.
    async fn analyze_stage(
        &self,
        ticket: &RunTicket,
        run_id: &str,
        entry: &AgentDirectoryEntry,
        request: AnalysisRequest,
    ) -> Result<String, AnalysisError> {
        let client = &self.client;
        let store = &self.store;
        let sink = &self.event_sink;

        self.retry
            .execute(
                move || {
                    let request = request.clone();
                    async move {
                        if !store.is_current(ticket) {
                            return Err(AnalysisError::Superseded);
                        }
                        client.analyze(request).await
                    }
                },
                move |notice| {
                    match store.record_interim(ticket, &entry.id, notice.interim_message()) {
                        Ok(outcome) if outcome.is_stale() => return,
                        Ok(_) => {}
                        Err(e) => {
                            warn!(stage = %entry.id, error = %e, "Failed to record retry notice");
                        }
                    }
                    sink.try_emit(&PipelineEvent::stage_retrying(
                        run_id,
                        &entry.id,
                        notice.attempt,
                        notice.attempts_remaining,
                        u64::try_from(notice.delay.as_millis()).unwrap_or(u64::MAX),
                    ));
                },
            )
            .await
    }

    fn superseded(&self, run_id: &str, stage: &str) -> RunOutcome {
        info!(run_id, stage, "Run superseded, discarding settlement");
        RunOutcome::Superseded
    }
}

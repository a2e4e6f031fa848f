//! Shared per-run stage state.
//!
//! The orchestrator is the only writer. Observers read through
//! [`PipelineStateStore::snapshot`] while a run is suspended on the network.
//! Every write carries the [`RunTicket`] issued when its run began; writes
//! from a run that has since been superseded by a reset or a new ingest are
//! dropped.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::context::GlobalDirective;
use crate::agents::AgentDirectory;
use crate::core::{Artifact, Stage, StageStatus};
use crate::errors::PipelineError;
use crate::media::{IngestedMedia, MediaReference};
use crate::utils::generate_run_id;

/// Proof that a writer belongs to a particular run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunTicket {
    run_id: Uuid,
}

impl RunTicket {
    /// The run this ticket was issued for.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

/// Result of a ticketed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome {
    /// The write was applied to the current run.
    Applied,
    /// The ticket's run was superseded; nothing changed.
    Stale,
}

impl WriteOutcome {
    /// Returns true if the write was dropped.
    #[must_use]
    pub fn is_stale(self) -> bool {
        self == Self::Stale
    }
}

/// Read-only view of the store at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Current run id.
    pub run_id: String,
    /// Whether a run is active.
    pub in_progress: bool,
    /// Composed directive of the latest run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
    /// Media the pipeline is bound to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaReference>,
    /// Ingest stage followed by the agent stages in execution order.
    pub stages: Vec<Stage>,
}

impl PipelineSnapshot {
    /// Looks up a stage by id.
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Status of a stage, if it exists.
    #[must_use]
    pub fn status(&self, id: &str) -> Option<StageStatus> {
        self.stage(id).map(|s| s.status)
    }

    /// Number of stages currently processing.
    #[must_use]
    pub fn processing_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Processing)
            .count()
    }
}

#[derive(Debug)]
struct StoreInner {
    run_id: Uuid,
    in_progress: bool,
    ingest: Stage,
    stages: Vec<Stage>,
    final_stage: String,
    media: Option<Arc<IngestedMedia>>,
    directive: Option<GlobalDirective>,
}

impl StoreInner {
    fn stage_mut(&mut self, id: &str) -> Result<&mut Stage, PipelineError> {
        self.stages
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| PipelineError::UnknownStage(id.to_string()))
    }

    fn reset_agents(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Starts a new generation; every outstanding ticket becomes stale.
    fn bump(&mut self) -> Uuid {
        let previous = self.run_id;
        self.run_id = generate_run_id();
        self.in_progress = false;
        previous
    }
}

/// Thread-safe holder of the current run's stages.
#[derive(Debug, Clone)]
pub struct PipelineStateStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl PipelineStateStore {
    /// Creates a store with one idle stage per directory entry.
    #[must_use]
    pub fn new(directory: &AgentDirectory) -> Self {
        let inner = StoreInner {
            run_id: generate_run_id(),
            in_progress: false,
            ingest: Stage::ingest(),
            stages: directory.iter().map(|e| e.to_stage()).collect(),
            final_stage: directory.final_entry().id.clone(),
            media: None,
            directive: None,
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Binds new media, superseding any in-flight run and clearing every
    /// agent stage. Returns the superseded run id.
    pub fn ingest(&self, media: IngestedMedia) -> Uuid {
        let mut inner = self.inner.write();
        let previous = inner.bump();
        inner.reset_agents();

        let kind = media.reference.kind.to_string().to_uppercase();
        inner.ingest.reset();
        inner.ingest.status = StageStatus::Completed;
        inner.ingest.output = Some(format!("{kind} ingested. Calibrating sensors..."));
        inner.media = Some(Arc::new(media));

        debug!(%previous, run_id = %inner.run_id, "Media bound");
        previous
    }

    /// Starts a run: checks the dispatch preconditions, clears every agent
    /// stage and marks the pipeline in progress.
    pub fn begin_run(
        &self,
        directive: GlobalDirective,
    ) -> Result<(RunTicket, Arc<IngestedMedia>), PipelineError> {
        let mut inner = self.inner.write();

        let media = inner.media.clone().ok_or(PipelineError::NoMedia)?;
        if inner.in_progress {
            return Err(PipelineError::AlreadyRunning {
                run_id: inner.run_id.to_string(),
            });
        }

        inner.bump();
        inner.reset_agents();
        inner.in_progress = true;
        inner.directive = Some(directive);

        Ok((
            RunTicket {
                run_id: inner.run_id,
            },
            media,
        ))
    }

    /// Returns true if `ticket` belongs to the current run.
    #[must_use]
    pub fn is_current(&self, ticket: &RunTicket) -> bool {
        let inner = self.inner.read();
        inner.in_progress && inner.run_id == ticket.run_id
    }

    fn write_stage(
        &self,
        ticket: &RunTicket,
        stage_id: &str,
        apply: impl FnOnce(&mut Stage) -> Result<(), PipelineError>,
    ) -> Result<WriteOutcome, PipelineError> {
        let mut inner = self.inner.write();
        if !inner.in_progress || inner.run_id != ticket.run_id {
            debug!(run_id = %ticket.run_id, stage = stage_id, "Dropping stale write");
            return Ok(WriteOutcome::Stale);
        }
        apply(inner.stage_mut(stage_id)?)?;
        Ok(WriteOutcome::Applied)
    }

    /// idle → processing.
    pub fn mark_processing(
        &self,
        ticket: &RunTicket,
        stage_id: &str,
    ) -> Result<WriteOutcome, PipelineError> {
        self.write_stage(ticket, stage_id, |stage| {
            stage.transition(StageStatus::Processing)?;
            stage.output = None;
            Ok(())
        })
    }

    /// Replaces the output of a processing stage without changing status.
    pub fn record_interim(
        &self,
        ticket: &RunTicket,
        stage_id: &str,
        message: impl Into<String>,
    ) -> Result<WriteOutcome, PipelineError> {
        self.write_stage(ticket, stage_id, |stage| {
            if stage.status != StageStatus::Processing {
                return Err(PipelineError::InvalidTransition {
                    stage: stage.id.clone(),
                    from: stage.status,
                    to: StageStatus::Processing,
                });
            }
            stage.output = Some(message.into());
            Ok(())
        })
    }

    /// processing → completed with the stage result.
    pub fn mark_completed(
        &self,
        ticket: &RunTicket,
        stage_id: &str,
        output: impl Into<String>,
    ) -> Result<WriteOutcome, PipelineError> {
        self.write_stage(ticket, stage_id, |stage| {
            stage.transition(StageStatus::Completed)?;
            stage.output = Some(output.into());
            Ok(())
        })
    }

    /// processing → error with a diagnostic.
    pub fn mark_error(
        &self,
        ticket: &RunTicket,
        stage_id: &str,
        diagnostic: impl Into<String>,
    ) -> Result<WriteOutcome, PipelineError> {
        self.write_stage(ticket, stage_id, |stage| {
            stage.transition(StageStatus::Error)?;
            stage.output = Some(diagnostic.into());
            Ok(())
        })
    }

    /// Clears the in-progress flag for the ticket's run.
    pub fn finish(&self, ticket: &RunTicket) -> WriteOutcome {
        let mut inner = self.inner.write();
        if inner.run_id != ticket.run_id {
            return WriteOutcome::Stale;
        }
        inner.in_progress = false;
        WriteOutcome::Applied
    }

    /// Discards media, directive and every stage's state. Any in-flight run
    /// becomes stale. Returns the discarded run id.
    pub fn reset(&self) -> Uuid {
        let mut inner = self.inner.write();
        let previous = inner.bump();
        inner.reset_agents();
        inner.ingest.reset();
        inner.media = None;
        inner.directive = None;
        previous
    }

    /// Current state of every stage.
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        let inner = self.inner.read();
        let mut stages = Vec::with_capacity(inner.stages.len() + 1);
        stages.push(inner.ingest.clone());
        stages.extend(inner.stages.iter().cloned());

        PipelineSnapshot {
            run_id: inner.run_id.to_string(),
            in_progress: inner.in_progress,
            directive: inner.directive.as_ref().map(GlobalDirective::compose),
            media: inner.media.as_ref().map(|m| m.reference.clone()),
            stages,
        }
    }

    /// The final stage's output, once that stage has completed.
    #[must_use]
    pub fn artifact(&self) -> Option<Artifact> {
        let inner = self.inner.read();
        inner
            .stages
            .iter()
            .find(|s| s.id == inner.final_stage)
            .filter(|s| s.status == StageStatus::Completed)
            .and_then(|s| s.output.as_ref())
            .map(|text| Artifact::new(&inner.final_stage, text))
    }

    /// Directive used by the most recent run.
    #[must_use]
    pub fn last_directive(&self) -> Option<GlobalDirective> {
        self.inner.read().directive.clone()
    }

    /// Media currently bound to the pipeline.
    #[must_use]
    pub fn media(&self) -> Option<Arc<IngestedMedia>> {
        self.inner.read().media.clone()
    }

    /// Whether a run is active.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.inner.read().in_progress
    }

    /// Overwrites a stage's status without any transition check.
    #[cfg(test)]
    pub(crate) fn force_status(&self, stage_id: &str, status: StageStatus) {
        if let Ok(stage) = self.inner.write().stage_mut(stage_id) {
            stage.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::INGEST_STAGE_ID;
    use crate::media::{EncodedStill, MediaKind, MediaPayload};

    fn image_media() -> IngestedMedia {
        IngestedMedia::new(
            MediaPayload::Image(EncodedStill::jpeg(b"img")),
            MediaReference::from_bytes("still.jpg", MediaKind::Image, b"img"),
        )
    }

    fn store() -> PipelineStateStore {
        PipelineStateStore::new(&AgentDirectory::standard())
    }

    #[test]
    fn test_initial_state() {
        let snapshot = store().snapshot();
        assert!(!snapshot.in_progress);
        assert_eq!(snapshot.stages.len(), 8);
        assert_eq!(snapshot.stages[0].id, INGEST_STAGE_ID);
        assert!(snapshot
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Idle && s.output.is_none()));
    }

    #[test]
    fn test_ingest_completes_ingest_stage() {
        let store = store();
        store.ingest(image_media());

        let snapshot = store.snapshot();
        let ingest = snapshot.stage(INGEST_STAGE_ID).unwrap();
        assert_eq!(ingest.status, StageStatus::Completed);
        assert_eq!(
            ingest.output.as_deref(),
            Some("IMAGE ingested. Calibrating sensors...")
        );
        assert_eq!(snapshot.media.unwrap().source, "still.jpg");
    }

    #[test]
    fn test_begin_run_requires_media() {
        let err = store().begin_run(GlobalDirective::new("d")).unwrap_err();
        assert_eq!(err, PipelineError::NoMedia);
    }

    #[test]
    fn test_begin_run_rejects_overlap() {
        let store = store();
        store.ingest(image_media());
        store.begin_run(GlobalDirective::new("d")).unwrap();

        let err = store.begin_run(GlobalDirective::new("d")).unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyRunning { .. }));
    }

    #[test]
    fn test_stage_lifecycle() {
        let store = store();
        store.ingest(image_media());
        let (ticket, _) = store.begin_run(GlobalDirective::new("d")).unwrap();

        assert_eq!(
            store.mark_processing(&ticket, "analyst").unwrap(),
            WriteOutcome::Applied
        );
        let _ = store
            .record_interim(&ticket, "analyst", "Rate limited...")
            .unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.status("analyst"), Some(StageStatus::Processing));
        assert_eq!(
            snapshot.stage("analyst").unwrap().output.as_deref(),
            Some("Rate limited...")
        );

        let _ = store.mark_completed(&ticket, "analyst", "X").unwrap();
        assert_eq!(store.snapshot().status("analyst"), Some(StageStatus::Completed));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let store = store();
        store.ingest(image_media());
        let (ticket, _) = store.begin_run(GlobalDirective::new("d")).unwrap();

        let err = store.mark_completed(&ticket, "analyst", "X").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));

        let err = store.mark_processing(&ticket, "ghost").unwrap_err();
        assert_eq!(err, PipelineError::UnknownStage("ghost".to_string()));
    }

    #[test]
    fn test_writes_after_reset_are_stale() {
        let store = store();
        store.ingest(image_media());
        let (ticket, _) = store.begin_run(GlobalDirective::new("d")).unwrap();
        let _ = store.mark_processing(&ticket, "analyst").unwrap();

        store.reset();

        assert!(!store.is_current(&ticket));
        assert!(store.mark_completed(&ticket, "analyst", "late").unwrap().is_stale());
        assert!(store.finish(&ticket).is_stale());

        let snapshot = store.snapshot();
        assert!(!snapshot.in_progress);
        assert!(snapshot.media.is_none());
        assert_eq!(snapshot.status("analyst"), Some(StageStatus::Idle));
        assert!(snapshot.stage("analyst").unwrap().output.is_none());
    }

    #[test]
    fn test_new_ingest_supersedes_run() {
        let store = store();
        store.ingest(image_media());
        let (ticket, _) = store.begin_run(GlobalDirective::new("d")).unwrap();

        store.ingest(image_media());
        assert!(store.mark_processing(&ticket, "analyst").unwrap().is_stale());
        assert!(!store.in_progress());
    }

    #[test]
    fn test_artifact_only_when_final_stage_completed() {
        let store = store();
        store.ingest(image_media());
        let (ticket, _) = store.begin_run(GlobalDirective::new("d")).unwrap();
        assert!(store.artifact().is_none());

        let _ = store.mark_processing(&ticket, "optimizer").unwrap();
        let _ = store.mark_completed(&ticket, "optimizer", "final prompt").unwrap();
        assert_eq!(
            store.artifact(),
            Some(Artifact::new("optimizer", "final prompt"))
        );
    }

    #[test]
    fn test_begin_run_clears_previous_outputs() {
        let store = store();
        store.ingest(image_media());
        let (ticket, _) = store.begin_run(GlobalDirective::new("d")).unwrap();
        let _ = store.mark_processing(&ticket, "analyst").unwrap();
        let _ = store.mark_error(&ticket, "analyst", "Link severed").unwrap();
        let _ = store.finish(&ticket);

        let (second, _) = store
            .begin_run(GlobalDirective::new("d").with_modifier("noir"))
            .unwrap();
        assert_ne!(ticket, second);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.status("analyst"), Some(StageStatus::Idle));
        assert_eq!(snapshot.directive.as_deref(), Some("d\nnoir"));
        assert_eq!(snapshot.status(INGEST_STAGE_ID), Some(StageStatus::Completed));
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(store().snapshot()).unwrap();
        assert_eq!(json["stages"][1]["status"], "idle");
    }
}

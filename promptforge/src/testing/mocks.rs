//! Scripted test doubles for the client and the frame sampler.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::client::{AnalysisClient, AnalysisRequest};
use crate::core::ModelTier;
use crate::errors::{AnalysisError, MediaError};
use crate::media::FrameSampler;

/// One call observed by a [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Stage that issued the call.
    pub stage_id: String,
    /// Context sent with the call.
    pub context: String,
    /// Tier the call was routed to.
    pub tier: ModelTier,
    /// Number of inline media parts.
    pub media_parts: usize,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Result<String, AnalysisError>>,
    fallback: Option<Result<String, AnalysisError>>,
}

/// Holds a stage's call open until released.
#[derive(Debug, Clone, Default)]
pub struct StageGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl StageGate {
    /// Waits until the gated call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the gated call return.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// [`AnalysisClient`] that answers from per-stage scripts.
///
/// Unscripted stages answer `"<stage> analysis"`. Scripted results are
/// consumed in order; once a queue is empty the stage's fallback (if any)
/// repeats forever.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, Script>>,
    gates: Mutex<HashMap<String, StageGate>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    /// Creates a client that answers every stage with a default text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one result for `stage_id`.
    #[must_use]
    pub fn then(self, stage_id: &str, result: Result<String, AnalysisError>) -> Self {
        self.scripts
            .lock()
            .entry(stage_id.to_string())
            .or_default()
            .queue
            .push_back(result);
        self
    }

    /// Queues a successful response for `stage_id`.
    #[must_use]
    pub fn respond(self, stage_id: &str, text: impl Into<String>) -> Self {
        self.then(stage_id, Ok(text.into()))
    }

    /// Makes `stage_id` return `result` whenever its queue is empty.
    #[must_use]
    pub fn always(self, stage_id: &str, result: Result<String, AnalysisError>) -> Self {
        self.scripts
            .lock()
            .entry(stage_id.to_string())
            .or_default()
            .fallback = Some(result);
        self
    }

    /// Installs a gate on `stage_id` and returns it.
    pub fn gate(&self, stage_id: &str) -> StageGate {
        self.gates
            .lock()
            .entry(stage_id.to_string())
            .or_default()
            .clone()
    }

    /// Every call in the order it was made.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Stage ids in call order.
    #[must_use]
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.stage_id.clone()).collect()
    }

    /// Number of calls made for `stage_id`.
    #[must_use]
    pub fn calls_for(&self, stage_id: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.stage_id == stage_id)
            .count()
    }

    fn next_result(&self, stage_id: &str) -> Result<String, AnalysisError> {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(stage_id) {
            Some(script) => script
                .queue
                .pop_front()
                .or_else(|| script.fallback.clone())
                .unwrap_or_else(|| Ok(format!("{stage_id} analysis"))),
            None => Ok(format!("{stage_id} analysis")),
        }
    }
}

#[async_trait]
impl AnalysisClient for ScriptedClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<String, AnalysisError> {
        self.calls.lock().push(RecordedCall {
            stage_id: request.stage_id.clone(),
            context: request.context.clone(),
            tier: request.tier,
            media_parts: request.media.len(),
        });

        let gate = self.gates.lock().get(&request.stage_id).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.next_result(&request.stage_id)
    }
}

/// [`FrameSampler`] for a clip of fixed duration. Each captured frame's
/// bytes are `"frame@<seconds>"`.
#[derive(Debug)]
pub struct StaticFrameSampler {
    duration: f64,
    captured: Mutex<Vec<f64>>,
}

impl StaticFrameSampler {
    /// Creates a sampler reporting `duration` seconds.
    #[must_use]
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            captured: Mutex::new(Vec::new()),
        }
    }

    /// Timestamps captured so far, in call order.
    #[must_use]
    pub fn captured(&self) -> Vec<f64> {
        self.captured.lock().clone()
    }

    /// Bytes this sampler returns for a capture at `at_seconds`.
    #[must_use]
    pub fn frame_bytes(at_seconds: f64) -> Vec<u8> {
        format!("frame@{at_seconds:.3}").into_bytes()
    }
}

#[async_trait]
impl FrameSampler for StaticFrameSampler {
    async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
        Ok(self.duration)
    }

    async fn capture_frame(&self, _path: &Path, at_seconds: f64) -> Result<Vec<u8>, MediaError> {
        self.captured.lock().push(at_seconds);
        Ok(Self::frame_bytes(at_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiKey;
    use crate::media::{EncodedStill, MediaPayload};

    fn request(stage_id: &str) -> AnalysisRequest {
        AnalysisRequest {
            stage_id: stage_id.to_string(),
            media: Arc::new(MediaPayload::Image(EncodedStill::jpeg(b"x"))),
            instructions: "i".to_string(),
            context: "ctx".to_string(),
            tier: ModelTier::Fast,
            api_key: ApiKey::new("k"),
        }
    }

    #[tokio::test]
    async fn test_default_response() {
        let client = ScriptedClient::new();
        assert_eq!(client.analyze(request("style")).await.unwrap(), "style analysis");
        assert_eq!(client.call_order(), vec!["style"]);
        assert_eq!(client.calls()[0].media_parts, 1);
    }

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let client = ScriptedClient::new()
            .then("analyst", Err(AnalysisError::rate_limited("429")))
            .respond("analyst", "X")
            .always("style", Err(AnalysisError::transport("down")));

        assert!(client.analyze(request("analyst")).await.is_err());
        assert_eq!(client.analyze(request("analyst")).await.unwrap(), "X");
        assert_eq!(
            client.analyze(request("analyst")).await.unwrap(),
            "analyst analysis"
        );
        for _ in 0..3 {
            assert!(client.analyze(request("style")).await.is_err());
        }
        assert_eq!(client.calls_for("style"), 3);
    }

    #[tokio::test]
    async fn test_gate_holds_call() {
        let client = Arc::new(ScriptedClient::new());
        let gate = client.gate("analyst");

        let task = {
            let client = client.clone();
            tokio::spawn(async move { client.analyze(request("analyst")).await })
        };

        gate.entered().await;
        assert!(!task.is_finished());
        gate.release();
        assert_eq!(task.await.unwrap().unwrap(), "analyst analysis");
    }

    #[tokio::test]
    async fn test_static_sampler_records_captures() {
        let sampler = StaticFrameSampler::new(6.0);
        assert_eq!(sampler.probe_duration(Path::new("x")).await.unwrap(), 6.0);
        let bytes = sampler.capture_frame(Path::new("x"), 3.0).await.unwrap();
        assert_eq!(bytes, StaticFrameSampler::frame_bytes(3.0));
        assert_eq!(sampler.captured(), vec![3.0]);
    }
}

//! The delivered artifact and the completion record emitted for it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::media::MediaReference;

/// File name used when exporting an artifact as plain text.
pub const ARTIFACT_FILE_NAME: &str = "synthesized_blueprint.txt";

/// The final synthesized prompt produced by the last pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// The stage that produced the text.
    pub stage_id: String,
    /// The prompt text.
    pub text: String,
}

impl Artifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(stage_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            text: text.into(),
        }
    }

    /// Writes the artifact into `dir` as [`ARTIFACT_FILE_NAME`] and returns
    /// the full path.
    pub async fn export(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let path = dir.as_ref().join(ARTIFACT_FILE_NAME);
        tokio::fs::write(&path, self.text.as_bytes()).await?;
        tracing::debug!(path = %path.display(), bytes = self.text.len(), "Exported artifact");
        Ok(path)
    }
}

/// "Run completed with artifact X for media Y", for callers that keep a
/// history of runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// The completed run.
    pub run_id: String,
    /// The media the run analysed.
    pub media: MediaReference,
    /// The final prompt text.
    pub artifact: String,
    /// The composed directive the run was seeded with.
    pub directive: String,
    /// When the run completed (ISO 8601).
    pub completed_at: String,
}

impl RunRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        media: MediaReference,
        artifact: impl Into<String>,
        directive: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            media,
            artifact: artifact.into(),
            directive: directive.into(),
            completed_at: crate::utils::iso_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    #[tokio::test]
    async fn test_export_writes_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact::new("optimizer", "anamorphic flare, 3200K key light");

        let path = artifact.export(dir.path()).await.unwrap();

        assert_eq!(path.file_name().unwrap(), ARTIFACT_FILE_NAME);
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "anamorphic flare, 3200K key light");
    }

    #[test]
    fn test_export_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        tokio_test::block_on(Artifact::new("optimizer", "first").export(dir.path())).unwrap();
        let path =
            tokio_test::block_on(Artifact::new("optimizer", "second").export(dir.path())).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "second");
    }

    #[test]
    fn test_run_record_serialization() {
        let media = MediaReference::from_bytes("clip.mp4", MediaKind::Video, b"frames");
        let record = RunRecord::new("run-1", media, "prompt", "Audit the media.");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["media"]["kind"], "video");
        assert_eq!(json["artifact"], "prompt");
        assert!(json["completed_at"].as_str().unwrap().contains('T'));
    }
}

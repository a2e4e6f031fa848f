//! Turns a file on disk into an [`IngestedMedia`].

use std::path::Path;
use std::sync::Arc;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use super::sampler::{sample_timestamps, FfmpegFrameSampler, FrameSampler};
use super::{image_mime_for_path, EncodedStill, IngestedMedia, MediaKind, MediaPayload, MediaReference};
use crate::config::MediaConfig;
use crate::errors::MediaError;

const DIGEST_CHUNK_BYTES: usize = 64 * 1024;

/// Converts uploaded files into analysable payloads.
#[derive(Clone)]
pub struct MediaPreprocessor {
    sampler: Arc<dyn FrameSampler>,
    load_timeout: Option<Duration>,
}

impl std::fmt::Debug for MediaPreprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPreprocessor")
            .field("load_timeout", &self.load_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for MediaPreprocessor {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}

impl MediaPreprocessor {
    /// Creates a preprocessor around a frame sampler.
    #[must_use]
    pub fn new(sampler: Arc<dyn FrameSampler>) -> Self {
        Self {
            sampler,
            load_timeout: MediaConfig::default().load_timeout(),
        }
    }

    /// Creates an ffmpeg-backed preprocessor from configuration.
    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            sampler: Arc::new(FfmpegFrameSampler::from_config(config)),
            load_timeout: config.load_timeout(),
        }
    }

    /// Sets how long a video may take to probe and sample. `None` waits
    /// indefinitely.
    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Produces the payload for `path` according to its declared kind.
    pub async fn prepare(&self, path: &Path, kind: MediaKind) -> Result<IngestedMedia, MediaError> {
        let media = match kind {
            MediaKind::Image => self.prepare_image(path).await?,
            MediaKind::Video => match self.load_timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.prepare_video(path))
                    .await
                    .map_err(|_| {
                        warn!(path = %path.display(), ?timeout, "Video load timed out");
                        MediaError::LoadTimeout {
                            path: path.display().to_string(),
                            timeout,
                        }
                    })??,
                None => self.prepare_video(path).await?,
            },
        };

        info!(
            path = %path.display(),
            kind = %kind,
            stills = media.payload.len(),
            digest = %media.reference.digest,
            "Media prepared"
        );
        Ok(media)
    }

    async fn prepare_image(&self, path: &Path) -> Result<IngestedMedia, MediaError> {
        let bytes = read_source(path).await?;
        let still = EncodedStill::from_bytes(image_mime_for_path(path), &bytes);
        let reference = MediaReference::from_bytes(source_label(path), MediaKind::Image, &bytes);
        Ok(IngestedMedia::new(MediaPayload::Image(still), reference))
    }

    async fn prepare_video(&self, path: &Path) -> Result<IngestedMedia, MediaError> {
        let reference = MediaReference {
            source: source_label(path),
            kind: MediaKind::Video,
            digest: digest_source(path).await?,
        };

        let duration = self.sampler.probe_duration(path).await?;
        let mut frames = Vec::with_capacity(super::sampler::FRAME_COUNT);
        for at in sample_timestamps(duration)? {
            let jpeg = self.sampler.capture_frame(path, at).await?;
            frames.push(EncodedStill::jpeg(&jpeg));
        }

        Ok(IngestedMedia::new(MediaPayload::Frames(frames), reference))
    }
}

async fn read_source(path: &Path) -> Result<Vec<u8>, MediaError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| MediaError::Read {
        path: path.display().to_string(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(MediaError::Empty(path.display().to_string()));
    }
    Ok(bytes)
}

/// Hex SHA-256 of the file, read in fixed-size chunks.
async fn digest_source(path: &Path) -> Result<String, MediaError> {
    let read_error = |source| MediaError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut file = tokio::fs::File::open(path).await.map_err(read_error)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_BYTES];
    let mut total = 0usize;

    loop {
        let n = file.read(&mut buf).await.map_err(read_error)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n;
    }

    if total == 0 {
        return Err(MediaError::Empty(path.display().to_string()));
    }
    Ok(hex::encode(hasher.finalize()))
}

fn source_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::sampler::MockFrameSampler;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::io::Write;

    fn write_temp(name: &str, bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_image_path_reads_whole_file() {
        let (_dir, path) = write_temp("still.png", b"png-bytes");
        let preprocessor = MediaPreprocessor::new(Arc::new(MockFrameSampler::new()));

        let media = preprocessor.prepare(&path, MediaKind::Image).await.unwrap();

        match &media.payload {
            MediaPayload::Image(still) => {
                assert_eq!(still.mime_type, "image/png");
                assert_eq!(still, &EncodedStill::from_bytes("image/png", b"png-bytes"));
            }
            other => panic!("expected image payload, got {other:?}"),
        }
        assert_eq!(media.reference.source, "still.png");
        assert_eq!(media.reference.kind, MediaKind::Image);
    }

    #[tokio::test]
    async fn test_video_path_samples_three_frames_in_order() {
        let (_dir, path) = write_temp("clip.mp4", b"video-bytes");
        let mut sampler = MockFrameSampler::new();
        let mut seq = Sequence::new();

        sampler
            .expect_probe_duration()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(8.0));
        for (at, frame) in [(0.1, "f0"), (4.0, "f1"), (7.9, "f2")] {
            sampler
                .expect_capture_frame()
                .with(mockall::predicate::always(), eq(at))
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_, _| Ok(frame.as_bytes().to_vec()));
        }

        let preprocessor = MediaPreprocessor::new(Arc::new(sampler));
        let media = preprocessor.prepare(&path, MediaKind::Video).await.unwrap();

        assert_eq!(
            media.payload,
            MediaPayload::Frames(vec![
                EncodedStill::jpeg(b"f0"),
                EncodedStill::jpeg(b"f1"),
                EncodedStill::jpeg(b"f2"),
            ])
        );
        assert_eq!(media.reference.kind, MediaKind::Video);
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let preprocessor = MediaPreprocessor::new(Arc::new(MockFrameSampler::new()));
        let err = preprocessor
            .prepare(Path::new("/nonexistent/still.jpg"), MediaKind::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Read { .. }));
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let (_dir, path) = write_temp("empty.jpg", b"");
        let preprocessor = MediaPreprocessor::new(Arc::new(MockFrameSampler::new()));
        let err = preprocessor.prepare(&path, MediaKind::Image).await.unwrap_err();
        assert!(matches!(err, MediaError::Empty(_)));
    }

    #[derive(Debug)]
    struct StalledSampler;

    #[async_trait::async_trait]
    impl FrameSampler for StalledSampler {
        async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
            std::future::pending().await
        }

        async fn capture_frame(&self, _path: &Path, _at: f64) -> Result<Vec<u8>, MediaError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_video_times_out() {
        let (_dir, path) = write_temp("stuck.mp4", b"video-bytes");
        let preprocessor = MediaPreprocessor::new(Arc::new(StalledSampler))
            .with_load_timeout(Some(Duration::from_secs(5)));

        let err = preprocessor.prepare(&path, MediaKind::Video).await.unwrap_err();
        assert!(matches!(err, MediaError::LoadTimeout { .. }));
    }

    #[tokio::test]
    async fn test_video_digest_streams_large_file() {
        let bytes: Vec<u8> = (0..200_000u32).map(|i| u8::try_from(i % 251).unwrap()).collect();
        let (_dir, path) = write_temp("long.mp4", &bytes);

        let digest = digest_source(&path).await.unwrap();
        assert_eq!(
            digest,
            MediaReference::from_bytes("long.mp4", MediaKind::Video, &bytes).digest
        );
    }

    #[tokio::test]
    async fn test_empty_video_rejected_before_probing() {
        let (_dir, path) = write_temp("empty.mp4", b"");
        let preprocessor = MediaPreprocessor::new(Arc::new(MockFrameSampler::new()));
        let err = preprocessor.prepare(&path, MediaKind::Video).await.unwrap_err();
        assert!(matches!(err, MediaError::Empty(_)));
    }
}

//! Frame sampling for video inputs.
//!
//! The pipeline only needs two capabilities from a video backend: its
//! duration, and a JPEG of the frame shown at a given time. Both sit behind
//! [`FrameSampler`] so the decoding backend can be swapped.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::config::MediaConfig;
use crate::errors::MediaError;

/// Offset from either end of the clip for the first and last samples.
pub const EDGE_OFFSET_SECONDS: f64 = 0.1;

/// Number of frames sampled from every video.
pub const FRAME_COUNT: usize = 3;

/// Backend that can probe and capture frames from a video file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Returns the video's duration in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;

    /// Seeks to `at_seconds` and returns the displayed frame as JPEG bytes.
    async fn capture_frame(&self, path: &Path, at_seconds: f64) -> Result<Vec<u8>, MediaError>;
}

/// Computes the sample times for a clip of `duration` seconds.
///
/// Targets are start + 0.1 s, the midpoint and end − 0.1 s, each clamped
/// into `[0, duration]`. Very short clips can clamp out of order, so the
/// result is sorted ascending.
pub fn sample_timestamps(duration: f64) -> Result<[f64; FRAME_COUNT], MediaError> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(MediaError::InvalidDuration(duration));
    }

    let mut times = [
        EDGE_OFFSET_SECONDS,
        duration / 2.0,
        duration - EDGE_OFFSET_SECONDS,
    ]
    .map(|t| t.clamp(0.0, duration));
    times.sort_by(f64::total_cmp);
    Ok(times)
}

/// [`FrameSampler`] backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSampler {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
    jpeg_qscale: u8,
}

impl Default for FfmpegFrameSampler {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}

impl FfmpegFrameSampler {
    /// Creates a sampler from media configuration.
    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            ffprobe: config.ffprobe_path.clone(),
            ffmpeg: config.ffmpeg_path.clone(),
            jpeg_qscale: config.jpeg_qscale,
        }
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Sampler(format!("Failed to execute ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Sampler(format!("ffprobe failed: {stderr}")));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration = stdout
            .trim()
            .parse::<f64>()
            .map_err(|e| MediaError::Sampler(format!("Unparseable duration '{}': {e}", stdout.trim())))?;

        debug!(path = %path.display(), duration, "Probed video duration");
        Ok(duration)
    }

    async fn capture_frame(&self, path: &Path, at_seconds: f64) -> Result<Vec<u8>, MediaError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-ss"])
            .arg(format!("{at_seconds:.3}"))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-q:v"])
            .arg(self.jpeg_qscale.to_string())
            .args(["-f", "image2pipe", "-vcodec", "mjpeg", "pipe:1"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Sampler(format!("Failed to execute ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Sampler(format!("ffmpeg failed: {stderr}")));
        }
        if output.stdout.is_empty() {
            return Err(MediaError::Sampler(format!(
                "ffmpeg produced no frame at {at_seconds:.3}s"
            )));
        }

        debug!(
            path = %path.display(),
            at_seconds,
            bytes = output.stdout.len(),
            "Captured frame"
        );
        Ok(output.stdout)
    }
}

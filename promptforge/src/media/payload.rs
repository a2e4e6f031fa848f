//! Encoded media handed to the analysis client.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// The declared kind of an ingested file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A single still image.
    Image,
    /// A short video, sampled into frames.
    Video,
}

impl MediaKind {
    /// Classifies a MIME type: `video/*` is a video, anything else an image.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        if mime.trim().to_ascii_lowercase().starts_with("video/") {
            Self::Video
        } else {
            Self::Image
        }
    }

    /// Classifies a path by its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let is_video = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                matches!(
                    ext.to_ascii_lowercase().as_str(),
                    "mp4" | "mov" | "webm" | "mkv" | "avi" | "m4v" | "mpeg" | "mpg"
                )
            })
            .unwrap_or(false);

        if is_video {
            Self::Video
        } else {
            Self::Image
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Guesses an image MIME type from a file extension, defaulting to JPEG.
#[must_use]
pub fn image_mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

/// One still image, base64 encoded for inline transport.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedStill {
    /// MIME type of the decoded bytes.
    pub mime_type: String,
    /// Standard base64 of the image bytes.
    pub data: String,
}

impl EncodedStill {
    /// Encodes raw image bytes.
    #[must_use]
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Encodes raw JPEG bytes.
    #[must_use]
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self::from_bytes("image/jpeg", bytes)
    }

    /// Approximate size of the decoded bytes.
    #[must_use]
    pub fn decoded_len(&self) -> usize {
        self.data.len() / 4 * 3
    }
}

impl fmt::Debug for EncodedStill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedStill")
            .field("mime_type", &self.mime_type)
            .field("encoded_len", &self.data.len())
            .finish()
    }
}

/// Describes where a payload came from, for completion records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Caller-facing label, usually the file name.
    pub source: String,
    /// The declared media kind.
    pub kind: MediaKind,
    /// Hex SHA-256 of the source bytes.
    pub digest: String,
}

impl MediaReference {
    /// Builds a reference by hashing the source bytes.
    #[must_use]
    pub fn from_bytes(source: impl Into<String>, kind: MediaKind, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            source: source.into(),
            kind,
            digest: hex::encode(hasher.finalize()),
        }
    }
}

/// The analysable form of an ingested file.
///
/// Frames are ordered by capture time; their order carries meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "stills", rename_all = "snake_case")]
pub enum MediaPayload {
    /// A single still image.
    Image(EncodedStill),
    /// Stills sampled from a video, in time order.
    Frames(Vec<EncodedStill>),
}

impl MediaPayload {
    /// Returns the stills in transport order.
    #[must_use]
    pub fn stills(&self) -> &[EncodedStill] {
        match self {
            Self::Image(still) => std::slice::from_ref(still),
            Self::Frames(frames) => frames,
        }
    }

    /// Returns the kind of media the payload represents.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Frames(_) => MediaKind::Video,
        }
    }

    /// Number of stills in the payload.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stills().len()
    }

    /// Returns true if the payload carries no stills.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stills().is_empty()
    }
}

/// A payload together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedMedia {
    /// What gets sent to the service.
    pub payload: MediaPayload,
    /// Where it came from.
    pub reference: MediaReference,
}

impl IngestedMedia {
    /// Pairs a payload with its reference.
    #[must_use]
    pub fn new(payload: MediaPayload, reference: MediaReference) -> Self {
        Self { payload, reference }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("VIDEO/webm"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("application/octet-stream"), MediaKind::Image);
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(MediaKind::from_path(Path::new("clip.MOV")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("still.jpg")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("noext")), MediaKind::Image);
    }

    #[test]
    fn test_image_mime_for_path() {
        assert_eq!(image_mime_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(image_mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(image_mime_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(image_mime_for_path(Path::new("a")), "image/jpeg");
    }

    #[test]
    fn test_encoded_still_base64() {
        let still = EncodedStill::jpeg(b"hello");
        assert_eq!(still.mime_type, "image/jpeg");
        assert_eq!(still.data, "aGVsbG8=");
    }

    #[test]
    fn test_debug_hides_payload() {
        let still = EncodedStill::jpeg(b"secret pixels");
        let debug = format!("{still:?}");
        assert!(!debug.contains(&still.data));
        assert!(debug.contains("encoded_len"));
    }

    #[test]
    fn test_payload_stills_preserve_order() {
        let frames = vec![
            EncodedStill::jpeg(b"t0"),
            EncodedStill::jpeg(b"t1"),
            EncodedStill::jpeg(b"t2"),
        ];
        let payload = MediaPayload::Frames(frames.clone());
        assert_eq!(payload.stills(), frames.as_slice());
        assert_eq!(payload.kind(), MediaKind::Video);
        assert_eq!(payload.len(), 3);

        let image = MediaPayload::Image(EncodedStill::jpeg(b"x"));
        assert_eq!(image.len(), 1);
        assert_eq!(image.kind(), MediaKind::Image);
    }

    #[test]
    fn test_reference_digest_is_sha256_hex() {
        let reference = MediaReference::from_bytes("a.jpg", MediaKind::Image, b"abc");
        assert_eq!(
            reference.digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

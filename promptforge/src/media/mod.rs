//! Media ingestion.
//!
//! This module provides:
//! - Payload types sent inline to the generation service
//! - Frame sampling for videos (trait + ffmpeg backend)
//! - The preprocessor that turns a file into a payload

mod payload;
mod preprocessor;
mod sampler;

pub use payload::{
    image_mime_for_path, EncodedStill, IngestedMedia, MediaKind, MediaPayload, MediaReference,
};
pub use preprocessor::MediaPreprocessor;
pub use sampler::{
    sample_timestamps, FfmpegFrameSampler, FrameSampler, EDGE_OFFSET_SECONDS, FRAME_COUNT,
};

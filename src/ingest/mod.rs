//! Video sources and the frame sampler.
//!
//! `VideoSource::open` picks a backend from the input string:
//! - `stub://...`: deterministic synthetic parking-lot video
//! - a directory: numbered still images, one frame per file
//! - anything else: a video file decoded with FFmpeg (feature: ingest-ffmpeg)
//!
//! `VideoSource::in_memory` wraps pre-decoded frames for tests and replays.
//!
//! Sources are forward-only. A backend reports a bad frame as
//! `Decoded::Corrupt` after it has already moved past it, so the sampler can
//! keep going.

#[cfg(feature = "ingest-ffmpeg")]
mod ffmpeg;
mod memory;
mod sampler;
mod sequence;
mod synthetic;

use image::RgbImage;
use std::path::Path;

use crate::error::{SlotError, SlotResult};

pub use sampler::{FrameSampler, SamplerStats};
pub use synthetic::{ParkedVehicle, SyntheticConfig};

/// Outcome of decoding one position in the source.
pub(crate) enum Decoded {
    Frame(RgbImage),
    Corrupt(String),
    End,
}

/// Readable video stream handle.
pub struct VideoSource {
    backend: VideoBackend,
}

enum VideoBackend {
    Memory(memory::MemoryVideo),
    Synthetic(synthetic::SyntheticVideo),
    Sequence(sequence::ImageSequenceVideo),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(ffmpeg::FfmpegVideo),
}

impl VideoSource {
    /// Open a source; failures are `SourceUnavailable` naming the input.
    pub fn open(input: &str) -> SlotResult<Self> {
        if input.trim().is_empty() {
            return Err(SlotError::unavailable(
                "<empty>",
                "expected a video file, image directory or stub:// source",
            ));
        }
        if input.starts_with("stub://") {
            let config = SyntheticConfig::from_uri(input)?;
            return Ok(Self {
                backend: VideoBackend::Synthetic(synthetic::SyntheticVideo::new(config)),
            });
        }
        let path = Path::new(input);
        if path.is_dir() {
            return Ok(Self {
                backend: VideoBackend::Sequence(sequence::ImageSequenceVideo::open(path)?),
            });
        }
        if !path.exists() {
            return Err(SlotError::unavailable(input, "no such file or directory"));
        }
        #[cfg(feature = "ingest-ffmpeg")]
        {
            Ok(Self {
                backend: VideoBackend::Ffmpeg(ffmpeg::FfmpegVideo::open(path)?),
            })
        }
        #[cfg(not(feature = "ingest-ffmpeg"))]
        {
            Err(SlotError::unavailable(
                input,
                "video file decoding requires the ingest-ffmpeg feature \
                 (use an image directory or stub:// source instead)",
            ))
        }
    }

    /// Pre-decoded frames; `None` entries decode as corrupt frames.
    pub fn in_memory(frames: Vec<Option<RgbImage>>) -> Self {
        Self {
            backend: VideoBackend::Memory(memory::MemoryVideo::new(frames)),
        }
    }

    /// Synthetic lot video with explicit settings.
    pub fn synthetic(config: SyntheticConfig) -> Self {
        Self {
            backend: VideoBackend::Synthetic(synthetic::SyntheticVideo::new(config)),
        }
    }

    /// Total frames, when the backend knows it up front.
    pub fn frame_count(&self) -> Option<u64> {
        match &self.backend {
            VideoBackend::Memory(source) => Some(source.frame_count()),
            VideoBackend::Synthetic(source) => Some(source.frame_count()),
            VideoBackend::Sequence(source) => Some(source.frame_count()),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.frame_count(),
        }
    }

    /// Human-readable name used in errors and logs.
    pub fn describe(&self) -> String {
        match &self.backend {
            VideoBackend::Memory(source) => source.describe(),
            VideoBackend::Synthetic(source) => source.describe(),
            VideoBackend::Sequence(source) => source.describe(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.describe(),
        }
    }

    pub(crate) fn decode_next(&mut self) -> Decoded {
        match &mut self.backend {
            VideoBackend::Memory(source) => source.decode_next(),
            VideoBackend::Synthetic(source) => source.decode_next(),
            VideoBackend::Sequence(source) => source.decode_next(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.decode_next(),
        }
    }

    /// Move past one position without keeping pixels. False at end of stream.
    pub(crate) fn skip(&mut self) -> bool {
        match &mut self.backend {
            VideoBackend::Memory(source) => source.skip(),
            VideoBackend::Synthetic(source) => source.skip(),
            VideoBackend::Sequence(source) => source.skip(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => !matches!(source.decode_next(), Decoded::End),
        }
    }
}

impl std::fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSource")
            .field("source", &self.describe())
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_unavailable() {
        let err = VideoSource::open("/definitely/not/here.mp4").unwrap_err();
        match err {
            SlotError::SourceUnavailable { resource, .. } => {
                assert_eq!(resource, "/definitely/not/here.mp4")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn stub_uri_selects_synthetic_backend() {
        let source = VideoSource::open("stub://lot?frames=12").unwrap();
        assert_eq!(source.frame_count(), Some(12));
        assert!(source.describe().starts_with("stub://"));
    }
}

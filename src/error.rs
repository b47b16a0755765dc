//! Error taxonomy shared by capture and detection.
//!
//! `SourceUnavailable`, `MalformedData` and `SeekOutOfRange` are fatal and are
//! raised before any processing loop starts. `FrameDecode` is recoverable: the
//! sampler has already moved past the bad frame when it is returned.
//! `InvalidGeometry` is recovered locally during interactive capture.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("invalid slot geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("malformed slot data in {resource}: {reason}")]
    MalformedData { resource: String, reason: String },

    #[error(
        "start frame {requested} is out of range for {resource} \
         (expected 1..={available})"
    )]
    SeekOutOfRange {
        resource: String,
        requested: u64,
        available: u64,
    },

    #[error("frame {index} could not be decoded: {reason}")]
    FrameDecode { index: u64, reason: String },

    #[error("cannot open {resource}: {reason}")]
    SourceUnavailable { resource: String, reason: String },

    #[error("frame sampler is closed: {reason}")]
    SamplerClosed { reason: String },

    #[error("failed to write {resource}: {source}")]
    Write {
        resource: String,
        #[source]
        source: io::Error,
    },
}

impl SlotError {
    pub(crate) fn geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedData {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors the detection loop can skip past.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::FrameDecode { .. })
    }
}

pub type SlotResult<T> = std::result::Result<T, SlotError>;

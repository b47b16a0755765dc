//! Frame sampler: seek once, then pull frames forward until end of stream.

use super::{Decoded, VideoSource};
use crate::error::{SlotError, SlotResult};
use crate::frame::Frame;

#[derive(Clone, Debug, PartialEq, Eq)]
enum SamplerState {
    Pending,
    Streaming,
    Exhausted,
    Closed(String),
}

/// Statistics for a sampler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub frames_yielded: u64,
    pub frames_skipped: u64,
    pub source: String,
}

/// Forward-only, non-restartable frame sequence over a `VideoSource`.
///
/// Frame indices are 1-based positions in the source. A failed seek closes
/// the sampler for good.
pub struct FrameSampler {
    source: VideoSource,
    state: SamplerState,
    position: u64,
    stats: SamplerStats,
}

impl FrameSampler {
    pub fn new(source: VideoSource) -> Self {
        let stats = SamplerStats {
            source: source.describe(),
            ..SamplerStats::default()
        };
        Self {
            source,
            state: SamplerState::Pending,
            position: 0,
            stats,
        }
    }

    /// Position the sampler so the first frame returned is `start_frame`.
    pub fn seek(&mut self, start_frame: u64) -> SlotResult<()> {
        if self.state != SamplerState::Pending {
            return Err(SlotError::SamplerClosed {
                reason: "seek is only allowed once, before the first frame".to_string(),
            });
        }
        let resource = self.source.describe();
        let known = self.source.frame_count();

        let out_of_range = |available: u64| SlotError::SeekOutOfRange {
            resource: resource.clone(),
            requested: start_frame,
            available,
        };

        if start_frame == 0 {
            let err = out_of_range(known.unwrap_or(0));
            self.state = SamplerState::Closed(err.to_string());
            return Err(err);
        }
        if let Some(total) = known {
            if start_frame > total {
                let err = out_of_range(total);
                self.state = SamplerState::Closed(err.to_string());
                return Err(err);
            }
        }

        while self.position + 1 < start_frame {
            if !self.source.skip() {
                let err = out_of_range(self.position);
                self.state = SamplerState::Closed(err.to_string());
                return Err(err);
            }
            self.position += 1;
        }

        log::info!("{}: starting at frame {}", resource, start_frame);
        self.state = SamplerState::Streaming;
        Ok(())
    }

    /// Next decoded frame, `Ok(None)` at end of stream.
    ///
    /// A `FrameDecode` error means that one frame was skipped; calling again
    /// continues with the following frame.
    pub fn next_frame(&mut self) -> SlotResult<Option<Frame>> {
        if let SamplerState::Closed(reason) = &self.state {
            return Err(SlotError::SamplerClosed {
                reason: reason.clone(),
            });
        }
        if self.state == SamplerState::Exhausted {
            return Ok(None);
        }
        if self.state == SamplerState::Pending {
            self.seek(1)?;
        }

        match self.source.decode_next() {
            Decoded::Frame(image) => {
                self.position += 1;
                self.stats.frames_yielded += 1;
                Ok(Some(Frame::new(self.position, image)))
            }
            Decoded::Corrupt(reason) => {
                self.position += 1;
                self.stats.frames_skipped += 1;
                Err(SlotError::FrameDecode {
                    index: self.position,
                    reason,
                })
            }
            Decoded::End => {
                log::info!(
                    "{}: end of stream after frame {}",
                    self.stats.source,
                    self.position
                );
                self.state = SamplerState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Index of the last frame consumed (decoded or skipped); 0 before the first.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total frames in the source, when known.
    pub fn frame_count(&self) -> Option<u64> {
        self.source.frame_count()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SamplerState::Closed(_))
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats.clone()
    }
}

impl Iterator for FrameSampler {
    type Item = SlotResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_closed() {
            return None;
        }
        self.next_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(v: u8) -> Option<RgbImage> {
        Some(RgbImage::from_pixel(4, 4, Rgb([v, v, v])))
    }

    #[test]
    fn seek_skips_to_one_based_start() {
        let source = VideoSource::in_memory(vec![solid(1), solid(2), solid(3)]);
        let mut sampler = FrameSampler::new(source);
        sampler.seek(2).unwrap();
        let frame = sampler.next_frame().unwrap().unwrap();
        assert_eq!(frame.index(), 2);
        assert_eq!(frame.image().get_pixel(0, 0).0, [2, 2, 2]);
        assert_eq!(sampler.next_frame().unwrap().unwrap().index(), 3);
        assert!(sampler.next_frame().unwrap().is_none());
        assert!(sampler.next_frame().unwrap().is_none());
    }

    #[test]
    fn seek_past_end_closes_sampler() {
        let source = VideoSource::in_memory(vec![solid(1), solid(2)]);
        let mut sampler = FrameSampler::new(source);
        let err = sampler.seek(3).unwrap_err();
        assert!(matches!(
            err,
            SlotError::SeekOutOfRange {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert!(sampler.is_closed());
        assert!(matches!(
            sampler.next_frame(),
            Err(SlotError::SamplerClosed { .. })
        ));
        assert!(sampler.next().is_none());
    }

    #[test]
    fn zero_start_frame_is_out_of_range() {
        let mut sampler = FrameSampler::new(VideoSource::in_memory(vec![solid(1)]));
        assert!(matches!(
            sampler.seek(0),
            Err(SlotError::SeekOutOfRange { requested: 0, .. })
        ));
    }

    #[test]
    fn corrupt_frame_is_skipped_not_fatal() {
        let source = VideoSource::in_memory(vec![solid(1), None, solid(3)]);
        let mut sampler = FrameSampler::new(source);
        assert_eq!(sampler.next_frame().unwrap().unwrap().index(), 1);
        match sampler.next_frame() {
            Err(SlotError::FrameDecode { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected decode error, got {:?}", other.map(|f| f.is_some())),
        }
        assert_eq!(sampler.next_frame().unwrap().unwrap().index(), 3);
        let stats = sampler.stats();
        assert_eq!(stats.frames_yielded, 2);
        assert_eq!(stats.frames_skipped, 1);
    }

    #[test]
    fn second_seek_is_rejected() {
        let mut sampler = FrameSampler::new(VideoSource::in_memory(vec![solid(1), solid(2)]));
        sampler.seek(1).unwrap();
        assert!(matches!(
            sampler.seek(2),
            Err(SlotError::SamplerClosed { .. })
        ));
    }
}

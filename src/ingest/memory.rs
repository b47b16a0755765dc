use image::RgbImage;
use std::collections::VecDeque;

use super::Decoded;

pub(crate) struct MemoryVideo {
    frames: VecDeque<Option<RgbImage>>,
    total: u64,
}

impl MemoryVideo {
    pub(crate) fn new(frames: Vec<Option<RgbImage>>) -> Self {
        let total = frames.len() as u64;
        Self {
            frames: frames.into(),
            total,
        }
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.total
    }

    pub(crate) fn describe(&self) -> String {
        format!("memory://{}-frames", self.total)
    }

    pub(crate) fn decode_next(&mut self) -> Decoded {
        match self.frames.pop_front() {
            Some(Some(image)) => Decoded::Frame(image),
            Some(None) => Decoded::Corrupt("frame marked corrupt".to_string()),
            None => Decoded::End,
        }
    }

    pub(crate) fn skip(&mut self) -> bool {
        self.frames.pop_front().is_some()
    }
}

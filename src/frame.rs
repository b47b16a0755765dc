//! Decoded frames.
//!
//! A `Frame` is owned by one loop iteration. The only pixels kept across
//! iterations are the per-slot references inside the classifier.

use image::{GrayImage, RgbImage};

/// One decoded RGB image with its 1-based index in the source.
#[derive(Clone, Debug)]
pub struct Frame {
    index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Single-channel intensity copy of the whole frame.
    pub fn luma(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}

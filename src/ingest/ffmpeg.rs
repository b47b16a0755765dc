//! Video file source using FFmpeg.
//!
//! Decodes the best video stream to RGB24 in-memory, one frame per call.
//! A packet the decoder rejects counts as one corrupt frame; decoding then
//! continues with the next packet.

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;

use super::Decoded;
use crate::error::{SlotError, SlotResult};

pub(crate) struct FfmpegVideo {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: Option<u64>,
    flushed: bool,
}

impl FfmpegVideo {
    pub(crate) fn open(path: &Path) -> SlotResult<Self> {
        let resource = path.display().to_string();
        let unavailable = |reason: String| SlotError::unavailable(&resource, reason);

        ffmpeg::init().map_err(|e| unavailable(format!("initialize ffmpeg: {}", e)))?;
        let input = ffmpeg::format::input(&path)
            .map_err(|e| unavailable(format!("ffmpeg could not open input: {}", e)))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| unavailable("file has no video track".to_string()))?;
        let stream_index = input_stream.index();
        let frame_count = match input_stream.frames() {
            n if n > 0 => Some(n as u64),
            _ => None,
        };
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| unavailable(format!("load video decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| unavailable(format!("open video decoder: {}", e)))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| unavailable(format!("create RGB scaler: {}", e)))?;

        log::info!(
            "video {}: {}x{}, {} frames",
            resource,
            decoder.width(),
            decoder.height(),
            frame_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        Ok(Self {
            path: resource,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count,
            flushed: false,
        })
    }

    pub(crate) fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    pub(crate) fn describe(&self) -> String {
        self.path.clone()
    }

    pub(crate) fn decode_next(&mut self) -> Decoded {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded);
            }
            if self.flushed {
                return Decoded::End;
            }

            let packet = self
                .input
                .packets()
                .find(|(stream, _)| stream.index() == self.stream_index)
                .map(|(_, packet)| packet);
            match packet {
                Some(packet) => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        return Decoded::Corrupt(format!("decoder rejected packet: {}", e));
                    }
                }
                None => {
                    // Drain frames still buffered inside the decoder.
                    self.flushed = true;
                    if let Err(e) = self.decoder.send_eof() {
                        log::debug!("ffmpeg send_eof on {}: {}", self.path, e);
                    }
                }
            }
        }
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Decoded {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        if let Err(e) = self.scaler.run(decoded, &mut rgb_frame) {
            return Decoded::Corrupt(format!("scale frame to RGB: {}", e));
        }
        match frame_to_image(&rgb_frame) {
            Some(img) => Decoded::Frame(img),
            None => Decoded::Corrupt("ffmpeg frame row is out of bounds".to_string()),
        }
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> Option<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(data.get(start..start + row_bytes)?);
    }
    RgbImage::from_raw(width, height, pixels)
}

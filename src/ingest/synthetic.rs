//! Synthetic parking-lot video (`stub://` sources).
//!
//! Renders a gray lot with slowly drifting brightness and seeded per-pixel
//! noise, plus two vehicles that park and leave on a fixed schedule. Used by
//! demos and tests; output is identical for identical settings.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Decoded;
use crate::error::{SlotError, SlotResult};

/// A vehicle block and the inclusive frame range (1-based) it is parked.
#[derive(Clone, Debug, PartialEq)]
pub struct ParkedVehicle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub arrives: u64,
    pub leaves: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
    pub seed: u64,
    /// Peak per-pixel noise amplitude.
    pub noise: u8,
    pub vehicles: Vec<ParkedVehicle>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            uri: "stub://lot".to_string(),
            width: 320,
            height: 240,
            frames: 300,
            seed: 7,
            noise: 4,
            vehicles: vec![
                ParkedVehicle {
                    x: 24,
                    y: 44,
                    width: 52,
                    height: 92,
                    arrives: 100,
                    leaves: 199,
                },
                ParkedVehicle {
                    x: 104,
                    y: 44,
                    width: 52,
                    height: 92,
                    arrives: 30,
                    leaves: 259,
                },
            ],
        }
    }
}

impl SyntheticConfig {
    /// Parse `stub://name?frames=N&seed=S&noise=A`; unknown keys are rejected.
    pub fn from_uri(uri: &str) -> SlotResult<Self> {
        let mut config = Self {
            uri: uri.to_string(),
            ..Self::default()
        };
        let Some((_, query)) = uri.split_once('?') else {
            return Ok(config);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let bad = |what: &str| {
                SlotError::unavailable(uri, format!("{} must be {}, got '{}'", key, what, value))
            };
            match key {
                "frames" => {
                    config.frames = value.parse().map_err(|_| bad("an integer"))?;
                }
                "seed" => {
                    config.seed = value.parse().map_err(|_| bad("an integer"))?;
                }
                "noise" => {
                    config.noise = value.parse().map_err(|_| bad("0..=255"))?;
                }
                other => {
                    return Err(SlotError::unavailable(
                        uri,
                        format!("unknown stub parameter '{}'", other),
                    ))
                }
            }
        }
        Ok(config)
    }
}

pub(crate) struct SyntheticVideo {
    config: SyntheticConfig,
    rng: StdRng,
    position: u64,
}

impl SyntheticVideo {
    pub(crate) fn new(config: SyntheticConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            position: 0,
        }
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.config.frames
    }

    pub(crate) fn describe(&self) -> String {
        self.config.uri.clone()
    }

    pub(crate) fn decode_next(&mut self) -> Decoded {
        if self.position >= self.config.frames {
            return Decoded::End;
        }
        self.position += 1;
        Decoded::Frame(self.render(self.position))
    }

    pub(crate) fn skip(&mut self) -> bool {
        if self.position >= self.config.frames {
            return false;
        }
        self.position += 1;
        true
    }

    fn render(&mut self, index: u64) -> RgbImage {
        let SyntheticConfig {
            width,
            height,
            noise,
            ..
        } = self.config;
        // Slow lighting drift: +-6 levels over a 200-frame period.
        let drift = (6.0 * (index as f64 * std::f64::consts::TAU / 200.0).sin()) as i32;
        let base = 92 + drift;
        let mut img = RgbImage::new(width, height);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let jitter = if noise == 0 {
                0
            } else {
                self.rng.gen_range(-(noise as i32)..=noise as i32)
            };
            // Painted bay lines every 80 px.
            let line = x % 80 < 3 && y > 30 && y < height.saturating_sub(30);
            let level = if line { 235 } else { base } + jitter;
            let v = level.clamp(0, 255) as u8;
            *px = Rgb([v, v, v]);
        }
        for vehicle in &self.config.vehicles {
            if index < vehicle.arrives || index > vehicle.leaves {
                continue;
            }
            paint_vehicle(&mut img, vehicle);
        }
        img
    }
}

fn paint_vehicle(img: &mut RgbImage, v: &ParkedVehicle) {
    let x_end = (v.x + v.width).min(img.width());
    let y_end = (v.y + v.height).min(img.height());
    for y in v.y..y_end {
        for x in v.x..x_end {
            let in_window = y > v.y + v.height / 4 && y < v.y + v.height / 2;
            // Dark panel seams give the body more texture than bare asphalt.
            let seam = (x - v.x) % 6 < 2;
            let color = if in_window {
                Rgb([30, 34, 40])
            } else if seam {
                Rgb([60, 20, 18])
            } else {
                Rgb([180, 40, 36])
            };
            img.put_pixel(x, y, color);
        }
    }
}

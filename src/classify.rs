//! Per-slot occupancy signal.
//!
//! Each slot keeps its own rolling reference of what the empty bay looks like:
//! a blurred luma crop of the slot's bounding rectangle, seeded from the first
//! frame and blended in as an exponential moving average while the slot is
//! stably Free and the current frame also reads Free. The dissimilarity
//! between the current crop and that reference is thresholded into one raw
//! decision per slot per frame. Raw decisions are noisy; smoothing happens in
//! `occupancy`.
//!
//! A vehicle already parked on the first processed frame becomes part of
//! that slot's reference and reads Free. Once it leaves, the bare bay reads
//! Occupied against it. A slot that stays stably Occupied on a still crop with
//! clearly less texture (mean Laplacian response) than its reference for
//! `relearn_frames` frames has its reference re-seeded from the current crop.
//! A vehicle that is smoother than the empty bay cannot be told apart this way.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::geometry::{BoundingRect, Point, SlotPolygon};
use crate::occupancy::Occupancy;
use crate::registry::{SlotId, SlotRegistry};

/// Dissimilarity measure between a crop and its reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Mean absolute intensity difference, in gray levels.
    #[default]
    MeanAbsDiff,
    /// Difference of mean absolute Laplacian response (texture energy).
    EdgeDelta,
}

impl std::str::FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mean_abs_diff" => Ok(Self::MeanAbsDiff),
            "edge_delta" => Ok(Self::EdgeDelta),
            other => Err(format!(
                "unknown signal '{}'; expected mean_abs_diff or edge_delta",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierConfig {
    /// Scores strictly above this read as Occupied.
    pub threshold: f32,
    /// EMA weight of the current crop when refreshing the reference.
    pub learning_rate: f32,
    /// Gaussian blur applied to crops before comparison; 0 disables.
    pub blur_sigma: f32,
    pub signal: Signal,
    /// Only sample pixels inside the slot polygon, not the whole rectangle.
    pub mask_polygon: bool,
    /// Still, smoother-than-reference Occupied frames before the reference
    /// is re-seeded; 0 disables.
    pub relearn_frames: u32,
}

/// Current texture must be below this fraction of the reference's to count
/// toward a relearn.
const RELEARN_TEXTURE_RATIO: f32 = 0.75;

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: 18.0,
            learning_rate: 0.05,
            blur_sigma: 1.0,
            signal: Signal::MeanAbsDiff,
            mask_polygon: false,
            relearn_frames: 25,
        }
    }
}

/// Raw, unsmoothed result for one slot on one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawReading {
    pub score: f32,
    pub decision: Occupancy,
}

impl RawReading {
    fn free() -> Self {
        Self {
            score: 0.0,
            decision: Occupancy::Free,
        }
    }
}

struct SlotReference {
    rect: BoundingRect,
    mask: Vec<bool>,
    pixels: Vec<f32>,
    edge_energy: f32,
}

struct SlotModel {
    polygon: SlotPolygon,
    reference: Option<SlotReference>,
    /// Previous crop, for the frame-to-frame stillness check.
    previous: Vec<f32>,
    /// Consecutive frames meeting the relearn conditions.
    relearn_run: u32,
    warned_outside: bool,
}

pub struct OccupancyClassifier {
    config: ClassifierConfig,
    slots: Vec<SlotModel>,
}

impl OccupancyClassifier {
    pub fn new(registry: &SlotRegistry, config: ClassifierConfig) -> Self {
        let slots = registry
            .iter()
            .map(|(_, polygon)| SlotModel {
                polygon: polygon.clone(),
                reference: None,
                previous: Vec::new(),
                relearn_run: 0,
                warned_outside: false,
            })
            .collect();
        Self { config, slots }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// True once the slot has a reference to compare against.
    pub fn has_reference(&self, slot: SlotId) -> bool {
        self.slots
            .get(slot)
            .is_some_and(|model| model.reference.is_some())
    }

    /// Classify every slot on one frame. `stable` holds the current stable
    /// state per slot, in id order, and gates reference updates.
    pub fn classify_frame(&mut self, frame: &Frame, stable: &[Occupancy]) -> Vec<RawReading> {
        let luma = frame.luma();
        (0..self.slots.len())
            .map(|slot| {
                let state = stable.get(slot).copied().unwrap_or(Occupancy::Free);
                self.classify(slot, &luma, state)
            })
            .collect()
    }

    /// Score one slot against its reference and threshold the score.
    pub fn classify(&mut self, slot: SlotId, luma: &GrayImage, stable: Occupancy) -> RawReading {
        let config = self.config.clone();
        let Some(model) = self.slots.get_mut(slot) else {
            return RawReading::free();
        };

        let Some(rect) = model
            .polygon
            .bounding_rect()
            .clamp_to(luma.width(), luma.height())
        else {
            if !model.warned_outside {
                log::warn!(
                    "slot {} lies outside the {}x{} frame; reporting Free",
                    slot,
                    luma.width(),
                    luma.height()
                );
                model.warned_outside = true;
            }
            return RawReading::free();
        };

        let crop = image::imageops::crop_imm(
            luma,
            rect.x as u32,
            rect.y as u32,
            rect.width,
            rect.height,
        )
        .to_image();
        let crop = if config.blur_sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(&crop, config.blur_sigma)
        } else {
            crop
        };

        let needs_seed = model
            .reference
            .as_ref()
            .map_or(true, |reference| reference.rect != rect);
        if needs_seed {
            let mask = sample_mask(&model.polygon, rect, config.mask_polygon);
            let energy = edge_energy(&crop, &mask);
            log::debug!("slot {}: reference seeded at {:?}", slot, rect);
            model.previous = luma_values(&crop);
            model.relearn_run = 0;
            model.reference = Some(SlotReference {
                rect,
                pixels: model.previous.clone(),
                mask,
                edge_energy: energy,
            });
            return RawReading::free();
        }
        let Some(reference) = model.reference.as_mut() else {
            return RawReading::free();
        };

        let current_edges = edge_energy(&crop, &reference.mask);
        let score = match config.signal {
            Signal::MeanAbsDiff => mean_abs_diff(&crop, &reference.pixels, &reference.mask),
            Signal::EdgeDelta => (current_edges - reference.edge_energy).abs(),
        };
        let decision = if score > config.threshold {
            Occupancy::Occupied
        } else {
            Occupancy::Free
        };
        log::debug!("slot {}: score {:.2} -> {:?}", slot, score, decision);

        let still = model.previous.len() == reference.pixels.len()
            && mean_abs_diff(&crop, &model.previous, &reference.mask) <= config.threshold / 2.0;
        model.previous = luma_values(&crop);

        if stable == Occupancy::Free && decision == Occupancy::Free {
            let a = config.learning_rate;
            for (r, p) in reference.pixels.iter_mut().zip(crop.pixels()) {
                *r = (1.0 - a) * *r + a * p.0[0] as f32;
            }
            reference.edge_energy = (1.0 - a) * reference.edge_energy + a * current_edges;
        }

        let smoother = current_edges < reference.edge_energy * RELEARN_TEXTURE_RATIO;
        if config.relearn_frames > 0
            && stable == Occupancy::Occupied
            && decision == Occupancy::Occupied
            && still
            && smoother
        {
            model.relearn_run += 1;
        } else {
            model.relearn_run = 0;
        }
        if config.relearn_frames > 0 && model.relearn_run >= config.relearn_frames {
            log::info!(
                "slot {}: relearning empty bay (reference texture {:.2}, now {:.2})",
                slot,
                reference.edge_energy,
                current_edges
            );
            reference.pixels = model.previous.clone();
            reference.edge_energy = current_edges;
            model.relearn_run = 0;
        }

        RawReading { score, decision }
    }
}

fn sample_mask(polygon: &SlotPolygon, rect: BoundingRect, use_polygon: bool) -> Vec<bool> {
    let len = rect.area() as usize;
    if !use_polygon {
        return vec![true; len];
    }
    let mut mask = Vec::with_capacity(len);
    for dy in 0..rect.height as i32 {
        for dx in 0..rect.width as i32 {
            mask.push(polygon.contains(Point::new(rect.x + dx, rect.y + dy)));
        }
    }
    if mask.iter().any(|&inside| inside) {
        mask
    } else {
        vec![true; len]
    }
}

fn luma_values(crop: &GrayImage) -> Vec<f32> {
    crop.pixels().map(|p| p.0[0] as f32).collect()
}

fn mean_abs_diff(crop: &GrayImage, pixels: &[f32], mask: &[bool]) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for ((p, r), &inside) in crop.pixels().zip(pixels).zip(mask) {
        if inside {
            sum += (p.0[0] as f32 - r).abs() as f64;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

fn edge_energy(crop: &GrayImage, mask: &[bool]) -> f32 {
    let laplacian = imageproc::filter::laplacian_filter(crop);
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for (p, &inside) in laplacian.pixels().zip(mask) {
        if inside {
            sum += (p.0[0] as f64).abs();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

//! Interactive slot capture on a still image.
//!
//! The tool is a plain state machine fed with click and key events, so a GUI
//! callback, a recorded script or a test can drive it. Every fourth accepted
//! click closes a slot. Feedback is drawn onto a canvas copy of the image.

use image::{Rgb, RgbImage};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::error::{SlotError, SlotResult};
use crate::geometry::{Point, SLOT_CORNERS};
use crate::registry::{SlotId, SlotRegistry};
use crate::render::{draw_edge, draw_label, draw_marker, draw_slot_outline};

pub const DEFAULT_QUIT_KEY: char = 'q';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureEvent {
    Click(Point),
    Key(char),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EventRecord {
    #[serde(default)]
    click: Option<Point>,
    #[serde(default)]
    key: Option<String>,
}

impl CaptureEvent {
    /// Parse a recorded event script:
    ///
    /// ```yaml
    /// - click: [120, 40]
    /// - key: q
    /// ```
    pub fn parse_script<R: Read>(mut reader: R, resource: &str) -> SlotResult<Vec<Self>> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| SlotError::unavailable(resource, e))?;
        let records: Option<Vec<EventRecord>> = serde_yaml::from_str(&text)
            .map_err(|e| SlotError::malformed(resource, e.to_string()))?;

        records
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(n, record)| match (record.click, record.key) {
                (Some(p), None) => Ok(CaptureEvent::Click(p)),
                (None, Some(key)) => {
                    let mut chars = key.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Ok(CaptureEvent::Key(c)),
                        _ => Err(SlotError::malformed(
                            resource,
                            format!("event {}: key must be a single character, got {:?}", n, key),
                        )),
                    }
                }
                _ => Err(SlotError::malformed(
                    resource,
                    format!("event {}: expected exactly one of `click` or `key`", n),
                )),
            })
            .collect()
    }
}

/// Result of feeding one event to the tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureStep {
    /// Out-of-bounds click, unbound key, or the session already ended.
    Ignored,
    /// Point accepted; `count` points are pending for the current slot.
    PointAdded { count: usize },
    SlotCommitted { id: SlotId },
    /// The fourth point produced a degenerate polygon and was dropped.
    Rejected { reason: String },
    Finished,
}

#[derive(Clone, Debug)]
pub struct CaptureConfig {
    pub quit_key: char,
    pub marker_color: [u8; 3],
    pub edge_color: [u8; 3],
    pub slot_color: [u8; 3],
    pub line_thickness: u32,
    pub label_scale: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quit_key: DEFAULT_QUIT_KEY,
            marker_color: [0, 120, 255],
            edge_color: [255, 200, 0],
            slot_color: [0, 200, 0],
            line_thickness: 2,
            label_scale: 2,
        }
    }
}

/// What a finished session hands back. Nothing is persisted by the tool.
#[derive(Debug)]
pub struct CapturedSlots {
    pub registry: SlotRegistry,
    pub canvas: RgbImage,
}

pub struct CaptureTool {
    config: CaptureConfig,
    image: RgbImage,
    canvas: RgbImage,
    registry: SlotRegistry,
    pending: Vec<Point>,
    finished: bool,
}

impl CaptureTool {
    pub fn new(image: RgbImage, config: CaptureConfig) -> Self {
        Self::with_registry(image, config, SlotRegistry::new())
    }

    /// Continue a session on top of already committed slots.
    pub fn with_registry(image: RgbImage, config: CaptureConfig, registry: SlotRegistry) -> Self {
        let mut tool = Self {
            canvas: image.clone(),
            config,
            image,
            registry,
            pending: Vec::with_capacity(SLOT_CORNERS),
            finished: false,
        };
        tool.redraw();
        tool
    }

    /// Load the reference image from disk.
    pub fn open(path: &Path, config: CaptureConfig) -> SlotResult<Self> {
        Self::open_with_registry(path, config, SlotRegistry::new())
    }

    pub fn open_with_registry(
        path: &Path,
        config: CaptureConfig,
        registry: SlotRegistry,
    ) -> SlotResult<Self> {
        let image = image::open(path)
            .map_err(|e| SlotError::unavailable(path.display().to_string(), e))?
            .to_rgb8();
        log::info!(
            "capture session on {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self::with_registry(image, config, registry))
    }

    pub fn handle(&mut self, event: CaptureEvent) -> CaptureStep {
        if self.finished {
            return CaptureStep::Ignored;
        }
        match event {
            CaptureEvent::Key(key) if key == self.config.quit_key => self.quit(),
            CaptureEvent::Key(_) => CaptureStep::Ignored,
            CaptureEvent::Click(p) => self.click(p),
        }
    }

    /// Feed recorded events until the quit key or the end of the list.
    pub fn replay<I>(&mut self, events: I) -> Vec<CaptureStep>
    where
        I: IntoIterator<Item = CaptureEvent>,
    {
        let mut steps = Vec::new();
        for event in events {
            let step = self.handle(event);
            let done = step == CaptureStep::Finished;
            steps.push(step);
            if done {
                break;
            }
        }
        steps
    }

    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    pub fn pending(&self) -> &[Point] {
        &self.pending
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// End the session. A partial polygon is discarded.
    pub fn finish(mut self) -> CapturedSlots {
        if !self.pending.is_empty() {
            log::warn!("discarding partial slot with {} points", self.pending.len());
            self.pending.clear();
            self.redraw();
        }
        log::info!("capture finished with {} slots", self.registry.len());
        CapturedSlots {
            registry: self.registry,
            canvas: self.canvas,
        }
    }

    fn click(&mut self, p: Point) -> CaptureStep {
        if !self.in_bounds(p) {
            log::debug!("ignoring click outside image at ({}, {})", p.x, p.y);
            return CaptureStep::Ignored;
        }

        self.pending.push(p);
        draw_marker(&mut self.canvas, p, Rgb(self.config.marker_color));
        if let [.., a, b] = self.pending[..] {
            draw_edge(
                &mut self.canvas,
                a,
                b,
                Rgb(self.config.edge_color),
                self.config.line_thickness,
            );
        }
        if self.pending.len() < SLOT_CORNERS {
            return CaptureStep::PointAdded {
                count: self.pending.len(),
            };
        }

        let corners = [
            self.pending[0],
            self.pending[1],
            self.pending[2],
            self.pending[3],
        ];
        match self.registry.add_slot(corners) {
            Ok(id) => {
                self.pending.clear();
                self.draw_committed(id);
                CaptureStep::SlotCommitted { id }
            }
            Err(err) => {
                log::warn!("rejected fourth point ({}, {}): {}", p.x, p.y, err);
                self.pending.pop();
                self.redraw();
                CaptureStep::Rejected {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn quit(&mut self) -> CaptureStep {
        self.finished = true;
        if !self.pending.is_empty() {
            log::info!("quit with {} pending points; discarded", self.pending.len());
            self.pending.clear();
            self.redraw();
        }
        CaptureStep::Finished
    }

    fn in_bounds(&self, p: Point) -> bool {
        p.x >= 0
            && p.y >= 0
            && (p.x as u32) < self.image.width()
            && (p.y as u32) < self.image.height()
    }

    fn draw_committed(&mut self, id: SlotId) {
        let Some(polygon) = self.registry.get(id) else {
            return;
        };
        draw_slot_outline(
            &mut self.canvas,
            polygon,
            Rgb(self.config.slot_color),
            self.config.line_thickness,
        );
        draw_label(
            &mut self.canvas,
            &id.to_string(),
            polygon.centroid(),
            self.config.label_scale,
        );
    }

    /// Rebuild the canvas from committed slots plus pending points.
    fn redraw(&mut self) {
        self.canvas = self.image.clone();
        for id in 0..self.registry.len() {
            self.draw_committed(id);
        }
        let marker = Rgb(self.config.marker_color);
        let edge = Rgb(self.config.edge_color);
        for (i, &p) in self.pending.iter().enumerate() {
            draw_marker(&mut self.canvas, p, marker);
            if i > 0 {
                draw_edge(
                    &mut self.canvas,
                    self.pending[i - 1],
                    p,
                    edge,
                    self.config.line_thickness,
                );
            }
        }
    }
}

//! Detection pipeline: sampler -> classifier -> debounce -> renderer.
//!
//! A single-threaded pull loop. Each call to `next_rendered` decodes at most
//! one usable frame, and per-slot state advances in strict frame order.

use anyhow::{Context, Result};
use image::RgbImage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::classify::OccupancyClassifier;
use crate::config::DetectorConfig;
use crate::error::SlotResult;
use crate::ingest::{FrameSampler, VideoSource};
use crate::occupancy::{Occupancy, OccupancyRecord, OccupancyStateMachine, Transition};
use crate::registry::SlotRegistry;
use crate::render::Renderer;

/// Cooperative cancellation flag, checked once per frame.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One display-ready frame.
#[derive(Debug)]
pub struct RenderedFrame {
    pub index: u64,
    pub image: RgbImage,
    pub states: Vec<Occupancy>,
    /// Stable-state flips that happened on this frame.
    pub transitions: Vec<Transition>,
}

impl RenderedFrame {
    pub fn occupied(&self) -> usize {
        self.states.iter().filter(|s| s.is_occupied()).count()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub source: String,
    pub slots: usize,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub transitions: u64,
    pub occupied: usize,
    pub last_frame: Option<u64>,
    pub cancelled: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "source:       {}", self.source)?;
        writeln!(
            f,
            "frames:       {} processed, {} skipped",
            self.frames_processed, self.frames_skipped
        )?;
        writeln!(f, "transitions:  {}", self.transitions)?;
        write!(f, "occupancy:    {}/{} occupied", self.occupied, self.slots)?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

pub struct OccupancyDetector {
    registry: SlotRegistry,
    sampler: FrameSampler,
    classifier: OccupancyClassifier,
    machine: OccupancyStateMachine,
    renderer: Renderer,
    stop: StopSignal,
    summary: RunSummary,
    done: bool,
}

impl OccupancyDetector {
    /// Build the pipeline and seek to `start_frame` (1-based).
    ///
    /// Fatal source problems (an unseekable start, a bad config) are reported
    /// here, before any frame is classified.
    pub fn start(
        registry: SlotRegistry,
        source: VideoSource,
        config: &DetectorConfig,
        start_frame: u64,
    ) -> Result<Self> {
        config.validate()?;
        let machine = OccupancyStateMachine::new(registry.len(), config.debounce_frames)?;
        let classifier = OccupancyClassifier::new(&registry, config.classifier.clone());
        let renderer = Renderer::new(config.render.clone());

        let description = source.describe();
        let mut sampler = FrameSampler::new(source);
        sampler
            .seek(start_frame)
            .with_context(|| format!("failed to start detection on {}", description))?;

        log::info!(
            "detecting {} slots on {} from frame {} (debounce {} frames, {:?} threshold {})",
            registry.len(),
            description,
            start_frame,
            config.debounce_frames,
            config.classifier.signal,
            config.classifier.threshold
        );

        Ok(Self {
            summary: RunSummary {
                source: description,
                slots: registry.len(),
                ..RunSummary::default()
            },
            registry,
            sampler,
            classifier,
            machine,
            renderer,
            stop: StopSignal::new(),
            done: false,
        })
    }

    /// Use an externally owned stop flag, e.g. one set from a Ctrl-C handler.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    pub fn records(&self) -> &[OccupancyRecord] {
        self.machine.records()
    }

    pub fn states(&self) -> Vec<Occupancy> {
        self.machine.stable_states()
    }

    /// Frames the source still holds from the start frame on, when known.
    pub fn remaining_frames(&self) -> Option<u64> {
        let total = self.sampler.frame_count()?;
        Some(total.saturating_sub(self.sampler.position()))
    }

    /// Process the next decodable frame.
    ///
    /// Returns `Ok(None)` at end of stream or once the stop signal is set.
    /// Undecodable frames are logged, counted and skipped.
    pub fn next_rendered(&mut self) -> SlotResult<Option<RenderedFrame>> {
        loop {
            if self.done {
                return Ok(None);
            }
            if self.stop.is_stopped() {
                log::info!("detection cancelled");
                self.summary.cancelled = true;
                self.done = true;
                return Ok(None);
            }

            let frame = match self.sampler.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.done = true;
                    return Ok(None);
                }
                Err(err) if err.is_recoverable() => {
                    log::warn!("skipping frame: {}", err);
                    self.summary.frames_skipped = self.sampler.stats().frames_skipped;
                    continue;
                }
                Err(err) => {
                    self.done = true;
                    return Err(err);
                }
            };

            let stable = self.machine.stable_states();
            let readings = self.classifier.classify_frame(&frame, &stable);
            let transitions = self.machine.observe_frame(&readings, frame.index());
            for t in &transitions {
                log::info!(
                    "frame {}: slot {} {:?} -> {:?}",
                    t.frame_index,
                    t.slot,
                    t.from,
                    t.to
                );
            }

            let states = self.machine.stable_states();
            let image = self.renderer.render(&frame, &self.registry, &states);

            self.summary.frames_processed += 1;
            self.summary.transitions += transitions.len() as u64;
            self.summary.occupied = self.machine.occupied_count();
            self.summary.last_frame = Some(frame.index());

            return Ok(Some(RenderedFrame {
                index: frame.index(),
                image,
                states,
                transitions,
            }));
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = self.summary.clone();
        summary.frames_skipped = self.sampler.stats().frames_skipped;
        summary
    }
}

impl Iterator for OccupancyDetector {
    type Item = SlotResult<RenderedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_rendered().transpose()
    }
}

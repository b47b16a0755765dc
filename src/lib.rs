//! parkwatch: parking slot occupancy from a fixed camera.
//!
//! Two halves share one slot registry:
//!
//! 1. **Capture**: mark each parking slot as a four-corner polygon by clicking
//!    on a still image of the lot (`capture`), then save the slots to a YAML
//!    slot-data file (`registry`).
//! 2. **Detection**: for each video frame, compare every slot's crop against a
//!    rolling reference of the empty bay (`classify`), debounce the noisy raw
//!    decisions into stable Free/Occupied states (`occupancy`), and draw the
//!    result (`render`). `detector` wires these into a pull loop over a
//!    `FrameSampler` (`ingest`).
//!
//! # Module Structure
//!
//! - `geometry`: points, slot polygons, bounding rectangles
//! - `registry`: ordered slot set and its on-disk format
//! - `capture`: click-driven slot capture state machine
//! - `ingest`: video sources and the seekable frame sampler
//! - `frame`: decoded frames tagged with their 1-based index
//! - `classify`: per-slot reference model and raw decision
//! - `occupancy`: per-slot debounce state machine
//! - `render`: slot overlays and the occupied/total panel
//! - `detector`: the detection pipeline, cancellation and run summary
//! - `config`: detector tuning from JSON/TOML plus environment overrides
//! - `error`: shared error type

pub mod capture;
pub mod classify;
pub mod config;
pub mod detector;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod occupancy;
pub mod registry;
pub mod render;

pub use capture::{CaptureConfig, CaptureEvent, CaptureStep, CaptureTool, CapturedSlots};
pub use classify::{ClassifierConfig, OccupancyClassifier, RawReading, Signal};
pub use config::DetectorConfig;
pub use detector::{OccupancyDetector, RenderedFrame, RunSummary, StopSignal};
pub use error::{SlotError, SlotResult};
pub use frame::Frame;
pub use geometry::{BoundingRect, Point, SlotPolygon, MAX_COORDINATE, MIN_SLOT_AREA};
pub use ingest::{FrameSampler, SamplerStats, SyntheticConfig, VideoSource};
pub use occupancy::{Occupancy, OccupancyRecord, OccupancyStateMachine, Transition};
pub use registry::{SlotId, SlotRegistry};
pub use render::{RenderConfig, Renderer};

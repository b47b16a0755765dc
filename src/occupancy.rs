//! Debounced occupancy state per slot.
//!
//! A slot's stable state only flips after `debounce_frames` consecutive raw
//! decisions disagree with it. Any agreeing frame clears the disagreement
//! counter, so isolated flicker (shadows, glare, a pedestrian) never shows.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::classify::RawReading;
use crate::registry::SlotId;

/// Default consecutive disagreeing frames needed to flip a slot.
pub const DEFAULT_DEBOUNCE_FRAMES: u32 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    #[default]
    Free,
    Occupied,
}

impl Occupancy {
    pub fn is_occupied(self) -> bool {
        self == Occupancy::Occupied
    }

    fn flipped(self) -> Self {
        match self {
            Occupancy::Free => Occupancy::Occupied,
            Occupancy::Occupied => Occupancy::Free,
        }
    }
}

/// Per-slot state for the current run. Never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OccupancyRecord {
    pub score: f32,
    pub raw: Occupancy,
    pub disagreement: u32,
    pub stable: Occupancy,
}

/// A stable-state flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub slot: SlotId,
    pub frame_index: u64,
    pub from: Occupancy,
    pub to: Occupancy,
}

pub struct OccupancyStateMachine {
    debounce_frames: u32,
    records: Vec<OccupancyRecord>,
}

impl OccupancyStateMachine {
    /// One Free record per slot. `debounce_frames` must be at least 1.
    pub fn new(slot_count: usize, debounce_frames: u32) -> Result<Self> {
        if debounce_frames == 0 {
            return Err(anyhow!("debounce threshold must be at least 1 frame"));
        }
        Ok(Self {
            debounce_frames,
            records: vec![OccupancyRecord::default(); slot_count],
        })
    }

    pub fn debounce_frames(&self) -> u32 {
        self.debounce_frames
    }

    /// Feed one raw reading. Readings for a slot must arrive in frame order.
    pub fn observe(
        &mut self,
        slot: SlotId,
        reading: RawReading,
        frame_index: u64,
    ) -> Option<Transition> {
        let debounce = self.debounce_frames;
        let record = self.records.get_mut(slot)?;
        record.score = reading.score;
        record.raw = reading.decision;

        if reading.decision == record.stable {
            record.disagreement = 0;
            return None;
        }

        record.disagreement += 1;
        if record.disagreement < debounce {
            return None;
        }

        let from = record.stable;
        record.stable = from.flipped();
        record.disagreement = 0;
        Some(Transition {
            slot,
            frame_index,
            from,
            to: record.stable,
        })
    }

    /// Feed one reading per slot, in id order.
    pub fn observe_frame(&mut self, readings: &[RawReading], frame_index: u64) -> Vec<Transition> {
        readings
            .iter()
            .enumerate()
            .filter_map(|(slot, reading)| self.observe(slot, *reading, frame_index))
            .collect()
    }

    pub fn record(&self, slot: SlotId) -> Option<&OccupancyRecord> {
        self.records.get(slot)
    }

    pub fn records(&self) -> &[OccupancyRecord] {
        &self.records
    }

    pub fn stable_states(&self) -> Vec<Occupancy> {
        self.records.iter().map(|r| r.stable).collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.records.iter().filter(|r| r.stable.is_occupied()).count()
    }

    pub fn free_count(&self) -> usize {
        self.records.len() - self.occupied_count()
    }
}

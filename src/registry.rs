//! Slot registry and the YAML slot-data file.
//!
//! File layout: a sequence of records, one per slot, in id order.
//!
//! ```yaml
//! - id: 0
//!   coordinates:
//!   - [0, 0]
//!   - [10, 0]
//!   - [10, 10]
//!   - [0, 10]
//! ```

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{SlotError, SlotResult};
use crate::geometry::{Point, SlotPolygon};

/// Zero-based slot identifier, assigned in capture order.
pub type SlotId = usize;

#[derive(Debug, Serialize, Deserialize)]
struct SlotRecordFile {
    id: i64,
    coordinates: Vec<Point>,
}

/// Ordered set of slot polygons. Ids are `0..len()` with no gaps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotRegistry {
    slots: Vec<SlotPolygon>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a slot, returning its id.
    ///
    /// On `InvalidGeometry` the registry is left unchanged.
    pub fn add_slot(&mut self, points: [Point; 4]) -> SlotResult<SlotId> {
        let polygon = SlotPolygon::new(&points)?;
        let id = self.slots.len();
        self.slots.push(polygon);
        log::info!("slot {} committed ({} px area)", id, self.slots[id].area());
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: SlotId) -> Option<&SlotPolygon> {
        self.slots.get(id)
    }

    /// Slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &SlotPolygon)> + '_ {
        self.slots.iter().enumerate()
    }

    /// Parse a slot-data document. `resource` names the input in errors.
    pub fn load<R: Read>(mut reader: R, resource: &str) -> SlotResult<Self> {
        let mut raw = String::new();
        reader
            .read_to_string(&mut raw)
            .map_err(|e| SlotError::malformed(resource, format!("unreadable: {}", e)))?;
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }

        let records: Option<Vec<SlotRecordFile>> = serde_yaml::from_str(&raw).map_err(|e| {
            SlotError::malformed(
                resource,
                format!("expected a list of {{id, coordinates}} records: {}", e),
            )
        })?;
        let mut records = records.unwrap_or_default();
        records.sort_by_key(|r| r.id);

        let mut slots = Vec::with_capacity(records.len());
        for (expected, record) in records.into_iter().enumerate() {
            if record.id != expected as i64 {
                return Err(SlotError::malformed(
                    resource,
                    format!(
                        "slot ids must be unique and contiguous from 0; expected id {}, found {}",
                        expected, record.id
                    ),
                ));
            }
            let polygon = SlotPolygon::new(&record.coordinates).map_err(|e| {
                SlotError::malformed(resource, format!("slot {}: {}", record.id, e))
            })?;
            slots.push(polygon);
        }
        Ok(Self { slots })
    }

    /// Read a slot-data file from disk.
    pub fn load_path(path: &Path) -> SlotResult<Self> {
        let resource = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| SlotError::unavailable(&resource, e))?;
        let registry = Self::load(std::io::BufReader::new(file), &resource)?;
        log::info!("loaded {} slots from {}", registry.len(), resource);
        Ok(registry)
    }

    /// Serialize every slot in id order.
    pub fn save<W: Write>(&self, mut writer: W) -> SlotResult<()> {
        let records: Vec<SlotRecordFile> = self
            .iter()
            .map(|(id, poly)| SlotRecordFile {
                id: id as i64,
                coordinates: poly.corners().to_vec(),
            })
            .collect();
        let doc = serde_yaml::to_string(&records).map_err(|e| SlotError::Write {
            resource: "slot data".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        writer
            .write_all(doc.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|source| SlotError::Write {
                resource: "slot data".to_string(),
                source,
            })
    }

    /// Write the slot file atomically: a temp file in the target directory
    /// is renamed over `path` once fully written.
    pub fn save_path(&self, path: &Path) -> SlotResult<()> {
        let resource = path.display().to_string();
        let write_err = |source: std::io::Error| SlotError::Write {
            resource: resource.clone(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        self.save(&mut tmp).map_err(|e| match e {
            SlotError::Write { source, .. } => write_err(source),
            other => other,
        })?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        log::info!("wrote {} slots to {}", self.len(), resource);
        Ok(())
    }
}

//! Image-directory source: every `.png`/`.jpg`/`.jpeg` file is one frame,
//! ordered by file name.

use std::path::{Path, PathBuf};

use super::Decoded;
use crate::error::{SlotError, SlotResult};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub(crate) struct ImageSequenceVideo {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceVideo {
    pub(crate) fn open(dir: &Path) -> SlotResult<Self> {
        let resource = dir.display().to_string();
        let entries = std::fs::read_dir(dir).map_err(|e| SlotError::unavailable(&resource, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SlotError::unavailable(&resource, e))?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_frame && path.is_file() {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(SlotError::unavailable(
                resource,
                "directory contains no .png/.jpg frames",
            ));
        }
        files.sort();
        log::info!("image sequence {}: {} frames", dir.display(), files.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            next: 0,
        })
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.files.len() as u64
    }

    pub(crate) fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    pub(crate) fn decode_next(&mut self) -> Decoded {
        let Some(path) = self.files.get(self.next) else {
            return Decoded::End;
        };
        self.next += 1;
        match image::open(path) {
            Ok(img) => Decoded::Frame(img.to_rgb8()),
            Err(e) => Decoded::Corrupt(format!("{}: {}", path.display(), e)),
        }
    }

    pub(crate) fn skip(&mut self) -> bool {
        if self.next >= self.files.len() {
            return false;
        }
        self.next += 1;
        true
    }
}

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::{ClassifierConfig, Signal};
use crate::occupancy::DEFAULT_DEBOUNCE_FRAMES;
use crate::render::RenderConfig;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    debounce_frames: Option<u32>,
    classifier: Option<ClassifierConfigFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ClassifierConfigFile {
    threshold: Option<f32>,
    learning_rate: Option<f32>,
    blur_sigma: Option<f32>,
    signal: Option<Signal>,
    mask_polygon: Option<bool>,
    relearn_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RenderConfigFile {
    free_color: Option<[u8; 3]>,
    occupied_color: Option<[u8; 3]>,
    line_thickness: Option<u32>,
    fill_alpha: Option<f32>,
    show_ids: Option<bool>,
    show_summary: Option<bool>,
    label_scale: Option<u32>,
}

/// Detector tuning. Every field has a default; a config file only needs the
/// keys it changes.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub classifier: ClassifierConfig,
    pub debounce_frames: u32,
    pub render: RenderConfig,
    /// File the settings came from, for error messages.
    pub source: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            debounce_frames: DEFAULT_DEBOUNCE_FRAMES,
            render: RenderConfig::default(),
            source: None,
        }
    }
}

impl DetectorConfig {
    /// Load from `path`, or from `PARKWATCH_CONFIG` when no path is given,
    /// then apply `PARKWATCH_*` overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var("PARKWATCH_CONFIG")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };
        let file_cfg = match path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.source = path;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DetectorConfigFile) -> Self {
        let defaults = Self::default();
        let classifier = file.classifier.unwrap_or_default();
        let render = file.render.unwrap_or_default();
        Self {
            classifier: ClassifierConfig {
                threshold: classifier.threshold.unwrap_or(defaults.classifier.threshold),
                learning_rate: classifier
                    .learning_rate
                    .unwrap_or(defaults.classifier.learning_rate),
                blur_sigma: classifier
                    .blur_sigma
                    .unwrap_or(defaults.classifier.blur_sigma),
                signal: classifier.signal.unwrap_or(defaults.classifier.signal),
                mask_polygon: classifier
                    .mask_polygon
                    .unwrap_or(defaults.classifier.mask_polygon),
                relearn_frames: classifier
                    .relearn_frames
                    .unwrap_or(defaults.classifier.relearn_frames),
            },
            debounce_frames: file.debounce_frames.unwrap_or(defaults.debounce_frames),
            render: RenderConfig {
                free_color: render.free_color.unwrap_or(defaults.render.free_color),
                occupied_color: render
                    .occupied_color
                    .unwrap_or(defaults.render.occupied_color),
                line_thickness: render
                    .line_thickness
                    .unwrap_or(defaults.render.line_thickness),
                fill_alpha: render.fill_alpha.unwrap_or(defaults.render.fill_alpha),
                show_ids: render.show_ids.unwrap_or(defaults.render.show_ids),
                show_summary: render.show_summary.unwrap_or(defaults.render.show_summary),
                label_scale: render.label_scale.unwrap_or(defaults.render.label_scale),
            },
            source: None,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(frames) = std::env::var("PARKWATCH_DEBOUNCE_FRAMES") {
            self.debounce_frames = frames.trim().parse().map_err(|_| {
                anyhow!("PARKWATCH_DEBOUNCE_FRAMES must be a positive integer frame count")
            })?;
        }
        if let Ok(threshold) = std::env::var("PARKWATCH_THRESHOLD") {
            self.classifier.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_THRESHOLD must be a number"))?;
        }
        if let Ok(signal) = std::env::var("PARKWATCH_SIGNAL") {
            if !signal.trim().is_empty() {
                self.classifier.signal = signal
                    .parse()
                    .map_err(|e| anyhow!("PARKWATCH_SIGNAL: {}", e))?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let origin = match &self.source {
            Some(path) => format!(" (from {})", path.display()),
            None => String::new(),
        };
        let c = &self.classifier;
        if !c.threshold.is_finite() || c.threshold <= 0.0 {
            return Err(anyhow!(
                "classifier.threshold must be a positive number, got {}{}",
                c.threshold,
                origin
            ));
        }
        if !(c.learning_rate > 0.0 && c.learning_rate <= 1.0) {
            return Err(anyhow!(
                "classifier.learning_rate must be in (0, 1], got {}{}",
                c.learning_rate,
                origin
            ));
        }
        if !c.blur_sigma.is_finite() || c.blur_sigma < 0.0 {
            return Err(anyhow!(
                "classifier.blur_sigma must be zero or positive, got {}{}",
                c.blur_sigma,
                origin
            ));
        }
        if self.debounce_frames == 0 {
            return Err(anyhow!("debounce_frames must be at least 1{}", origin));
        }
        let r = &self.render;
        if !(0.0..=1.0).contains(&r.fill_alpha) {
            return Err(anyhow!(
                "render.fill_alpha must be in [0, 1], got {}{}",
                r.fill_alpha,
                origin
            ));
        }
        if r.label_scale == 0 || r.line_thickness == 0 {
            return Err(anyhow!(
                "render.label_scale and render.line_thickness must be at least 1{}",
                origin
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DetectorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = DetectorConfig::from_file(DetectorConfigFile::default());
        assert_eq!(cfg.debounce_frames, DEFAULT_DEBOUNCE_FRAMES);
        assert_eq!(cfg.classifier, ClassifierConfig::default());
        assert_eq!(cfg.render, RenderConfig::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let file: DetectorConfigFile =
            serde_json::from_str(r#"{"classifier": {"signal": "edge_delta"}}"#).unwrap();
        let cfg = DetectorConfig::from_file(file);
        assert_eq!(cfg.classifier.signal, Signal::EdgeDelta);
        assert_eq!(
            cfg.classifier.threshold,
            ClassifierConfig::default().threshold
        );
    }

    #[test]
    fn validation_names_the_field() {
        let mut cfg = DetectorConfig::default();
        cfg.classifier.learning_rate = 0.0;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("learning_rate"), "{}", err);

        let mut cfg = DetectorConfig::default();
        cfg.classifier.threshold = f32::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectorConfig::default();
        cfg.render.fill_alpha = 1.5;
        cfg.source = Some(PathBuf::from("lot.toml"));
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("fill_alpha") && err.contains("lot.toml"), "{}", err);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: std::result::Result<DetectorConfigFile, _> =
            serde_json::from_str(r#"{"debounce": 3}"#);
        assert!(parsed.is_err());
    }
}

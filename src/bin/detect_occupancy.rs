//! detect_occupancy - per-frame parking slot occupancy over a video
//!
//! Reads the slot-data file written by `capture_slots`, runs the detector over
//! the video and reports stable-state changes. Rendered frames can be dumped
//! as PNGs for review. Ctrl-C stops after the current frame and still prints
//! the run summary.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use parkwatch::{DetectorConfig, OccupancyDetector, SlotRegistry, StopSignal, VideoSource};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file, directory of still frames, or stub:// synthetic source.
    #[arg(long)]
    video: String,
    /// Slot-data file.
    #[arg(long, default_value = "parking_slots.yml")]
    data: PathBuf,
    /// First frame to process (1-based).
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    start_frame: u64,
    /// Detector config (.toml or JSON).
    #[arg(long, env = "PARKWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Write rendered frames here as PNG.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// With --out-dir, keep every Nth frame plus every frame with a transition.
    #[arg(long, default_value_t = 1)]
    every: u64,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.every == 0 {
        return Err(anyhow!("--every must be >= 1"));
    }
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let config = {
        let _stage = ui.stage("Load config");
        DetectorConfig::load(args.config.as_deref())?
    };
    let registry = {
        let _stage = ui.stage("Load slots");
        SlotRegistry::load_path(&args.data)?
    };
    if registry.is_empty() {
        log::warn!("{} holds no slots; nothing to classify", args.data.display());
    }
    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.stop())
            .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    }

    let mut detector = {
        let _stage = ui.stage("Open video");
        let source = VideoSource::open(&args.video)?;
        OccupancyDetector::start(registry, source, &config, args.start_frame)?
            .with_stop_signal(stop)
    };

    let mut written = 0u64;
    {
        let mut progress = ui.frames(detector.remaining_frames());
        while let Some(frame) = detector.next_rendered()? {
            let total = frame.states.len();
            progress.tick(frame.index, frame.occupied(), total);

            let Some(dir) = &args.out_dir else {
                continue;
            };
            if frame.index % args.every != 0 && frame.transitions.is_empty() {
                continue;
            }
            let path = dir.join(format!("frame_{:06}.png", frame.index));
            frame
                .image
                .save_with_format(&path, image::ImageFormat::Png)
                .with_context(|| format!("failed to write {}", path.display()))?;
            written += 1;
        }
    }

    let summary = detector.summary();
    if summary.frames_skipped > 0 {
        log::warn!("{} frames could not be decoded and were skipped", summary.frames_skipped);
    }
    println!("{summary}");
    for (id, state) in detector.states().iter().enumerate() {
        println!("slot {:>3}: {:?}", id, state);
    }
    if let Some(dir) = &args.out_dir {
        println!("{} frames written to {}", written, dir.display());
    }
    Ok(())
}

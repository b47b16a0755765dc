//! capture_slots - mark parking slots on a still image of the lot
//!
//! Clicks come from a recorded event script (YAML list of `click: [x, y]` and
//! `key: q` entries), read from `--events` or stdin. Every four accepted
//! clicks close one slot. The slots are written to the slot-data file when the
//! session ends; a partial slot is discarded.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use parkwatch::capture::DEFAULT_QUIT_KEY;
use parkwatch::{CaptureConfig, CaptureEvent, CaptureStep, CaptureTool, SlotRegistry, StopSignal};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Reference image of the parking lot.
    #[arg(long)]
    image: PathBuf,
    /// Slot-data file to write.
    #[arg(long, default_value = "parking_slots.yml")]
    data: PathBuf,
    /// Recorded event script; reads stdin when omitted.
    #[arg(long)]
    events: Option<PathBuf>,
    /// Keep the slots already in --data and add new ones after them.
    #[arg(long)]
    append: bool,
    /// Write the annotated image here (PNG).
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Key that ends the session.
    #[arg(long, default_value_t = DEFAULT_QUIT_KEY)]
    quit_key: char,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.stop())
            .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    }

    let events = {
        let _stage = ui.stage("Load events");
        match &args.events {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("failed to open event script {}", path.display()))?;
                CaptureEvent::parse_script(file, &path.display().to_string())?
            }
            None => CaptureEvent::parse_script(std::io::stdin().lock(), "<stdin>")?,
        }
    };

    let config = CaptureConfig {
        quit_key: args.quit_key,
        ..CaptureConfig::default()
    };
    let mut tool = {
        let _stage = ui.stage("Open image");
        let existing = if args.append && args.data.exists() {
            let existing = SlotRegistry::load_path(&args.data)?;
            log::info!(
                "continuing after {} slots from {}",
                existing.len(),
                args.data.display()
            );
            existing
        } else {
            SlotRegistry::new()
        };
        CaptureTool::open_with_registry(&args.image, config, existing)?
    };

    let mut committed = 0usize;
    let mut rejected = 0usize;
    {
        let _stage = ui.stage("Replay clicks");
        for event in events {
            if stop.is_stopped() {
                log::info!("interrupted; keeping committed slots");
                break;
            }
            match tool.handle(event) {
                CaptureStep::SlotCommitted { .. } => committed += 1,
                CaptureStep::Rejected { .. } => rejected += 1,
                CaptureStep::Finished => break,
                CaptureStep::Ignored | CaptureStep::PointAdded { .. } => {}
            }
        }
    }

    let captured = tool.finish();
    {
        let _stage = ui.stage("Save slots");
        captured.registry.save_path(&args.data)?;
    }
    if let Some(preview) = &args.preview {
        let _stage = ui.stage("Write preview");
        captured
            .canvas
            .save_with_format(preview, image::ImageFormat::Png)
            .with_context(|| format!("failed to write preview {}", preview.display()))?;
    }

    println!(
        "{} slots in {} ({} added, {} rejected clicks)",
        captured.registry.len(),
        args.data.display(),
        committed,
        rejected
    );
    Ok(())
}

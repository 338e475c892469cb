//! tello_trackd - face-following controller for a Tello quadcopter
//!
//! This daemon:
//! 1. Loads the detector (model definition + weights) before touching the drone
//! 2. Connects over the Tello text SDK, starts the video stream and takes off
//! 3. Decodes the stream, detects the subject and steers to keep it centered
//!    and at the distance captured on the first good detection
//! 4. Lands after the requested delay, on Ctrl-C, or when the link is lost

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use tello_tracker::{detect, LifecycleEvent, Session, TrackerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Detector model definition (JSON), or stub:// for defaults.
    model: PathBuf,
    /// Detector weights (ONNX), or stub:// for a dry run without detections.
    weights: PathBuf,
    /// Seconds after takeoff before the scheduled landing.
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    land_after: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = TrackerConfig::load()?;
    log::info!(
        "frame {}x{}, drone {}, decoder {}",
        cfg.frame.width,
        cfg.frame.height,
        cfg.link.drone_addr,
        cfg.decoder.ffmpeg_path.display()
    );
    if let Some(frames) = cfg.rebaseline_after_lost_frames {
        log::info!("baseline resets after {} lost frames", frames);
    }

    let detector = detect::load_backend(&args.model, &args.weights)?;

    let session = Session::start(cfg, detector, Duration::from_secs(args.land_after))?;
    let events = session.events();
    ctrlc::set_handler(move || {
        let _ = events.send(LifecycleEvent::Shutdown);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    session.run()?;
    log::info!("tello_trackd stopped");
    Ok(())
}

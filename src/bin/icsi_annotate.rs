//! icsi_annotate - Annotate an ICSI recording with per-frame procedure stages
//!
//! Reads a frame sequence and the matching recorded detections, classifies every
//! frame, writes annotated frames plus `video.json` to the output directory and
//! appends one observation per frame to the run log.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use icsi_stage::config::AppConfig;
use icsi_stage::detect::{DetectorBackend, ReplayBackend, StubBackend};
use icsi_stage::ingest::{FileConfig, FileSource, FrameSource};
use icsi_stage::output::ImageSequenceSink;
use icsi_stage::storage::{open_store, LogFormat};
use icsi_stage::{AnnotationPipeline, Stage, StageRules};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "icsi_annotate",
    about = "Classify and annotate every frame of an ICSI recording"
)]
struct Args {
    /// Frame directory (PNG/JPEG, name order) or stub://WIDTHxHEIGHT/COUNT
    #[arg(long, value_name = "DIR")]
    frames: String,

    /// Recorded detections (JSON). Without it every frame is empty.
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,

    /// Output directory for annotated frames
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Observation log path
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Observation log format (jsonl|sqlite)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Frame rate recorded for the output sequence
    #[arg(long)]
    fps: Option<f64>,

    /// Stage the whole recording is expected to show; reports the match rate
    #[arg(long, value_name = "STAGE")]
    expect: Option<Stage>,

    /// Oocyte circularity below which a touching pipette counts as inserted
    #[arg(long, value_name = "RATIO")]
    circularity_threshold: Option<f64>,

    /// Ignore detections scoring below this
    #[arg(long, value_name = "SCORE")]
    min_score: Option<f32>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui));

    let mut cfg = AppConfig::load()?;
    if let Some(threshold) = args.circularity_threshold {
        cfg.rules = StageRules::new(threshold)?;
    }
    if let Some(min_score) = args.min_score {
        cfg.min_score = min_score;
    }
    if let Some(fps) = args.fps {
        cfg.fps = fps;
    }
    if let Some(dir) = args.out {
        cfg.output.dir = dir;
    }
    if let Some(path) = args.log {
        cfg.output.log_path = path;
    }
    if let Some(format) = args.log_format {
        cfg.output.log_format = format;
    }
    cfg.validate()?;

    let mut source = {
        let _step = ui.step("Open frames");
        let mut source = FileSource::new(FileConfig {
            path: args.frames.clone(),
            fps: cfg.fps,
        })?;
        source.connect()?;
        source
    };
    let meta = source.meta()?;

    let detector: Box<dyn DetectorBackend> = match &args.detections {
        Some(path) => {
            let _step = ui.step("Load detections");
            let replay = ReplayBackend::from_path(path)?.with_min_score(cfg.min_score);
            if replay.frame_count() == 0 {
                return Err(anyhow!("{} holds no frames", path.display()));
            }
            Box::new(replay)
        }
        None => {
            log::warn!("no detections given; every frame will be empty");
            Box::new(StubBackend::new())
        }
    };

    let mut sink = ImageSequenceSink::create(&cfg.output.dir, meta)?;
    let mut store = open_store(&cfg.output.log_path, cfg.output.log_format)?;

    let mut pipeline = AnnotationPipeline::new(detector, cfg.rules, cfg.overlay);
    if let Some(stage) = args.expect {
        pipeline = pipeline.with_expected_stage(stage);
    }

    let summary = {
        let _step = ui.step("Annotate frames");
        pipeline.run(&mut source, &mut sink, store.as_mut())?
    };

    println!("icsi_annotate: {} frames from {}", summary.frames, args.frames);
    for (stage, count) in &summary.stage_counts {
        println!("  {:<46} {:>6}", stage.label(), count);
    }
    if let (Some(stage), Some(percent)) = (summary.expected, summary.expected_percent()) {
        println!("expected stage '{}': {:.2}% of frames", stage, percent);
    }
    println!("annotated frames: {}", cfg.output.dir.display());
    println!("observation log:  {}", cfg.output.log_path.display());
    Ok(())
}

//! icsi_evaluate - Score predicted stages against a reference sequence
//!
//! Classifies every frame of a recorded detections file and compares the
//! resulting stage sequence with the reference, frame by frame.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use icsi_stage::config::AppConfig;
use icsi_stage::detect::ReplayBackend;
use icsi_stage::{classify, ReferenceSequence, Stage, StageRules};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "icsi_evaluate",
    about = "Compare predicted ICSI stages with a reference sequence"
)]
struct Args {
    /// Recorded detections (JSON)
    #[arg(long, value_name = "PATH")]
    detections: PathBuf,

    /// Reference stages: JSON array or one label per line
    #[arg(long, value_name = "PATH")]
    reference: PathBuf,

    /// Frame width the detection polygons refer to
    #[arg(long)]
    width: u32,

    /// Frame height the detection polygons refer to
    #[arg(long)]
    height: u32,

    #[arg(long, value_name = "RATIO")]
    circularity_threshold: Option<f64>,

    /// Ignore detections scoring below this
    #[arg(long, value_name = "SCORE")]
    min_score: Option<f32>,

    /// List every mismatching frame
    #[arg(short, long)]
    verbose: bool,

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
    cfg.validate()?;

    let (replay, reference) = {
        let _step = ui.step("Load inputs");
        let replay = ReplayBackend::from_path(&args.detections)?.with_min_score(cfg.min_score);
        let reference = ReferenceSequence::load(&args.reference)?;
        (replay, reference)
    };

    let predicted = {
        let _step = ui.step("Classify frames");
        (0..replay.frame_count())
            .map(|index| -> Result<Stage> {
                let detection = replay.detection_for(index, args.width, args.height)?;
                Ok(classify(&detection, &cfg.rules))
            })
            .collect::<Result<Vec<Stage>>>()?
    };

    let evaluation = reference.evaluate(&predicted)?;
    if predicted.len() != reference.len() {
        log::warn!(
            "{} predicted frames vs {} reference frames; comparing the first {}",
            predicted.len(),
            reference.len(),
            evaluation.compared
        );
    }

    println!("icsi_evaluate: {}", args.detections.display());
    println!(
        "matched {} of {} compared frames: {:.2}%",
        evaluation.matches,
        evaluation.compared,
        evaluation.accuracy_percent()
    );
    println!(
        "coverage of {} reference frames: {:.2}%",
        evaluation.reference_len,
        evaluation.reference_coverage_percent()
    );
    if args.verbose {
        for mismatch in &evaluation.mismatches {
            println!(
                "  frame {:>5}: predicted '{}', expected '{}'",
                mismatch.frame_index, mismatch.predicted, mismatch.expected
            );
        }
    }
    Ok(())
}

//! Replays pre-computed detections.
//!
//! The segmentation model runs out of process and writes its per-frame output as
//! JSON. Each instance carries its class id, score and mask outline polygon:
//!
//! ```json
//! { "frames": [
//!     { "instances": [
//!         { "class_id": 1, "score": 0.98, "polygon": [[120, 80], [260, 80], [260, 210], [120, 210]] }
//!     ] }
//! ] }
//! ```
//!
//! Entry `i` of `frames` belongs to frame index `i`.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::detect::backend::DetectorBackend;
use crate::detect::mask::Mask;
use crate::detect::result::{DetectionResult, Instance, ObjectClass};
use crate::frame::Frame;

#[derive(Debug, Deserialize)]
struct ReplayFile {
    frames: Vec<ReplayFrame>,
}

#[derive(Debug, Deserialize, Default)]
struct ReplayFrame {
    #[serde(default)]
    instances: Vec<ReplayInstance>,
}

#[derive(Debug, Deserialize)]
struct ReplayInstance {
    class_id: u8,
    #[serde(default = "default_score")]
    score: f32,
    polygon: Vec<[f64; 2]>,
}

fn default_score() -> f32 {
    1.0
}

enum ReplayEntry {
    Polygons(ReplayFrame),
    Ready(DetectionResult),
}

/// Detector backend that replays recorded detections frame by frame.
pub struct ReplayBackend {
    entries: Vec<ReplayEntry>,
    min_score: f32,
}

impl ReplayBackend {
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ReplayFile =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid detections file: {}", e))?;
        Ok(Self {
            entries: file.frames.into_iter().map(ReplayEntry::Polygons).collect(),
            min_score: 0.0,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading detections from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("loading {}", path.display()))
    }

    /// Replay already-built results, one per frame.
    pub fn from_results(results: Vec<DetectionResult>) -> Self {
        Self {
            entries: results.into_iter().map(ReplayEntry::Ready).collect(),
            min_score: 0.0,
        }
    }

    /// Drop instances scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.entries.len()
    }

    /// Detection result recorded for frame `index`, rasterised at `width` x `height`.
    pub fn detection_for(&self, index: usize, width: u32, height: u32) -> Result<DetectionResult> {
        let entry = self.entries.get(index).ok_or_else(|| {
            anyhow!(
                "no recorded detections for frame {} ({} recorded)",
                index,
                self.entries.len()
            )
        })?;

        match entry {
            ReplayEntry::Ready(result) => {
                if result.width() != width || result.height() != height {
                    return Err(anyhow!(
                        "recorded detections for frame {} are {}x{}, frame is {}x{}",
                        index,
                        result.width(),
                        result.height(),
                        width,
                        height
                    ));
                }
                let kept = result
                    .instances()
                    .iter()
                    .filter(|i| i.score >= self.min_score)
                    .cloned()
                    .collect();
                DetectionResult::new(width, height, kept)
            }
            ReplayEntry::Polygons(frame) => {
                let mut instances = Vec::with_capacity(frame.instances.len());
                for (n, recorded) in frame.instances.iter().enumerate() {
                    if recorded.score < self.min_score {
                        continue;
                    }
                    let class = ObjectClass::try_from(recorded.class_id)
                        .with_context(|| format!("frame {} instance {}", index, n))?;
                    let vertices: Vec<(f64, f64)> =
                        recorded.polygon.iter().map(|p| (p[0], p[1])).collect();
                    let mask = Mask::from_polygon(width, height, &vertices)
                        .with_context(|| format!("frame {} instance {}", index, n))?;
                    instances.push(Instance {
                        class,
                        mask,
                        score: recorded.score,
                    });
                }
                DetectionResult::new(width, height, instances)
            }
        }
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let index = usize::try_from(frame.index)
            .map_err(|_| anyhow!("frame index {} out of range", frame.index))?;
        self.detection_for(index, frame.width(), frame.height())
    }
}

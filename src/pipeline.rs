//! Frame annotation pipeline.
//!
//! Frames are handled strictly one at a time in stream order: detect, summarise,
//! classify, annotate, record, emit. The only state carried between frames is
//! the running `RunSummary`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::aggregate;
use crate::detect::{DetectionResult, DetectorBackend};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::observation::FrameObservation;
use crate::output::FrameSink;
use crate::overlay::{annotate, OverlayStyle};
use crate::stage::{classify_view_traced, Stage, StageRules};
use crate::storage::ObservationStore;

/// Totals for one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames: u64,
    pub stage_counts: BTreeMap<Stage, u64>,
    /// Stage per processed frame, in order.
    pub predicted: Vec<Stage>,
    pub expected: Option<Stage>,
    pub expected_matches: u64,
}

impl RunSummary {
    pub fn count(&self, stage: Stage) -> u64 {
        self.stage_counts.get(&stage).copied().unwrap_or(0)
    }

    /// Share of frames classified as the expected stage, in percent.
    /// `None` without an expected stage or before any frame.
    pub fn expected_percent(&self) -> Option<f64> {
        self.expected?;
        if self.frames == 0 {
            return None;
        }
        Some(100.0 * self.expected_matches as f64 / self.frames as f64)
    }

    fn record(&mut self, stage: Stage) {
        self.frames += 1;
        *self.stage_counts.entry(stage).or_insert(0) += 1;
        self.predicted.push(stage);
        if self.expected == Some(stage) {
            self.expected_matches += 1;
        }
    }
}

/// Result of processing one frame.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    pub stage: Stage,
    pub annotated: Frame,
    pub observation: FrameObservation,
}

pub struct AnnotationPipeline<D: DetectorBackend> {
    detector: D,
    rules: StageRules,
    style: OverlayStyle,
    summary: RunSummary,
}

impl<D: DetectorBackend> AnnotationPipeline<D> {
    pub fn new(detector: D, rules: StageRules, style: OverlayStyle) -> Self {
        Self {
            detector,
            rules,
            style,
            summary: RunSummary::default(),
        }
    }

    /// Tally how many frames are classified as `stage`.
    pub fn with_expected_stage(mut self, stage: Stage) -> Self {
        self.summary.expected = Some(stage);
        self
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Run detection on `frame`, then `process_frame`.
    pub fn step(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        let detection = self.detector.detect(frame)?;
        self.process_frame(frame, &detection)
    }

    /// Classify and annotate one frame given its detections.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        detection: &DetectionResult,
    ) -> Result<FrameOutcome> {
        if (detection.width(), detection.height()) != (frame.width(), frame.height()) {
            return Err(anyhow!(
                "detection for frame {} is {}x{}, frame is {}x{}",
                frame.index,
                detection.width(),
                detection.height(),
                frame.width(),
                frame.height()
            ));
        }

        let view = aggregate(detection);
        for (class, entry) in view.iter() {
            if let Err(reason) = &entry.representative {
                log::warn!("frame {}: {} {}", frame.index, class, reason);
            }
        }

        let (stage, rule) = classify_view_traced(&view, &self.rules);
        log::debug!(
            "frame {}: {} instances, stage {} (rule {})",
            frame.index,
            view.total_instances(),
            stage.key(),
            rule.unwrap_or("none")
        );

        let annotated = annotate(frame, detection, stage, &self.style)?;
        let observation = FrameObservation::from_frame(frame.index, detection, &view, stage);
        self.summary.record(stage);

        Ok(FrameOutcome {
            stage,
            annotated,
            observation,
        })
    }

    /// Drain `source` through the pipeline into `sink` and `store`.
    ///
    /// `source` must already be connected. The sink and store are finalised
    /// once the source is exhausted.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        store: &mut dyn ObservationStore,
    ) -> Result<RunSummary> {
        let meta = source.meta()?;
        log::info!(
            "annotating {}x{} @ {} fps with detector {}",
            meta.width,
            meta.height,
            meta.fps,
            self.detector.name()
        );
        self.detector.warm_up()?;

        while let Some(frame) = source.next_frame()? {
            meta.check_frame(&frame)?;
            let outcome = self.step(&frame)?;
            sink.write_frame(&outcome.annotated)?;
            store.append(&outcome.observation)?;
        }

        sink.finish()?;
        store.flush()?;

        log::info!(
            "processed {} frames, {} with a detected stage",
            self.summary.frames,
            self.summary.frames - self.summary.count(Stage::StageNotDetected)
        );
        if let Some(percent) = self.summary.expected_percent() {
            log::info!("expected stage matched in {:.2}% of frames", percent);
        }
        Ok(self.summary.clone())
    }
}

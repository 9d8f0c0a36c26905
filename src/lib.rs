//! ICSI stage classification
//!
//! Assigns each frame of an intracytoplasmic sperm injection recording to a
//! procedure stage, using the instance segmentation of that frame alone.
//!
//! # Architecture
//!
//! Per frame, in stream order:
//!
//! 1. **Detect**: a `DetectorBackend` yields class-tagged instance masks.
//! 2. **Describe**: each class's first instance is reduced to a geometric
//!    descriptor (bounding box, contour area and perimeter, centroid, circularity).
//! 3. **Classify**: a fixed-priority rule table maps the class summary to a `Stage`.
//!    Classification is total; frames matching no rule are `StageNotDetected`.
//! 4. **Annotate**: masks, boxes and the stage label are drawn on the frame, a
//!    numeric observation is appended to the run log and the frame is emitted.
//!
//! Predicted sequences can be scored against a reference with `evaluate`.
//!
//! # Module Structure
//!
//! - `detect`: detector boundary (classes, masks, backends)
//! - `geometry`, `aggregate`, `stage`: descriptor, class summary, rule engine
//! - `evaluate`: sequence correctness
//! - `frame`, `ingest`, `output`, `overlay`: frames in, annotated frames out
//! - `observation`, `storage`: per-frame run log
//! - `pipeline`: ties the above together
//! - `config`: layered settings for the command-line tools

pub mod aggregate;
pub mod config;
pub mod detect;
pub mod evaluate;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod observation;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod stage;
pub mod storage;

pub use aggregate::{aggregate, ClassEntry, ClassView};
pub use detect::{DetectionResult, DetectorBackend, Instance, Mask, ObjectClass};
pub use evaluate::{evaluate, Evaluation, Mismatch, ReferenceSequence};
pub use frame::{Frame, VideoMeta};
pub use geometry::{describe, BoundingBox, Centroid, GeometricDescriptor, UndefinedGeometry};
pub use observation::FrameObservation;
pub use pipeline::{AnnotationPipeline, FrameOutcome, RunSummary};
pub use stage::{Stage, StageRules, DEFAULT_CIRCULARITY_THRESHOLD};

/// Stage of a single frame's detections.
pub fn classify(detection: &DetectionResult, rules: &StageRules) -> Stage {
    stage::classify_view(&aggregate(detection), rules)
}

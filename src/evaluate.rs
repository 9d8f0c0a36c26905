//! Frame-by-frame comparison of a predicted stage sequence with a reference.
//!
//! Sequences are compared position by position over their common prefix.
//! Frames past the shorter sequence are not compared; `reference_len` keeps the
//! full reference length so coverage against the whole reference can be reported.
//!
//! Two percentages are derived from the same count of matching frames:
//! - `accuracy_percent`: over the compared frames, so a prediction that agrees
//!   on every frame it covers scores 100 even when the reference is longer.
//! - `reference_coverage_percent`: over the whole reference,
//!   `100 * matches / len(reference)`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::stage::Stage;

/// A frame where prediction and reference disagree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub frame_index: usize,
    pub predicted: Stage,
    pub expected: Stage,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub matches: usize,
    pub compared: usize,
    pub reference_len: usize,
    pub mismatches: Vec<Mismatch>,
}

impl Evaluation {
    /// Matching frames over compared frames, in percent.
    ///
    /// `[A, B]` against `[A, B, C]` scores 100.
    pub fn accuracy_percent(&self) -> f64 {
        100.0 * self.matches as f64 / self.compared as f64
    }

    /// Matching frames over the whole reference, in percent.
    ///
    /// `[A, B]` against `[A, B, C]` scores 66.67.
    pub fn reference_coverage_percent(&self) -> f64 {
        100.0 * self.matches as f64 / self.reference_len as f64
    }
}

/// Compare `predicted` with `reference` over their common prefix.
///
/// Fails when either sequence is empty, since no percentage is defined.
pub fn evaluate(predicted: &[Stage], reference: &[Stage]) -> Result<Evaluation> {
    if predicted.is_empty() {
        return Err(anyhow!("predicted stage sequence is empty"));
    }
    if reference.is_empty() {
        return Err(anyhow!("reference stage sequence is empty"));
    }

    let mismatches: Vec<Mismatch> = predicted
        .iter()
        .zip(reference)
        .enumerate()
        .filter(|(_, (p, r))| p != r)
        .map(|(frame_index, (&predicted, &expected))| Mismatch {
            frame_index,
            predicted,
            expected,
        })
        .collect();
    let compared = predicted.len().min(reference.len());

    Ok(Evaluation {
        matches: compared - mismatches.len(),
        compared,
        reference_len: reference.len(),
        mismatches,
    })
}

/// Ground-truth stage labels, one per frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceSequence {
    stages: Vec<Stage>,
}

impl ReferenceSequence {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Parse either a JSON array of stage names or plain text with one stage
    /// per line. Blank lines and `#` comments are skipped in text form.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('[') {
            let names: Vec<String> =
                serde_json::from_str(trimmed).context("reference JSON must be an array of stage names")?;
            let stages = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    name.parse::<Stage>()
                        .with_context(|| format!("reference entry {}", i))
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::new(stages));
        }

        let mut stages = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let stage = line
                .parse::<Stage>()
                .with_context(|| format!("reference line {}", lineno + 1))?;
            stages.push(stage);
        }
        Ok(Self::new(stages))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read reference {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse reference {}", path.display()))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn evaluate(&self, predicted: &[Stage]) -> Result<Evaluation> {
        evaluate(predicted, &self.stages)
    }
}

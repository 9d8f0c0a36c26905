//! ICSI procedure stages and the rule engine that assigns one to each frame.

mod rules;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use rules::{
    classify_view, classify_view_traced, StageRules, DEFAULT_CIRCULARITY_THRESHOLD,
    POLAR_BODY_ALIGNMENT_LIMIT,
};

/// Step of the procedure visible in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SpermSelection,
    SpermImmobilization,
    SpermCollection,
    OocytePositioning,
    PipetteInsertion,
    OrganelleFlow,
    SpermInjection,
    PipetteRemoval,
    StageNotDetected,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::SpermSelection,
        Stage::SpermImmobilization,
        Stage::SpermCollection,
        Stage::OocytePositioning,
        Stage::PipetteInsertion,
        Stage::OrganelleFlow,
        Stage::SpermInjection,
        Stage::PipetteRemoval,
        Stage::StageNotDetected,
    ];

    /// Human-readable label, as overlaid on annotated frames.
    pub fn label(self) -> &'static str {
        match self {
            Stage::SpermSelection => "Sperm selection",
            Stage::SpermImmobilization => "Immobilization of the sperm",
            Stage::SpermCollection => "Sperm collection",
            Stage::OocytePositioning => "Oocyte positioning",
            Stage::PipetteInsertion => "Inserting the pipette",
            Stage::OrganelleFlow => "Flow of the cell organelles into the pipette",
            Stage::SpermInjection => "Sperm injection",
            Stage::PipetteRemoval => "Removing the pipette",
            Stage::StageNotDetected => "Stage not detected",
        }
    }

    /// Stable snake_case key used in logs and reference files.
    pub fn key(self) -> &'static str {
        match self {
            Stage::SpermSelection => "sperm_selection",
            Stage::SpermImmobilization => "sperm_immobilization",
            Stage::SpermCollection => "sperm_collection",
            Stage::OocytePositioning => "oocyte_positioning",
            Stage::PipetteInsertion => "pipette_insertion",
            Stage::OrganelleFlow => "organelle_flow",
            Stage::SpermInjection => "sperm_injection",
            Stage::PipetteRemoval => "pipette_removal",
            Stage::StageNotDetected => "stage_not_detected",
        }
    }

    pub fn is_detected(self) -> bool {
        self != Stage::StageNotDetected
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    /// Accepts the label ("Sperm collection") or the key (`sperm_collection`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Stage::ALL
            .into_iter()
            .find(|stage| {
                stage.label().eq_ignore_ascii_case(wanted) || stage.key().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| anyhow!("unknown stage '{}'", wanted))
    }
}

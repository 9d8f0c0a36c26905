use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::mask::Mask;

/// Object classes produced by the ICSI instance segmentation model.
///
/// Discriminants are the detector's class ids; id 0 is the model's background
/// class and never appears in a `DetectionResult`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Oocyte = 1,
    PolarBody = 2,
    Spermatozoon = 3,
    Pipette = 4,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 4] = [
        ObjectClass::Oocyte,
        ObjectClass::PolarBody,
        ObjectClass::Spermatozoon,
        ObjectClass::Pipette,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            ObjectClass::Oocyte => "oocyte",
            ObjectClass::PolarBody => "polar body",
            ObjectClass::Spermatozoon => "spermatozoon",
            ObjectClass::Pipette => "pipette",
        }
    }
}

impl TryFrom<u8> for ObjectClass {
    type Error = anyhow::Error;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            1 => Ok(ObjectClass::Oocyte),
            2 => Ok(ObjectClass::PolarBody),
            3 => Ok(ObjectClass::Spermatozoon),
            4 => Ok(ObjectClass::Pipette),
            other => Err(anyhow!("unknown object class id {}", other)),
        }
    }
}

impl std::fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One detected object in one frame.
#[derive(Clone, Debug)]
pub struct Instance {
    pub class: ObjectClass,
    pub mask: Mask,
    /// Detector confidence. Informational only; stage rules never read it.
    pub score: f32,
}

/// All instances detected in one frame, in detection order.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    width: u32,
    height: u32,
    instances: Vec<Instance>,
}

impl DetectionResult {
    /// An empty result for a frame of the given size.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            instances: Vec::new(),
        }
    }

    /// Build a result, checking that every mask matches the frame size.
    pub fn new(width: u32, height: u32, instances: Vec<Instance>) -> Result<Self> {
        for (idx, instance) in instances.iter().enumerate() {
            if instance.mask.width() != width || instance.mask.height() != height {
                return Err(anyhow!(
                    "instance {} ({}) mask is {}x{}, frame is {}x{}",
                    idx,
                    instance.class,
                    instance.mask.width(),
                    instance.mask.height(),
                    width,
                    height
                ));
            }
        }
        Ok(Self {
            width,
            height,
            instances,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Class ids in detection order, as the detector reports them.
    pub fn class_ids(&self) -> Vec<u8> {
        self.instances.iter().map(|i| i.class.id()).collect()
    }
}

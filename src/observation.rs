//! Per-frame measurement record.
//!
//! One `FrameObservation` is produced for every processed frame and handed to
//! an `ObservationStore`. Oocyte measures describe the first oocyte instance
//! and are absent when no oocyte is present or its geometry is undefined.

use serde::{Deserialize, Serialize};

use crate::aggregate::ClassView;
use crate::detect::{DetectionResult, ObjectClass};
use crate::geometry::{BoundingBox, Centroid};
use crate::stage::Stage;

/// Bounding box of one detected instance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservedBox {
    pub class: ObjectClass,
    pub score: f32,
    pub bbox: BoundingBox,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    pub frame_index: u64,
    pub stage: Stage,
    pub instance_count: usize,
    /// Area enclosed by the oocyte contour.
    pub oocyte_area: Option<f64>,
    /// Raw count of oocyte mask pixels.
    pub oocyte_pixel_count: Option<usize>,
    pub oocyte_perimeter: Option<f64>,
    pub oocyte_circularity: Option<f64>,
    pub oocyte_centroid: Option<Centroid>,
    /// Every non-empty instance, in detection order.
    pub boxes: Vec<ObservedBox>,
}

impl FrameObservation {
    pub fn from_frame(
        frame_index: u64,
        detection: &DetectionResult,
        view: &ClassView,
        stage: Stage,
    ) -> Self {
        let oocyte = view.descriptor(ObjectClass::Oocyte);
        let oocyte_pixel_count = detection
            .instances()
            .iter()
            .find(|i| i.class == ObjectClass::Oocyte)
            .map(|i| i.mask.pixel_count());
        let boxes = detection
            .instances()
            .iter()
            .filter_map(|instance| {
                BoundingBox::of_mask(&instance.mask).map(|bbox| ObservedBox {
                    class: instance.class,
                    score: instance.score,
                    bbox,
                })
            })
            .collect();

        Self {
            frame_index,
            stage,
            instance_count: detection.instances().len(),
            oocyte_area: oocyte.map(|d| d.area),
            oocyte_pixel_count,
            oocyte_perimeter: oocyte.map(|d| d.perimeter),
            oocyte_circularity: oocyte.map(|d| d.circularity_ratio),
            oocyte_centroid: oocyte.map(|d| d.centroid),
            boxes,
        }
    }
}

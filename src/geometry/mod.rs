//! Geometric descriptor of a single instance mask.
//!
//! Area, perimeter and circularity are taken from the traced outer contour
//! rather than the raw pixel set, so they share one unit. The bounding box
//! covers the raw pixel set.

mod contour;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::detect::Mask;

pub use contour::{outer_contours, trace_outer_contour, Contour};

/// Inclusive, axis-aligned pixel box. `x1 <= x2`, `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Extent of every occupied pixel of `mask`; `None` when it is empty.
    pub fn of_mask(mask: &Mask) -> Option<Self> {
        let (x1, y1, x2, y2) = mask.extent()?;
        Some(Self::new(x1, y1, x2, y2))
    }

    /// True when `inner` lies inside `self` with no shared edge.
    pub fn strictly_contains(&self, inner: &BoundingBox) -> bool {
        inner.x1 > self.x1 && inner.y1 > self.y1 && inner.x2 < self.x2 && inner.y2 < self.y2
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

/// Why a mask has no usable descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UndefinedGeometry {
    EmptyMask,
    ZeroArea,
    ZeroPerimeter,
}

impl std::fmt::Display for UndefinedGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            UndefinedGeometry::EmptyMask => "mask has no occupied pixels",
            UndefinedGeometry::ZeroArea => "contour encloses zero area",
            UndefinedGeometry::ZeroPerimeter => "contour has zero perimeter",
        };
        write!(f, "undefined geometry: {}", reason)
    }
}
impl std::error::Error for UndefinedGeometry {}

/// Read-only geometric summary of one instance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometricDescriptor {
    pub bbox: BoundingBox,
    pub centroid: Centroid,
    pub perimeter: f64,
    pub area: f64,
    pub circularity_ratio: f64,
}

impl GeometricDescriptor {
    /// Assemble a descriptor from measured parts.
    ///
    /// Fails rather than dividing by zero when the area or perimeter vanish.
    pub fn new(
        bbox: BoundingBox,
        centroid: Centroid,
        area: f64,
        perimeter: f64,
    ) -> Result<Self, UndefinedGeometry> {
        if area <= 0.0 {
            return Err(UndefinedGeometry::ZeroArea);
        }
        if perimeter <= 0.0 {
            return Err(UndefinedGeometry::ZeroPerimeter);
        }
        Ok(Self {
            bbox,
            centroid,
            perimeter,
            area,
            circularity_ratio: circularity_ratio(area, perimeter),
        })
    }
}

/// `2·sqrt(π·area) / perimeter`; 1.0 for a perfect circle.
pub fn circularity_ratio(area: f64, perimeter: f64) -> f64 {
    2.0 * (PI * area).sqrt() / perimeter
}

/// Describe a mask.
///
/// The box spans every occupied pixel. Area, perimeter and centroid come from
/// the dominant connected component.
pub fn describe(mask: &Mask) -> Result<GeometricDescriptor, UndefinedGeometry> {
    let bbox = BoundingBox::of_mask(mask).ok_or(UndefinedGeometry::EmptyMask)?;
    let contour = trace_outer_contour(mask).ok_or(UndefinedGeometry::EmptyMask)?;
    let (m00, m10, m01) = contour.moments();
    if m00 == 0.0 {
        return Err(UndefinedGeometry::ZeroArea);
    }
    let centroid = Centroid {
        x: m10 / m00,
        y: m01 / m00,
    };
    GeometricDescriptor::new(bbox, centroid, m00.abs(), contour.arc_length())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mask_is_undefined() {
        assert_eq!(describe(&Mask::new(16, 16)), Err(UndefinedGeometry::EmptyMask));
    }

    #[test]
    fn single_pixel_and_line_masks_are_undefined() {
        let mut dot = Mask::new(16, 16);
        dot.set(3, 3, true);
        assert_eq!(describe(&dot), Err(UndefinedGeometry::ZeroArea));

        let mut line = Mask::new(16, 16);
        line.fill_rect(2, 4, 9, 4);
        assert_eq!(describe(&line), Err(UndefinedGeometry::ZeroArea));
    }

    #[test]
    fn square_descriptor() {
        let mut mask = Mask::new(32, 32);
        mask.fill_rect(10, 10, 20, 20);
        let d = describe(&mask).unwrap();

        assert_eq!(d.bbox, BoundingBox::new(10, 10, 20, 20));
        assert!((d.area - 100.0).abs() < 1e-9);
        assert!((d.perimeter - 40.0).abs() < 1e-9);
        assert!((d.centroid.x - 15.0).abs() < 1e-9);
        assert!((d.centroid.y - 15.0).abs() < 1e-9);
        let expected = 2.0 * (PI * 100.0).sqrt() / 40.0;
        assert!((d.circularity_ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn centroid_follows_offset_rectangle() {
        let mut mask = Mask::new(32, 32);
        mask.fill_rect(4, 6, 10, 8);
        let d = describe(&mask).unwrap();
        assert!((d.centroid.x - 7.0).abs() < 1e-9);
        assert!((d.centroid.y - 7.0).abs() < 1e-9);
    }

    #[test]
    fn disc_is_rounder_than_sliver() {
        let disc = Mask::from_fn(64, 64, |x, y| {
            let dx = x as f64 - 32.0;
            let dy = y as f64 - 32.0;
            dx * dx + dy * dy <= 400.0
        });
        let mut sliver = Mask::new(64, 64);
        sliver.fill_rect(10, 30, 49, 33);

        let round = describe(&disc).unwrap().circularity_ratio;
        let flat = describe(&sliver).unwrap().circularity_ratio;
        assert!(round > 0.85, "disc circularity {}", round);
        assert!(flat < 0.5, "sliver circularity {}", flat);
    }

    #[test]
    fn masks_touching_the_frame_edge_are_described() {
        let mut left = Mask::new(32, 32);
        left.fill_rect(0, 8, 10, 18);
        let d = describe(&left).unwrap();
        assert_eq!(d.bbox, BoundingBox::new(0, 8, 10, 18));
        assert!((d.area - 100.0).abs() < 1e-9);
        assert!((d.centroid.x - 5.0).abs() < 1e-9);

        let mut full = Mask::new(16, 16);
        full.fill_rect(0, 0, 15, 15);
        let d = describe(&full).unwrap();
        assert_eq!(d.bbox, BoundingBox::new(0, 0, 15, 15));
        assert!((d.area - 225.0).abs() < 1e-9);
        assert!((d.perimeter - 60.0).abs() < 1e-9);
    }

    #[test]
    fn bbox_spans_every_component() {
        let mut mask = Mask::new(64, 64);
        mask.fill_rect(20, 20, 40, 40);
        mask.fill_rect(50, 2, 53, 5);
        let d = describe(&mask).unwrap();
        assert_eq!(d.bbox, BoundingBox::new(20, 2, 53, 40));
        // Measures still follow the dominant component.
        assert!((d.area - 400.0).abs() < 1e-9);
        assert!((d.centroid.x - 30.0).abs() < 1e-9);
        assert!((d.centroid.y - 30.0).abs() < 1e-9);
    }

    #[test]
    fn bbox_of_degenerate_mask_is_still_known() {
        let mut line = Mask::new(16, 16);
        line.fill_rect(2, 4, 9, 4);
        assert_eq!(BoundingBox::of_mask(&line), Some(BoundingBox::new(2, 4, 9, 4)));
        assert_eq!(BoundingBox::of_mask(&Mask::new(4, 4)), None);
    }

    #[test]
    fn strict_containment_excludes_shared_edges() {
        let outer = BoundingBox::new(0, 0, 30, 30);
        assert!(outer.strictly_contains(&BoundingBox::new(10, 10, 20, 20)));
        assert!(!outer.strictly_contains(&BoundingBox::new(0, 10, 20, 20)));
        assert!(!outer.strictly_contains(&BoundingBox::new(5, 5, 35, 35)));
    }

    #[test]
    fn descriptor_refuses_zero_perimeter() {
        let bbox = BoundingBox::new(0, 0, 1, 1);
        let c = Centroid { x: 0.5, y: 0.5 };
        assert_eq!(
            GeometricDescriptor::new(bbox, c, 1.0, 0.0),
            Err(UndefinedGeometry::ZeroPerimeter)
        );
    }
}

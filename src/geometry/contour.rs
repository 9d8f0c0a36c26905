//! Outer contour tracing and polygon measures.
//!
//! Border following is delegated to `imageproc` (Suzuki–Abe). The traced chain
//! visits every border pixel centre; runs of same-direction steps are collapsed
//! to their end points, which leaves length, enclosed area and moments intact.

use imageproc::contours::{find_contours, BorderType};

use crate::detect::Mask;

const TRACE_PAD: u32 = 1;

/// Closed polygon through border pixel centres, in tracing order.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    points: Vec<(i32, i32)>,
}

impl Contour {
    pub fn new(points: Vec<(i32, i32)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    /// Closed arc length.
    pub fn arc_length(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                (f64::from(x1 - x0)).hypot(f64::from(y1 - y0))
            })
            .sum()
    }

    /// Raw spatial moments `(m00, m10, m01)` of the enclosed polygon.
    ///
    /// `m00` is the signed shoelace area; the sign follows tracing orientation
    /// and cancels in the centroid ratios.
    pub fn moments(&self) -> (f64, f64, f64) {
        let n = self.points.len();
        if n < 3 {
            return (0.0, 0.0, 0.0);
        }
        let mut m00 = 0.0;
        let mut m10 = 0.0;
        let mut m01 = 0.0;
        for i in 0..n {
            let (x0, y0) = self.points[i];
            let (x1, y1) = self.points[(i + 1) % n];
            let (x0, y0, x1, y1) = (f64::from(x0), f64::from(y0), f64::from(x1), f64::from(y1));
            let cross = x0 * y1 - x1 * y0;
            m00 += cross;
            m10 += (x0 + x1) * cross;
            m01 += (y0 + y1) * cross;
        }
        (m00 / 2.0, m10 / 6.0, m01 / 6.0)
    }

    /// Unsigned enclosed area.
    pub fn area(&self) -> f64 {
        self.moments().0.abs()
    }

    /// Inclusive extrema `(x1, y1, x2, y2)`; `None` for an empty contour.
    pub fn extrema(&self) -> Option<(i32, i32, i32, i32)> {
        let (&(fx, fy), rest) = self.points.split_first()?;
        Some(rest.iter().fold((fx, fy, fx, fy), |(x1, y1, x2, y2), &(x, y)| {
            (x1.min(x), y1.min(y), x2.max(x), y2.max(y))
        }))
    }
}

/// All outer borders of the mask, one per connected component.
///
/// The mask is traced inside a one-pixel zero border so components touching
/// the frame edge are still found; points are shifted back to mask coordinates.
pub fn outer_contours(mask: &Mask) -> Vec<Contour> {
    let image = mask.to_padded_gray_image(TRACE_PAD);
    let pad = TRACE_PAD as i32;
    find_contours::<i32>(&image)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer))
        .map(|c| {
            let points = c.points.iter().map(|p| (p.x - pad, p.y - pad)).collect();
            Contour::new(compress_runs(points))
        })
        .collect()
}

/// The outer border enclosing the largest area; earliest in raster order on ties.
pub fn trace_outer_contour(mask: &Mask) -> Option<Contour> {
    outer_contours(mask).into_iter().reduce(|best, candidate| {
        if candidate.area() > best.area() {
            candidate
        } else {
            best
        }
    })
}

fn compress_runs(mut points: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
    points.dedup();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    let n = points.len();
    if n < 3 {
        return points;
    }
    let step = |a: (i32, i32), b: (i32, i32)| ((b.0 - a.0).signum(), (b.1 - a.1).signum());
    let kept: Vec<(i32, i32)> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() {
        points
    } else {
        kept
    }
}

use anyhow::{anyhow, Result};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Binary instance mask with the same dimensions as its frame.
///
/// Stored row-major; `true` where the instance occupies the pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// An all-false mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    /// Rasterise a closed polygon outline into a mask.
    ///
    /// Vertices are pixel coordinates `(x, y)`; an explicit closing vertex
    /// equal to the first one is accepted and ignored.
    pub fn from_polygon(width: u32, height: u32, vertices: &[(f64, f64)]) -> Result<Self> {
        let mut points: Vec<Point<i32>> = vertices
            .iter()
            .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
            .collect();
        points.dedup();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return Err(anyhow!(
                "polygon needs at least 3 distinct vertices, got {}",
                points.len()
            ));
        }

        let mut canvas = GrayImage::new(width, height);
        draw_polygon_mut(&mut canvas, &points, Luma([255u8]));
        Ok(Self::from_gray_image(&canvas))
    }

    pub fn from_gray_image(image: &GrayImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            image.get_pixel(x, y).0[0] > 0
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Out-of-bounds reads return `false`.
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[self.index(x, y)]
    }

    /// Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        self.bits[idx] = value;
    }

    /// Set every pixel of the inclusive rectangle `(x1, y1)..=(x2, y2)`.
    pub fn fill_rect(&mut self, x1: u32, y1: u32, x2: u32, y2: u32) {
        for y in y1..=y2.min(self.height.saturating_sub(1)) {
            for x in x1..=x2.min(self.width.saturating_sub(1)) {
                self.set(x, y, true);
            }
        }
    }

    /// Raw count of occupied pixels.
    pub fn pixel_count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    /// Inclusive extent `(x1, y1, x2, y2)` of all occupied pixels.
    pub fn extent(&self) -> Option<(u32, u32, u32, u32)> {
        let mut extent: Option<(u32, u32, u32, u32)> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.get(x, y) {
                    continue;
                }
                extent = Some(match extent {
                    None => (x, y, x, y),
                    Some((x1, y1, x2, y2)) => (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
                });
            }
        }
        extent
    }

    /// 0/255 grayscale rendition.
    pub fn to_gray_image(&self) -> GrayImage {
        self.to_padded_gray_image(0)
    }

    /// 0/255 grayscale rendition inside a zero border of `pad` pixels.
    pub fn to_padded_gray_image(&self, pad: u32) -> GrayImage {
        GrayImage::from_fn(self.width + 2 * pad, self.height + 2 * pad, |x, y| {
            let inside = x >= pad && y >= pad && self.get(x - pad, y - pad);
            Luma([if inside { 255 } else { 0 }])
        })
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rect_is_inclusive_and_clipped() {
        let mut mask = Mask::new(10, 10);
        mask.fill_rect(2, 3, 4, 5);
        assert_eq!(mask.pixel_count(), 9);
        assert!(mask.get(2, 3));
        assert!(mask.get(4, 5));
        assert!(!mask.get(5, 5));

        mask.fill_rect(8, 8, 20, 20);
        assert_eq!(mask.pixel_count(), 9 + 4);
    }

    #[test]
    fn out_of_bounds_access_is_harmless() {
        let mut mask = Mask::new(3, 3);
        mask.set(7, 1, true);
        assert!(mask.is_empty());
        assert!(!mask.get(3, 0));
    }

    #[test]
    fn polygon_rasterisation_covers_interior() {
        let square = [(2.0, 2.0), (7.0, 2.0), (7.0, 7.0), (2.0, 7.0), (2.0, 2.0)];
        let mask = Mask::from_polygon(10, 10, &square).unwrap();
        assert!(mask.get(2, 2));
        assert!(mask.get(4, 5));
        assert!(mask.get(7, 7));
        assert!(!mask.get(1, 1));
        assert!(!mask.get(8, 4));
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        assert!(Mask::from_polygon(10, 10, &[(1.0, 1.0), (5.0, 5.0)]).is_err());
        assert!(Mask::from_polygon(10, 10, &[(1.0, 1.0), (1.2, 1.0), (5.0, 5.0)]).is_err());
    }

    #[test]
    fn extent_covers_all_components() {
        let mut mask = Mask::new(64, 64);
        assert_eq!(mask.extent(), None);
        mask.fill_rect(20, 20, 40, 40);
        mask.fill_rect(50, 2, 53, 5);
        assert_eq!(mask.extent(), Some((20, 2, 53, 40)));
    }

    #[test]
    fn padded_image_keeps_edge_pixels_off_the_border() {
        let mut mask = Mask::new(3, 2);
        mask.set(0, 0, true);
        let image = mask.to_padded_gray_image(1);
        assert_eq!(image.dimensions(), (5, 4));
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
        assert_eq!(image.get_pixel(1, 1).0[0], 255);
        assert_eq!(image.get_pixel(4, 3).0[0], 0);
    }

    #[test]
    fn gray_image_round_trip_preserves_pixels() {
        let mut mask = Mask::new(5, 4);
        mask.fill_rect(1, 1, 2, 3);
        assert_eq!(Mask::from_gray_image(&mask.to_gray_image()), mask);
    }
}

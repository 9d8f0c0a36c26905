//! Frame annotation: instance masks, their boxes and the stage caption.
//!
//! Output frames keep the input resolution. Masks are tinted with a per-class
//! colour, each instance gets its bounding box and optionally its traced
//! outline, and the stage label is written in red on a dark box at top left.

pub mod font;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::detect::{DetectionResult, Mask, ObjectClass};
use crate::frame::Frame;
use crate::geometry::{trace_outer_contour, BoundingBox};
use crate::stage::Stage;

pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const LABEL_BACKGROUND: Rgb<u8> = Rgb([24, 24, 24]);
/// Largest accepted caption scale.
pub const MAX_LABEL_SCALE: u32 = 16;
const MASK_ALPHA: f32 = 0.4;

/// Drawing options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Integer scale of the caption font, `1..=MAX_LABEL_SCALE`.
    pub label_scale: u32,
    /// Trace each instance's outer contour.
    pub draw_outlines: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            label_scale: 2,
            draw_outlines: true,
        }
    }
}

pub fn class_color(class: ObjectClass) -> Rgb<u8> {
    match class {
        ObjectClass::Oocyte => Rgb([0, 200, 0]),
        ObjectClass::PolarBody => Rgb([255, 220, 0]),
        ObjectClass::Spermatozoon => Rgb([0, 220, 255]),
        ObjectClass::Pipette => Rgb([255, 0, 255]),
    }
}

/// Render `stage` and the detected instances onto a copy of `frame`.
pub fn annotate(
    frame: &Frame,
    detection: &DetectionResult,
    stage: Stage,
    style: &OverlayStyle,
) -> Result<Frame> {
    if (detection.width(), detection.height()) != (frame.width(), frame.height()) {
        return Err(anyhow!(
            "detection is {}x{}, frame {} is {}x{}",
            detection.width(),
            detection.height(),
            frame.index,
            frame.width(),
            frame.height()
        ));
    }

    let mut image = frame.image.clone();
    for instance in detection.instances() {
        let color = class_color(instance.class);
        tint_mask(&mut image, &instance.mask, color);
        if style.draw_outlines {
            draw_outline(&mut image, &instance.mask, color);
        }
        if let Some(b) = BoundingBox::of_mask(&instance.mask) {
            let rect = Rect::at(b.x1 as i32, b.y1 as i32).of_size(b.x2 - b.x1 + 1, b.y2 - b.y1 + 1);
            draw_hollow_rect_mut(&mut image, rect, color);
        }
    }
    draw_caption(&mut image, stage.label(), style.label_scale.clamp(1, MAX_LABEL_SCALE));

    Ok(Frame::new(frame.index, image))
}

fn tint_mask(image: &mut RgbImage, mask: &Mask, color: Rgb<u8>) {
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if !mask.get(x, y) {
            continue;
        }
        for (channel, target) in pixel.0.iter_mut().zip(color.0) {
            let blended = f32::from(*channel) * (1.0 - MASK_ALPHA) + f32::from(target) * MASK_ALPHA;
            *channel = blended.round() as u8;
        }
    }
}

fn draw_outline(image: &mut RgbImage, mask: &Mask, color: Rgb<u8>) {
    let Some(contour) = trace_outer_contour(mask) else {
        return;
    };
    let points = contour.points();
    for (i, &(x0, y0)) in points.iter().enumerate() {
        let (x1, y1) = points[(i + 1) % points.len()];
        draw_line_segment_mut(image, (x0 as f32, y0 as f32), (x1 as f32, y1 as f32), color);
    }
}

fn draw_caption(image: &mut RgbImage, text: &str, scale: u32) {
    let pad = 2 * scale;
    let width = font::text_width(text, scale) + 2 * pad;
    let height = font::text_height(scale) + 2 * pad;
    draw_filled_rect_mut(image, Rect::at(0, 0).of_size(width, height), LABEL_BACKGROUND);
    font::draw_text(image, pad, pad, text, LABEL_COLOR, scale);
}

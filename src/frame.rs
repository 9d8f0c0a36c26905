//! Frame values flowing from a source, through detection and annotation, to a sink.
//!
//! - `Frame`: one decoded video frame plus its position in the stream.
//! - `VideoMeta`: stream-level properties a sink must preserve (resolution, frame rate).

use anyhow::{anyhow, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded frame. `index` counts from 0 in stream order.
#[derive(Clone, Debug)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// ----------------------------------------------------------------------------
// VideoMeta
// ----------------------------------------------------------------------------

/// Stream properties reported by a source and preserved by a sink.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoMeta {
    pub fn new(width: u32, height: u32, fps: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("video dimensions must be non-zero ({}x{})", width, height));
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(anyhow!("frame rate must be positive, got {}", fps));
        }
        Ok(Self { width, height, fps })
    }

    /// Ensure a frame matches the stream resolution.
    pub fn check_frame(&self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(anyhow!(
                "frame {} is {}x{}, stream is {}x{}",
                frame.index,
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_meta_rejects_degenerate_streams() {
        assert!(VideoMeta::new(0, 480, 25.0).is_err());
        assert!(VideoMeta::new(640, 480, 0.0).is_err());
        assert!(VideoMeta::new(640, 480, f64::NAN).is_err());
        assert!(VideoMeta::new(640, 480, 25.0).is_ok());
    }

    #[test]
    fn check_frame_enforces_resolution() {
        let meta = VideoMeta::new(4, 3, 10.0).unwrap();
        assert!(meta.check_frame(&Frame::new(0, RgbImage::new(4, 3))).is_ok());
        assert!(meta.check_frame(&Frame::new(1, RgbImage::new(3, 4))).is_err());
    }
}

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionResult;
use crate::frame::Frame;

/// Stub backend for dry runs and tests. Never detects anything.
#[derive(Debug, Default)]
pub struct StubBackend {
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        self.frames_seen += 1;
        Ok(DetectionResult::empty(frame.width(), frame.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn stub_backend_returns_empty_frame_sized_results() {
        let mut backend = StubBackend::new();

        let r1 = backend.detect(&Frame::new(0, RgbImage::new(16, 9))).unwrap();
        assert!(r1.is_empty());
        assert_eq!((r1.width(), r1.height()), (16, 9));

        let r2 = backend.detect(&Frame::new(1, RgbImage::new(16, 9))).unwrap();
        assert!(r2.is_empty());
        assert_eq!(backend.frames_seen(), 2);
    }
}

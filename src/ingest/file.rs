//! Local file frame source.
//!
//! `FileSource` reads a directory of still frames (PNG or JPEG, ordered by file
//! name) or produces a synthetic `stub://` stream. Every frame must share the
//! first frame's resolution. Remote URLs are refused.

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

use super::FrameSource;
use crate::frame::{Frame, VideoMeta};

const STUB_SCHEME: &str = "stub://";
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Frame directory, or `stub://WIDTHxHEIGHT/COUNT`.
    pub path: String,
    /// Frame rate reported to sinks. Still frames carry no timing of their own.
    pub fps: f64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            fps: 25.0,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    config: FileConfig,
    backend: FileBackend,
    frames_captured: u64,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    Sequence(ImageSequenceSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let backend = match config.path.strip_prefix(STUB_SCHEME) {
            Some(rest) => FileBackend::Synthetic(SyntheticFileSource::parse(rest)?),
            None => FileBackend::Sequence(ImageSequenceSource::new(PathBuf::from(&config.path))),
        };
        Ok(Self {
            config,
            backend,
            frames_captured: 0,
        })
    }

    pub fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frames_captured,
            path: self.config.path.clone(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(_) => true,
            FileBackend::Sequence(source) => source.connected,
        }
    }
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => {
                log::info!(
                    "FileSource: connected to {} (synthetic, {} frames)",
                    self.config.path,
                    source.count
                );
            }
            FileBackend::Sequence(source) => {
                source.connect()?;
                log::info!(
                    "FileSource: connected to {} ({} frames)",
                    self.config.path,
                    source.files.len()
                );
            }
        }
        Ok(())
    }

    fn meta(&self) -> Result<VideoMeta> {
        let (width, height) = match &self.backend {
            FileBackend::Synthetic(source) => (source.width, source.height),
            FileBackend::Sequence(source) => source
                .dimensions
                .ok_or_else(|| anyhow!("file source {} is not connected", self.config.path))?,
        };
        VideoMeta::new(width, height, self.config.fps)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let index = self.frames_captured;
        let image = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_image(index),
            FileBackend::Sequence(source) => source.next_image()?,
        };
        Ok(image.map(|image| {
            self.frames_captured += 1;
            Frame::new(index, image)
        }))
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Image sequence directory
// ----------------------------------------------------------------------------

struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    dimensions: Option<(u32, u32)>,
    connected: bool,
}

impl ImageSequenceSource {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: Vec::new(),
            cursor: 0,
            dimensions: None,
            connected: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.files = list_frames(&self.dir)?;
        let first = self
            .files
            .first()
            .ok_or_else(|| anyhow!("no PNG or JPEG frames in {}", self.dir.display()))?;
        self.dimensions = Some(
            image::image_dimensions(first)
                .with_context(|| format!("read frame header {}", first.display()))?,
        );
        self.cursor = 0;
        self.connected = true;
        Ok(())
    }

    fn next_image(&mut self) -> Result<Option<RgbImage>> {
        if !self.connected {
            return Err(anyhow!("file source {} is not connected", self.dir.display()));
        }
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let image = image::open(path)
            .with_context(|| format!("decode frame {}", path.display()))?
            .to_rgb8();
        if let Some((width, height)) = self.dimensions {
            if image.dimensions() != (width, height) {
                return Err(anyhow!(
                    "frame {} is {}x{}, expected {}x{}",
                    path.display(),
                    image.width(),
                    image.height(),
                    width,
                    height
                ));
            }
        }
        Ok(Some(image))
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read frame directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)));
        if is_image && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    width: u32,
    height: u32,
    count: u64,
}

impl SyntheticFileSource {
    /// Parse `WIDTHxHEIGHT/COUNT`.
    fn parse(descriptor: &str) -> Result<Self> {
        let bad = || anyhow!("stub source must look like stub://WIDTHxHEIGHT/COUNT, got stub://{}", descriptor);
        let (size, count) = descriptor.split_once('/').ok_or_else(bad)?;
        let (width, height) = size.split_once('x').ok_or_else(bad)?;
        let width: u32 = width.parse().map_err(|_| bad())?;
        let height: u32 = height.parse().map_err(|_| bad())?;
        let count: u64 = count.parse().map_err(|_| bad())?;
        if width == 0 || height == 0 {
            return Err(bad());
        }
        Ok(Self {
            width,
            height,
            count,
        })
    }

    fn next_image(&self, index: u64) -> Option<RgbImage> {
        if index >= self.count {
            return None;
        }
        let shade = (index % 256) as u8;
        Some(RgbImage::from_pixel(
            self.width,
            self.height,
            Rgb([shade, shade, shade]),
        ))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

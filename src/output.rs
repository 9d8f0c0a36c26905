//! Annotated frame sinks.
//!
//! A sink receives frames in stream order and must keep the input resolution.
//! `ImageSequenceSink` writes numbered PNG files plus a `video.json` manifest
//! holding the stream's resolution, frame rate and frame count.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::frame::{Frame, VideoMeta};

pub const MANIFEST_FILE: &str = "video.json";

pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush anything buffered. Called once after the last frame.
    fn finish(&mut self) -> Result<()>;
}

/// Contents of `video.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceManifest {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
}

pub struct ImageSequenceSink {
    dir: PathBuf,
    meta: VideoMeta,
    written: u64,
}

impl ImageSequenceSink {
    /// Create `dir` if needed and prepare to write frames into it.
    pub fn create(dir: &Path, meta: VideoMeta) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            meta,
            written: 0,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    pub fn read_manifest(dir: &Path) -> Result<SequenceManifest> {
        let path = dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse manifest {}", path.display()))
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.meta.check_frame(frame)?;
        let path = self.frame_path(self.written);
        frame
            .image
            .save(&path)
            .with_context(|| format!("write frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let manifest = SequenceManifest {
            width: self.meta.width,
            height: self.meta.height,
            fps: self.meta.fps,
            frames: self.written,
        };
        let path = self.dir.join(MANIFEST_FILE);
        let raw = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(&path, raw).with_context(|| format!("write manifest {}", path.display()))?;
        log::info!(
            "wrote {} frames to {} ({}x{} @ {} fps)",
            self.written,
            self.dir.display(),
            manifest.width,
            manifest.height,
            manifest.fps
        );
        Ok(())
    }
}

/// Keeps frames in memory.
#[derive(Default)]
pub struct MemorySink {
    meta: Option<VideoMeta>,
    frames: Vec<Frame>,
    finished: bool,
}

impl MemorySink {
    pub fn new(meta: VideoMeta) -> Self {
        Self {
            meta: Some(meta),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(anyhow!("sink already finished"));
        }
        if let Some(meta) = &self.meta {
            meta.check_frame(frame)?;
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

//! Frame ingestion sources.
//!
//! A source yields decoded frames in stream order together with the stream's
//! resolution and frame rate. Only local inputs are accepted:
//! - a directory of numbered PNG/JPEG frames
//! - `stub://WIDTHxHEIGHT/COUNT`, a synthetic stream for tests and dry runs

use anyhow::Result;

use crate::frame::{Frame, VideoMeta};

pub mod file;

pub use file::{FileConfig, FileSource, FileStats};

/// A stream of frames.
pub trait FrameSource {
    /// Open the underlying input. Must be called before `meta` or `next_frame`.
    fn connect(&mut self) -> Result<()>;

    /// Resolution and frame rate of the stream.
    fn meta(&self) -> Result<VideoMeta>;

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

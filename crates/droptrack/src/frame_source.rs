//! Frame sources: decoded raster frames plus a frame rate.
//!
//! The pipeline only consumes the [`FrameSource`] trait. Three
//! implementations ship with the crate:
//! - [`FfmpegSource`] decodes a video container through `ffmpeg`/`ffprobe`.
//! - [`ImageSequenceSource`] walks a directory of still images.
//! - [`VecFrameSource`] serves frames already held in memory.

use std::collections::VecDeque;
use std::path::PathBuf;

use image::DynamicImage;

mod ffmpeg;
mod sequence;

pub use ffmpeg::{FfmpegConfig, FfmpegSource};
pub use sequence::ImageSequenceSource;

/// One decoded raster image.
pub type Frame = DynamicImage;

/// Errors raised while opening or reading a frame source.
#[derive(Debug)]
pub enum FrameSourceError {
    /// The input could not be opened (missing file, decoder unavailable, ...).
    Open { path: PathBuf, reason: String },
    /// The reported frame rate is missing, non-finite or not positive.
    InvalidFrameRate(f64),
    /// A frame could not be decoded.
    Decode { frame_index: usize, reason: String },
    /// Underlying I/O failure.
    Io(std::io::Error),
}

impl std::fmt::Display for FrameSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { path, reason } => {
                write!(f, "cannot open {}: {}", path.display(), reason)
            }
            Self::InvalidFrameRate(fps) => write!(f, "invalid frame rate: {}", fps),
            Self::Decode {
                frame_index,
                reason,
            } => write!(f, "failed to decode frame {}: {}", frame_index, reason),
            Self::Io(e) => write!(f, "frame source i/o error: {}", e),
        }
    }
}

impl std::error::Error for FrameSourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FrameSourceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// An ordered stream of frames at a fixed, reported frame rate.
pub trait FrameSource {
    /// Frames per second reported by the source.
    fn fps(&self) -> f64;

    /// Next frame in presentation order, or `None` once exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;

    /// Total number of frames if the source knows it up front.
    fn frame_count_hint(&self) -> Option<usize> {
        None
    }
}

/// Check that a reported frame rate can be used to derive timestamps.
pub fn validate_fps(fps: f64) -> Result<f64, FrameSourceError> {
    if fps.is_finite() && fps > 0.0 {
        Ok(fps)
    } else {
        Err(FrameSourceError::InvalidFrameRate(fps))
    }
}

/// In-memory frame source.
#[derive(Debug, Clone)]
pub struct VecFrameSource {
    frames: VecDeque<Frame>,
    fps: f64,
    total: usize,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let total = frames.len();
        Self {
            frames: frames.into(),
            fps,
            total,
        }
    }
}

impl FrameSource for VecFrameSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        Ok(self.frames.pop_front())
    }

    fn frame_count_hint(&self) -> Option<usize> {
        Some(self.total)
    }
}

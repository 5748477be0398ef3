use std::path::{Path, PathBuf};

use super::{validate_fps, Frame, FrameSource, FrameSourceError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Directory of still images played back at a caller-supplied frame rate.
///
/// Frames are ordered by file name, so zero-padded names (`frame_0001.png`)
/// sort in presentation order.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    fps: f64,
    next_index: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, FrameSourceError> {
        let fps = validate_fps(fps)?;
        let entries = std::fs::read_dir(dir).map_err(|e| FrameSourceError::Open {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(FrameSourceError::Open {
                path: dir.to_path_buf(),
                reason: "directory contains no images".to_string(),
            });
        }
        tracing::debug!("image sequence {}: {} frames", dir.display(), paths.len());

        Ok(Self {
            paths,
            fps,
            next_index: 0,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let Some(path) = self.paths.get(self.next_index) else {
            return Ok(None);
        };
        let frame = image::open(path).map_err(|e| FrameSourceError::Decode {
            frame_index: self.next_index,
            reason: format!("{}: {}", path.display(), e),
        })?;
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn frame_count_hint(&self) -> Option<usize> {
        Some(self.paths.len())
    }
}

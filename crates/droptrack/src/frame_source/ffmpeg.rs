//! Video decoding through `ffprobe` (stream metadata) and `ffmpeg`
//! (raw RGB24 frames on stdout).

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::{DynamicImage, RgbImage};

use super::{validate_fps, Frame, FrameSource, FrameSourceError};

/// Locations of the external decoder binaries.
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, serde::Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    nb_frames: Option<String>,
}

/// Parse an ffprobe rational such as `30000/1001` or `25/1`.
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Video stream decoded by an `ffmpeg` child process.
///
/// The child is killed and reaped on drop, so the stream handle is released
/// on every exit path of the caller.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    frame_count: Option<usize>,
    next_index: usize,
}

impl FfmpegSource {
    /// Open `path` with the default binaries found on `PATH`.
    pub fn open(path: &Path) -> Result<Self, FrameSourceError> {
        Self::open_with(path, &FfmpegConfig::default())
    }

    pub fn open_with(path: &Path, config: &FfmpegConfig) -> Result<Self, FrameSourceError> {
        if !path.is_file() {
            return Err(FrameSourceError::Open {
                path: path.to_path_buf(),
                reason: "no such file".to_string(),
            });
        }

        let stream = probe(path, config)?;
        let rate = stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_rate)
            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
            .unwrap_or(0.0);
        let fps = validate_fps(rate)?;
        if stream.width == 0 || stream.height == 0 {
            return Err(FrameSourceError::Open {
                path: path.to_path_buf(),
                reason: format!("invalid frame size {}x{}", stream.width, stream.height),
            });
        }

        let mut child = Command::new(&config.ffmpeg)
            .arg("-v")
            .arg("error")
            .arg("-nostdin")
            .arg("-i")
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FrameSourceError::Open {
                path: path.to_path_buf(),
                reason: format!("failed to run `{}`: {}", config.ffmpeg.display(), e),
            })?;
        let stdout = child.stdout.take();

        tracing::debug!(
            "ffmpeg stream {}: {}x{} @ {:.3} fps",
            path.display(),
            stream.width,
            stream.height,
            fps
        );

        Ok(Self {
            path: path.to_path_buf(),
            child: Some(child),
            stdout,
            width: stream.width,
            height: stream.height,
            fps,
            frame_count: stream.nb_frames.and_then(|n| n.parse().ok()),
            next_index: 0,
        })
    }

    /// Frame dimensions `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reap the decoder once stdout is exhausted and surface a failed exit.
    fn finish(&mut self) -> Result<(), FrameSourceError> {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            if !status.success() {
                return Err(FrameSourceError::Decode {
                    frame_index: self.next_index,
                    reason: format!("ffmpeg exited with {} for {}", status, self.path.display()),
                });
            }
        }
        Ok(())
    }
}

fn probe(path: &Path, config: &FfmpegConfig) -> Result<ProbeStream, FrameSourceError> {
    let output = Command::new(&config.ffprobe)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args([
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| FrameSourceError::Open {
            path: path.to_path_buf(),
            reason: format!("failed to run `{}`: {}", config.ffprobe.display(), e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FrameSourceError::Open {
            path: path.to_path_buf(),
            reason: format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
        });
    }

    let parsed: ProbeOutput =
        serde_json::from_slice(&output.stdout).map_err(|e| FrameSourceError::Open {
            path: path.to_path_buf(),
            reason: format!("unreadable ffprobe output: {}", e),
        })?;
    parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| FrameSourceError::Open {
            path: path.to_path_buf(),
            reason: "no video stream".to_string(),
        })
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl FrameSource for FfmpegSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let frame_len = self.width as usize * self.height as usize * 3;
        let mut buf = vec![0u8; frame_len];
        let n = read_full(stdout, &mut buf)?;
        if n == 0 {
            self.finish()?;
            return Ok(None);
        }
        if n < frame_len {
            let frame_index = self.next_index;
            self.finish()?;
            return Err(FrameSourceError::Decode {
                frame_index,
                reason: format!("truncated frame: {} of {} bytes", n, frame_len),
            });
        }

        let img = RgbImage::from_raw(self.width, self.height, buf).ok_or_else(|| {
            FrameSourceError::Decode {
                frame_index: self.next_index,
                reason: "raw buffer does not match frame size".to_string(),
            }
        })?;
        self.next_index += 1;
        Ok(Some(DynamicImage::ImageRgb8(img)))
    }

    fn frame_count_hint(&self) -> Option<usize> {
        self.frame_count
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

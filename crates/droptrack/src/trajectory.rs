//! Time/position series accumulated over one analysis run.

/// How sample timestamps are derived from the frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// `n / fps`, where `n` is the 1-based count of frames with a detection.
    /// Frames without a detection do not advance the clock.
    #[default]
    DetectionOrdinal,
    /// `(frame_index + 1) / fps`, the frame's position in the source video.
    FrameIndex,
}

/// Trajectory construction options.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    pub timestamps: TimestampMode,
}

/// One located droplet position.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sample {
    /// Index of the source frame (0-based, counting skipped frames).
    pub frame_index: usize,
    /// Seconds.
    pub time: f64,
    /// Vertical position in pixels.
    pub position: f64,
}

/// Ordered samples of one run, in frame order.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    /// Wrap samples that are already in temporal order.
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Build a trajectory from parallel time/position series.
    ///
    /// Frame indices are assigned sequentially.
    pub fn from_series(times: &[f64], positions: &[f64]) -> Self {
        let samples = times
            .iter()
            .zip(positions)
            .enumerate()
            .map(|(frame_index, (&time, &position))| Sample {
                frame_index,
                time,
                position,
            })
            .collect();
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn positions(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.position).collect()
    }
}

/// Accumulates one sample per frame with a detection.
#[derive(Debug, Clone)]
pub struct TrajectoryBuilder {
    fps: f64,
    mode: TimestampMode,
    samples: Vec<Sample>,
}

impl TrajectoryBuilder {
    /// `fps` must be finite and positive (see [`crate::frame_source::validate_fps`]).
    pub fn new(fps: f64, mode: TimestampMode) -> Self {
        debug_assert!(fps.is_finite() && fps > 0.0, "fps must be validated");
        Self {
            fps,
            mode,
            samples: Vec::new(),
        }
    }

    /// Record the droplet position located in frame `frame_index`.
    pub fn push(&mut self, frame_index: usize, position: f64) -> &Sample {
        let tick = match self.mode {
            TimestampMode::DetectionOrdinal => self.samples.len() + 1,
            TimestampMode::FrameIndex => frame_index + 1,
        };
        self.samples.push(Sample {
            frame_index,
            time: tick as f64 / self.fps,
            position,
        });
        &self.samples[self.samples.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn finish(self) -> Trajectory {
        Trajectory {
            samples: self.samples,
        }
    }
}

//! droptrack — droplet trajectory extraction and decay-model fitting.
//!
//! Measures the vertical motion of a falling droplet in a video and writes a
//! table for plotting. The pipeline stages are:
//!
//! 1. **Frame source** – decoded frames plus the reported frame rate.
//! 2. **Locator** – luminance, fixed global threshold, external contours;
//!    the largest region's bounding-box center is the droplet position.
//! 3. **Trajectory** – one timestamped sample per frame with a detection.
//! 4. **Kinematics** – velocity and acceleration by numerical gradient.
//! 5. **Decay fit** – `a·exp(−b·t) + c` by Levenberg–Marquardt.
//! 6. **Output** – CSV table `Time,Distance,Velocity,Acceleration,FittedCurve`.
//!
//! # Public API
//! - [`Analyzer`] and [`AnalysisConfig`] as primary entry points
//! - [`analyze`] / [`analyze_video`] for the one-call path → table use case
//! - the stage functions ([`locate_droplet`], [`kinematics::gradient`],
//!   [`fit_decay`]) for callers that bring their own series

mod api;
pub mod fit;
pub mod frame_source;
pub mod kinematics;
pub mod locator;
mod observer;
pub mod output;
mod pipeline;
pub mod trajectory;

#[cfg(test)]
pub(crate) mod test_utils;

use std::path::Path;

pub use api::Analyzer;
pub use fit::{fit_decay, DecayFit, DecayParameters, FitConfig, FitError};
pub use frame_source::{
    FfmpegSource, Frame, FrameSource, FrameSourceError, ImageSequenceSource, VecFrameSource,
};
pub use kinematics::{GradientScheme, KinematicSeries, KinematicsConfig, KinematicsError};
pub use locator::{locate_droplet, BoundingBox, Detection, LocatorConfig, ThresholdPolarity};
pub use observer::{AnalysisObserver, NoopObserver, TracingObserver};
pub use output::{OutputError, OutputRecord};
pub use pipeline::{
    AnalysisConfig, AnalysisError, AnalysisErrorKind, AnalysisOutcome, AnalysisReport,
    ConfigError, PipelineStage,
};
pub use trajectory::{Sample, TimestampMode, Trajectory, TrajectoryConfig};

/// Analyze `video_path` with default settings and write the table to
/// `output_path`.
pub fn analyze_video(video_path: &Path, output_path: &Path) -> Result<AnalysisReport, AnalysisError> {
    Analyzer::default().run_video(video_path, output_path)
}

/// Boolean form of [`analyze_video`]: `true` when the table was written.
///
/// Failures are logged through `tracing`; use [`analyze_video`] to inspect
/// the cause.
pub fn analyze(video_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> bool {
    analyze_video(video_path.as_ref(), output_path.as_ref()).is_ok()
}

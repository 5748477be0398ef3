//! High-level analysis API.
//!
//! [`Analyzer`] is the primary entry point. It wraps an [`AnalysisConfig`]
//! and runs the pipeline over a video file, an image sequence or any other
//! [`FrameSource`].

use std::path::Path;

use crate::frame_source::{FfmpegSource, FrameSource, ImageSequenceSource};
use crate::observer::{AnalysisObserver, NoopObserver};
use crate::pipeline::{
    self, AnalysisConfig, AnalysisError, AnalysisOutcome, AnalysisReport, PipelineStage,
};
use crate::trajectory::Trajectory;

/// Primary analysis interface.
///
/// Create once, analyze many recordings.
///
/// # Examples
///
/// ```no_run
/// use droptrack::Analyzer;
/// use std::path::Path;
///
/// let analyzer = Analyzer::default();
/// let report = analyzer
///     .run_video(Path::new("droplet_video.mp4"), Path::new("droplet_data.csv"))
///     .unwrap();
/// println!("{} rows, b = {:.3}", report.rows, report.params.b);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with full config control.
    pub fn with_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut AnalysisConfig {
        &mut self.config
    }

    /// Streaming stage only: locate the droplet in every frame and return
    /// the trajectory together with the number of frames read.
    pub fn track(&self, source: &mut dyn FrameSource) -> Result<(Trajectory, usize), AnalysisError> {
        pipeline::track_source(source, &self.config, &mut NoopObserver)
    }

    /// Run every stage except writing the table.
    pub fn analyze(&self, source: &mut dyn FrameSource) -> Result<AnalysisOutcome, AnalysisError> {
        self.analyze_with_observer(source, &mut NoopObserver)
    }

    pub fn analyze_with_observer(
        &self,
        source: &mut dyn FrameSource,
        observer: &mut dyn AnalysisObserver,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        pipeline::analyze_source(source, &self.config, observer)
    }

    /// Full run over `source`, writing the result table to `output`.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        output: &Path,
    ) -> Result<AnalysisReport, AnalysisError> {
        self.run_with_observer(source, output, &mut NoopObserver)
    }

    pub fn run_with_observer(
        &self,
        source: &mut dyn FrameSource,
        output: &Path,
        observer: &mut dyn AnalysisObserver,
    ) -> Result<AnalysisReport, AnalysisError> {
        pipeline::run(source, output, &self.config, observer)
    }

    /// Decode `video` with ffmpeg and run the full pipeline.
    ///
    /// The decoder is shut down before this returns, whatever the outcome.
    pub fn run_video(&self, video: &Path, output: &Path) -> Result<AnalysisReport, AnalysisError> {
        self.run_video_with_observer(video, output, &mut NoopObserver)
    }

    pub fn run_video_with_observer(
        &self,
        video: &Path,
        output: &Path,
        observer: &mut dyn AnalysisObserver,
    ) -> Result<AnalysisReport, AnalysisError> {
        tracing::info!("Opening video: {}", video.display());
        let mut source = open_or_fail(FfmpegSource::open(video), observer)?;
        self.run_with_observer(&mut source, output, observer)
    }

    /// Run the full pipeline over a directory of frames at `fps`.
    pub fn run_image_sequence(
        &self,
        dir: &Path,
        fps: f64,
        output: &Path,
        observer: &mut dyn AnalysisObserver,
    ) -> Result<AnalysisReport, AnalysisError> {
        tracing::info!("Opening image sequence: {}", dir.display());
        let mut source = open_or_fail(ImageSequenceSource::open(dir, fps), observer)?;
        self.run_with_observer(&mut source, output, observer)
    }
}

/// A source that cannot be opened fails the run before streaming starts.
fn open_or_fail<S: FrameSource>(
    opened: Result<S, crate::frame_source::FrameSourceError>,
    observer: &mut dyn AnalysisObserver,
) -> Result<S, AnalysisError> {
    opened.map_err(|e| {
        observer.on_stage(PipelineStage::Init);
        observer.on_stage(PipelineStage::Failed);
        tracing::error!("analysis failed during {}: {}", PipelineStage::Init, e);
        AnalysisError::new(PipelineStage::Init, e)
    })
}

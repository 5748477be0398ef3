//! Stage sequencing for one run.

use std::path::Path;

use super::{
    AnalysisConfig, AnalysisError, AnalysisErrorKind, AnalysisOutcome, AnalysisReport,
    PipelineStage,
};
use crate::fit::{fit_decay, MIN_FIT_SAMPLES};
use crate::frame_source::{validate_fps, FrameSource};
use crate::kinematics;
use crate::locator::locate_droplet;
use crate::observer::AnalysisObserver;
use crate::output::{build_records, write_table};
use crate::trajectory::{TimestampMode, Trajectory, TrajectoryBuilder};

/// Tracks the current stage and reports transitions to the observer.
struct StageTracker<'a> {
    stage: PipelineStage,
    observer: &'a mut dyn AnalysisObserver,
}

impl<'a> StageTracker<'a> {
    fn new(observer: &'a mut dyn AnalysisObserver) -> Self {
        observer.on_stage(PipelineStage::Init);
        Self {
            stage: PipelineStage::Init,
            observer,
        }
    }

    fn enter(&mut self, next: PipelineStage) {
        tracing::trace!("pipeline {} -> {}", self.stage, next);
        self.stage = next;
        self.observer.on_stage(next);
    }

    /// Close out a failed run: the error keeps the stage that was active.
    fn fail(&mut self, kind: AnalysisErrorKind) -> AnalysisError {
        let stage = self.stage;
        self.enter(PipelineStage::Failed);
        tracing::error!("analysis failed during {}: {}", stage, kind);
        AnalysisError::new(stage, kind)
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Read the source to exhaustion, locating the droplet in every frame.
///
/// Returns the trajectory and the number of frames read.
fn stream(
    source: &mut dyn FrameSource,
    fps: f64,
    config: &AnalysisConfig,
    tracker: &mut StageTracker<'_>,
) -> Result<(Trajectory, usize), AnalysisErrorKind> {
    let mut builder = TrajectoryBuilder::new(fps, config.trajectory.timestamps);
    let mut frame_index = 0usize;

    while let Some(frame) = source.next_frame()? {
        let detection = locate_droplet(&frame, &config.locator);
        drop(frame);
        if let Some(d) = &detection {
            builder.push(frame_index, d.center_y);
        }
        tracker.observer.on_frame(frame_index, detection.as_ref());
        frame_index += 1;
    }

    Ok((builder.finish(), frame_index))
}

fn analyze_stages(
    source: &mut dyn FrameSource,
    config: &AnalysisConfig,
    tracker: &mut StageTracker<'_>,
) -> Result<AnalysisOutcome, AnalysisErrorKind> {
    let fps = validate_fps(source.fps())?;
    match source.frame_count_hint() {
        Some(n) => tracing::info!("Analyzing {} frames at {:.3} fps", n, fps),
        None => tracing::info!("Analyzing video at {:.3} fps", fps),
    }

    tracker.enter(PipelineStage::Streaming);
    let (trajectory, frames_total) = stream(source, fps, config, tracker)?;

    tracker.enter(PipelineStage::SeriesComplete);
    let skipped = frames_total - trajectory.len();
    tracing::info!(
        "Droplet found in {} of {} frames",
        trajectory.len(),
        frames_total
    );
    if skipped > 0 && config.trajectory.timestamps == TimestampMode::DetectionOrdinal {
        tracing::warn!(
            "{} frames without a droplet; timestamps count detections only",
            skipped
        );
    }
    if trajectory.len() < MIN_FIT_SAMPLES {
        return Err(AnalysisErrorKind::InsufficientSamples {
            needed: MIN_FIT_SAMPLES,
            got: trajectory.len(),
        });
    }

    let kinematics = kinematics::estimate(&trajectory, &config.kinematics)?;
    let times = trajectory.times();
    let positions = trajectory.positions();
    let fit = fit_decay(&times, &positions, &config.fit)?;
    let records = build_records(&trajectory, &kinematics, &fit)?;
    tracker.observer.on_fit(&trajectory, &fit);
    tracing::info!(
        "Decay fit: a={:.4} b={:.4} c={:.4} (rmse {:.3} px)",
        fit.params.a,
        fit.params.b,
        fit.params.c,
        fit.rmse
    );
    tracker.enter(PipelineStage::Fitted);

    Ok(AnalysisOutcome {
        trajectory,
        kinematics,
        fit,
        records,
        frames_total,
        fps,
    })
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Streaming stage only: the trajectory and the number of frames read.
pub(crate) fn track_source(
    source: &mut dyn FrameSource,
    config: &AnalysisConfig,
    observer: &mut dyn AnalysisObserver,
) -> Result<(Trajectory, usize), AnalysisError> {
    let mut tracker = StageTracker::new(observer);
    let tracked = validate_fps(source.fps())
        .map_err(AnalysisErrorKind::from)
        .and_then(|fps| {
            tracker.enter(PipelineStage::Streaming);
            stream(source, fps, config, &mut tracker)
        });
    match tracked {
        Ok(t) => {
            tracker.enter(PipelineStage::SeriesComplete);
            Ok(t)
        }
        Err(kind) => Err(tracker.fail(kind)),
    }
}

/// Run every stage except serialization.
pub(crate) fn analyze_source(
    source: &mut dyn FrameSource,
    config: &AnalysisConfig,
    observer: &mut dyn AnalysisObserver,
) -> Result<AnalysisOutcome, AnalysisError> {
    let mut tracker = StageTracker::new(observer);
    analyze_stages(source, config, &mut tracker).map_err(|kind| tracker.fail(kind))
}

/// Full run: analyze `source` and write the result table to `output`.
pub(crate) fn run(
    source: &mut dyn FrameSource,
    output: &Path,
    config: &AnalysisConfig,
    observer: &mut dyn AnalysisObserver,
) -> Result<AnalysisReport, AnalysisError> {
    let mut tracker = StageTracker::new(observer);
    let outcome = analyze_stages(source, config, &mut tracker).map_err(|kind| tracker.fail(kind))?;

    if let Err(e) = write_table(output, &outcome.records) {
        return Err(tracker.fail(e.into()));
    }
    tracker.enter(PipelineStage::Serialized);
    tracing::info!(
        "Wrote {} rows to {}",
        outcome.records.len(),
        output.display()
    );
    Ok(outcome.report(output))
}

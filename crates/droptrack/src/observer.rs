//! Reporting hook called by the pipeline at stage transitions, per frame and
//! after fitting. Plotting, progress bars or debug dumps plug in here.

use crate::fit::DecayFit;
use crate::locator::Detection;
use crate::pipeline::PipelineStage;
use crate::trajectory::Trajectory;

pub trait AnalysisObserver {
    /// The pipeline entered `stage`.
    fn on_stage(&mut self, _stage: PipelineStage) {}

    /// Frame `frame_index` was processed; `detection` is `None` when skipped.
    fn on_frame(&mut self, _frame_index: usize, _detection: Option<&Detection>) {}

    /// The decay model was fitted to `trajectory`.
    fn on_fit(&mut self, _trajectory: &Trajectory, _fit: &DecayFit) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AnalysisObserver for NoopObserver {}

/// Logs events through `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AnalysisObserver for TracingObserver {
    fn on_stage(&mut self, stage: PipelineStage) {
        tracing::debug!("stage -> {}", stage);
    }

    fn on_frame(&mut self, frame_index: usize, detection: Option<&Detection>) {
        match detection {
            Some(d) => tracing::debug!(
                "frame {}: droplet at y={:.1} (bbox {}x{} at {},{}; area {:.1})",
                frame_index,
                d.center_y,
                d.bbox.width,
                d.bbox.height,
                d.bbox.x,
                d.bbox.y,
                d.area
            ),
            None => tracing::debug!("frame {}: no droplet", frame_index),
        }
    }

    fn on_fit(&mut self, trajectory: &Trajectory, fit: &DecayFit) {
        tracing::debug!(
            "fit over {} samples: a={:.4} b={:.4} c={:.4} rmse={:.4}",
            trajectory.len(),
            fit.params.a,
            fit.params.b,
            fit.params.c,
            fit.rmse
        );
    }
}

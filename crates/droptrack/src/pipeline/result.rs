use std::path::{Path, PathBuf};

use super::PipelineStage;
use crate::fit::{DecayFit, DecayParameters, FitError};
use crate::frame_source::FrameSourceError;
use crate::kinematics::{KinematicSeries, KinematicsError};
use crate::output::{OutputError, OutputRecord};
use crate::trajectory::Trajectory;

/// Everything computed by a run, before serialization.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub trajectory: Trajectory,
    pub kinematics: KinematicSeries,
    pub fit: DecayFit,
    /// One row per trajectory sample.
    pub records: Vec<OutputRecord>,
    /// Frames read from the source, including those without a detection.
    pub frames_total: usize,
    pub fps: f64,
}

impl AnalysisOutcome {
    pub fn report(&self, output: &Path) -> AnalysisReport {
        AnalysisReport {
            frames_total: self.frames_total,
            frames_detected: self.trajectory.len(),
            fps: self.fps,
            params: self.fit.params,
            cost: self.fit.cost,
            rmse: self.fit.rmse,
            rows: self.records.len(),
            output: output.to_path_buf(),
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisReport {
    pub frames_total: usize,
    pub frames_detected: usize,
    pub fps: f64,
    pub params: DecayParameters,
    pub cost: f64,
    pub rmse: f64,
    /// Rows written to the result table.
    pub rows: usize,
    pub output: PathBuf,
}

/// Cause of a failed run.
#[derive(Debug)]
pub enum AnalysisErrorKind {
    /// The source could not be opened or read.
    Source(FrameSourceError),
    /// Too few frames with a detection for differentiation and fitting.
    InsufficientSamples { needed: usize, got: usize },
    Kinematics(KinematicsError),
    Fit(FitError),
    Output(OutputError),
}

impl std::fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(e) => write!(f, "frame source: {}", e),
            Self::InsufficientSamples { needed, got } => write!(
                f,
                "insufficient samples: droplet found in {} frames, need at least {}",
                got, needed
            ),
            Self::Kinematics(e) => write!(f, "kinematics: {}", e),
            Self::Fit(e) => write!(f, "decay fit: {}", e),
            Self::Output(e) => write!(f, "output: {}", e),
        }
    }
}

impl From<FrameSourceError> for AnalysisErrorKind {
    fn from(e: FrameSourceError) -> Self {
        Self::Source(e)
    }
}

impl From<KinematicsError> for AnalysisErrorKind {
    fn from(e: KinematicsError) -> Self {
        Self::Kinematics(e)
    }
}

impl From<FitError> for AnalysisErrorKind {
    fn from(e: FitError) -> Self {
        Self::Fit(e)
    }
}

impl From<OutputError> for AnalysisErrorKind {
    fn from(e: OutputError) -> Self {
        Self::Output(e)
    }
}

/// A failed run: the stage that was active and what went wrong.
#[derive(Debug)]
pub struct AnalysisError {
    pub stage: PipelineStage,
    pub kind: AnalysisErrorKind,
}

impl AnalysisError {
    pub fn new(stage: PipelineStage, kind: impl Into<AnalysisErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "analysis failed during {}: {}", self.stage, self.kind)
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AnalysisErrorKind::Source(e) => Some(e),
            AnalysisErrorKind::Kinematics(e) => Some(e),
            AnalysisErrorKind::Fit(e) => Some(e),
            AnalysisErrorKind::Output(e) => Some(e),
            AnalysisErrorKind::InsufficientSamples { .. } => None,
        }
    }
}

//! Analysis pipeline.
//!
//! Wires the stages together for one run:
//! frame source -> locator (per frame) -> trajectory -> kinematics -> decay fit
//! -> result table.
//!
//! A run moves through [`PipelineStage`]s in order; any error moves it to
//! [`PipelineStage::Failed`] and nothing is written. Algorithmic primitives
//! live in `crate::locator`, `crate::kinematics` and `crate::fit`; this
//! layer owns stage boundaries, call order and error attribution.

mod result;
mod run;

pub use result::{AnalysisError, AnalysisErrorKind, AnalysisOutcome, AnalysisReport};

pub(crate) use run::{analyze_source, run, track_source};

use std::path::{Path, PathBuf};

use crate::fit::FitConfig;
use crate::kinematics::KinematicsConfig;
use crate::locator::LocatorConfig;
use crate::trajectory::TrajectoryConfig;

/// Run state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Created, source not yet validated.
    Init,
    /// Reading frames and accumulating samples.
    Streaming,
    /// Source exhausted; the trajectory is final.
    SeriesComplete,
    /// Kinematics and decay fit succeeded.
    Fitted,
    /// The result table is on disk.
    Serialized,
    /// Terminal failure.
    Failed,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Streaming => "streaming",
            Self::SeriesComplete => "series-complete",
            Self::Fitted => "fitted",
            Self::Serialized => "serialized",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Top-level configuration of one analysis run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub locator: LocatorConfig,
    pub trajectory: TrajectoryConfig,
    pub kinematics: KinematicsConfig,
    pub fit: FitConfig,
}

impl AnalysisConfig {
    /// Load a (possibly partial) JSON configuration; missing fields keep
    /// their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Errors from loading an [`AnalysisConfig`] file.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {}", path.display(), source),
            Self::Json { path, source } => {
                write!(f, "invalid config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests;

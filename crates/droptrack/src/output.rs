//! Result table and run summary serialization.
//!
//! Files are written to a temporary sibling and renamed into place only once
//! complete, so a failed run never leaves a partial table at the target path.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::fit::DecayFit;
use crate::kinematics::KinematicSeries;
use crate::trajectory::Trajectory;

/// Column names of the result table, in order.
pub const TABLE_HEADER: [&str; 5] = ["Time", "Distance", "Velocity", "Acceleration", "FittedCurve"];

/// One row of the result table.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutputRecord {
    #[serde(rename = "Time")]
    pub time: f64,
    #[serde(rename = "Distance")]
    pub distance: f64,
    #[serde(rename = "Velocity")]
    pub velocity: f64,
    #[serde(rename = "Acceleration")]
    pub acceleration: f64,
    #[serde(rename = "FittedCurve")]
    pub fitted_distance: f64,
}

#[derive(Debug)]
pub enum OutputError {
    /// Per-sample series do not all have the trajectory's length.
    LengthMismatch { expected: usize, got: usize },
    Io { path: PathBuf, source: std::io::Error },
    Csv(csv::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { expected, got } => write!(
                f,
                "series length mismatch: expected {} rows, got {}",
                expected, got
            ),
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Csv(e) => write!(f, "csv error: {}", e),
            Self::Json(e) => write!(f, "json error: {}", e),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::LengthMismatch { .. } => None,
        }
    }
}

impl From<csv::Error> for OutputError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<serde_json::Error> for OutputError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Zip the per-sample series into table rows.
pub fn build_records(
    trajectory: &Trajectory,
    kinematics: &KinematicSeries,
    fit: &DecayFit,
) -> Result<Vec<OutputRecord>, OutputError> {
    let n = trajectory.len();
    for got in [kinematics.velocity.len(), kinematics.acceleration.len()] {
        if got != n {
            return Err(OutputError::LengthMismatch { expected: n, got });
        }
    }

    let records = trajectory
        .samples()
        .iter()
        .zip(&kinematics.velocity)
        .zip(&kinematics.acceleration)
        .map(|((s, &velocity), &acceleration)| OutputRecord {
            time: s.time,
            distance: s.position,
            velocity,
            acceleration,
            fitted_distance: fit.params.evaluate(s.time),
        })
        .collect();
    Ok(records)
}

/// Write `contents` via a temporary file in the target directory, then
/// atomically move it to `path`.
fn persist_atomically(
    path: &Path,
    contents: impl FnOnce(&mut std::fs::File) -> Result<(), OutputError>,
) -> Result<(), OutputError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err(dir))?;
    contents(tmp.as_file_mut())?;
    tmp.as_file_mut().flush().map_err(io_err(path))?;
    tmp.as_file().sync_all().map_err(io_err(path))?;
    tmp.persist(path).map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Write the result table as CSV with the [`TABLE_HEADER`] header row.
pub fn write_table(path: &Path, records: &[OutputRecord]) -> Result<(), OutputError> {
    persist_atomically(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        if records.is_empty() {
            writer.write_record(TABLE_HEADER)?;
        }
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush().map_err(io_err(path))?;
        Ok(())
    })?;
    tracing::debug!("wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Read a result table previously written by [`write_table`].
pub fn read_table(path: &Path) -> Result<Vec<OutputRecord>, OutputError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Write any serializable run summary as pretty JSON.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(value)?;
    persist_atomically(path, |file| {
        file.write_all(json.as_bytes()).map_err(io_err(path))?;
        file.write_all(b"\n").map_err(io_err(path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::DecayParameters;

    fn sample_fit() -> DecayFit {
        DecayFit {
            params: DecayParameters::new(-10.0, 1.0, 20.0),
            cost: 0.0,
            rmse: 0.0,
        }
    }

    #[test]
    fn records_align_with_trajectory() {
        let traj = Trajectory::from_series(&[0.1, 0.2, 0.3], &[11.0, 12.0, 13.0]);
        let kin = KinematicSeries {
            velocity: vec![10.0, 10.0, 10.0],
            acceleration: vec![0.0, 0.0, 0.0],
        };
        let fit = sample_fit();
        let records = build_records(&traj, &kin, &fit).unwrap();
        assert_eq!(records.len(), traj.len());
        assert_eq!(records[1].time, 0.2);
        assert_eq!(records[1].distance, 12.0);
        assert_eq!(records[1].fitted_distance, fit.params.evaluate(0.2));
    }

    #[test]
    fn misaligned_series_are_rejected() {
        let traj = Trajectory::from_series(&[0.1, 0.2, 0.3], &[11.0, 12.0, 13.0]);
        let kin = KinematicSeries {
            velocity: vec![10.0, 10.0],
            acceleration: vec![0.0, 0.0, 0.0],
        };
        let err = build_records(&traj, &kin, &sample_fit()).unwrap_err();
        assert!(matches!(
            err,
            OutputError::LengthMismatch {
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn table_has_header_and_one_row_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("droplet_data.csv");
        let records = vec![
            OutputRecord {
                time: 0.5,
                distance: 10.0,
                velocity: 2.0,
                acceleration: 0.0,
                fitted_distance: 10.5,
            },
            OutputRecord {
                time: 1.0,
                distance: 11.0,
                velocity: 2.0,
                acceleration: -0.25,
                fitted_distance: 11.0,
            },
        ];
        write_table(&path, &records).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Time,Distance,Velocity,Acceleration,FittedCurve")
        );
        assert_eq!(lines.next(), Some("0.5,10.0,2.0,0.0,10.5"));
        assert_eq!(lines.count(), 1);

        assert_eq!(read_table(&path).unwrap(), records);
    }

    #[test]
    fn empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_table(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), TABLE_HEADER.join(","));
    }

    #[test]
    fn unwritable_target_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = write_table(&path, &[]).unwrap_err();
        assert!(matches!(err, OutputError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn json_summary_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &sample_fit()).unwrap();
        let back: DecayFit =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, sample_fit());
    }
}

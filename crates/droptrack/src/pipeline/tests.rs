use approx::assert_relative_eq;

use super::*;
use crate::fit::DecayParameters;
use crate::frame_source::{Frame, FrameSource, FrameSourceError, VecFrameSource};
use crate::kinematics::{self, KinematicsConfig};
use crate::locator::Detection;
use crate::observer::{AnalysisObserver, NoopObserver};
use crate::output::read_table;
use crate::test_utils::droplet_frames;
use crate::trajectory::{TimestampMode, Trajectory};

const FPS: f64 = 30.0;
const W: u32 = 48;
const H: u32 = 200;

#[derive(Default)]
struct Recorder {
    stages: Vec<PipelineStage>,
    frames: Vec<(usize, bool)>,
    fits: usize,
}

impl AnalysisObserver for Recorder {
    fn on_stage(&mut self, stage: PipelineStage) {
        self.stages.push(stage);
    }

    fn on_frame(&mut self, frame_index: usize, detection: Option<&Detection>) {
        self.frames.push((frame_index, detection.is_some()));
    }

    fn on_fit(&mut self, _trajectory: &Trajectory, _fit: &crate::fit::DecayFit) {
        self.fits += 1;
    }
}

/// Yields `ok` frames, then a decode error.
struct FailingSource {
    inner: VecFrameSource,
    ok: usize,
    served: usize,
}

impl FrameSource for FailingSource {
    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        if self.served == self.ok {
            return Err(FrameSourceError::Decode {
                frame_index: self.served,
                reason: "corrupt packet".to_string(),
            });
        }
        self.served += 1;
        self.inner.next_frame()
    }
}

fn decay_truth() -> DecayParameters {
    DecayParameters::new(-120.0, 1.5, 150.0)
}

/// Droplet centers following the decay model at `n / fps`, n = 1, 2, ...
fn decay_centers(n: usize) -> Vec<Option<f64>> {
    let truth = decay_truth();
    (1..=n).map(|i| Some(truth.evaluate(i as f64 / FPS))).collect()
}

fn linear_centers() -> Vec<Option<f64>> {
    // 20x20 droplet whose center moves from y=10 to y=100.
    (0..10).map(|i| Some(10.0 + 10.0 * i as f64)).collect()
}

#[test]
fn linear_fall_scenario_produces_evenly_timed_samples() {
    let mut src = VecFrameSource::new(droplet_frames(W, 128, &linear_centers()), FPS);
    let (traj, total) = track_source(&mut src, &AnalysisConfig::default(), &mut NoopObserver).unwrap();

    assert_eq!(total, 10);
    assert_eq!(traj.len(), 10);
    let times = traj.times();
    for (i, t) in times.iter().enumerate() {
        assert_relative_eq!(*t, (i + 1) as f64 / FPS, max_relative = 1e-12);
    }
    assert!(times.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(traj.positions().first(), Some(&10.0));
    assert_eq!(traj.positions().last(), Some(&100.0));

    let k = kinematics::estimate(&traj, &KinematicsConfig::default()).unwrap();
    let expected = (100.0 - 10.0) / (9.0 / FPS);
    for v in &k.velocity {
        assert_relative_eq!(*v, expected, max_relative = 1e-9);
    }
}

#[test]
fn linear_fall_scenario_writes_full_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("droplet_data.csv");
    let mut src = VecFrameSource::new(droplet_frames(W, 128, &linear_centers()), FPS);

    let report = run(&mut src, &out, &AnalysisConfig::default(), &mut NoopObserver).unwrap();

    assert_eq!(report.rows, 10);
    let rows = read_table(&out).unwrap();
    assert_eq!(rows.len(), 10);
    for (i, row) in rows.iter().enumerate() {
        assert_relative_eq!(row.time, (i + 1) as f64 / FPS, max_relative = 1e-12);
        assert_eq!(row.distance, 10.0 + 10.0 * i as f64);
        assert_relative_eq!(row.velocity, 300.0, max_relative = 1e-9);
        assert!(row.fitted_distance.is_finite());
        assert!((row.fitted_distance - row.distance).abs() < 1.0);
    }
}

#[test]
fn full_run_writes_one_row_per_sample() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("droplet_data.csv");
    let mut src = VecFrameSource::new(droplet_frames(W, H, &decay_centers(45)), FPS);
    let mut rec = Recorder::default();

    let report = run(&mut src, &out, &AnalysisConfig::default(), &mut rec).unwrap();

    assert_eq!(report.frames_total, 45);
    assert_eq!(report.frames_detected, 45);
    assert_eq!(report.rows, 45);
    assert_eq!(report.output, out);
    assert_eq!(
        rec.stages,
        vec![
            PipelineStage::Init,
            PipelineStage::Streaming,
            PipelineStage::SeriesComplete,
            PipelineStage::Fitted,
            PipelineStage::Serialized,
        ]
    );
    assert_eq!(rec.frames.len(), 45);
    assert_eq!(rec.fits, 1);

    let rows = read_table(&out).unwrap();
    assert_eq!(rows.len(), 45);
    let truth = decay_truth();
    assert_relative_eq!(report.params.b, truth.b, max_relative = 0.1);
    assert_relative_eq!(report.params.c, truth.c, max_relative = 0.05);
    for (i, row) in rows.iter().enumerate() {
        assert_relative_eq!(row.time, (i + 1) as f64 / FPS, max_relative = 1e-12);
        // Pixel quantization keeps every sample within half a pixel.
        assert!((row.distance - truth.evaluate(row.time)).abs() <= 0.5 + 1e-9);
        assert!((row.fitted_distance - row.distance).abs() < 1.0);
        assert!(row.velocity >= 0.0, "droplet falls downward in image space");
    }
}

#[test]
fn frames_without_droplet_contribute_no_rows() {
    let mut centers = decay_centers(40);
    centers.insert(5, None);
    centers.insert(20, None);
    let mut src = VecFrameSource::new(droplet_frames(W, H, &centers), FPS);
    let mut rec = Recorder::default();

    let outcome = analyze_source(&mut src, &AnalysisConfig::default(), &mut rec).unwrap();

    assert_eq!(outcome.frames_total, 42);
    assert_eq!(outcome.trajectory.len(), 40);
    assert_eq!(outcome.records.len(), 40);
    assert_eq!(outcome.kinematics.len(), 40);
    assert_eq!(rec.frames.iter().filter(|(_, hit)| !hit).count(), 2);
    assert_eq!(rec.frames[5], (5, false));

    // Detection-ordinal clock: the frame after a gap keeps the next tick.
    let sample = outcome.trajectory.samples()[5];
    assert_eq!(sample.frame_index, 6);
    assert_relative_eq!(sample.time, 6.0 / FPS, max_relative = 1e-12);
}

#[test]
fn frame_index_clock_follows_video_time() {
    let centers = vec![Some(20.0), None, Some(40.0), Some(50.0), None, Some(60.0)];
    let mut src = VecFrameSource::new(droplet_frames(W, 96, &centers), FPS);
    let mut config = AnalysisConfig::default();
    config.trajectory.timestamps = TimestampMode::FrameIndex;

    let (traj, _) = track_source(&mut src, &config, &mut NoopObserver).unwrap();
    let ticks: Vec<f64> = traj.times().iter().map(|t| (t * FPS).round()).collect();
    assert_eq!(ticks, vec![1.0, 3.0, 4.0, 6.0]);
}

#[test]
fn single_detection_fails_with_insufficient_samples() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");
    let centers = vec![None, Some(50.0), None];
    let mut src = VecFrameSource::new(droplet_frames(W, H, &centers), FPS);
    let mut rec = Recorder::default();

    let err = run(&mut src, &out, &AnalysisConfig::default(), &mut rec).unwrap_err();

    assert_eq!(err.stage, PipelineStage::SeriesComplete);
    assert!(matches!(
        err.kind,
        AnalysisErrorKind::InsufficientSamples { needed: 3, got: 1 }
    ));
    assert_eq!(rec.stages.last(), Some(&PipelineStage::Failed));
    assert_eq!(rec.fits, 0);
    assert!(!out.exists());
}

#[test]
fn failed_run_keeps_previous_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");
    std::fs::write(&out, "previous").unwrap();
    let mut src = VecFrameSource::new(droplet_frames(W, H, &[None, None]), FPS);

    let err = run(&mut src, &out, &AnalysisConfig::default(), &mut NoopObserver).unwrap_err();

    assert!(matches!(
        err.kind,
        AnalysisErrorKind::InsufficientSamples { got: 0, .. }
    ));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "previous");
}

#[test]
fn static_droplet_has_zero_motion_and_exact_fit() {
    let centers = vec![Some(80.0); 8];
    let mut src = VecFrameSource::new(droplet_frames(W, H, &centers), FPS);
    let outcome = analyze_source(&mut src, &AnalysisConfig::default(), &mut NoopObserver).unwrap();
    for r in &outcome.records {
        assert_eq!(r.velocity, 0.0);
        assert_eq!(r.acceleration, 0.0);
        assert_eq!(r.fitted_distance, 80.0);
    }
}

#[test]
fn source_error_mid_stream_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");
    let mut src = FailingSource {
        inner: VecFrameSource::new(droplet_frames(W, H, &decay_centers(10)), FPS),
        ok: 4,
        served: 0,
    };
    let mut rec = Recorder::default();

    let err = run(&mut src, &out, &AnalysisConfig::default(), &mut rec).unwrap_err();

    assert_eq!(err.stage, PipelineStage::Streaming);
    assert!(matches!(
        err.kind,
        AnalysisErrorKind::Source(FrameSourceError::Decode { frame_index: 4, .. })
    ));
    assert_eq!(rec.frames.len(), 4);
    assert!(!out.exists());
}

#[test]
fn invalid_frame_rate_fails_before_streaming() {
    let mut src = VecFrameSource::new(droplet_frames(W, H, &decay_centers(5)), 0.0);
    let mut rec = Recorder::default();
    let err = analyze_source(&mut src, &AnalysisConfig::default(), &mut rec).unwrap_err();
    assert_eq!(err.stage, PipelineStage::Init);
    assert!(matches!(
        err.kind,
        AnalysisErrorKind::Source(FrameSourceError::InvalidFrameRate(_))
    ));
    assert_eq!(rec.stages, vec![PipelineStage::Init, PipelineStage::Failed]);
}

#[test]
fn unwritable_output_fails_after_fitting() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("no_such_dir").join("out.csv");
    let mut src = VecFrameSource::new(droplet_frames(W, H, &decay_centers(30)), FPS);
    let mut rec = Recorder::default();

    let err = run(&mut src, &out, &AnalysisConfig::default(), &mut rec).unwrap_err();

    assert_eq!(err.stage, PipelineStage::Fitted);
    assert!(matches!(err.kind, AnalysisErrorKind::Output(_)));
    assert_eq!(rec.stages.last(), Some(&PipelineStage::Failed));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn fit_failure_is_reported_not_fabricated() {
    let mut config = AnalysisConfig::default();
    config.fit.initial_guess = Some(DecayParameters::new(f64::NAN, 1.0, 0.0));
    let mut src = VecFrameSource::new(droplet_frames(W, H, &decay_centers(30)), FPS);

    let err = analyze_source(&mut src, &config, &mut NoopObserver).unwrap_err();

    assert_eq!(err.stage, PipelineStage::SeriesComplete);
    assert!(matches!(err.kind, AnalysisErrorKind::Fit(_)));
}

#[test]
fn config_loads_partial_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"locator": {"threshold": 80, "polarity": "bright_foreground"}, "fit": {"max_iters": 50}}"#,
    )
    .unwrap();
    let config = AnalysisConfig::from_json_file(&path).unwrap();
    assert_eq!(config.locator.threshold, 80);
    assert_eq!(
        config.locator.polarity,
        crate::locator::ThresholdPolarity::BrightForeground
    );
    assert_eq!(config.fit.max_iters, 50);
    assert_eq!(config.trajectory.timestamps, TimestampMode::DetectionOrdinal);
}

#[test]
fn config_errors_are_typed() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(
        AnalysisConfig::from_json_file(&missing),
        Err(ConfigError::Io { .. })
    ));

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"locator": {"threshold": "high"}}"#).unwrap();
    let err = AnalysisConfig::from_json_file(&bad).unwrap_err();
    assert!(matches!(err, ConfigError::Json { .. }));
    assert!(err.to_string().contains("bad.json"));
    assert!(std::error::Error::source(&err).is_some());
}

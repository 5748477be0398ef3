//! Velocity and acceleration by discrete differentiation of the trajectory.

use crate::trajectory::Trajectory;

/// Interior stencil used by [`gradient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientScheme {
    /// `(f[i+1] - f[i-1]) / (t[i+1] - t[i-1])`.
    #[default]
    Central,
    /// Second-order accurate stencil for uneven spacing. Reduces to
    /// `Central` when samples are evenly spaced.
    SecondOrder,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    pub scheme: GradientScheme,
}

/// Errors from differentiating a series.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Fewer than two samples.
    InsufficientSamples { needed: usize, got: usize },
    /// Value and time series differ in length.
    LengthMismatch { values: usize, times: usize },
    /// `times[index]` does not strictly exceed `times[index - 1]`.
    NonMonotonicTime { index: usize },
}

impl std::fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientSamples { needed, got } => write!(
                f,
                "differentiation needs at least {} samples, got {}",
                needed, got
            ),
            Self::LengthMismatch { values, times } => write!(
                f,
                "series length mismatch: {} values, {} times",
                values, times
            ),
            Self::NonMonotonicTime { index } => {
                write!(f, "time is not strictly increasing at sample {}", index)
            }
        }
    }
}

impl std::error::Error for KinematicsError {}

/// Velocity and acceleration, index-aligned with the trajectory.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KinematicSeries {
    pub velocity: Vec<f64>,
    pub acceleration: Vec<f64>,
}

impl KinematicSeries {
    pub fn len(&self) -> usize {
        self.velocity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocity.is_empty()
    }
}

/// Numerical derivative of `values` with respect to `times`.
///
/// Edges use a one-sided difference with the nearest neighbour; the output
/// has the same length as the input.
pub fn gradient(
    values: &[f64],
    times: &[f64],
    scheme: GradientScheme,
) -> Result<Vec<f64>, KinematicsError> {
    let n = values.len();
    if n != times.len() {
        return Err(KinematicsError::LengthMismatch {
            values: n,
            times: times.len(),
        });
    }
    if n < 2 {
        return Err(KinematicsError::InsufficientSamples { needed: 2, got: n });
    }
    for i in 1..n {
        // Negated comparison also rejects NaN.
        if !(times[i] > times[i - 1]) {
            return Err(KinematicsError::NonMonotonicTime { index: i });
        }
    }

    let mut out = Vec::with_capacity(n);
    out.push((values[1] - values[0]) / (times[1] - times[0]));
    for i in 1..n - 1 {
        let d = match scheme {
            GradientScheme::Central => {
                (values[i + 1] - values[i - 1]) / (times[i + 1] - times[i - 1])
            }
            GradientScheme::SecondOrder => {
                let h0 = times[i] - times[i - 1];
                let h1 = times[i + 1] - times[i];
                (h0 * h0 * (values[i + 1] - values[i]) + h1 * h1 * (values[i] - values[i - 1]))
                    / (h0 * h1 * (h0 + h1))
            }
        };
        out.push(d);
    }
    out.push((values[n - 1] - values[n - 2]) / (times[n - 1] - times[n - 2]));
    Ok(out)
}

/// Differentiate the trajectory twice: position → velocity → acceleration.
pub fn estimate(
    trajectory: &Trajectory,
    config: &KinematicsConfig,
) -> Result<KinematicSeries, KinematicsError> {
    let times = trajectory.times();
    let positions = trajectory.positions();
    let velocity = gradient(&positions, &times, config.scheme)?;
    let acceleration = gradient(&velocity, &times, config.scheme)?;
    Ok(KinematicSeries {
        velocity,
        acceleration,
    })
}

//! Exponential-decay model fit of the position series.
//!
//! Model: `position(t) = a·exp(−b·t) + c`, fitted by Levenberg–Marquardt
//! least squares on `Σ (position[i] − f(time[i]))²`.
//!
//! The result depends on the starting point. Unless
//! [`FitConfig::initial_guess`] is set, the start is `b = 1`,
//! `c = last position` and `a = ±(max − min)`, negative unless the series
//! ends below where it started.

mod solver;

/// Minimum number of samples for a three-parameter fit.
pub const MIN_FIT_SAMPLES: usize = 3;

/// Coefficients of `a·exp(−b·t) + c`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecayParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl DecayParameters {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Model value at time `t`.
    #[inline]
    pub fn evaluate(&self, t: f64) -> f64 {
        self.a * (-self.b * t).exp() + self.c
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }

    /// Default starting point for a series (see module docs).
    ///
    /// `a` is non-zero whenever the series is not constant, so the
    /// decay-rate direction is never degenerate at the start.
    pub fn initial_guess(positions: &[f64]) -> Option<Self> {
        let (&first, &last) = (positions.first()?, positions.last()?);
        let (min, max) = positions
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let span = max - min;
        let a = if first > last { span } else { -span };
        Some(Self::new(a, 1.0, last))
    }
}

/// Solver settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Iteration cap.
    pub max_iters: usize,
    /// Stop when an iteration reduces the cost by less than this fraction.
    pub rel_tol: f64,
    /// Stop when the cost, or its decrease, falls below
    /// `cost_tol · Σ (y − ȳ)²`.
    pub cost_tol: f64,
    /// Overrides the default starting point.
    pub initial_guess: Option<DecayParameters>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iters: 200,
            rel_tol: 1e-10,
            cost_tol: 1e-8,
            initial_guess: None,
        }
    }
}

/// Reasons the decay fit produced no coefficients.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Fewer samples than free parameters.
    InsufficientPoints { needed: usize, got: usize },
    /// Time and position series differ in length.
    LengthMismatch { times: usize, positions: usize },
    /// Input contains NaN or infinity.
    NonFiniteInput,
    /// The optimizer produced no solution (e.g. a failed linear solve).
    NoSolution,
    /// The model evaluated to NaN or infinity.
    NonFiniteResult,
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientPoints { needed, got } => {
                write!(f, "too few points for fit: need {}, got {}", needed, got)
            }
            Self::LengthMismatch { times, positions } => write!(
                f,
                "series length mismatch: {} times, {} positions",
                times, positions
            ),
            Self::NonFiniteInput => write!(f, "non-finite input sample"),
            Self::NoSolution => write!(f, "optimizer found no solution"),
            Self::NonFiniteResult => write!(f, "fit produced non-finite values"),
        }
    }
}

impl std::error::Error for FitError {}

/// A converged decay fit.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecayFit {
    pub params: DecayParameters,
    /// Sum of squared residuals at the solution.
    pub cost: f64,
    /// Root-mean-square residual (pixels).
    pub rmse: f64,
}

impl DecayFit {
    /// Model values at each of `times`.
    pub fn fitted(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.params.evaluate(t)).collect()
    }
}

/// Fit `a·exp(−b·t) + c` to `(times, positions)`.
pub fn fit_decay(
    times: &[f64],
    positions: &[f64],
    config: &FitConfig,
) -> Result<DecayFit, FitError> {
    if times.len() != positions.len() {
        return Err(FitError::LengthMismatch {
            times: times.len(),
            positions: positions.len(),
        });
    }
    if times.len() < MIN_FIT_SAMPLES {
        return Err(FitError::InsufficientPoints {
            needed: MIN_FIT_SAMPLES,
            got: times.len(),
        });
    }
    if !times.iter().chain(positions).all(|v| v.is_finite()) {
        return Err(FitError::NonFiniteInput);
    }

    let init = match config.initial_guess {
        Some(p) => p,
        None => DecayParameters::initial_guess(positions).ok_or(
            FitError::InsufficientPoints {
                needed: MIN_FIT_SAMPLES,
                got: 0,
            },
        )?,
    };
    if !init.is_finite() {
        return Err(FitError::NonFiniteInput);
    }

    // An exact start (e.g. a static droplet) is already the solution.
    let params = if solver::sum_sq(times, positions, &init) == 0.0 {
        init
    } else {
        solver::levenberg_marquardt(times, positions, init, config)?
    };
    let cost = solver::sum_sq(times, positions, &params);
    if !cost.is_finite() {
        return Err(FitError::NonFiniteResult);
    }

    tracing::debug!(
        "decay fit: a={:.6} b={:.6} c={:.6} cost={:.3e}",
        params.a,
        params.b,
        params.c,
        cost
    );

    Ok(DecayFit {
        params,
        cost,
        rmse: (cost / times.len() as f64).sqrt(),
    })
}

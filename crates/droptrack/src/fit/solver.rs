use std::collections::HashMap;

use tiny_solver::factors::na as ts_na;
use tiny_solver::Optimizer;

use super::{DecayParameters, FitConfig, FitError};

const PARAMS_KEY: &str = "decay";

/// Residual `a·exp(−b·t) + c − y` of one sample.
#[derive(Debug, Clone)]
struct DecayFactor {
    t: f64,
    y: f64,
}

impl<T: ts_na::RealField> tiny_solver::factors::Factor<T> for DecayFactor {
    fn residual_func(&self, params: &[ts_na::DVector<T>]) -> ts_na::DVector<T> {
        let p = &params[0];
        let a = p[0].clone();
        let b = p[1].clone();
        let c = p[2].clone();
        let t: T = ts_na::convert(self.t);
        let y: T = ts_na::convert(self.y);
        let r = a * (-b * t).exp() + c - y;
        ts_na::DVector::<T>::from_vec(vec![r])
    }
}

/// Sum of squared residuals of `params` over the samples.
pub(super) fn sum_sq(times: &[f64], values: &[f64], params: &DecayParameters) -> f64 {
    times
        .iter()
        .zip(values)
        .map(|(&t, &y)| {
            let r = y - params.evaluate(t);
            r * r
        })
        .sum()
}

/// Total sum of squares `Σ (y − ȳ)²`, the scale for absolute tolerances.
pub(super) fn total_sum_sq(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|y| (y - mean) * (y - mean)).sum()
}

/// Levenberg–Marquardt minimization of `Σ (y − f(t))²` over `(a, b, c)`.
///
/// Absolute stopping thresholds are `config.cost_tol · Σ (y − ȳ)²`, so a
/// series that an exponential can only approach in the limit (e.g. uniform
/// motion, where `b → 0`) still terminates once the residual is negligible
/// against the spread of the data.
pub(super) fn levenberg_marquardt(
    times: &[f64],
    values: &[f64],
    init: DecayParameters,
    config: &FitConfig,
) -> Result<DecayParameters, FitError> {
    let mut problem = tiny_solver::Problem::new();
    for (&t, &y) in times.iter().zip(values) {
        problem.add_residual_block(1, &[PARAMS_KEY], Box::new(DecayFactor { t, y }), None);
    }

    let mut initial_values = HashMap::<String, ts_na::DVector<f64>>::new();
    initial_values.insert(
        PARAMS_KEY.to_string(),
        ts_na::DVector::<f64>::from_vec(vec![init.a, init.b, init.c]),
    );

    let scale = total_sum_sq(values).max(f64::MIN_POSITIVE);
    let optimizer = tiny_solver::LevenbergMarquardtOptimizer::default();
    let options = tiny_solver::OptimizerOptions {
        max_iteration: config.max_iters.max(1),
        verbosity_level: 0,
        min_abs_error_decrease_threshold: config.cost_tol * scale,
        min_rel_error_decrease_threshold: config.rel_tol,
        min_error_threshold: config.cost_tol * scale,
        ..Default::default()
    };

    let result = optimizer
        .optimize(&problem, &initial_values, Some(options))
        .ok_or(FitError::NoSolution)?;
    let p = result.get(PARAMS_KEY).ok_or(FitError::NoSolution)?;
    if p.len() != 3 {
        return Err(FitError::NoSolution);
    }
    let params = DecayParameters::new(p[0], p[1], p[2]);
    if !params.is_finite() {
        return Err(FitError::NonFiniteResult);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residual_matches_model() {
        let factor = DecayFactor { t: 0.7, y: 50.0 };
        let p = DecayParameters::new(-40.0, 1.3, 90.0);
        let params = [ts_na::DVector::<f64>::from_vec(vec![p.a, p.b, p.c])];
        let r = tiny_solver::factors::Factor::<f64>::residual_func(&factor, &params);
        assert_eq!(r.len(), 1);
        assert!((r[0] - (p.evaluate(0.7) - 50.0)).abs() < 1e-12);
    }

    #[test]
    fn total_sum_sq_is_spread_about_mean() {
        assert_eq!(total_sum_sq(&[1.0, 3.0]), 2.0);
        assert_eq!(total_sum_sq(&[4.0; 5]), 0.0);
    }

    #[test]
    fn converges_from_nearby_start() {
        let truth = DecayParameters::new(-20.0, 2.0, 50.0);
        let times: Vec<f64> = (1..=30).map(|i| i as f64 * 0.05).collect();
        let values: Vec<f64> = times.iter().map(|&t| truth.evaluate(t)).collect();
        let start = DecayParameters::new(-18.0, 1.7, 49.0);
        let p = levenberg_marquardt(&times, &values, start, &FitConfig::default()).unwrap();
        assert!((p.b - truth.b).abs() < 0.02, "b = {}", p.b);
        assert!(sum_sq(&times, &values, &p) < sum_sq(&times, &values, &start));
    }
}

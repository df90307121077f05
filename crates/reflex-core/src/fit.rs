//! Bounded, weighted nonlinear least squares.
//!
//! A Levenberg-Marquardt solver with a forward-difference Jacobian. Steps are
//! projected back onto the parameter bounds, and the reported covariance is
//! scaled by the reduced chi-squared so that the weights only need to be
//! relative.

use std::cell::Cell;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::consts::{
    FIT_FTOL, FIT_INITIAL_LAMBDA, FIT_JACOBIAN_STEP, FIT_MAX_EVALS_PER_PARAM, FIT_XTOL,
};
use crate::error::{ReflexError, Result};

/// Inclusive lower/upper limits for each fitted parameter.
#[derive(Clone, Debug)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ParamBounds {
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    fn clamp(&self, params: &mut [f64]) {
        for (i, p) in params.iter_mut().enumerate() {
            *p = p.max(self.lower[i]).min(self.upper[i]);
        }
    }
}

/// Outcome of a converged fit.
#[derive(Clone, Debug)]
pub struct FitResult {
    pub params: Vec<f64>,
    pub covariance: DMatrix<f64>,
    pub chi_squared: f64,
    pub evaluations: usize,
}

impl FitResult {
    /// One-sigma parameter uncertainties: the square root of the covariance
    /// diagonal.
    pub fn std_errors(&self) -> Vec<f64> {
        self.covariance.diagonal().iter().map(|v| v.max(0.0).sqrt()).collect()
    }
}

/// Fit `model` to `y` with per-point standard deviations `sigma`.
///
/// `model` maps a parameter slice to one predicted value per data point.
pub fn curve_fit<F>(
    model: F,
    y: &[f64],
    sigma: &[f64],
    p0: &[f64],
    bounds: &ParamBounds,
) -> Result<FitResult>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = y.len();
    let m = p0.len();
    if sigma.len() != n {
        return Err(ReflexError::Shape {
            expected: n,
            actual: sigma.len(),
        });
    }
    if bounds.lower.len() != m || bounds.upper.len() != m {
        return Err(ReflexError::Shape {
            expected: m,
            actual: bounds.lower.len().min(bounds.upper.len()),
        });
    }
    if n <= m {
        return Err(ReflexError::FitConvergence(format!(
            "{n} data points cannot constrain {m} parameters"
        )));
    }
    if sigma.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
        return Err(ReflexError::FitConvergence(
            "fit weights require finite, positive uncertainties".into(),
        ));
    }

    let max_evals = FIT_MAX_EVALS_PER_PARAM * (m + 1);
    let evaluations = Cell::new(0usize);
    let eval = |p: &[f64]| {
        evaluations.set(evaluations.get() + 1);
        model(p)
    };

    let mut params = p0.to_vec();
    bounds.clamp(&mut params);

    let mut predicted = eval(&params);
    let mut chi2 = chi_squared(y, sigma, &predicted);
    if !chi2.is_finite() {
        return Err(ReflexError::FitConvergence(
            "model is not finite at the initial parameters".into(),
        ));
    }

    let mut lambda = FIT_INITIAL_LAMBDA;
    let mut jacobian = weighted_jacobian(&eval, &params, &predicted, sigma, bounds);
    let mut converged = chi2 == 0.0;

    while !converged {
        if evaluations.get() >= max_evals {
            return Err(ReflexError::FitConvergence(format!(
                "no convergence after {} model evaluations",
                evaluations.get()
            )));
        }

        let residuals = DVector::from_iterator(
            n,
            (0..n).map(|i| (y[i] - predicted[i]) / sigma[i]),
        );
        let jtj = jacobian.transpose() * &jacobian;
        let jtr = jacobian.transpose() * residuals;

        let mut damped = jtj.clone();
        for k in 0..m {
            damped[(k, k)] += lambda * jtj[(k, k)].max(f64::EPSILON);
        }
        let Some(step) = damped.lu().solve(&jtr) else {
            lambda *= 10.0;
            if lambda > 1e16 {
                return Err(ReflexError::FitConvergence("normal equations are singular".into()));
            }
            continue;
        };

        let mut trial = params.clone();
        for k in 0..m {
            trial[k] += step[k];
        }
        bounds.clamp(&mut trial);

        let trial_predicted = eval(&trial);
        let trial_chi2 = chi_squared(y, sigma, &trial_predicted);

        if trial_chi2.is_finite() && trial_chi2 <= chi2 {
            let step_norm: f64 = params
                .iter()
                .zip(&trial)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            let param_norm: f64 = params.iter().map(|p| p * p).sum::<f64>().sqrt();
            let reduction = chi2 - trial_chi2;

            params = trial;
            predicted = trial_predicted;
            chi2 = trial_chi2;
            lambda = (lambda / 10.0).max(1e-12);

            converged = reduction <= FIT_FTOL * chi2.max(f64::MIN_POSITIVE)
                || step_norm <= FIT_XTOL * (param_norm + FIT_XTOL)
                || chi2 == 0.0;
            if !converged {
                jacobian = weighted_jacobian(&eval, &params, &predicted, sigma, bounds);
            }
        } else {
            lambda *= 10.0;
            // No downhill step exists at any damping: we sit in a minimum.
            if lambda > 1e16 {
                converged = true;
            }
        }
    }

    let jacobian = weighted_jacobian(&eval, &params, &predicted, sigma, bounds);
    let jtj = jacobian.transpose() * &jacobian;
    let covariance = jtj.try_inverse().ok_or_else(|| {
        ReflexError::FitConvergence("parameter covariance is singular".into())
    })?;
    let reduced_chi2 = chi2 / (n - m) as f64;
    let covariance = covariance * reduced_chi2;

    let evaluations = evaluations.get();
    debug!(chi_squared = chi2, evaluations, "Fit converged");

    Ok(FitResult {
        params,
        covariance,
        chi_squared: chi2,
        evaluations,
    })
}

fn chi_squared(y: &[f64], sigma: &[f64], predicted: &[f64]) -> f64 {
    y.iter()
        .zip(sigma)
        .zip(predicted)
        .map(|((yi, si), pi)| {
            let r = (yi - pi) / si;
            r * r
        })
        .sum()
}

/// Forward-difference Jacobian of the model, each row divided by sigma.
fn weighted_jacobian<F>(
    eval: &F,
    params: &[f64],
    predicted: &[f64],
    sigma: &[f64],
    bounds: &ParamBounds,
) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = predicted.len();
    let m = params.len();
    let mut jac = DMatrix::zeros(n, m);
    let mut shifted = params.to_vec();
    for k in 0..m {
        let mut h = FIT_JACOBIAN_STEP * params[k].abs().max(1.0);
        if params[k] + h > bounds.upper[k] {
            h = -h;
        }
        shifted[k] = params[k] + h;
        let column = eval(&shifted);
        for i in 0..n {
            jac[(i, k)] = (column[i] - predicted[i]) / h / sigma[i];
        }
        shifted[k] = params[k];
    }
    jac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_straight_line() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        let sigma = vec![1.0; x.len()];
        let model = |p: &[f64]| x.iter().map(|v| p[0] * v + p[1]).collect::<Vec<_>>();
        let fit = curve_fit(model, &y, &sigma, &[1.0, 0.0], &ParamBounds::unbounded(2)).unwrap();
        assert!((fit.params[0] - 3.0).abs() < 1e-6);
        assert!((fit.params[1] + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_respects_bounds() {
        let y = vec![5.0; 10];
        let sigma = vec![1.0; 10];
        let model = |p: &[f64]| vec![p[0]; 10];
        let bounds = ParamBounds {
            lower: vec![0.0],
            upper: vec![2.0],
        };
        let fit = curve_fit(model, &y, &sigma, &[1.0], &bounds).unwrap();
        assert!(fit.params[0] <= 2.0);
        assert!((fit.params[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_too_few_points() {
        let model = |p: &[f64]| vec![p[0], p[1]];
        let err = curve_fit(model, &[1.0, 2.0], &[1.0, 1.0], &[0.0, 0.0], &ParamBounds::unbounded(2));
        assert!(matches!(err, Err(ReflexError::FitConvergence(_))));
    }
}

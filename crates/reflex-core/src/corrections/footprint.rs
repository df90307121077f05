use ndarray::Array1;
use statrs::function::erf::erf;
use tracing::warn;

use crate::consts::FWHM_PER_SIGMA;
use crate::error::{ReflexError, Result};

/// Fraction of a Gaussian beam intercepted by the sample at incidence angle
/// `theta_deg` (degrees).
///
/// `beam_width` is the beam FWHM and `sample_size` the sample length along the
/// beam, in the same units. Tends to one for large `sample_size * sin(theta)`
/// and to zero as `theta` goes to zero.
pub fn footprint_factor(beam_width: f64, sample_size: f64, theta_deg: f64) -> f64 {
    let a = projected_scale(beam_width, sample_size);
    erf(a * theta_deg.to_radians().sin())
}

/// Derivative of [`footprint_factor`] with respect to the angle, per radian.
pub fn footprint_factor_derivative(beam_width: f64, sample_size: f64, theta_deg: f64) -> f64 {
    let a = projected_scale(beam_width, sample_size);
    let theta = theta_deg.to_radians();
    let u = a * theta.sin();
    std::f64::consts::FRAC_2_SQRT_PI * (-u * u).exp() * a * theta.cos()
}

/// `L / (sqrt(2) * sigma)` with sigma the beam's standard deviation.
fn projected_scale(beam_width: f64, sample_size: f64) -> f64 {
    let beam_sd = beam_width / FWHM_PER_SIGMA;
    sample_size / (std::f64::consts::SQRT_2 * beam_sd)
}

/// Divide intensities by the footprint factor in place and propagate the
/// uncertainty to first order.
///
/// `theta_e_deg`, when given, holds per-point angle uncertainties in degrees.
/// Returns the factors that were applied.
pub fn footprint_correct(
    intensity: &mut Array1<f64>,
    intensity_e: &mut Array1<f64>,
    theta_deg: &Array1<f64>,
    theta_e_deg: Option<&Array1<f64>>,
    beam_width: f64,
    sample_size: f64,
) -> Result<Array1<f64>> {
    if !(beam_width.is_finite() && beam_width > 0.0) {
        return Err(ReflexError::Validation(format!(
            "beam width must be positive, got {beam_width}"
        )));
    }
    if !(sample_size.is_finite() && sample_size > 0.0) {
        return Err(ReflexError::Validation(format!(
            "sample size must be positive, got {sample_size}"
        )));
    }
    let n = intensity.len();
    for len in [intensity_e.len(), theta_deg.len()] {
        if len != n {
            return Err(ReflexError::Shape {
                expected: n,
                actual: len,
            });
        }
    }
    if let Some(te) = theta_e_deg {
        if te.len() != n {
            return Err(ReflexError::Shape {
                expected: n,
                actual: te.len(),
            });
        }
    }
    if theta_deg.iter().any(|&t| t == 0.0) {
        warn!("Footprint correction at zero incidence angle divides by zero");
    }

    let factors = theta_deg.mapv(|t| footprint_factor(beam_width, sample_size, t));
    for i in 0..n {
        let f = factors[i];
        let value = intensity[i];
        let mut variance = (intensity_e[i] / f).powi(2);
        if let Some(te) = theta_e_deg {
            let df = footprint_factor_derivative(beam_width, sample_size, theta_deg[i]);
            let sigma_theta = te[i].to_radians();
            variance += (value * df * sigma_theta / (f * f)).powi(2);
        }
        intensity[i] = value / f;
        intensity_e[i] = variance.sqrt();
    }
    Ok(factors)
}

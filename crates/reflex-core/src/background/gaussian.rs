use ndarray::Axis;
use statrs::distribution::{Continuous, Normal};
use tracing::debug;

use crate::error::{ReflexError, Result};
use crate::fit::{curve_fit, ParamBounds};
use crate::image::Image;

use super::{BackgroundMethod, BkgSubInfo};

/// Offset position in the 1D parameter vector `[mean, sigma, offset, factor]`.
const OFFSET_1D: usize = 2;

/// Offset position in the 2D parameter vector
/// `[mean_x, mean_y, sigma_x, sigma_y, offset, factor]`.
const OFFSET_2D: usize = 4;

/// `offset + factor * pdf(x; mean, sigma)` at every abscissa for
/// `params = [mean, sigma, offset, factor]`, or NaNs when the parameters do
/// not describe a normal distribution.
pub(crate) fn univariate_normal(xs: &[f64], params: &[f64]) -> Vec<f64> {
    let &[mean, sigma, offset, factor] = params else {
        return vec![f64::NAN; xs.len()];
    };
    match Normal::new(mean, sigma) {
        Ok(normal) => xs.iter().map(|&x| offset + factor * normal.pdf(x)).collect(),
        Err(_) => vec![f64::NAN; xs.len()],
    }
}

/// Fit a Gaussian plus constant to the mean projection of `image` along
/// `axis`; the fitted constant is the per-pixel background.
pub fn fit_gaussian_1d(image: &Image, axis: usize) -> Result<BkgSubInfo> {
    if axis > 1 {
        return Err(ReflexError::Validation(format!(
            "images have two axes, cannot project along axis {axis}"
        )));
    }
    let values = image.values();
    let errors = image.errors();
    let ordinate = values
        .mean_axis(Axis(axis))
        .ok_or_else(|| ReflexError::Validation("cannot fit an empty image".into()))?;
    let ordinate_e = errors
        .mapv(|e| e * e)
        .mean_axis(Axis(axis))
        .ok_or_else(|| ReflexError::Validation("cannot fit an empty image".into()))?
        .mapv(f64::sqrt);

    let len = ordinate.len() as f64;
    let scale0 = values.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if scale0 <= 0.0 {
        return Err(ReflexError::FitConvergence(
            "image has no positive signal to fit".into(),
        ));
    }
    let y = ordinate.to_vec();
    let p0 = [argmax(&y) as f64, 1.0, median(&y), scale0];
    let bounds = ParamBounds {
        lower: vec![0.0; 4],
        upper: vec![len, len, scale0, 10.0 * scale0],
    };

    let xs: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
    let fit = curve_fit(
        |p: &[f64]| univariate_normal(&xs, p),
        &y,
        &ordinate_e.to_vec(),
        &p0,
        &bounds,
    )?;
    let std_errors = fit.std_errors();
    debug!(
        mean = fit.params[0],
        sigma = fit.params[1],
        offset = fit.params[OFFSET_1D],
        "1D Gaussian background fit"
    );
    Ok(BkgSubInfo {
        bkg: fit.params[OFFSET_1D],
        bkg_e: std_errors[OFFSET_1D],
        method: BackgroundMethod::Gaussian1d { axis },
        fit: Some(fit),
    })
}

/// Fit `offset + factor * N(x) * N(y)` over every pixel of `image`, weighted
/// by the pixel uncertainties; the fitted offset is the background.
pub fn fit_gaussian_2d(image: &Image) -> Result<BkgSubInfo> {
    let (nx, ny) = image.shape();
    let values = image.values();
    let y: Vec<f64> = values.iter().copied().collect();
    let sigma: Vec<f64> = image.errors().iter().copied().collect();
    if y.is_empty() {
        return Err(ReflexError::Validation("cannot fit an empty image".into()));
    }

    let scale0 = y.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if scale0 <= 0.0 {
        return Err(ReflexError::FitConvergence(
            "image has no positive signal to fit".into(),
        ));
    }
    let peak = argmax(&y);
    let p0 = [
        (peak / ny) as f64,
        (peak % ny) as f64,
        1.0,
        1.0,
        median(&y),
        scale0,
    ];
    let (fx, fy) = (nx as f64, ny as f64);
    let bounds = ParamBounds {
        lower: vec![0.0; 6],
        upper: vec![fx, fy, fx, fy, scale0, 10.0 * scale0],
    };

    let model = |p: &[f64]| -> Vec<f64> {
        let (Ok(nxd), Ok(nyd)) = (Normal::new(p[0], p[2]), Normal::new(p[1], p[3])) else {
            return vec![f64::NAN; nx * ny];
        };
        let px: Vec<f64> = (0..nx).map(|i| nxd.pdf(i as f64)).collect();
        let py: Vec<f64> = (0..ny).map(|j| nyd.pdf(j as f64)).collect();
        px.iter()
            .flat_map(|a| py.iter().map(move |b| p[4] + p[5] * a * b))
            .collect()
    };
    let fit = curve_fit(model, &y, &sigma, &p0, &bounds)?;
    let std_errors = fit.std_errors();
    debug!(
        mean_x = fit.params[0],
        mean_y = fit.params[1],
        offset = fit.params[OFFSET_2D],
        "2D Gaussian background fit"
    );
    Ok(BkgSubInfo {
        bkg: fit.params[OFFSET_2D],
        bkg_e: std_errors[OFFSET_2D],
        method: BackgroundMethod::Gaussian2d,
        fit: Some(fit),
    })
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

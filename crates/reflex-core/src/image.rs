use ndarray::{s, Array2, ArrayView2};

use crate::consts::ZERO_COUNT_UNCERTAINTY;
use crate::error::{ReflexError, Result};
use crate::region::Region;

/// A single detector frame: nominal pixel values and their standard
/// deviations, always of the same shape.
///
/// Shape is `(x, y)`; see [`Region`] for the axis convention.
#[derive(Clone, Debug)]
pub struct Image {
    values: Array2<f64>,
    errors: Array2<f64>,
}

impl Image {
    /// Build an image from values and per-pixel uncertainties.
    ///
    /// With `transpose` set, both arrays have their axes swapped before
    /// anything else happens to them.
    pub fn new(values: Array2<f64>, errors: Array2<f64>, transpose: bool) -> Result<Self> {
        if values.dim() != errors.dim() {
            return Err(ReflexError::Validation(format!(
                "image values have shape {:?} but uncertainties have shape {:?}",
                values.dim(),
                errors.dim()
            )));
        }
        if errors.iter().any(|&e| e.is_nan() || e < 0.0) {
            return Err(ReflexError::Validation(
                "image uncertainties must be non-negative".into(),
            ));
        }
        let (values, errors) = if transpose {
            (values.reversed_axes(), errors.reversed_axes())
        } else {
            (values, errors)
        };
        Ok(Self {
            values: values.as_standard_layout().into_owned(),
            errors: errors.as_standard_layout().into_owned(),
        })
    }

    /// Build an image from raw detector counts with Poisson uncertainties.
    ///
    /// Each pixel gets `sqrt(counts)`; pixels with zero counts get an
    /// uncertainty of one count.
    pub fn from_counts(counts: Array2<f64>, transpose: bool) -> Result<Self> {
        if counts.iter().any(|&c| !c.is_finite() || c < 0.0) {
            return Err(ReflexError::Validation(
                "detector counts must be finite and non-negative".into(),
            ));
        }
        let errors = counts.mapv(|c| {
            if c == 0.0 {
                ZERO_COUNT_UNCERTAINTY
            } else {
                c.sqrt()
            }
        });
        Self::new(counts, errors, transpose)
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn errors(&self) -> ArrayView2<'_, f64> {
        self.errors.view()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn num_pixels(&self) -> usize {
        self.values.len()
    }

    /// Replace both arrays with the sub-rectangle selected by `region`.
    ///
    /// The region is expressed in the coordinates of the current array. The
    /// shape change is permanent.
    pub fn crop(&mut self, region: &Region) -> Result<()> {
        if !region.fits_within(self.shape()) {
            return Err(ReflexError::Bounds(format!(
                "crop region ({region}) exceeds image shape {:?}",
                self.shape()
            )));
        }
        let window = s![region.x_start()..region.x_end(), region.y_start()..region.y_end()];
        self.values = self.values.slice(window).to_owned();
        self.errors = self.errors.slice(window).to_owned();
        Ok(())
    }

    /// Subtract a scalar background from every pixel, combining
    /// uncertainties in quadrature. Negative results are kept.
    pub fn background_subtraction(&mut self, background: f64, background_e: f64) {
        self.values -= background;
        let bkg_var = background_e * background_e;
        self.errors.mapv_inplace(|e| (e * e + bkg_var).sqrt());
    }

    /// Total intensity and its uncertainty: `(Σ values, sqrt(Σ errors²))`.
    pub fn sum(&self) -> (f64, f64) {
        let intensity = self.values.sum();
        let variance: f64 = self.errors.iter().map(|e| e * e).sum();
        (intensity, variance.sqrt())
    }

    /// Sum of values and number of pixels inside `region`.
    pub(crate) fn region_total(&self, region: &Region) -> Result<(f64, usize)> {
        if !region.fits_within(self.shape()) {
            return Err(ReflexError::Bounds(format!(
                "region ({region}) exceeds image shape {:?}",
                self.shape()
            )));
        }
        let window = self
            .values
            .slice(s![region.x_start()..region.x_end(), region.y_start()..region.y_end()]);
        Ok((window.sum(), region.num_pixels()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_swaps_axes() {
        let counts = Array2::from_shape_fn((2, 3), |(r, c)| (r * 3 + c) as f64);
        let img = Image::from_counts(counts, true).unwrap();
        assert_eq!(img.shape(), (3, 2));
        assert_eq!(img.values()[[2, 1]], 5.0);
    }

    #[test]
    fn test_zero_counts_get_unit_error() {
        let counts = Array2::from_shape_vec((1, 2), vec![0.0, 16.0]).unwrap();
        let img = Image::from_counts(counts, false).unwrap();
        assert_eq!(img.errors()[[0, 0]], 1.0);
        assert_eq!(img.errors()[[0, 1]], 4.0);
    }

    #[test]
    fn test_mismatched_shapes_rejected() {
        let err = Image::new(Array2::zeros((2, 2)), Array2::zeros((2, 3)), false);
        assert!(matches!(err, Err(ReflexError::Validation(_))));
    }

    #[test]
    fn test_negative_uncertainty_rejected() {
        let err = Image::new(Array2::zeros((1, 1)), Array2::from_elem((1, 1), -1.0), false);
        assert!(err.is_err());
    }
}

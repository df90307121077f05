use crate::error::{ReflexError, Result};

/// Monotone piecewise-cubic Hermite interpolation (Fritsch-Carlson).
///
/// The curve passes through every knot and never overshoots between them.
/// Queries outside the knot range evaluate to NaN; nothing is extrapolated.
#[derive(Clone, Debug)]
pub struct Interpolator {
    x: Vec<f64>,
    y: Vec<f64>,
    slopes: Vec<f64>,
}

impl Interpolator {
    /// Build an interpolator from `(x, y)` knots sorted by `x`.
    ///
    /// Fails if fewer than two knots are given, if any value is non-finite,
    /// or if `x` is not strictly increasing.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(ReflexError::DataFormat(format!(
                "interpolation axis has {} values but intensity has {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(ReflexError::DataFormat(
                "interpolation needs at least two points".into(),
            ));
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(ReflexError::DataFormat(
                "interpolation data contains non-finite values".into(),
            ));
        }

        if let Some(w) = x.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ReflexError::DataFormat(format!(
                "interpolation axis must be strictly increasing, found {} followed by {}",
                w[0], w[1]
            )));
        }

        let (x, y) = (x.to_vec(), y.to_vec());
        let slopes = pchip_slopes(&x, &y);
        Ok(Self { x, y, slopes })
    }

    /// The `[min, max]` range of the knot axis.
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    pub fn eval(&self, at: f64) -> f64 {
        let (lo, hi) = self.domain();
        if !(lo..=hi).contains(&at) {
            return f64::NAN;
        }
        // Index of the interval [x[k], x[k+1]] holding `at`.
        let k = self
            .x
            .partition_point(|&xi| xi <= at)
            .saturating_sub(1)
            .min(self.x.len() - 2);
        let h = self.x[k + 1] - self.x[k];
        let t = (at - self.x[k]) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * self.y[k] + h10 * h * self.slopes[k] + h01 * self.y[k + 1] + h11 * h * self.slopes[k + 1]
    }
}

fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / h[k]).collect();

    if n == 2 {
        return vec![delta[0], delta[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
        }
    }
    d[0] = end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

/// Shape-preserving three-point estimate of an end slope.
fn end_slope(h0: f64, h1: f64, d0: f64, d1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * d0 - h0 * d1) / (h0 + h1);
    if d.signum() != d0.signum() || d0 == 0.0 {
        0.0
    } else if d0.signum() != d1.signum() && d.abs() > 3.0 * d0.abs() {
        3.0 * d0
    } else {
        d
    }
}

use ndarray::Array1;

use crate::consts::HC_KEV_ANGSTROM;
use crate::error::{ReflexError, Result};
use crate::metadata::AxisType;

/// Convert an incidence angle in degrees to momentum transfer in Å⁻¹.
pub fn theta_to_q(theta_deg: f64, energy_kev: f64) -> f64 {
    4.0 * std::f64::consts::PI * energy_kev * theta_deg.to_radians().sin() / HC_KEV_ANGSTROM
}

/// Convert momentum transfer in Å⁻¹ to an incidence angle in degrees.
pub fn q_to_theta(q: f64, energy_kev: f64) -> f64 {
    (q * HC_KEV_ANGSTROM / (4.0 * std::f64::consts::PI * energy_kev))
        .asin()
        .to_degrees()
}

/// Per-point arrays of one scan, all the same length and in acquisition
/// order.
#[derive(Clone, Debug)]
pub struct ScanData {
    q: Array1<f64>,
    theta: Array1<f64>,
    intensity: Array1<f64>,
    intensity_e: Array1<f64>,
    transmission: Array1<f64>,
    energy: f64,
}

impl ScanData {
    /// Build scan data from one independent axis; the other of q/θ is
    /// derived from the probe energy (keV).
    pub fn new(
        axis: Array1<f64>,
        axis_type: AxisType,
        intensity: Array1<f64>,
        intensity_e: Array1<f64>,
        energy: f64,
    ) -> Result<Self> {
        let n = axis.len();
        check_len(n, intensity.len())?;
        check_len(n, intensity_e.len())?;
        if !(energy.is_finite() && energy > 0.0) {
            return Err(ReflexError::Validation(format!(
                "probe energy must be positive, got {energy}"
            )));
        }
        let (q, theta) = match axis_type {
            AxisType::Q => {
                let theta = axis.mapv(|q| q_to_theta(q, energy));
                (axis, theta)
            }
            AxisType::Theta => (axis.mapv(|t| theta_to_q(t, energy)), axis),
            AxisType::TwoTheta => {
                let theta = axis.mapv(|tth| tth / 2.0);
                (theta.mapv(|t| theta_to_q(t, energy)), theta)
            }
        };
        Ok(Self {
            q,
            theta,
            intensity,
            intensity_e,
            transmission: Array1::ones(n),
            energy,
        })
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn q(&self) -> &Array1<f64> {
        &self.q
    }

    /// Incidence angles, in degrees.
    pub fn theta(&self) -> &Array1<f64> {
        &self.theta
    }

    pub fn intensity(&self) -> &Array1<f64> {
        &self.intensity
    }

    pub fn intensity_e(&self) -> &Array1<f64> {
        &self.intensity_e
    }

    pub fn transmission(&self) -> &Array1<f64> {
        &self.transmission
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Intensity scaled so its maximum is one, with matching uncertainty.
    pub fn reflectivity(&self) -> (Array1<f64>, Array1<f64>) {
        let max = self.intensity.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        (&self.intensity / max, &self.intensity_e / max)
    }

    pub(crate) fn set_transmission(&mut self, transmission: Array1<f64>) -> Result<()> {
        check_len(self.len(), transmission.len())?;
        self.transmission = transmission;
        Ok(())
    }

    pub(crate) fn set_intensity(
        &mut self,
        intensity: Array1<f64>,
        intensity_e: Array1<f64>,
    ) -> Result<()> {
        check_len(self.len(), intensity.len())?;
        check_len(self.len(), intensity_e.len())?;
        self.intensity = intensity;
        self.intensity_e = intensity_e;
        Ok(())
    }

    /// Divide intensity and its uncertainty by a per-point factor.
    pub(crate) fn divide_by(&mut self, factors: &Array1<f64>) -> Result<()> {
        check_len(self.len(), factors.len())?;
        self.intensity /= factors;
        self.intensity_e /= factors;
        Ok(())
    }

    pub(crate) fn intensity_mut(&mut self) -> (&mut Array1<f64>, &mut Array1<f64>) {
        (&mut self.intensity, &mut self.intensity_e)
    }

    /// Delete the given indices from every per-point array.
    pub(crate) fn remove_points(&mut self, indices: &[usize]) -> Result<()> {
        let keep = keep_mask(self.len(), indices)?;
        let filter = |a: &Array1<f64>| -> Array1<f64> {
            a.iter()
                .zip(&keep)
                .filter_map(|(&v, &k)| k.then_some(v))
                .collect()
        };
        self.q = filter(&self.q);
        self.theta = filter(&self.theta);
        self.intensity = filter(&self.intensity);
        self.intensity_e = filter(&self.intensity_e);
        self.transmission = filter(&self.transmission);
        Ok(())
    }
}

/// `true` for every index that survives the removal of `indices`.
pub(crate) fn keep_mask(len: usize, indices: &[usize]) -> Result<Vec<bool>> {
    let mut keep = vec![true; len];
    for &i in indices {
        if i >= len {
            return Err(ReflexError::Bounds(format!(
                "data point index {i} out of range for a scan of {len} points"
            )));
        }
        keep[i] = false;
    }
    Ok(keep)
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ReflexError::Shape { expected, actual })
    }
}

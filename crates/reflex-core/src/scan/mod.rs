//! Scans: per-point measurement arrays plus the metadata they were taken
//! with, and the scan-wide corrections applied to them.

pub mod data;
mod scan2d;

use std::sync::Arc;

use ndarray::Array1;
use tracing::{debug, warn};

use crate::corrections::{footprint_correct, Interpolator};
use crate::error::{ReflexError, Result};
use crate::metadata::{Metadata, Transmission};

pub use data::{q_to_theta, theta_to_q, ScanData};
pub use scan2d::Scan2D;

/// A one-dimensional reflectometry scan.
#[derive(Clone, Debug)]
pub struct Scan {
    data: ScanData,
    metadata: Arc<dyn Metadata>,
}

impl Scan {
    /// Pair scan data with its metadata; the data's transmission column is
    /// filled from the metadata.
    pub fn new(mut data: ScanData, metadata: Arc<dyn Metadata>) -> Result<Self> {
        let transmission = match metadata.transmission() {
            Transmission::Scalar(t) => Array1::from_elem(data.len(), t),
            Transmission::PerPoint(values) => Array1::from(values),
        };
        data.set_transmission(transmission)?;
        Ok(Self { data, metadata })
    }

    pub fn data(&self) -> &ScanData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut ScanData {
        &mut self.data
    }

    pub fn metadata(&self) -> &dyn Metadata {
        self.metadata.as_ref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Scan-level corrections, shared by [`Scan`] and [`Scan2D`].
///
/// Each correction mutates the owned arrays in place. Applying one twice
/// applies its physical effect twice.
pub trait Measurement: Send + Sync {
    fn scan(&self) -> &Scan;

    fn scan_mut(&mut self) -> &mut Scan;

    /// Delete the given point indices from every per-point array.
    fn remove_data_points(&mut self, indices: &[usize]) -> Result<()>;

    /// Keep only points with `q_min <= q <= q_max`. Returns how many points
    /// were removed.
    fn subsample_q(&mut self, q_min: f64, q_max: f64) -> Result<usize> {
        let outside: Vec<usize> = self
            .scan()
            .data()
            .q()
            .iter()
            .enumerate()
            .filter(|&(_, &q)| q < q_min || q > q_max)
            .map(|(i, _)| i)
            .collect();
        if !outside.is_empty() {
            self.remove_data_points(&outside)?;
        }
        debug!(
            source = self.scan().metadata().source_path(),
            removed = outside.len(),
            q_min,
            q_max,
            "Subsampled q range"
        );
        Ok(outside.len())
    }

    /// Divide intensity by the per-point transmission.
    ///
    /// `overwrite` replaces the transmission from the metadata and must have
    /// one value per point.
    fn transmission_normalisation(&mut self, overwrite: Option<&[f64]>) -> Result<()> {
        let data = self.scan_mut().data_mut();
        if let Some(values) = overwrite {
            if values.len() != data.len() {
                return Err(ReflexError::Shape {
                    expected: data.len(),
                    actual: values.len(),
                });
            }
            data.set_transmission(Array1::from(values.to_vec()))?;
        }
        let transmission = data.transmission().clone();
        data.divide_by(&transmission)
    }

    /// Divide intensity by the incident intensity interpolated at each q.
    fn qdcd_normalisation(&mut self, interpolator: &Interpolator) -> Result<()> {
        let data = self.scan_mut().data_mut();
        let factors = data.q().mapv(|q| interpolator.eval(q));
        let outside = factors.iter().filter(|f| f.is_nan()).count();
        if outside > 0 {
            warn!(
                points = outside,
                "q values outside the normalisation reference range"
            );
        }
        data.divide_by(&factors)
    }

    /// Correct every point for the fraction of the beam missing the sample.
    /// `beam_width` (FWHM) and `sample_size` share a length unit.
    fn footprint_correction(&mut self, beam_width: f64, sample_size: f64) -> Result<()> {
        let data = self.scan_mut().data_mut();
        let theta = data.theta().clone();
        let (intensity, intensity_e) = data.intensity_mut();
        footprint_correct(intensity, intensity_e, &theta, None, beam_width, sample_size)?;
        Ok(())
    }
}

impl Measurement for Scan {
    fn scan(&self) -> &Scan {
        self
    }

    fn scan_mut(&mut self) -> &mut Scan {
        self
    }

    fn remove_data_points(&mut self, indices: &[usize]) -> Result<()> {
        self.data.remove_points(indices)
    }
}

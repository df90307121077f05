pub mod footprint;
pub mod interpolate;

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::io::normalisation::read_normalisation_file;

pub use footprint::{footprint_correct, footprint_factor, footprint_factor_derivative};
pub use interpolate::Interpolator;

/// Build the incident-intensity interpolator from a normalisation reference
/// file, reading the named axis and intensity columns.
pub fn get_interpolator(
    path: &Path,
    axis_column: &str,
    intensity_column: &str,
) -> Result<Interpolator> {
    let (axis, intensity) = read_normalisation_file(path, axis_column, intensity_column)?;
    debug!(
        path = %path.display(),
        points = axis.len(),
        "Loaded normalisation reference"
    );
    Interpolator::new(&axis, &intensity)
}

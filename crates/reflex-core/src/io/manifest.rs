use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ReflexError, Result};
use crate::image::Image;
use crate::metadata::ScanMetadata;
use crate::scan::{Scan, Scan2D, ScanData};

/// Anything that can turn a file into a [`Scan2D`].
///
/// Facility-specific parsers implement this; the reduction pipeline only
/// ever sees the resulting scans.
pub trait ScanSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Scan2D>;
}

/// One detector frame in a manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameSource {
    /// An image file (TIFF, PNG, ...) read as 16-bit counts. Relative paths
    /// are resolved against the manifest's directory.
    File { path: PathBuf },
    /// Counts written out row by row.
    Inline { rows: Vec<Vec<f64>> },
}

/// Instrument-agnostic description of one scan.
///
/// ```toml
/// axis = [0.1, 0.2]
///
/// [metadata]
/// probe_energy = 12.5
/// axis_name = "qdcd"
/// axis_type = "q"
///
/// [[frames]]
/// path = "frame_0.tif"
///
/// [[frames]]
/// rows = [[0, 1], [5, 2]]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanManifest {
    pub metadata: ScanMetadata,
    /// Default axis value of every point.
    pub axis: Vec<f64>,
    /// Swap image axes on load.
    #[serde(default)]
    pub transpose: bool,
    pub frames: Vec<FrameSource>,
}

impl ScanManifest {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }
}

/// [`ScanSource`] for TOML scan manifests.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifestSource;

impl ScanSource for ManifestSource {
    fn load(&self, path: &Path) -> Result<Scan2D> {
        let mut manifest = ScanManifest::read(path)?;
        if manifest.metadata.source_path.is_empty() {
            manifest.metadata.source_path = path.display().to_string();
        }
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let scan = build_scan(manifest, base)?;
        info!(
            source = %path.display(),
            points = scan.images().len(),
            "Loaded scan"
        );
        Ok(scan)
    }
}

/// Assemble a [`Scan2D`] from a parsed manifest, resolving frame paths
/// against `base`.
pub fn build_scan(manifest: ScanManifest, base: &Path) -> Result<Scan2D> {
    if manifest.frames.len() != manifest.axis.len() {
        return Err(ReflexError::Shape {
            expected: manifest.axis.len(),
            actual: manifest.frames.len(),
        });
    }
    let images = manifest
        .frames
        .iter()
        .map(|frame| {
            let counts = match frame {
                FrameSource::File { path } => load_counts(&base.join(path))?,
                FrameSource::Inline { rows } => counts_from_rows(rows)?,
            };
            Image::from_counts(counts, manifest.transpose)
        })
        .collect::<Result<Vec<_>>>()?;

    let sums: Vec<(f64, f64)> = images.iter().map(Image::sum).collect();
    let data = ScanData::new(
        Array1::from(manifest.axis),
        manifest.metadata.axis_type,
        sums.iter().map(|s| s.0).collect(),
        sums.iter().map(|s| s.1).collect(),
        manifest.metadata.probe_energy,
    )?;
    let scan = Scan::new(data, Arc::new(manifest.metadata))?;
    Scan2D::new(scan, images)
}

/// Read an image file as raw 16-bit counts, shape `(rows, columns)`.
pub fn load_counts(path: &Path) -> Result<Array2<f64>> {
    let gray = image::open(path)?.to_luma16();
    let (w, h) = gray.dimensions();
    debug!(path = %path.display(), width = w, height = h, "Read frame");
    Ok(Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32).0[0] as f64
    }))
}

fn counts_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if ncols == 0 {
        return Err(ReflexError::DataFormat("inline frame has no pixels".into()));
    }
    if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
        return Err(ReflexError::DataFormat(format!(
            "inline frame rows must all have {ncols} values, found one with {}",
            bad.len()
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), ncols), flat)
        .map_err(|e| ReflexError::DataFormat(e.to_string()))
}

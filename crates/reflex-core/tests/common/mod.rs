use std::sync::Arc;

use ndarray::{Array1, Array2};
use reflex_core::image::Image;
use reflex_core::metadata::{AxisType, ScanMetadata, Transmission};
use reflex_core::region::Region;
use reflex_core::scan::{Scan, Scan2D, ScanData};

pub const ENERGY_KEV: f64 = 12.5;

/// Metadata for a q-axis scan with one 2x2 signal region at (1, 1) and a
/// background strip along the first row, for 4x4 frames.
pub fn metadata(source: &str, transmission: f64) -> ScanMetadata {
    ScanMetadata {
        source_path: source.to_string(),
        probe_energy: ENERGY_KEV,
        axis_name: "qdcd".to_string(),
        axis_type: AxisType::Q,
        transmission: Transmission::Scalar(transmission),
        detector_distance: 0.5,
        signal_regions: vec![signal_region()],
        background_regions: vec![background_region()],
    }
}

pub fn signal_region() -> Region {
    Region::new(1, 3, 1, 3).unwrap()
}

pub fn background_region() -> Region {
    Region::new(0, 1, 0, 4).unwrap()
}

/// A 4x4 frame of `background` counts with `signal` added on the signal
/// region.
pub fn frame_counts(background: f64, signal: f64) -> Array2<f64> {
    let region = signal_region();
    Array2::from_shape_fn((4, 4), |(x, y)| {
        if region.contains(x, y) {
            background + signal
        } else {
            background
        }
    })
}

/// Build a Scan2D from raw frames, with intensities summed from the frames.
pub fn scan2d(source: &str, q: &[f64], frames: Vec<Array2<f64>>, transmission: f64) -> Scan2D {
    let images: Vec<Image> = frames
        .into_iter()
        .map(|c| Image::from_counts(c, false).unwrap())
        .collect();
    let intensity: Array1<f64> = images.iter().map(|i| i.sum().0).collect();
    let intensity_e: Array1<f64> = images.iter().map(|i| i.sum().1).collect();
    let data = ScanData::new(
        Array1::from(q.to_vec()),
        AxisType::Q,
        intensity,
        intensity_e,
        ENERGY_KEV,
    )
    .unwrap();
    let scan = Scan::new(data, Arc::new(metadata(source, transmission))).unwrap();
    Scan2D::new(scan, images).unwrap()
}

/// Plain 1D scan with the given per-point values on a q axis.
pub fn scan1d(source: &str, q: &[f64], intensity: &[f64], intensity_e: &[f64]) -> Scan {
    let data = ScanData::new(
        Array1::from(q.to_vec()),
        AxisType::Q,
        Array1::from(intensity.to_vec()),
        Array1::from(intensity_e.to_vec()),
        ENERGY_KEV,
    )
    .unwrap();
    Scan::new(data, Arc::new(metadata(source, 1.0))).unwrap()
}

/// Render a frame as TOML inline rows.
pub fn toml_rows(counts: &Array2<f64>) -> String {
    let rows: Vec<String> = counts
        .rows()
        .into_iter()
        .map(|r| {
            let vals: Vec<String> = r.iter().map(|v| format!("{v:.1}")).collect();
            format!("[{}]", vals.join(", "))
        })
        .collect();
    format!("[{}]", rows.join(", "))
}

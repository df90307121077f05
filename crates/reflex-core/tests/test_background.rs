#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;
use ndarray::Array2;
use reflex_core::background::{fit_gaussian_1d, fit_gaussian_2d, BackgroundMethod};
use reflex_core::error::ReflexError;
use reflex_core::image::Image;
use reflex_core::region::Region;

use common::{background_region, frame_counts, signal_region};

/// Rows identical; each column follows `offset + height * exp(-(y-mu)^2 / 2 s^2)`.
fn gaussian_stripe(offset: f64, height: f64, mu: f64, s: f64) -> Image {
    let counts = Array2::from_shape_fn((12, 30), |(_, y)| {
        let d = y as f64 - mu;
        offset + height * (-d * d / (2.0 * s * s)).exp()
    });
    Image::from_counts(counts, false).unwrap()
}

#[test]
fn test_roi_background_on_fixture_frame() {
    let img = Image::from_counts(frame_counts(2.0, 30.0), false).unwrap();
    let info = BackgroundMethod::Roi
        .estimate(&img, &[background_region()])
        .unwrap();
    assert_relative_eq!(info.bkg, 2.0);
    assert_relative_eq!(info.bkg_e, 8f64.sqrt() / 4.0);
}

#[test]
fn test_roi_multiple_regions_pool_pixels() {
    let img = Image::from_counts(frame_counts(3.0, 30.0), false).unwrap();
    let regions = [
        Region::new(0, 1, 0, 4).unwrap(),
        Region::new(3, 4, 0, 4).unwrap(),
    ];
    let info = BackgroundMethod::Roi.estimate(&img, &regions).unwrap();
    assert_relative_eq!(info.bkg, 3.0);
    assert_relative_eq!(info.bkg_e, 24f64.sqrt() / 8.0);
}

#[test]
fn test_roi_region_out_of_bounds() {
    let img = Image::from_counts(frame_counts(1.0, 1.0), false).unwrap();
    let region = Region::new(0, 10, 0, 1).unwrap();
    assert!(matches!(
        BackgroundMethod::Roi.estimate(&img, &[region]),
        Err(ReflexError::Bounds(_))
    ));
}

#[test]
fn test_area_background_skips_signal() {
    let img = Image::from_counts(frame_counts(5.0, 100.0), false).unwrap();
    let info = BackgroundMethod::Area
        .estimate(&img, &[signal_region()])
        .unwrap();
    assert_relative_eq!(info.bkg, 5.0);
    assert_relative_eq!(info.bkg_e, 60f64.sqrt() / 12.0);
}

#[test]
fn test_gaussian_1d_recovers_offset() {
    let img = gaussian_stripe(5.0, 200.0, 14.0, 1.5);
    let info = fit_gaussian_1d(&img, 0).unwrap();
    assert!((info.bkg - 5.0).abs() < 0.05, "offset {}", info.bkg);
    let fit = info.fit.expect("fit diagnostics");
    assert!((fit.params[0] - 14.0).abs() < 0.05);
    assert!((fit.params[1] - 1.5).abs() < 0.05);
    assert!(info.bkg_e >= 0.0);
}

#[test]
fn test_gaussian_1d_rejects_bad_axis() {
    let img = gaussian_stripe(5.0, 200.0, 14.0, 1.5);
    assert!(matches!(fit_gaussian_1d(&img, 2), Err(ReflexError::Validation(_))));
}

#[test]
fn test_gaussian_1d_empty_signal_is_fit_error() {
    let img = Image::from_counts(Array2::zeros((4, 4)), false).unwrap();
    assert!(matches!(
        fit_gaussian_1d(&img, 0),
        Err(ReflexError::FitConvergence(_))
    ));
}

#[test]
fn test_gaussian_2d_recovers_offset() {
    let counts = Array2::from_shape_fn((15, 15), |(x, y)| {
        let dx = x as f64 - 7.0;
        let dy = y as f64 - 8.0;
        3.0 + 500.0 * (-(dx * dx + dy * dy) / 2.0).exp()
    });
    let img = Image::from_counts(counts, false).unwrap();
    let info = fit_gaussian_2d(&img).unwrap();
    assert!((info.bkg - 3.0).abs() < 0.05, "offset {}", info.bkg);
    assert_eq!(info.method, BackgroundMethod::Gaussian2d);
}

#[test]
fn test_method_registry() {
    assert_eq!(BackgroundMethod::from_name("roi").unwrap(), BackgroundMethod::Roi);
    assert_eq!(
        "gaussian_1d".parse::<BackgroundMethod>().unwrap(),
        BackgroundMethod::Gaussian1d { axis: 0 }
    );
    assert!(BackgroundMethod::from_name("median").is_err());
    assert!(BackgroundMethod::Area.uses_regions());
    assert!(!BackgroundMethod::Gaussian2d.uses_regions());
}

#[allow(dead_code)]
mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use ndarray::{array, Array2};
use reflex_core::background::BackgroundMethod;
use reflex_core::error::ReflexError;
use reflex_core::image::Image;
use reflex_core::metadata::{AxisType, Transmission};
use reflex_core::region::Region;
use reflex_core::scan::{Measurement, Scan, Scan2D, ScanData};

use common::{background_region, frame_counts, scan2d, signal_region};

fn three_point_scan() -> Scan2D {
    scan2d(
        "i07-1001.nxs",
        &[0.1, 0.2, 0.3],
        vec![
            frame_counts(2.0, 10.0),
            frame_counts(2.0, 20.0),
            frame_counts(2.0, 30.0),
        ],
        1.0,
    )
}

#[test]
fn test_remove_data_point_keeps_arrays_consistent() {
    let mut scan = three_point_scan();
    scan.remove_data_points(&[1]).unwrap();
    assert_eq!(scan.images().len(), 2);
    assert_eq!(scan.scan().len(), 2);
    assert_eq!(scan.scan().data().q(), &array![0.1, 0.3]);
    for (img, &i) in scan.images().iter().zip(scan.scan().data().intensity()) {
        assert_relative_eq!(img.sum().0, i);
    }
    assert_relative_eq!(scan.scan().data().intensity()[1], 16.0 * 2.0 + 4.0 * 30.0);
}

#[test]
fn test_remove_out_of_range_index_changes_nothing() {
    let mut scan = three_point_scan();
    assert!(matches!(
        scan.remove_data_points(&[0, 7]),
        Err(ReflexError::Bounds(_))
    ));
    assert_eq!(scan.images().len(), 3);
    assert_eq!(scan.scan().len(), 3);
}

#[test]
fn test_subsample_q_inclusive() {
    let mut scan = three_point_scan();
    let removed = scan.subsample_q(0.2, 0.3).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(scan.scan().data().q(), &array![0.2, 0.3]);
    assert_eq!(scan.images().len(), 2);
}

#[test]
fn test_crop_recomputes_intensity() {
    let mut scan = three_point_scan();
    scan.crop(&signal_region()).unwrap();
    assert_eq!(scan.images()[0].shape(), (2, 2));
    assert_relative_eq!(scan.scan().data().intensity()[0], 4.0 * 12.0);
    assert_relative_eq!(scan.scan().data().intensity_e()[2], (4.0f64 * 32.0).sqrt());
}

#[test]
fn test_crop_that_does_not_fit_is_atomic() {
    let mut scan = three_point_scan();
    let region = Region::new(0, 6, 0, 2).unwrap();
    assert!(matches!(scan.crop(&region), Err(ReflexError::Bounds(_))));
    assert!(scan.images().iter().all(|img| img.shape() == (4, 4)));
}

#[test]
fn test_bkg_sub_after_crop_with_local_regions() {
    let mut scan = three_point_scan();
    scan.crop(&Region::new(0, 3, 0, 4).unwrap()).unwrap();
    let infos = scan
        .bkg_sub(BackgroundMethod::Roi, &[background_region()])
        .unwrap();
    assert_eq!(infos.len(), 3);
    assert_relative_eq!(infos[0].bkg, 2.0);
    // 12 pixels of background removed, 4 signal pixels remain above it.
    assert_relative_eq!(scan.scan().data().intensity()[1], 80.0, epsilon = 1e-9);
}

#[test]
fn test_estimate_then_subtract_matches_bkg_sub() {
    let mut a = three_point_scan();
    let mut b = three_point_scan();
    let regions = [background_region()];

    let estimates = a.estimate_background(BackgroundMethod::Roi, &regions).unwrap();
    a.subtract_background(&estimates).unwrap();
    b.bkg_sub(BackgroundMethod::Roi, &regions).unwrap();

    assert_eq!(a.scan().data().intensity(), b.scan().data().intensity());
    assert_eq!(a.scan().data().intensity_e(), b.scan().data().intensity_e());
}

#[test]
fn test_transmission_from_metadata() {
    let mut scan = scan2d("att", &[0.1, 0.2], vec![frame_counts(1.0, 0.0); 2], 0.5);
    let before = scan.scan().data().intensity().clone();
    scan.transmission_normalisation(None).unwrap();
    assert_relative_eq!(scan.scan().data().intensity()[0], before[0] * 2.0);
}

#[test]
fn test_transmission_override_length_checked() {
    let mut scan = three_point_scan();
    assert!(matches!(
        scan.transmission_normalisation(Some(&[0.5, 0.5])),
        Err(ReflexError::Shape {
            expected: 3,
            actual: 2
        })
    ));
    scan.transmission_normalisation(Some(&[0.5, 0.25, 1.0])).unwrap();
    assert_eq!(scan.scan().data().transmission(), &array![0.5, 0.25, 1.0]);
}

#[test]
fn test_per_point_transmission_length_checked() {
    let mut meta = common::metadata("tx", 1.0);
    meta.transmission = Transmission::PerPoint(vec![1.0, 0.1]);
    let data = ScanData::new(
        array![0.1, 0.2, 0.3],
        AxisType::Q,
        array![1.0, 1.0, 1.0],
        array![1.0, 1.0, 1.0],
        common::ENERGY_KEV,
    )
    .unwrap();
    assert!(matches!(
        Scan::new(data, Arc::new(meta)),
        Err(ReflexError::Shape { .. })
    ));
}

#[test]
fn test_scan2d_requires_one_image_per_point() {
    let scan = common::scan1d("x", &[0.1, 0.2], &[1.0, 1.0], &[1.0, 1.0]);
    let images = vec![Image::from_counts(frame_counts(1.0, 1.0), false).unwrap()];
    assert!(matches!(
        Scan2D::new(scan, images),
        Err(ReflexError::Shape {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn test_reflectivity_scaled_to_max() {
    let scan = common::scan1d("r", &[0.1, 0.2], &[50.0, 200.0], &[5.0, 10.0]);
    let (r, r_e) = scan.data().reflectivity();
    assert_eq!(r, array![0.25, 1.0]);
    assert_eq!(r_e, array![0.025, 0.05]);
}

/// 12x30 frame whose columns follow `offset + height * exp(-(y-14)^2 / 4.5)`.
fn stripe_counts(offset: f64, height: f64) -> Array2<f64> {
    Array2::from_shape_fn((12, 30), |(_, y)| {
        let d = y as f64 - 14.0;
        offset + height * (-d * d / 4.5).exp()
    })
}

fn scan_with_blank_frame() -> Scan2D {
    scan2d(
        "stripes",
        &[0.1, 0.2, 0.3],
        vec![
            stripe_counts(5.0, 200.0),
            Array2::zeros((12, 30)),
            stripe_counts(5.0, 200.0),
        ],
        1.0,
    )
}

#[test]
fn test_failed_fit_names_the_frame() {
    let mut scan = scan_with_blank_frame();
    let err = scan
        .bkg_sub(BackgroundMethod::Gaussian1d { axis: 0 }, &[])
        .unwrap_err();
    match err {
        ReflexError::FitConvergence(msg) => {
            assert!(msg.contains("stripes frame 1"), "{msg}");
        }
        other => panic!("unexpected error {other}"),
    }
    // Nothing was subtracted.
    assert_relative_eq!(scan.scan().data().intensity()[1], 0.0);
    assert!(scan.scan().data().intensity()[0] > 12.0 * 30.0 * 5.0);
}

#[test]
fn test_failed_frame_keeps_other_estimates() {
    let scan = scan_with_blank_frame();
    let estimates = scan.estimate_each(BackgroundMethod::Gaussian1d { axis: 0 }, &[]);
    assert_eq!(estimates.len(), 3);
    assert!(matches!(estimates[1], Err(ReflexError::FitConvergence(_))));
    for i in [0, 2] {
        let info = estimates[i].as_ref().unwrap();
        assert!((info.bkg - 5.0).abs() < 0.05, "offset {}", info.bkg);
    }
}

#[test]
fn test_fall_back_to_roi_for_failed_frame() {
    let mut scan = scan_with_blank_frame();
    let strip = [Region::new(0, 1, 0, 30).unwrap()];
    let backgrounds = scan
        .estimate_each(BackgroundMethod::Gaussian1d { axis: 0 }, &[])
        .into_iter()
        .enumerate()
        .map(|(i, estimate)| {
            estimate.or_else(|_| BackgroundMethod::Roi.estimate(&scan.images()[i], &strip))
        })
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(backgrounds[1].method, BackgroundMethod::Roi);
    assert_eq!(backgrounds[0].method, BackgroundMethod::Gaussian1d { axis: 0 });

    scan.subtract_background(&backgrounds).unwrap();
    assert_relative_eq!(scan.scan().data().intensity()[1], 0.0);
    assert!(scan.scan().data().intensity()[2] > 0.0);
}

#[test]
fn test_drop_failed_frame_then_subtract() {
    let mut scan = scan_with_blank_frame();
    let failed: Vec<usize> = scan
        .estimate_each(BackgroundMethod::Gaussian1d { axis: 0 }, &[])
        .iter()
        .enumerate()
        .filter_map(|(i, estimate)| estimate.is_err().then_some(i))
        .collect();
    assert_eq!(failed, vec![1]);

    scan.remove_data_points(&failed).unwrap();
    let infos = scan
        .bkg_sub(BackgroundMethod::Gaussian1d { axis: 0 }, &[])
        .unwrap();
    assert_eq!(infos.len(), 2);
    assert_eq!(scan.scan().data().q(), &array![0.1, 0.3]);
}

#[test]
fn test_crop_around_each_frames_peak() {
    let frame_with_peak = |x: usize, y: usize| {
        let mut counts = Array2::from_elem((8, 8), 1.0);
        counts[[x, y]] = 100.0;
        counts
    };
    let mut scan = scan2d(
        "peaks",
        &[0.1, 0.2],
        vec![frame_with_peak(2, 3), frame_with_peak(5, 5)],
        1.0,
    );
    let windows = scan.crop_around_peak(2, 2).unwrap();
    assert_eq!(windows[0], Region::new(1, 3, 2, 4).unwrap());
    assert_eq!(windows[1], Region::new(4, 6, 4, 6).unwrap());
    assert!(scan.images().iter().all(|img| img.shape() == (2, 2)));
    assert_eq!(scan.scan().data().intensity(), &array![103.0, 103.0]);
}

#[allow(dead_code)]
mod common;

use std::io::Write;

use approx::assert_relative_eq;
use reflex_core::corrections::{footprint_factor, get_interpolator, Interpolator};
use reflex_core::error::ReflexError;
use reflex_core::scan::Measurement;

const BEAM: f64 = 100e-6;
const SAMPLE: f64 = 10e-3;

#[test]
fn test_footprint_shrinks_towards_zero_angle() {
    let thetas = [2.0, 1.0, 0.5, 0.2, 0.1, 0.05, 0.01];
    let factors: Vec<f64> = thetas.iter().map(|&t| footprint_factor(BEAM, SAMPLE, t)).collect();
    for pair in factors.windows(2) {
        assert!(pair[1] < pair[0]);
    }
    assert!(factors.iter().all(|&f| f > 0.0 && f <= 1.0));
}

#[test]
fn test_footprint_saturates_at_one() {
    assert_relative_eq!(footprint_factor(BEAM, SAMPLE, 5.0), 1.0, epsilon = 1e-12);
    assert_relative_eq!(footprint_factor(1e-9, 1.0, 0.5), 1.0, epsilon = 1e-12);
}

#[test]
fn test_footprint_correction_on_scan() {
    let mut scan = common::scan1d("fp", &[0.05, 0.1, 0.3], &[100.0, 50.0, 10.0], &[10.0, 7.0, 3.0]);
    let theta = scan.data().theta().clone();
    scan.footprint_correction(BEAM, SAMPLE).unwrap();
    for i in 0..3 {
        let f = footprint_factor(BEAM, SAMPLE, theta[i]);
        assert_relative_eq!(scan.data().intensity()[i], [100.0, 50.0, 10.0][i] / f, epsilon = 1e-9);
        assert_relative_eq!(scan.data().intensity_e()[i], [10.0, 7.0, 3.0][i] / f, epsilon = 1e-9);
    }
}

#[test]
fn test_footprint_rejects_bad_geometry() {
    let mut scan = common::scan1d("fp", &[0.1], &[1.0], &[1.0]);
    assert!(matches!(
        scan.footprint_correction(-1.0, SAMPLE),
        Err(ReflexError::Validation(_))
    ));
}

#[test]
fn test_interpolator_from_dat_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "meta line\n<MetaDataAtStart>\nenergy=12.5\n</MetaDataAtStart>\n &END\n\
         adc1 qdcd_ adc2\n1 0.0 10\n1 0.1 20\n1 0.2 40\n1 0.3 80\n"
    )
    .unwrap();
    let itp = get_interpolator(file.path(), "qdcd_", "adc2").unwrap();
    assert_eq!(itp.domain(), (0.0, 0.3));
    assert_relative_eq!(itp.eval(0.1), 20.0, epsilon = 1e-12);
    let mid = itp.eval(0.15);
    assert!(mid > 20.0 && mid < 40.0);
    assert!(itp.eval(0.31).is_nan());
}

#[test]
fn test_interpolator_missing_column() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, " &END\nq I\n0.1 1\n0.2 2\n").unwrap();
    assert!(matches!(
        get_interpolator(file.path(), "qdcd_", "adc2"),
        Err(ReflexError::DataFormat(_))
    ));
}

#[test]
fn test_interpolator_duplicate_axis() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "0.1 1\n0.1 2\n0.2 3\n").unwrap();
    assert!(matches!(
        get_interpolator(file.path(), "q", "I"),
        Err(ReflexError::DataFormat(_))
    ));
}

#[test]
fn test_interpolator_unsorted_reference_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "qdcd_ adc2\n0.3 80\n0.1 20\n0.2 40\n").unwrap();
    assert!(matches!(
        get_interpolator(file.path(), "qdcd_", "adc2"),
        Err(ReflexError::DataFormat(_))
    ));
}

#[test]
fn test_qdcd_normalisation_divides_by_reference() {
    let itp = Interpolator::new(&[0.0, 0.5], &[2.0, 2.0]).unwrap();
    let mut scan = common::scan1d("dcd", &[0.1, 0.2], &[10.0, 20.0], &[1.0, 2.0]);
    scan.qdcd_normalisation(&itp).unwrap();
    assert_relative_eq!(scan.data().intensity()[1], 10.0);
    assert_relative_eq!(scan.data().intensity_e()[0], 0.5);
}

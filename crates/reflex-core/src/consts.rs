/// Planck constant in eV s.
pub const PLANCK_EV_S: f64 = 4.135_667_696e-15;

/// Speed of light in vacuum, in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// h*c in keV Å, the factor converting probe energy to wavenumber.
pub const HC_KEV_ANGSTROM: f64 = PLANCK_EV_S * 1e-3 * SPEED_OF_LIGHT * 1e10;

/// Ratio between a Gaussian's FWHM and its standard deviation: 2*sqrt(2 ln 2).
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// Default number of bins when rebinning a stitched curve.
pub const DEFAULT_NUMBER_OF_Q_VECTORS: usize = 5000;

/// Padding added above the largest q so the generated grid encloses it.
pub const REBIN_Q_EPSILON: f64 = 0.001;

/// Default upper q bound used to locate the total external reflection plateau.
pub const DEFAULT_TER_MAX_Q: f64 = 0.1;

/// Uncertainty assigned to a pixel that recorded zero counts.
pub const ZERO_COUNT_UNCERTAINTY: f64 = 1.0;

/// Maximum number of model evaluations per fitted parameter (plus one).
pub const FIT_MAX_EVALS_PER_PARAM: usize = 2000;

/// Relative chi-squared change below which a fit is considered converged.
pub const FIT_FTOL: f64 = 1e-10;

/// Relative parameter step below which a fit is considered converged.
pub const FIT_XTOL: f64 = 1e-10;

/// Relative step used for forward-difference Jacobians.
pub const FIT_JACOBIAN_STEP: f64 = 1.5e-8;

/// Initial Levenberg-Marquardt damping factor.
pub const FIT_INITIAL_LAMBDA: f64 = 1e-3;

/// Frame count above which per-image work inside a scan is spread over rayon.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Axis column read from a normalisation reference file by default.
pub const DEFAULT_NORMALISATION_AXIS_COLUMN: &str = "qdcd_";

/// Intensity column read from a normalisation reference file by default.
pub const DEFAULT_NORMALISATION_INTENSITY_COLUMN: &str = "adc2";

/// Default side length, in pixels, of the window kept when cropping around a peak.
pub const DEFAULT_PEAK_WINDOW: usize = 20;

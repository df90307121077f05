//! Background estimation for detector images.
//!
//! Every method reduces an [`Image`] (and, where relevant, a set of
//! [`Region`]s) to a scalar per-pixel background and its uncertainty, ready
//! for [`Image::background_subtraction`]. Methods are selected by name through
//! [`BackgroundMethod`].

pub mod gaussian;
pub mod roi;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ReflexError, Result};
use crate::fit::FitResult;
use crate::image::Image;
use crate::region::Region;

pub use gaussian::{fit_gaussian_1d, fit_gaussian_2d};
pub use roi::{area_subtraction, roi_subtraction};

/// Background estimation algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BackgroundMethod {
    /// Poisson mean over the background regions.
    #[default]
    Roi,
    /// Poisson mean over every pixel outside the signal regions.
    Area,
    /// Gaussian plus offset fitted to a mean projection.
    #[serde(rename = "gaussian_1d")]
    Gaussian1d {
        /// Axis averaged away before fitting.
        #[serde(default)]
        axis: usize,
    },
    /// Separable 2D Gaussian plus offset fitted to the whole frame.
    #[serde(rename = "gaussian_2d")]
    Gaussian2d,
}

impl BackgroundMethod {
    /// Look a method up by its configuration name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "roi" | "roi_subtraction" => Ok(Self::Roi),
            "area" => Ok(Self::Area),
            "gaussian_1d" => Ok(Self::Gaussian1d { axis: 0 }),
            "gaussian_2d" => Ok(Self::Gaussian2d),
            other => Err(ReflexError::Validation(format!(
                "unknown background method `{other}` (expected roi, area, gaussian_1d or gaussian_2d)"
            ))),
        }
    }

    /// Whether the method reads the caller's regions. Region-based methods
    /// must see frames in the coordinates their regions were defined in.
    pub fn uses_regions(&self) -> bool {
        matches!(self, Self::Roi | Self::Area)
    }

    /// Estimate the background of one image.
    ///
    /// `regions` are background regions for [`Self::Roi`], signal regions for
    /// [`Self::Area`], and ignored by the fitting methods.
    pub fn estimate(&self, image: &Image, regions: &[Region]) -> Result<BkgSubInfo> {
        match *self {
            Self::Roi => roi_subtraction(image, regions),
            Self::Area => area_subtraction(image, regions),
            Self::Gaussian1d { axis } => fit_gaussian_1d(image, axis),
            Self::Gaussian2d => fit_gaussian_2d(image),
        }
    }
}

impl FromStr for BackgroundMethod {
    type Err = ReflexError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for BackgroundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Roi => write!(f, "roi"),
            Self::Area => write!(f, "area"),
            Self::Gaussian1d { axis } => write!(f, "gaussian_1d (axis {axis})"),
            Self::Gaussian2d => write!(f, "gaussian_2d"),
        }
    }
}

/// Outcome of a background estimate for one image.
#[derive(Clone, Debug)]
pub struct BkgSubInfo {
    /// Background per pixel.
    pub bkg: f64,
    pub bkg_e: f64,
    pub method: BackgroundMethod,
    /// Fit diagnostics, for the fitting methods.
    pub fit: Option<FitResult>,
}

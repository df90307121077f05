use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::background::BackgroundMethod;
use crate::consts::{
    DEFAULT_NORMALISATION_AXIS_COLUMN, DEFAULT_NORMALISATION_INTENSITY_COLUMN,
    DEFAULT_NUMBER_OF_Q_VECTORS, DEFAULT_PEAK_WINDOW, DEFAULT_TER_MAX_Q,
};
use crate::error::{ReflexError, Result};
use crate::region::Region;
use crate::stitching::{RebinGrid, RebinShape};

/// Full recipe for reducing a set of scans into one curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Scan files, in stitching order.
    pub scans: Vec<PathBuf>,
    pub setup: SetupConfig,
    #[serde(default)]
    pub crop: CropConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub q_subsample: Vec<QSubsample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebin: Option<RebinConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            scans: Vec::new(),
            setup: SetupConfig::default(),
            crop: CropConfig::default(),
            background: BackgroundConfig::default(),
            q_subsample: Vec::new(),
            rebin: Some(RebinConfig::default()),
            output: OutputConfig::default(),
        }
    }
}

impl ReductionConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a config file. Relative scan and normalisation paths are taken
    /// relative to the file's directory.
    pub fn read(path: &Path) -> Result<Self> {
        let mut config = Self::from_toml(&std::fs::read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ReflexError::Validation(format!("cannot serialize config: {e}")))
    }

    fn resolve_paths(&mut self, base: &Path) {
        for scan in &mut self.scans {
            if scan.is_relative() {
                *scan = base.join(&*scan);
            }
        }
        if let Some(norm) = &mut self.setup.normalisation {
            if norm.file.is_relative() {
                norm.file = base.join(&norm.file);
            }
        }
    }

    /// Reject recipes that cannot run before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.scans.is_empty() {
            return Err(ReflexError::EmptySequence);
        }
        if !(self.setup.beam_width > 0.0 && self.setup.sample_size > 0.0) {
            return Err(ReflexError::Validation(format!(
                "beam width and sample size must be positive, got {} and {}",
                self.setup.beam_width, self.setup.sample_size
            )));
        }
        if let Some(window) = self.crop.around_peak {
            if self.crop.region.is_some() {
                return Err(ReflexError::Validation(
                    "crop.region and crop.around_peak are mutually exclusive".into(),
                ));
            }
            if window.x_size == 0 || window.y_size == 0 {
                return Err(ReflexError::Validation(format!(
                    "crop.around_peak window must be at least 1x1, got {}x{}",
                    window.x_size, window.y_size
                )));
            }
        }
        for sub in &self.q_subsample {
            if sub.q_min > sub.q_max {
                return Err(ReflexError::Validation(format!(
                    "q subsample for `{}` has q_min {} above q_max {}",
                    sub.scan_id, sub.q_min, sub.q_max
                )));
            }
        }
        if let Some(rebin) = &self.rebin {
            rebin.grid()?;
        }
        Ok(())
    }
}

/// Beam and sample geometry, plus the optional incident-beam reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Beam FWHM, in metres.
    pub beam_width: f64,
    /// Sample length along the beam, in metres.
    pub sample_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalisation: Option<NormalisationConfig>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            beam_width: 100e-6,
            sample_size: 10e-3,
            normalisation: None,
        }
    }
}

/// Reference file for the q-dependent incident intensity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalisationConfig {
    pub file: PathBuf,
    #[serde(default = "default_axis_column")]
    pub axis_column: String,
    #[serde(default = "default_intensity_column")]
    pub intensity_column: String,
}

fn default_axis_column() -> String {
    DEFAULT_NORMALISATION_AXIS_COLUMN.to_string()
}

fn default_intensity_column() -> String {
    DEFAULT_NORMALISATION_INTENSITY_COLUMN.to_string()
}

/// How frames are cropped before reduction.
///
/// An explicit `region` is in detector coordinates. With `around_peak`, every
/// frame is cropped to a window centred on its own brightest pixel. With
/// neither, the first signal region recorded in the first scan's metadata is
/// used.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CropConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub around_peak: Option<PeakWindow>,
}

/// Size of the window kept around each frame's peak, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakWindow {
    #[serde(default = "default_peak_window")]
    pub x_size: usize,
    #[serde(default = "default_peak_window")]
    pub y_size: usize,
}

impl Default for PeakWindow {
    fn default() -> Self {
        Self {
            x_size: DEFAULT_PEAK_WINDOW,
            y_size: DEFAULT_PEAK_WINDOW,
        }
    }
}

fn default_peak_window() -> usize {
    DEFAULT_PEAK_WINDOW
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundConfig {
    #[serde(flatten)]
    pub method: BackgroundMethod,
    /// Regions in detector coordinates: background regions for `roi`,
    /// signal regions for `area`. When absent, the first scan's metadata
    /// supplies them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<Region>>,
}

/// Restrict one scan to `q_min <= q <= q_max`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QSubsample {
    /// Substring of the scan's source path.
    pub scan_id: String,
    #[serde(default)]
    pub q_min: f64,
    #[serde(default = "default_q_max")]
    pub q_max: f64,
}

fn default_q_max() -> f64 {
    f64::INFINITY
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RebinConfig {
    #[serde(default)]
    pub shape: RebinShape,
    #[serde(default = "default_n_q_vectors")]
    pub n_q_vectors: usize,
    /// Explicit bin left edges; overrides `shape` and `n_q_vectors`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_q: Option<Vec<f64>>,
}

impl Default for RebinConfig {
    fn default() -> Self {
        Self {
            shape: RebinShape::Linear,
            n_q_vectors: DEFAULT_NUMBER_OF_Q_VECTORS,
            new_q: None,
        }
    }
}

fn default_n_q_vectors() -> usize {
    DEFAULT_NUMBER_OF_Q_VECTORS
}

impl RebinConfig {
    pub fn grid(&self) -> Result<RebinGrid> {
        match &self.new_q {
            Some(edges) => Ok(RebinGrid::Explicit(edges.clone())),
            None if self.n_q_vectors == 0 => Err(ReflexError::Validation(
                "rebin.n_q_vectors must be at least 1".into(),
            )),
            None => Ok(RebinGrid::Generated {
                shape: self.shape,
                number_of_q_vectors: self.n_q_vectors,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Add a reflectivity column scaled to a maximum of one.
    #[serde(default)]
    pub normalise: bool,
    /// Rescale the curve so the total external reflection plateau is one.
    #[serde(default)]
    pub ter_normalise: bool,
    #[serde(default = "default_ter_max_q")]
    pub ter_max_q: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            normalise: false,
            ter_normalise: false,
            ter_max_q: DEFAULT_TER_MAX_Q,
        }
    }
}

fn default_ter_max_q() -> f64 {
    DEFAULT_TER_MAX_Q
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::region::Region;

/// What the scan's default (independent) axis measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisType {
    /// Momentum transfer, in Å⁻¹.
    #[serde(rename = "q")]
    Q,
    /// Incidence angle θ, in degrees.
    #[serde(rename = "th")]
    Theta,
    /// Scattering angle 2θ, in degrees.
    #[serde(rename = "tth")]
    TwoTheta,
}

impl fmt::Display for AxisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Q => write!(f, "q"),
            Self::Theta => write!(f, "th"),
            Self::TwoTheta => write!(f, "tth"),
        }
    }
}

/// Fraction of the beam let through by the attenuators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transmission {
    Scalar(f64),
    PerPoint(Vec<f64>),
}

impl Default for Transmission {
    fn default() -> Self {
        Self::Scalar(1.0)
    }
}

/// Read-only instrument context for one scan.
///
/// Implemented once per facility file layout; the reduction core only ever
/// talks to this trait.
pub trait Metadata: Send + Sync + fmt::Debug {
    /// Probe energy in keV.
    fn probe_energy(&self) -> f64;

    /// Name of the default axis as recorded by the instrument.
    fn default_axis_name(&self) -> &str;

    fn default_axis_type(&self) -> AxisType;

    fn transmission(&self) -> Transmission;

    /// Sample to detector distance, in metres.
    fn detector_distance(&self) -> f64;

    /// Identifier of the file this scan was read from.
    fn source_path(&self) -> &str;

    /// Signal regions set during acquisition, in detector coordinates.
    fn signal_regions(&self) -> Vec<Region> {
        Vec::new()
    }

    /// Background regions set during acquisition, in detector coordinates.
    fn background_regions(&self) -> Vec<Region> {
        Vec::new()
    }
}

/// Plain, deserializable metadata record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    #[serde(default)]
    pub source_path: String,
    pub probe_energy: f64,
    pub axis_name: String,
    pub axis_type: AxisType,
    #[serde(default)]
    pub transmission: Transmission,
    #[serde(default)]
    pub detector_distance: f64,
    #[serde(default)]
    pub signal_regions: Vec<Region>,
    #[serde(default)]
    pub background_regions: Vec<Region>,
}

impl Metadata for ScanMetadata {
    fn probe_energy(&self) -> f64 {
        self.probe_energy
    }

    fn default_axis_name(&self) -> &str {
        &self.axis_name
    }

    fn default_axis_type(&self) -> AxisType {
        self.axis_type
    }

    fn transmission(&self) -> Transmission {
        self.transmission.clone()
    }

    fn detector_distance(&self) -> f64 {
        self.detector_distance
    }

    fn source_path(&self) -> &str {
        &self.source_path
    }

    fn signal_regions(&self) -> Vec<Region> {
        self.signal_regions.clone()
    }

    fn background_regions(&self) -> Vec<Region> {
        self.background_regions.clone()
    }
}

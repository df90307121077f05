use crate::background::BkgSubInfo;
use crate::profile::Provenance;
use crate::stitching::ReflectivityCurve;

/// Reduction stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReductionStage {
    Loading,
    Cropping,
    Background,
    DcdNormalisation,
    Footprint,
    Transmission,
    Stitching,
    Subsampling,
    Rebinning,
    Normalising,
}

impl std::fmt::Display for ReductionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading scans"),
            Self::Cropping => write!(f, "Cropping"),
            Self::Background => write!(f, "Subtracting background"),
            Self::DcdNormalisation => write!(f, "DCD normalisation"),
            Self::Footprint => write!(f, "Footprint correction"),
            Self::Transmission => write!(f, "Transmission normalisation"),
            Self::Stitching => write!(f, "Stitching scans"),
            Self::Subsampling => write!(f, "Bounding q ranges"),
            Self::Rebinning => write!(f, "Rebinning"),
            Self::Normalising => write!(f, "Normalising"),
        }
    }
}

/// Result of a reduction run.
#[derive(Clone, Debug)]
pub struct ReductionOutput {
    pub curve: ReflectivityCurve,
    pub provenance: Provenance,
    /// Per-image background estimates, one vector per scan.
    pub backgrounds: Vec<Vec<BkgSubInfo>>,
}

/// Thread-safe progress reporting for the reduction.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (e.g. scan count), if known.
    fn begin_stage(&self, _stage: ReductionStage, _total_items: Option<usize>) {}

    /// `items_done` work items within the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `reduce` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

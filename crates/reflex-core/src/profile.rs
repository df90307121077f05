use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::background::{BackgroundMethod, BkgSubInfo};
use crate::corrections::Interpolator;
use crate::error::{ReflexError, Result};
use crate::region::Region;
use crate::scan::{Measurement, Scan2D};
use crate::stitching::{concatenate, rebin, RebinGrid, ReflectivityCurve};

/// Corrections applied so far to a profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cropped: Option<Region>,
    /// `[x_size, y_size]` of the per-frame window when cropped around peaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cropped_around_peak: Option<[usize; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    pub dcd_normalised: bool,
    pub footprint_corrected: bool,
    pub transmission_normalised: bool,
    /// Scans whose q range was narrowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub q_subsampled: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebinned: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalised: Option<String>,
}

/// Where a reduced curve came from and what was done to it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source identifier of every scan, in profile order.
    pub scans: Vec<String>,
    pub state: DataState,
}

/// One complete reflectivity measurement: an ordered set of scans and,
/// once stitched, the combined curve.
///
/// Scan-level corrections are broadcast to every scan in order. Once a
/// combined curve exists, every correction rebuilds it from the scans by
/// concatenation, so any earlier rebinning has to be redone.
#[derive(Clone, Debug)]
pub struct Profile<S: Measurement = Scan2D> {
    scans: Vec<S>,
    combined: Option<ReflectivityCurve>,
    provenance: Provenance,
}

impl<S: Measurement> Profile<S> {
    pub fn new(scans: Vec<S>) -> Result<Self> {
        if scans.is_empty() {
            return Err(ReflexError::EmptySequence);
        }
        let provenance = Provenance {
            scans: scans
                .iter()
                .map(|s| s.scan().metadata().source_path().to_string())
                .collect(),
            state: DataState::default(),
        };
        Ok(Self {
            scans,
            combined: None,
            provenance,
        })
    }

    pub fn scans(&self) -> &[S] {
        &self.scans
    }

    /// The stitched curve, if [`Self::concatenate`] has been called.
    pub fn combined(&self) -> Option<&ReflectivityCurve> {
        self.combined.as_ref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Split into the combined curve (if any) and its provenance.
    pub fn into_parts(self) -> (Option<ReflectivityCurve>, Provenance) {
        (self.combined, self.provenance)
    }

    /// Total number of points across all scans.
    pub fn num_points(&self) -> usize {
        self.scans.iter().map(|s| s.scan().len()).sum()
    }

    /// Narrow the q range of every scan whose source path contains
    /// `scan_id`. Returns the number of points removed.
    pub fn subsample_q_in(&mut self, scan_id: &str, q_min: f64, q_max: f64) -> Result<usize> {
        let mut removed = 0;
        let mut matched = false;
        for scan in &mut self.scans {
            if scan.scan().metadata().source_path().contains(scan_id) {
                removed += scan.subsample_q(q_min, q_max)?;
                matched = true;
            }
        }
        if !matched {
            return Err(ReflexError::Validation(format!(
                "no scan in the profile matches `{scan_id}`"
            )));
        }
        self.provenance.state.q_subsampled.push(scan_id.to_string());
        self.refresh_combined();
        Ok(removed)
    }

    /// Narrow the q range of every scan. Returns the number of points removed.
    pub fn subsample_q(&mut self, q_min: f64, q_max: f64) -> Result<usize> {
        let mut removed = 0;
        for scan in &mut self.scans {
            removed += scan.subsample_q(q_min, q_max)?;
        }
        self.provenance.state.q_subsampled = self.provenance.scans.clone();
        self.refresh_combined();
        Ok(removed)
    }

    pub fn transmission_normalisation(&mut self) -> Result<()> {
        for scan in &mut self.scans {
            scan.transmission_normalisation(None)?;
        }
        self.provenance.state.transmission_normalised = true;
        self.refresh_combined();
        Ok(())
    }

    pub fn qdcd_normalisation(&mut self, interpolator: &Interpolator) -> Result<()> {
        for scan in &mut self.scans {
            scan.qdcd_normalisation(interpolator)?;
        }
        self.provenance.state.dcd_normalised = true;
        self.refresh_combined();
        Ok(())
    }

    pub fn footprint_correction(&mut self, beam_width: f64, sample_size: f64) -> Result<()> {
        for scan in &mut self.scans {
            scan.footprint_correction(beam_width, sample_size)?;
        }
        self.provenance.state.footprint_corrected = true;
        self.refresh_combined();
        Ok(())
    }

    /// Merge every scan's points into the combined curve, sorted by q.
    pub fn concatenate(&mut self) -> &ReflectivityCurve {
        let curve = concatenate(&self.scans);
        debug!(points = curve.len(), scans = self.scans.len(), "Concatenated scans");
        self.provenance.state.rebinned = None;
        self.provenance.state.normalised = None;
        self.combined.insert(curve)
    }

    /// Rebin the combined curve in place.
    pub fn rebin(&mut self, grid: &RebinGrid) -> Result<&ReflectivityCurve> {
        let current = self.combined.as_ref().ok_or(ReflexError::NotConcatenated)?;
        let binned = rebin(current, grid)?;
        info!(
            before = current.len(),
            after = binned.len(),
            "Rebinned combined curve"
        );
        self.provenance.state.rebinned = Some(match grid {
            RebinGrid::Generated { shape, .. } => shape.to_string(),
            RebinGrid::Explicit(_) => "explicit".to_string(),
        });
        Ok(self.combined.insert(binned))
    }

    /// Scale the combined curve so its total external reflection plateau
    /// sits at one. Returns the divisor.
    pub fn normalise_ter(&mut self, max_q: f64) -> Result<f64> {
        let curve = self.combined.as_mut().ok_or(ReflexError::NotConcatenated)?;
        let level = curve.ter_level(max_q)?;
        curve.scale_down(level);
        self.provenance.state.normalised = Some("ter".to_string());
        Ok(level)
    }

    /// Scale the combined curve so its maximum is one. Returns the divisor.
    pub fn normalise_to_max(&mut self) -> Result<f64> {
        let curve = self.combined.as_mut().ok_or(ReflexError::NotConcatenated)?;
        let max = curve.max_reflectivity().ok_or(ReflexError::EmptySequence)?;
        curve.scale_down(max);
        self.provenance.state.normalised = Some("max".to_string());
        Ok(max)
    }

    fn refresh_combined(&mut self) {
        if self.combined.is_some() {
            self.concatenate();
        }
    }
}

impl Profile<Scan2D> {
    /// Crop every image of every scan to `region`.
    pub fn crop(&mut self, region: &Region) -> Result<()> {
        for scan in &mut self.scans {
            scan.crop(region)?;
        }
        self.provenance.state.cropped = Some(*region);
        self.refresh_combined();
        Ok(())
    }

    /// Crop every image of every scan to a window centred on that image's
    /// brightest pixel.
    pub fn crop_around_peak(&mut self, x_size: usize, y_size: usize) -> Result<()> {
        for scan in &mut self.scans {
            scan.crop_around_peak(x_size, y_size)?;
        }
        self.provenance.state.cropped_around_peak = Some([x_size, y_size]);
        self.refresh_combined();
        Ok(())
    }

    /// Estimate the background of every image without modifying anything.
    /// The outer vector follows scan order.
    pub fn estimate_background(
        &self,
        method: BackgroundMethod,
        regions: &[Region],
    ) -> Result<Vec<Vec<BkgSubInfo>>> {
        self.scans
            .iter()
            .map(|s| s.estimate_background(method, regions))
            .collect()
    }

    /// Subtract per-image estimates produced by [`Self::estimate_background`].
    pub fn subtract_background(&mut self, backgrounds: &[Vec<BkgSubInfo>]) -> Result<()> {
        if backgrounds.len() != self.scans.len() {
            return Err(ReflexError::Shape {
                expected: self.scans.len(),
                actual: backgrounds.len(),
            });
        }
        for (scan, bkg) in self.scans.iter_mut().zip(backgrounds) {
            scan.subtract_background(bkg)?;
        }
        if let Some(method) = backgrounds.iter().flatten().next().map(|b| b.method) {
            self.provenance.state.background = Some(method.to_string());
        }
        self.refresh_combined();
        Ok(())
    }

    /// Estimate and subtract the background of every image, with regions in
    /// the images' current coordinates.
    pub fn bkg_sub(
        &mut self,
        method: BackgroundMethod,
        regions: &[Region],
    ) -> Result<Vec<Vec<BkgSubInfo>>> {
        let backgrounds = self.estimate_background(method, regions)?;
        self.subtract_background(&backgrounds)?;
        Ok(backgrounds)
    }
}

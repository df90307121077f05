use std::sync::Arc;

use tracing::info;

use crate::background::BackgroundMethod;
use crate::corrections::get_interpolator;
use crate::error::{ReflexError, Result};
use crate::io::ScanSource;
use crate::profile::Profile;
use crate::region::Region;
use crate::scan::{Measurement, Scan2D};

use super::config::ReductionConfig;
use super::types::{NoOpReporter, ProgressReporter, ReductionOutput, ReductionStage};

/// Crop region: explicit, else the first signal region of the first scan.
/// Unused when frames are cropped around their peaks.
fn resolve_crop_region(config: &ReductionConfig, scans: &[Scan2D]) -> Result<Region> {
    if let Some(region) = config.crop.region {
        return Ok(region);
    }
    let region = scans
        .first()
        .and_then(|s| s.scan().metadata().signal_regions().first().copied())
        .ok_or_else(|| {
            ReflexError::Validation(
                "no crop region configured and the scan metadata records no signal region".into(),
            )
        })?;
    info!(region = %region, "Crop region taken from scan metadata");
    Ok(region)
}

/// Background regions: explicit, else from the first scan's metadata
/// (background regions for ROI, signal regions for area).
fn resolve_background_regions(config: &ReductionConfig, scans: &[Scan2D]) -> Vec<Region> {
    if let Some(regions) = &config.background.regions {
        return regions.clone();
    }
    let Some(first) = scans.first() else {
        return Vec::new();
    };
    let metadata = first.scan().metadata();
    match config.background.method {
        BackgroundMethod::Area => metadata.signal_regions(),
        _ => metadata.background_regions(),
    }
}

/// Run the full reduction with a thread-safe progress reporter.
///
/// Stages run in a fixed order: load, crop, background, DCD normalisation
/// (when configured), footprint, transmission, stitching, q bounding,
/// rebinning (when configured) and TER normalisation (when configured).
pub fn run_reduction(
    config: &ReductionConfig,
    source: &dyn ScanSource,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<ReductionOutput> {
    config.validate()?;

    reporter.begin_stage(ReductionStage::Loading, Some(config.scans.len()));
    let mut scans = Vec::with_capacity(config.scans.len());
    for (i, path) in config.scans.iter().enumerate() {
        scans.push(source.load(path)?);
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    let method = config.background.method;
    let regions = resolve_background_regions(config, &scans);
    let mut profile = Profile::new(scans)?;
    info!(
        scans = profile.scans().len(),
        points = profile.num_points(),
        "Loaded profile"
    );

    // Region-based estimates need frames in detector coordinates, so they
    // are taken before cropping and subtracted afterwards.
    let early_backgrounds = if method.uses_regions() {
        reporter.begin_stage(ReductionStage::Background, None);
        let estimates = profile.estimate_background(method, &regions)?;
        reporter.finish_stage();
        Some(estimates)
    } else {
        None
    };

    reporter.begin_stage(ReductionStage::Cropping, None);
    match config.crop.around_peak {
        Some(window) => {
            profile.crop_around_peak(window.x_size, window.y_size)?;
            info!(
                x_size = window.x_size,
                y_size = window.y_size,
                "Cropped every frame around its peak"
            );
        }
        None => {
            let region = resolve_crop_region(config, profile.scans())?;
            profile.crop(&region)?;
        }
    }
    reporter.finish_stage();

    reporter.begin_stage(ReductionStage::Background, None);
    let backgrounds = match early_backgrounds {
        Some(estimates) => {
            profile.subtract_background(&estimates)?;
            estimates
        }
        None => profile.bkg_sub(method, &[])?,
    };
    reporter.finish_stage();
    info!(method = %method, "Background subtracted");

    if let Some(norm) = &config.setup.normalisation {
        reporter.begin_stage(ReductionStage::DcdNormalisation, None);
        let itp = get_interpolator(&norm.file, &norm.axis_column, &norm.intensity_column)?;
        profile.qdcd_normalisation(&itp)?;
        reporter.finish_stage();
    }

    reporter.begin_stage(ReductionStage::Footprint, None);
    profile.footprint_correction(config.setup.beam_width, config.setup.sample_size)?;
    reporter.finish_stage();

    reporter.begin_stage(ReductionStage::Transmission, None);
    profile.transmission_normalisation()?;
    reporter.finish_stage();

    reporter.begin_stage(ReductionStage::Stitching, None);
    profile.concatenate();
    reporter.finish_stage();

    if !config.q_subsample.is_empty() {
        reporter.begin_stage(ReductionStage::Subsampling, Some(config.q_subsample.len()));
        for (i, sub) in config.q_subsample.iter().enumerate() {
            let removed = profile.subsample_q_in(&sub.scan_id, sub.q_min, sub.q_max)?;
            info!(scan = %sub.scan_id, removed, "Bounded q range");
            reporter.advance(i + 1);
        }
        reporter.finish_stage();
    }

    if let Some(rebin) = &config.rebin {
        reporter.begin_stage(ReductionStage::Rebinning, None);
        profile.rebin(&rebin.grid()?)?;
        reporter.finish_stage();
    }

    if config.output.ter_normalise {
        reporter.begin_stage(ReductionStage::Normalising, None);
        let level = profile.normalise_ter(config.output.ter_max_q)?;
        info!(level, "Normalised to the TER plateau");
        reporter.finish_stage();
    }

    let (curve, provenance) = profile.into_parts();
    let curve = curve.ok_or(ReflexError::NotConcatenated)?;
    info!(points = curve.len(), "Reduction complete");
    Ok(ReductionOutput {
        curve,
        provenance,
        backgrounds,
    })
}

/// Run the full reduction without progress reporting.
pub fn reduce(config: &ReductionConfig, source: &dyn ScanSource) -> Result<ReductionOutput> {
    run_reduction(config, source, Arc::new(NoOpReporter))
}

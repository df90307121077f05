use crate::consts::ZERO_COUNT_UNCERTAINTY;
use crate::error::{ReflexError, Result};
use crate::image::Image;
use crate::region::Region;

use super::{BackgroundMethod, BkgSubInfo};

/// Per-pixel background from the counts inside one or more background
/// regions, treated as a single Poisson measurement.
///
/// Overlapping regions count their shared pixels once per region.
pub fn roi_subtraction(image: &Image, regions: &[Region]) -> Result<BkgSubInfo> {
    if regions.is_empty() {
        return Err(ReflexError::Validation(
            "ROI background subtraction needs at least one background region".into(),
        ));
    }
    let mut total = 0.0;
    let mut num_pixels = 0;
    for region in regions {
        let (sum, n) = image.region_total(region)?;
        total += sum;
        num_pixels += n;
    }
    Ok(poisson_background(total, num_pixels, BackgroundMethod::Roi))
}

/// Per-pixel background from every pixel outside the signal regions.
pub fn area_subtraction(image: &Image, signal_regions: &[Region]) -> Result<BkgSubInfo> {
    let shape = image.shape();
    if let Some(r) = signal_regions.iter().find(|r| !r.fits_within(shape)) {
        return Err(ReflexError::Bounds(format!(
            "signal region ({r}) exceeds image shape {shape:?}"
        )));
    }
    let mut total = 0.0;
    let mut num_pixels = 0;
    for ((x, y), &v) in image.values().indexed_iter() {
        if !signal_regions.iter().any(|r| r.contains(x, y)) {
            total += v;
            num_pixels += 1;
        }
    }
    if num_pixels == 0 {
        return Err(ReflexError::Validation(
            "signal regions cover the whole image; no background pixels left".into(),
        ));
    }
    Ok(poisson_background(total, num_pixels, BackgroundMethod::Area))
}

fn poisson_background(total: f64, num_pixels: usize, method: BackgroundMethod) -> BkgSubInfo {
    // One square root for the whole area, never zero.
    let mut total_e = total.max(0.0).sqrt();
    if total_e == 0.0 {
        total_e = ZERO_COUNT_UNCERTAINTY;
    }
    let n = num_pixels as f64;
    BkgSubInfo {
        bkg: total / n,
        bkg_e: total_e / n,
        method,
        fit: None,
    }
}

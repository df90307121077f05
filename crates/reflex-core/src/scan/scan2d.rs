use ndarray::Array1;
use rayon::prelude::*;
use tracing::debug;

use crate::background::{BackgroundMethod, BkgSubInfo};
use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{ReflexError, Result};
use crate::image::Image;
use crate::region::Region;

use super::data::keep_mask;
use super::{Measurement, Scan};

/// A scan whose intensities come from one detector image per point.
///
/// Images stay index-aligned with the per-point arrays for the lifetime of
/// the scan.
#[derive(Clone, Debug)]
pub struct Scan2D {
    scan: Scan,
    images: Vec<Image>,
}

impl Scan2D {
    /// Fails with [`ReflexError::Shape`] unless there is exactly one image per
    /// point.
    pub fn new(scan: Scan, images: Vec<Image>) -> Result<Self> {
        if images.len() != scan.len() {
            return Err(ReflexError::Shape {
                expected: scan.len(),
                actual: images.len(),
            });
        }
        Ok(Self { scan, images })
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Crop every image to `region` and recompute the per-point intensities
    /// from the cropped images.
    ///
    /// Nothing is modified unless the region fits every image.
    pub fn crop(&mut self, region: &Region) -> Result<()> {
        if let Some((i, img)) = self
            .images
            .iter()
            .enumerate()
            .find(|(_, img)| !region.fits_within(img.shape()))
        {
            return Err(ReflexError::Bounds(format!(
                "crop region ({region}) exceeds image {i} of shape {:?}",
                img.shape()
            )));
        }
        self.images
            .par_iter_mut()
            .with_min_len(PARALLEL_FRAME_THRESHOLD)
            .try_for_each(|img| img.crop(region))?;
        debug!(
            source = self.scan.metadata().source_path(),
            region = %region,
            frames = self.images.len(),
            "Cropped images"
        );
        self.refresh_intensity()
    }

    /// Crop every image to an `x_size` by `y_size` window centred on its own
    /// brightest pixel, then recompute the per-point intensities. Returns the
    /// window used for each image.
    pub fn crop_around_peak(&mut self, x_size: usize, y_size: usize) -> Result<Vec<Region>> {
        let windows = self
            .images
            .par_iter()
            .with_min_len(PARALLEL_FRAME_THRESHOLD)
            .map(|img| Region::around_peak(img, x_size, y_size))
            .collect::<Result<Vec<_>>>()?;
        self.images
            .par_iter_mut()
            .with_min_len(PARALLEL_FRAME_THRESHOLD)
            .zip(windows.par_iter())
            .try_for_each(|(img, region)| img.crop(region))?;
        debug!(
            source = self.scan.metadata().source_path(),
            x_size,
            y_size,
            frames = self.images.len(),
            "Cropped images around their peaks"
        );
        self.refresh_intensity()?;
        Ok(windows)
    }

    /// Estimate the background of every image on its own, one result per
    /// image. A frame that fails leaves the other estimates intact, so the
    /// caller can drop that point or estimate it another way.
    pub fn estimate_each(
        &self,
        method: BackgroundMethod,
        regions: &[Region],
    ) -> Vec<Result<BkgSubInfo>> {
        self.images
            .par_iter()
            .with_min_len(PARALLEL_FRAME_THRESHOLD)
            .map(|img| method.estimate(img, regions))
            .collect()
    }

    /// Estimate the background of every image, in order. Images are left
    /// untouched. The first failure is returned naming the scan and frame.
    pub fn estimate_background(
        &self,
        method: BackgroundMethod,
        regions: &[Region],
    ) -> Result<Vec<BkgSubInfo>> {
        let source = self.scan.metadata().source_path();
        self.estimate_each(method, regions)
            .into_iter()
            .enumerate()
            .map(|(i, estimate)| estimate.map_err(|e| frame_error(e, source, i)))
            .collect()
    }

    /// Subtract one background estimate from each image and recompute the
    /// per-point intensities.
    pub fn subtract_background(&mut self, backgrounds: &[BkgSubInfo]) -> Result<()> {
        if backgrounds.len() != self.images.len() {
            return Err(ReflexError::Shape {
                expected: self.images.len(),
                actual: backgrounds.len(),
            });
        }
        self.images
            .par_iter_mut()
            .with_min_len(PARALLEL_FRAME_THRESHOLD)
            .zip(backgrounds.par_iter())
            .for_each(|(img, info)| img.background_subtraction(info.bkg, info.bkg_e));
        self.refresh_intensity()
    }

    /// Estimate and subtract the background of every image, with regions in
    /// the images' current coordinates. Returns the per-image estimates.
    pub fn bkg_sub(
        &mut self,
        method: BackgroundMethod,
        regions: &[Region],
    ) -> Result<Vec<BkgSubInfo>> {
        let backgrounds = self.estimate_background(method, regions)?;
        self.subtract_background(&backgrounds)?;
        debug!(
            source = self.scan.metadata().source_path(),
            method = %method,
            frames = backgrounds.len(),
            "Subtracted background"
        );
        Ok(backgrounds)
    }

    fn refresh_intensity(&mut self) -> Result<()> {
        let sums: Vec<(f64, f64)> = self.images.par_iter().map(Image::sum).collect();
        let intensity: Array1<f64> = sums.iter().map(|s| s.0).collect();
        let intensity_e: Array1<f64> = sums.iter().map(|s| s.1).collect();
        self.scan.data_mut().set_intensity(intensity, intensity_e)
    }
}

/// Prefix a per-frame error message with the scan and frame it came from.
fn frame_error(err: ReflexError, source: &str, frame: usize) -> ReflexError {
    let at = |msg: String| format!("{source} frame {frame}: {msg}");
    match err {
        ReflexError::FitConvergence(msg) => ReflexError::FitConvergence(at(msg)),
        ReflexError::Validation(msg) => ReflexError::Validation(at(msg)),
        ReflexError::Bounds(msg) => ReflexError::Bounds(at(msg)),
        other => other,
    }
}

impl Measurement for Scan2D {
    fn scan(&self) -> &Scan {
        &self.scan
    }

    fn scan_mut(&mut self) -> &mut Scan {
        &mut self.scan
    }

    fn remove_data_points(&mut self, indices: &[usize]) -> Result<()> {
        let keep = keep_mask(self.images.len(), indices)?;
        self.scan.data_mut().remove_points(indices)?;
        let mut keep = keep.into_iter();
        self.images.retain(|_| keep.next().unwrap_or(false));
        Ok(())
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use reflex_core::io::{ManifestSource, ScanSource};
use reflex_core::scan::Measurement;

#[derive(Args)]
pub struct InfoArgs {
    /// Scan manifest (TOML)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let scan = ManifestSource
        .load(&args.file)
        .with_context(|| format!("Failed to load scan {}", args.file.display()))?;
    let meta = scan.scan().metadata();
    let data = scan.scan().data();

    println!("Source:      {}", meta.source_path());
    println!("Points:      {}", data.len());
    println!("Energy:      {} keV", meta.probe_energy());
    println!(
        "Axis:        {} ({})",
        meta.default_axis_name(),
        meta.default_axis_type()
    );
    if let Some(img) = scan.images().first() {
        let (x, y) = img.shape();
        println!("Frame shape: {}x{}", x, y);
    }
    if !data.is_empty() {
        let q = data.q();
        println!(
            "q range:     {:.5} .. {:.5} 1/Å",
            q.fold(f64::INFINITY, |a, &b| a.min(b)),
            q.fold(f64::NEG_INFINITY, |a, &b| a.max(b))
        );
    }
    println!("Detector:    {} m", meta.detector_distance());

    for region in meta.signal_regions() {
        println!("Signal ROI:  {}", region);
    }
    for region in meta.background_regions() {
        println!("Bkg ROI:     {}", region);
    }

    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use reflex_core::io::{write_reflectivity, ManifestSource};
use reflex_core::pipeline::config::ReductionConfig;
use reflex_core::pipeline::run_reduction;
use tracing::info;

use crate::progress::BarReporter;
use crate::summary::{print_reduction_result, print_reduction_summary};

#[derive(Args)]
pub struct ReduceArgs {
    /// Reduction config file (TOML)
    pub config: PathBuf,

    /// Output file path
    #[arg(short, long, default_value = "reflectivity.dat")]
    pub output: PathBuf,
}

pub fn run(args: &ReduceArgs) -> Result<()> {
    let config = ReductionConfig::read(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;

    print_reduction_summary(&config, &args.output);

    let reporter = Arc::new(BarReporter::new()?);
    let output = run_reduction(&config, &ManifestSource, reporter.clone())
        .context("Reduction failed")?;
    reporter.finish();

    write_reflectivity(
        &args.output,
        &output.curve,
        &output.provenance,
        config.output.normalise,
    )
    .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(output = %args.output.display(), points = output.curve.len(), "Wrote reduced curve");
    print_reduction_result(&output, &args.output);
    Ok(())
}

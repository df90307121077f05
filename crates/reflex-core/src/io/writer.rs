use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{ReflexError, Result};
use crate::profile::Provenance;
use crate::stitching::ReflectivityCurve;

/// Write a reduced curve as a whitespace-separated text table.
///
/// The file opens with the provenance as `#`-prefixed TOML, then a column
/// line and one row per point. With `normalise` set, a fourth column holds
/// the reflectivity divided by its maximum.
pub fn write_reflectivity(
    path: &Path,
    curve: &ReflectivityCurve,
    provenance: &Provenance,
    normalise: bool,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_table(&mut out, curve, provenance, normalise)?;
    out.flush()?;
    info!(path = %path.display(), points = curve.len(), "Wrote reflectivity");
    Ok(())
}

/// Format the table produced by [`write_reflectivity`] into any writer.
pub fn write_table<W: Write>(
    out: &mut W,
    curve: &ReflectivityCurve,
    provenance: &Provenance,
    normalise: bool,
) -> Result<()> {
    let header = toml::to_string(provenance)
        .map_err(|e| ReflexError::Validation(format!("cannot serialize provenance: {e}")))?;
    for line in header.lines() {
        writeln!(out, "# {line}")?;
    }

    let max = curve.max_reflectivity().unwrap_or(1.0);
    if normalise {
        writeln!(out, "# Q(1/Å) R R_error R_normalised")?;
    } else {
        writeln!(out, "# Q(1/Å) R R_error")?;
    }
    for i in 0..curve.len() {
        write!(
            out,
            "{:.18e} {:.18e} {:.18e}",
            curve.q[i], curve.r[i], curve.r_e[i]
        )?;
        if normalise {
            write!(out, " {:.18e}", curve.r[i] / max)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

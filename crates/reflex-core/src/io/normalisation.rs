use std::path::Path;

use tracing::debug;

use crate::error::{ReflexError, Result};

/// Marker line that ends the metadata header of a `.dat` scan file.
const DAT_END_MARKER: &str = "&END";

/// Read `(axis, intensity)` columns from a normalisation reference file.
///
/// Two layouts are understood:
/// - a `.dat` scan file: everything up to the ` &END` line (including any
///   `<MetaDataAtStart>` block) is header, the next line holds column titles
///   and the rest is whitespace-separated data;
/// - a plain whitespace table with optional `#` comments, whose first row may
///   name the columns. Without a title row the first two columns are used.
pub fn read_normalisation_file(
    path: &Path,
    axis_column: &str,
    intensity_column: &str,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let text = std::fs::read_to_string(path)?;
    parse_normalisation_table(&text, axis_column, intensity_column)
}

/// Parse the contents of a normalisation reference file.
/// See [`read_normalisation_file`].
pub fn parse_normalisation_table(
    text: &str,
    axis_column: &str,
    intensity_column: &str,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let lines: Vec<(usize, &str)> = text.lines().enumerate().collect();

    let body: Vec<(usize, &str)> = match lines
        .iter()
        .position(|(_, l)| l.trim() == DAT_END_MARKER)
    {
        Some(end) => {
            debug!(header_lines = end + 1, "Skipping .dat metadata header");
            lines[end + 1..].to_vec()
        }
        None => lines,
    };
    let mut rows = body
        .into_iter()
        .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

    let (first_no, first) = rows
        .next()
        .ok_or_else(|| ReflexError::DataFormat("normalisation file holds no data".into()))?;
    let first_fields: Vec<&str> = first.split_whitespace().collect();
    let titled = first_fields.iter().any(|f| f.parse::<f64>().is_err());

    let (axis_idx, intensity_idx) = if titled {
        (
            column_index(&first_fields, axis_column)?,
            column_index(&first_fields, intensity_column)?,
        )
    } else {
        (0, 1)
    };

    let mut axis = Vec::new();
    let mut intensity = Vec::new();
    let data_rows = (!titled)
        .then_some((first_no, first))
        .into_iter()
        .chain(rows);
    for (line_no, line) in data_rows {
        let fields: Vec<&str> = line.split_whitespace().collect();
        axis.push(parse_field(&fields, axis_idx, line_no)?);
        intensity.push(parse_field(&fields, intensity_idx, line_no)?);
    }

    if axis.is_empty() {
        return Err(ReflexError::DataFormat(
            "normalisation file has a header but no data rows".into(),
        ));
    }
    Ok((axis, intensity))
}

fn column_index(titles: &[&str], name: &str) -> Result<usize> {
    titles.iter().position(|t| *t == name).ok_or_else(|| {
        ReflexError::DataFormat(format!(
            "normalisation file has no `{name}` column (found: {})",
            titles.join(", ")
        ))
    })
}

fn parse_field(fields: &[&str], idx: usize, line_no: usize) -> Result<f64> {
    let raw = fields.get(idx).ok_or_else(|| {
        ReflexError::DataFormat(format!(
            "line {}: expected at least {} columns, found {}",
            line_no + 1,
            idx + 1,
            fields.len()
        ))
    })?;
    raw.parse::<f64>().map_err(|_| {
        ReflexError::DataFormat(format!("line {}: `{raw}` is not a number", line_no + 1))
    })
}

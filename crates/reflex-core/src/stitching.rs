//! Merging overlapping scans into one curve.
//!
//! [`concatenate`] is a pure merge-and-sort over every scan's points.
//! [`rebin`] then averages the points in each q bin with inverse-variance
//! weights, which is the minimum-variance combination of independent
//! measurements of the same quantity.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{DEFAULT_NUMBER_OF_Q_VECTORS, REBIN_Q_EPSILON};
use crate::error::{ReflexError, Result};
use crate::scan::Measurement;

/// Reflectivity against momentum transfer, ascending in q.
#[derive(Clone, Debug, PartialEq)]
pub struct ReflectivityCurve {
    pub q: Array1<f64>,
    pub r: Array1<f64>,
    pub r_e: Array1<f64>,
}

impl ReflectivityCurve {
    pub fn new(q: Array1<f64>, r: Array1<f64>, r_e: Array1<f64>) -> Result<Self> {
        for len in [r.len(), r_e.len()] {
            if len != q.len() {
                return Err(ReflexError::Shape {
                    expected: q.len(),
                    actual: len,
                });
            }
        }
        Ok(Self { q, r, r_e })
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// Largest reflectivity value, or `None` for an empty curve.
    pub fn max_reflectivity(&self) -> Option<f64> {
        self.r.iter().copied().reduce(f64::max)
    }

    /// Divide reflectivity and its uncertainty by `factor`.
    pub fn scale_down(&mut self, factor: f64) {
        self.r /= factor;
        self.r_e /= factor;
    }

    /// Mean reflectivity of the total external reflection plateau.
    ///
    /// The plateau is taken as the points with `q < max_q` up to and
    /// including the one before the steepest drop. Without any drop, every
    /// point below `max_q` counts.
    pub fn ter_level(&self, max_q: f64) -> Result<f64> {
        let below = self.q.iter().take_while(|&&q| q < max_q).count();
        if below < 2 {
            return Err(ReflexError::Validation(format!(
                "need at least two points below q = {max_q} to find the TER plateau, found {below}"
            )));
        }
        let r = &self.r;
        let steepest = (0..below - 1)
            .map(|i| (i, r[i + 1] - r[i]))
            .filter(|&(_, d)| d < 0.0)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i + 1)
            .unwrap_or(below);
        let plateau = r.slice(ndarray::s![..steepest]);
        Ok(plateau.sum() / steepest as f64)
    }
}

/// Merge every scan's `(q, I, I_e)` into one sequence sorted by q.
///
/// The sort is stable, so points with equal q keep scan order.
pub fn concatenate<S: Measurement>(scans: &[S]) -> ReflectivityCurve {
    let mut points: Vec<(f64, f64, f64)> = scans
        .iter()
        .flat_map(|s| {
            let d = s.scan().data();
            d.q()
                .iter()
                .zip(d.intensity())
                .zip(d.intensity_e())
                .map(|((&q, &i), &e)| (q, i, e))
                .collect::<Vec<_>>()
        })
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    ReflectivityCurve {
        q: points.iter().map(|p| p.0).collect(),
        r: points.iter().map(|p| p.1).collect(),
        r_e: points.iter().map(|p| p.2).collect(),
    }
}

/// Spacing of a generated rebinning grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebinShape {
    #[default]
    Linear,
    Log,
}

impl std::fmt::Display for RebinShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Log => write!(f, "log"),
        }
    }
}

/// How to place the bins of [`rebin`].
#[derive(Clone, Debug, PartialEq)]
pub enum RebinGrid {
    /// `number_of_q_vectors` bins spanning the data, padded slightly above the
    /// largest q so it is enclosed.
    Generated {
        shape: RebinShape,
        number_of_q_vectors: usize,
    },
    /// Bin left edges. The last bin repeats the width of the one before it.
    Explicit(Vec<f64>),
}

impl Default for RebinGrid {
    fn default() -> Self {
        Self::Generated {
            shape: RebinShape::Linear,
            number_of_q_vectors: DEFAULT_NUMBER_OF_Q_VECTORS,
        }
    }
}

/// Bin edges for `grid` over the q range of `curve`: one more edge than bins.
pub fn bin_edges(curve: &ReflectivityCurve, grid: &RebinGrid) -> Result<Vec<f64>> {
    match grid {
        RebinGrid::Generated {
            shape,
            number_of_q_vectors: n,
        } => {
            let n = *n;
            if n == 0 {
                return Err(ReflexError::Validation(
                    "rebinning needs at least one bin".into(),
                ));
            }
            let (Some(lo), Some(hi)) = (
                curve.q.iter().copied().reduce(f64::min),
                curve.q.iter().copied().reduce(f64::max),
            ) else {
                return Err(ReflexError::EmptySequence);
            };
            let hi = hi + REBIN_Q_EPSILON;
            match shape {
                RebinShape::Linear => Ok((0..=n)
                    .map(|i| lo + (hi - lo) * i as f64 / n as f64)
                    .collect()),
                RebinShape::Log => {
                    if lo <= 0.0 {
                        return Err(ReflexError::Validation(format!(
                            "logarithmic rebinning needs q > 0, smallest q is {lo}"
                        )));
                    }
                    let (a, b) = (lo.log10(), hi.log10());
                    let mut edges: Vec<f64> = (0..=n)
                        .map(|i| 10f64.powf(a + (b - a) * i as f64 / n as f64))
                        .collect();
                    // powf round-off must not push the outermost points out.
                    edges[0] = lo;
                    edges[n] = hi;
                    Ok(edges)
                }
            }
        }
        RebinGrid::Explicit(left_edges) => {
            if left_edges.len() < 2 {
                return Err(ReflexError::Validation(
                    "explicit rebinning needs at least two q values".into(),
                ));
            }
            if left_edges.iter().any(|v| !v.is_finite())
                || left_edges.windows(2).any(|w| w[0] >= w[1])
            {
                return Err(ReflexError::Validation(
                    "explicit rebinning q values must be strictly increasing".into(),
                ));
            }
            let n = left_edges.len();
            let mut edges = left_edges.clone();
            edges.push(left_edges[n - 1] + (left_edges[n - 1] - left_edges[n - 2]));
            Ok(edges)
        }
    }
}

#[derive(Clone, Copy, Default)]
struct BinSums {
    count: usize,
    q: f64,
    weight: f64,
    weighted_r: f64,
}

/// Rebin `curve` onto `grid` with inverse-variance weighting.
///
/// Each bin `[edge_i, edge_i+1)` reports the plain mean of its q values,
/// `R = Σ(R/σ²) / Σ(1/σ²)` and `σ = 1/sqrt(Σ(1/σ²))`. Bins without points
/// are dropped, as are points outside every bin.
pub fn rebin(curve: &ReflectivityCurve, grid: &RebinGrid) -> Result<ReflectivityCurve> {
    let edges = bin_edges(curve, grid)?;
    let num_bins = edges.len() - 1;
    let mut bins = vec![BinSums::default(); num_bins];

    for ((&q, &r), &e) in curve.q.iter().zip(&curve.r).zip(&curve.r_e) {
        if !(e.is_finite() && e > 0.0) {
            return Err(ReflexError::Validation(format!(
                "cannot weight the point at q = {q} with uncertainty {e}"
            )));
        }
        let upper = edges.partition_point(|&edge| edge <= q);
        if upper == 0 || upper > num_bins {
            continue;
        }
        let bin = &mut bins[upper - 1];
        let w = 1.0 / (e * e);
        bin.count += 1;
        bin.q += q;
        bin.weight += w;
        bin.weighted_r += r * w;
    }

    let filled: Vec<&BinSums> = bins.iter().filter(|b| b.count > 0).collect();
    debug!(
        bins = num_bins,
        filled = filled.len(),
        points = curve.len(),
        "Rebinned curve"
    );
    Ok(ReflectivityCurve {
        q: filled.iter().map(|b| b.q / b.count as f64).collect(),
        r: filled.iter().map(|b| b.weighted_r / b.weight).collect(),
        r_e: filled.iter().map(|b| 1.0 / b.weight.sqrt()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn curve(q: Vec<f64>) -> ReflectivityCurve {
        let n = q.len();
        ReflectivityCurve::new(Array1::from(q), Array1::ones(n), Array1::ones(n)).unwrap()
    }

    #[test]
    fn test_generated_linear_edges() {
        let c = curve(vec![0.0, 0.999]);
        let edges = bin_edges(
            &c,
            &RebinGrid::Generated {
                shape: RebinShape::Linear,
                number_of_q_vectors: 4,
            },
        )
        .unwrap();
        assert_eq!(edges.len(), 5);
        assert!((edges[4] - 1.0).abs() < 1e-12);
        assert!((edges[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_log_grid_rejects_non_positive_q() {
        let c = curve(vec![0.0, 0.1]);
        let grid = RebinGrid::Generated {
            shape: RebinShape::Log,
            number_of_q_vectors: 10,
        };
        assert!(matches!(bin_edges(&c, &grid), Err(ReflexError::Validation(_))));
    }

    #[test]
    fn test_explicit_edges_extend_last_bin() {
        let c = curve(vec![0.1]);
        let edges = bin_edges(&c, &RebinGrid::Explicit(vec![0.1, 0.2, 0.4])).unwrap();
        assert_eq!(edges.len(), 4);
        assert!((edges[3] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_edges_must_increase() {
        let c = curve(vec![0.1]);
        assert!(bin_edges(&c, &RebinGrid::Explicit(vec![0.2, 0.1])).is_err());
        assert!(bin_edges(&c, &RebinGrid::Explicit(vec![0.2])).is_err());
    }

    #[test]
    fn test_ter_level_stops_at_steepest_drop() {
        let c = ReflectivityCurve::new(
            array![0.01, 0.02, 0.03, 0.04, 0.2],
            array![1.0, 1.1, 0.9, 0.1, 0.01],
            array![0.1, 0.1, 0.1, 0.1, 0.1],
        )
        .unwrap();
        // Steepest drop is 0.9 -> 0.1, so the plateau is the first three points.
        let level = c.ter_level(0.1).unwrap();
        assert!((level - 1.0).abs() < 1e-12);
    }
}

//! Map quality measures.
//!
//! All measures use Euclidean distance regardless of the training metric.

use crate::error::{Result, SomError};
use crate::som::distance::{bmus, closest_n_vec, distance_matrix, Metric};
use crate::som::grid::NEIGHBOR_THRESHOLD;
use log::warn;
use ndarray::{ArrayView1, ArrayView2};
use rayon::prelude::*;
use std::fmt;

/// Value recorded in a [`QualityReport`] for a measure that failed.
pub const METRIC_SENTINEL: f64 = -1.0;

fn check_operands(data: ArrayView2<f64>, codebook: ArrayView2<f64>) -> Result<()> {
    if data.nrows() == 0 || data.ncols() == 0 {
        return Err(SomError::InvalidInput(format!(
            "invalid data supplied: {}x{}",
            data.nrows(),
            data.ncols()
        )));
    }
    if codebook.nrows() == 0 {
        return Err(SomError::InvalidInput("invalid codebook supplied: no rows".to_string()));
    }
    if data.ncols() != codebook.ncols() {
        return Err(SomError::DimensionMismatch {
            context: "quality measure",
            expected: codebook.ncols(),
            found: data.ncols(),
        });
    }
    Ok(())
}

fn check_unit_dist(codebook: ArrayView2<f64>, unit_dist: ArrayView2<f64>) -> Result<()> {
    if unit_dist.nrows() != unit_dist.ncols() {
        return Err(SomError::DimensionMismatch {
            context: "unit distance matrix",
            expected: unit_dist.nrows(),
            found: unit_dist.ncols(),
        });
    }
    if unit_dist.nrows() != codebook.nrows() {
        return Err(SomError::DimensionMismatch {
            context: "grid and codebook",
            expected: unit_dist.nrows(),
            found: codebook.nrows(),
        });
    }
    Ok(())
}

/// Mean distance between each sample and its BMU.
pub fn quant_error(data: ArrayView2<f64>, codebook: ArrayView2<f64>) -> Result<f64> {
    check_operands(data, codebook)?;
    let bmus = bmus(Metric::Euclidean, data, codebook)?;

    let total: f64 = bmus
        .par_iter()
        .enumerate()
        .map(|(i, &bmu)| {
            let d = &data.row(i) - &codebook.row(bmu);
            d.dot(&d).sqrt()
        })
        .sum();
    Ok(total / data.nrows() as f64)
}

/// Fraction of samples whose two closest units are not lattice neighbours.
///
/// `unit_dist` is the lattice distance matrix of the map.
pub fn topo_error(data: ArrayView2<f64>, codebook: ArrayView2<f64>, unit_dist: ArrayView2<f64>) -> Result<f64> {
    check_operands(data, codebook)?;
    check_unit_dist(codebook, unit_dist)?;

    let mut errors = 0usize;
    for sample in data.outer_iter() {
        let closest = closest_n_vec(Metric::Euclidean, 2, sample, codebook)?;
        if unit_dist[[closest[0], closest[1]]] >= NEIGHBOR_THRESHOLD {
            errors += 1;
        }
    }
    Ok(errors as f64 / data.nrows() as f64)
}

/// Indices other than `own`, ordered by ascending distance.
fn ranked_neighbours(distances: ArrayView1<f64>, own: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..distances.len()).filter(|&j| j != own).collect();
    idx.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)));
    idx
}

/// Topographic product of `codebook` on a lattice with distances `unit_dist`.
///
/// Compares, for every unit, the ranking of the other units by lattice
/// distance with their ranking by codebook distance. Zero means both
/// rankings agree. Returns `+∞` when two codebook rows coincide.
pub fn topo_product(codebook: ArrayView2<f64>, unit_dist: ArrayView2<f64>) -> Result<f64> {
    let n = codebook.nrows();
    if n < 2 || codebook.ncols() == 0 {
        return Err(SomError::InvalidInput(format!(
            "invalid codebook supplied: {}x{}",
            n,
            codebook.ncols()
        )));
    }
    check_unit_dist(codebook, unit_dist)?;

    let code_dist = distance_matrix(Metric::Euclidean, codebook)?;

    let duplicate = code_dist
        .indexed_iter()
        .any(|((i, j), &d)| i != j && d == 0.0);
    if duplicate {
        warn!("Identical codebook vectors found, topographic product is infinite");
        return Ok(f64::INFINITY);
    }

    let mut tp = 0.0;
    for i in 0..n {
        let by_lattice = ranked_neighbours(unit_dist.row(i), i);
        let by_codebook = ranked_neighbours(code_dist.row(i), i);

        let mut p3 = 1.0;
        for (k, (&l, &c)) in by_lattice.iter().zip(by_codebook.iter()).enumerate() {
            let q1 = code_dist[[i, l]] / code_dist[[i, c]];
            let q2 = unit_dist[[i, l]] / unit_dist[[i, c]];
            if q1.is_nan() || q2.is_nan() {
                return Ok(f64::INFINITY);
            }
            p3 *= q1 * q2;
            tp += p3.powf(1.0 / (2.0 * (k + 1) as f64)).ln();
        }
    }
    Ok(tp / (n * (n - 1)) as f64)
}

/// All three quality measures of a trained map.
///
/// A measure that could not be computed holds [`METRIC_SENTINEL`] and its
/// error message is kept in `errors`.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    /// Quantization error.
    pub quant_error: f64,
    /// Topographic error.
    pub topo_error: f64,
    /// Topographic product.
    pub topo_product: f64,
    /// Messages of the measures that failed.
    pub errors: Vec<String>,
}

impl QualityReport {
    /// Computes every measure, recording failures instead of stopping.
    pub fn compute(data: ArrayView2<f64>, codebook: ArrayView2<f64>, unit_dist: ArrayView2<f64>) -> Self {
        let mut errors = Vec::new();
        let mut record = |name: &str, value: Result<f64>| match value {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to compute {}: {}", name, e);
                errors.push(format!("{}: {}", name, e));
                METRIC_SENTINEL
            }
        };

        let quant_error = record("quantization error", quant_error(data, codebook));
        let topo_error = record("topographic error", topo_error(data, codebook, unit_dist));
        let topo_product = record("topographic product", topo_product(codebook, unit_dist));

        Self {
            quant_error,
            topo_error,
            topo_product,
            errors,
        }
    }

    /// True when every measure was computed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Quantization error: {:.6}", self.quant_error)?;
        writeln!(f, "Topographic error:  {:.6}", self.topo_error)?;
        write!(f, "Topographic product: {:.6}", self.topo_product)
    }
}

//! Distance metrics and Best Matching Unit search.

use crate::error::{Result, SomError};
use crate::som::heap::BoundedMaxHeap;
use log::warn;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance metric between two vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// L2 distance.
    #[default]
    Euclidean,
    /// L1 distance.
    Manhattan,
    /// L∞ distance.
    Chebyshev,
}

impl Metric {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::Chebyshev => "chebyshev",
        }
    }

    /// Parses a metric name, falling back to Euclidean distance for anything
    /// unknown.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown distance metric '{}', using euclidean", name);
            Metric::Euclidean
        })
    }

    /// Distance between `a` and `b`. Lengths are assumed to match.
    #[inline]
    fn eval(self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let pairs = a.iter().zip(b.iter());
        match self {
            Metric::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
            Metric::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
            Metric::Chebyshev => pairs.map(|(x, y)| (x - y).abs()).fold(0.0, f64::max),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Metric::Euclidean),
            "manhattan" | "cityblock" => Ok(Metric::Manhattan),
            "chebyshev" => Ok(Metric::Chebyshev),
            other => Err(SomError::Config(format!("unsupported distance metric: {}", other))),
        }
    }
}

/// Distance between two vectors under `metric`.
///
/// Fails if either vector is empty or their lengths differ.
pub fn distance(metric: Metric, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
    if a.is_empty() || b.is_empty() {
        return Err(SomError::InvalidInput(format!(
            "invalid vectors supplied: a has {} items, b has {} items",
            a.len(),
            b.len()
        )));
    }
    if a.len() != b.len() {
        return Err(SomError::DimensionMismatch {
            context: "distance",
            expected: a.len(),
            found: b.len(),
        });
    }
    Ok(metric.eval(a, b))
}

/// Pairwise distances between the rows of `m`.
///
/// The result is a hollow symmetric matrix whose element `(i, j)` holds the
/// distance between rows `i` and `j`.
pub fn distance_matrix(metric: Metric, m: ArrayView2<f64>) -> Result<Array2<f64>> {
    let (rows, cols) = m.dim();
    if rows == 0 || cols == 0 {
        return Err(SomError::InvalidInput(format!(
            "invalid matrix supplied: {}x{}",
            rows, cols
        )));
    }

    let mut out = Array2::zeros((rows, rows));
    for i in 0..rows {
        for j in (i + 1)..rows {
            let d = metric.eval(m.row(i), m.row(j));
            out[[i, j]] = d;
            out[[j, i]] = d;
        }
    }
    Ok(out)
}

fn check_query(v: ArrayView1<f64>, m: ArrayView2<f64>) -> Result<()> {
    if v.is_empty() {
        return Err(SomError::InvalidInput("invalid vector: empty".to_string()));
    }
    let (rows, cols) = m.dim();
    if rows == 0 || cols == 0 {
        return Err(SomError::InvalidInput(format!(
            "invalid matrix: {}x{}",
            rows, cols
        )));
    }
    if v.len() != cols {
        return Err(SomError::DimensionMismatch {
            context: "closest vector search",
            expected: cols,
            found: v.len(),
        });
    }
    Ok(())
}

/// Index of the row of `m` closest to `v`.
///
/// Ties resolve to the lowest row index.
pub fn closest_vec(metric: Metric, v: ArrayView1<f64>, m: ArrayView2<f64>) -> Result<usize> {
    check_query(v, m)?;

    let mut closest = 0;
    let mut best = f64::MAX;
    for (i, row) in m.outer_iter().enumerate() {
        let d = metric.eval(v, row);
        if d < best {
            best = d;
            closest = i;
        }
    }
    Ok(closest)
}

/// Indices of the `n` rows of `m` closest to `v`, nearest first.
///
/// `n` must be in `1..=rows`. For `n == 1` this is `[closest_vec(..)]`.
pub fn closest_n_vec(
    metric: Metric,
    n: usize,
    v: ArrayView1<f64>,
    m: ArrayView2<f64>,
) -> Result<Vec<usize>> {
    check_query(v, m)?;
    if n == 0 || n > m.nrows() {
        return Err(SomError::InvalidInput(format!(
            "invalid number of closest vectors requested: {}",
            n
        )));
    }
    if n == 1 {
        return Ok(vec![closest_vec(metric, v, m)?]);
    }

    let mut heap = BoundedMaxHeap::new(n)
        .ok_or_else(|| SomError::InvalidInput("zero heap capacity".to_string()))?;
    for (i, row) in m.outer_iter().enumerate() {
        heap.push(metric.eval(v, row), i);
    }
    Ok(heap.into_sorted_vec().into_iter().map(|c| c.index).collect())
}

/// Best Matching Unit index of every row of `data`.
pub fn bmus(metric: Metric, data: ArrayView2<f64>, codebook: ArrayView2<f64>) -> Result<Vec<usize>> {
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
            context: "BMU search",
            expected: codebook.ncols(),
            found: data.ncols(),
        });
    }

    (0..data.nrows())
        .into_par_iter()
        .map(|i| closest_vec(metric, data.row(i), codebook))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, aview1};

    #[test]
    fn test_distance() {
        let cases = [
            ([0.0, 0.0], [0.0, 1.0], 1.0),
            ([0.0, 0.0], [0.0, 0.0], 0.0),
            ([3.0, 1.0], [1.0, 3.0], 2.828),
        ];
        for (a, b, expected) in cases {
            let d = distance(Metric::Euclidean, aview1(&a), aview1(&b)).unwrap();
            assert!((d - expected).abs() < 0.01);
        }

        let d = distance(Metric::Manhattan, aview1(&[3.0, 1.0]), aview1(&[1.0, 3.0])).unwrap();
        assert_eq!(d, 4.0);
        let d = distance(Metric::Chebyshev, aview1(&[3.0, 1.0]), aview1(&[1.0, 4.0])).unwrap();
        assert_eq!(d, 3.0);
    }

    #[test]
    fn test_distance_errors() {
        let empty: [f64; 0] = [];
        assert!(distance(Metric::Euclidean, aview1(&empty), aview1(&empty)).is_err());
        let err = distance(Metric::Euclidean, aview1(&[0.0, 0.0]), aview1(&[1.0])).unwrap_err();
        assert!(matches!(err, SomError::DimensionMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_unknown_metric_falls_back_to_euclidean() {
        let metric = Metric::from_name("foobar");
        assert_eq!(metric, Metric::Euclidean);
        assert!("foobar".parse::<Metric>().is_err());
    }

    #[test]
    fn test_distance_matrix() {
        let m = arr2(&[[33.0, 33.0, 33.0], [133.0, 33.0, 33.0]]);
        let dm = distance_matrix(Metric::Euclidean, m.view()).unwrap();
        assert_eq!(dm, arr2(&[[0.0, 100.0], [100.0, 0.0]]));

        let zero = arr2(&[[1.0, 1.0], [1.0, 1.0]]);
        let dm = distance_matrix(Metric::Euclidean, zero.view()).unwrap();
        assert!(dm.iter().all(|&d| d == 0.0));

        let empty = Array2::<f64>::zeros((0, 3));
        assert!(distance_matrix(Metric::Euclidean, empty.view()).is_err());
    }

    #[test]
    fn test_closest_vec() {
        let cases = [
            ([0.0, 0.0], [[0.0, 1.0], [0.0, 0.1]], 1),
            ([0.0, 0.0], [[0.0, 0.0], [0.0, 0.1]], 0),
            ([3.0, 1.0], [[1.0, 3.0], [1.0, 0.0]], 1),
        ];
        for (v, m, expected) in cases {
            let m = arr2(&m);
            assert_eq!(closest_vec(Metric::Euclidean, aview1(&v), m.view()).unwrap(), expected);
        }

        // ties resolve to the first row
        let m = arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]]);
        assert_eq!(closest_vec(Metric::Euclidean, aview1(&[0.0, 0.0]), m.view()).unwrap(), 0);
    }

    #[test]
    fn test_closest_vec_errors() {
        let m = arr2(&[[0.0, 0.0], [1.0, 1.0]]);
        let empty: [f64; 0] = [];
        assert!(closest_vec(Metric::Euclidean, aview1(&empty), m.view()).is_err());
        assert!(closest_vec(Metric::Euclidean, aview1(&[0.0, 0.0, 0.0]), m.view()).is_err());
        let no_rows = Array2::<f64>::zeros((0, 2));
        assert!(closest_vec(Metric::Euclidean, aview1(&[0.0, 0.0]), no_rows.view()).is_err());
    }

    #[test]
    fn test_closest_n_vec() {
        let v = [0.0, 0.0];
        let m = arr2(&[[0.0, 1.0], [0.0, 0.1], [0.0, 0.2], [0.1, 0.0], [0.0, 0.5]]);

        let mut closest = closest_n_vec(Metric::Euclidean, 2, aview1(&v), m.view()).unwrap();
        closest.sort_unstable();
        assert_eq!(closest, vec![1, 3]);

        let ordered = closest_n_vec(Metric::Euclidean, 4, aview1(&v), m.view()).unwrap();
        assert_eq!(ordered, vec![1, 3, 2, 4]);

        assert!(closest_n_vec(Metric::Euclidean, 0, aview1(&v), m.view()).is_err());
        assert!(closest_n_vec(Metric::Euclidean, 6, aview1(&v), m.view()).is_err());
    }

    #[test]
    fn test_closest_n_vec_single_matches_closest_vec() {
        let m = arr2(&[[0.3, 0.9], [0.5, 0.5], [0.9, 0.1], [0.5, 0.5]]);
        for v in [[0.0, 0.0], [1.0, 0.0], [0.5, 0.5], [0.2, 1.0]] {
            let one = closest_n_vec(Metric::Euclidean, 1, aview1(&v), m.view()).unwrap();
            let bmu = closest_vec(Metric::Euclidean, aview1(&v), m.view()).unwrap();
            assert_eq!(one, vec![bmu]);
        }
    }

    #[test]
    fn test_bmus() {
        let data = arr2(&[
            [5.1, 3.5, 1.4, 0.1],
            [4.6, 3.1, 1.5, 0.4],
            [5.0, 3.6, 1.4, 0.5],
        ]);
        let codebook = arr2(&[[5.1, 3.5, 1.4, 0.1], [5.0, 3.6, 1.4, 0.5]]);

        let found = bmus(Metric::Euclidean, data.view(), codebook.view()).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0], 0);
        assert_eq!(found[2], 1);

        let narrow = arr2(&[[5.1, 3.5, 1.4]]);
        assert!(bmus(Metric::Euclidean, data.view(), narrow.view()).is_err());
    }
}

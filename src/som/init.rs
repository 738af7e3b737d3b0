//! Codebook initialization.
//!
//! Two strategies are supported: uniform random values bounded by the
//! column ranges of the data, and linear initialization along the two
//! leading principal axes of the data.

use crate::error::{Result, SomError};
use crate::som::grid::Grid;
use log::debug;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seed of the power iteration start vectors. Fixed so that principal axes
/// are reproducible.
const PCA_SEED: u64 = 0x5eed_0f_9ca;

/// Maximum number of power iterations per component.
const PCA_MAX_ITER: usize = 500;

/// Convergence tolerance of the power iteration.
const PCA_TOLERANCE: f64 = 1e-12;

/// Codebook initialization method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMethod {
    /// Uniform random values within each column's range.
    #[default]
    Random,
    /// Values spanned by the two leading principal components.
    Linear,
}

impl InitMethod {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            InitMethod::Random => "random",
            InitMethod::Linear => "linear",
        }
    }

    /// Builds an initial codebook for `grid` from `data`.
    ///
    /// `seed` only affects random initialization.
    pub fn codebook(self, data: ArrayView2<f64>, grid: &Grid, seed: Option<u64>) -> Result<Array2<f64>> {
        match self {
            InitMethod::Random => {
                let mut rng = match seed {
                    Some(s) => ChaCha8Rng::seed_from_u64(s),
                    None => ChaCha8Rng::from_entropy(),
                };
                random_init(data, grid.units(), &mut rng)
            }
            InitMethod::Linear => linear_init(data, grid),
        }
    }
}

impl fmt::Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InitMethod {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "rand" => Ok(InitMethod::Random),
            "linear" | "lin" => Ok(InitMethod::Linear),
            other => Err(SomError::Config(format!(
                "unsupported codebook initialization: {}",
                other
            ))),
        }
    }
}

fn check_data(data: ArrayView2<f64>) -> Result<()> {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return Err(SomError::InvalidInput(format!(
            "invalid data supplied: {}x{}",
            rows, cols
        )));
    }
    Ok(())
}

/// Random codebook with `units` rows.
///
/// Column `j` is drawn uniformly from `[min_j, max_j]` of the data.
pub fn random_init<R: Rng + ?Sized>(data: ArrayView2<f64>, units: usize, rng: &mut R) -> Result<Array2<f64>> {
    check_data(data)?;
    if units == 0 {
        return Err(SomError::InvalidInput(
            "codebook must have at least one unit".to_string(),
        ));
    }

    let cols = data.ncols();
    let mut min = Array1::from_elem(cols, f64::INFINITY);
    let mut max = Array1::from_elem(cols, f64::NEG_INFINITY);
    for row in data.outer_iter() {
        for (j, &v) in row.iter().enumerate() {
            min[j] = min[j].min(v);
            max[j] = max[j].max(v);
        }
    }

    let codebook = Array2::from_shape_fn((units, cols), |(_, j)| {
        let u: f64 = rng.gen();
        min[j] + u * (max[j] - min[j])
    });
    Ok(codebook)
}

/// Sample covariance matrix of `data` (features x features).
fn covariance(data: ArrayView2<f64>) -> Result<Array2<f64>> {
    let rows = data.nrows();
    let mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| SomError::InvalidInput("cannot average an empty data set".to_string()))?;
    let centered = &data - &mean;
    Ok(centered.t().dot(&centered) / (rows as f64 - 1.0))
}

/// The `k` leading principal components of `data`.
///
/// Returns the eigenvalues of the sample covariance matrix in descending
/// order together with the matching unit eigenvectors as rows of a
/// `k x features` matrix. Computed by power iteration with deflation.
pub fn principal_components(data: ArrayView2<f64>, k: usize) -> Result<(Vec<f64>, Array2<f64>)> {
    check_data(data)?;
    let (rows, cols) = data.dim();
    if rows < 2 {
        return Err(SomError::InvalidInput(format!(
            "principal components need at least 2 samples, got {}",
            rows
        )));
    }
    if k == 0 || k > cols {
        return Err(SomError::InvalidInput(format!(
            "invalid number of principal components requested: {}",
            k
        )));
    }

    let mut cov = covariance(data)?;
    let mut rng = ChaCha8Rng::seed_from_u64(PCA_SEED);
    let mut eigenvalues = Vec::with_capacity(k);
    let mut eigenvectors = Array2::zeros((k, cols));

    for c in 0..k {
        let mut v: Array1<f64> = (0..cols).map(|_| rng.sample(StandardNormal)).collect();
        let norm = v.dot(&v).sqrt();
        v /= norm;

        for _ in 0..PCA_MAX_ITER {
            let mut next = cov.dot(&v);
            let norm = next.dot(&next).sqrt();
            if norm < PCA_TOLERANCE {
                // remaining spectrum is empty
                break;
            }
            next /= norm;
            let delta = (&next - &v).mapv(f64::abs).sum();
            v = next;
            if delta < PCA_TOLERANCE {
                break;
            }
        }

        let lambda = v.dot(&cov.dot(&v)).max(0.0);
        for i in 0..cols {
            for j in 0..cols {
                cov[[i, j]] -= lambda * v[i] * v[j];
            }
        }
        eigenvectors.row_mut(c).assign(&v);
        eigenvalues.push(lambda);
    }

    debug!("Principal eigenvalues: {:?}", eigenvalues);
    Ok((eigenvalues, eigenvectors))
}

/// Linear codebook for `grid`.
///
/// Each unit's lattice coordinate is normalized to `[-1, 1]` per axis and
/// mapped onto the plane spanned by the leading principal components, each
/// scaled by the square root of its eigenvalue, around the data mean. The
/// longer lattice axis follows the first component.
pub fn linear_init(data: ArrayView2<f64>, grid: &Grid) -> Result<Array2<f64>> {
    check_data(data)?;
    let (rows, cols) = data.dim();
    if rows < 2 {
        return Err(SomError::InvalidInput(format!(
            "linear initialization needs at least 2 samples, got {}",
            rows
        )));
    }

    let mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| SomError::InvalidInput("cannot average an empty data set".to_string()))?;
    let k = cols.min(2);
    let (eigenvalues, eigenvectors) = principal_components(data, k)?;

    let coords = grid.coords();
    let mut axes: Vec<(usize, f64, f64)> = (0..2)
        .map(|a| {
            let column = coords.column(a);
            let lo = column.fold(f64::INFINITY, |m, &v| m.min(v));
            let hi = column.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            (a, lo, hi)
        })
        .collect();
    axes.sort_by(|x, y| (y.2 - y.1).total_cmp(&(x.2 - x.1)));

    let mut codebook = Array2::zeros((grid.units(), cols));
    for (u, mut proto) in codebook.outer_iter_mut().enumerate() {
        proto.assign(&mean);
        for (c, &(axis, lo, hi)) in axes.iter().take(k).enumerate() {
            let span = hi - lo;
            let t = if span > 0.0 {
                (coords[[u, axis]] - lo) / span * 2.0 - 1.0
            } else {
                0.0
            };
            let scale = t * eigenvalues[c].sqrt();
            proto.scaled_add(scale, &eigenvectors.row(c));
        }
    }
    Ok(codebook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::som::grid::UnitShape;
    use ndarray::arr2;

    #[test]
    fn test_random_init_bounds() {
        let data = arr2(&[[1.0, -5.0, 0.0], [3.0, 5.0, 0.0], [2.0, 0.0, 0.0]]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let cb = random_init(data.view(), 12, &mut rng).unwrap();

        assert_eq!(cb.dim(), (12, 3));
        for row in cb.outer_iter() {
            assert!(row[0] >= 1.0 && row[0] <= 3.0);
            assert!(row[1] >= -5.0 && row[1] <= 5.0);
            assert_eq!(row[2], 0.0);
        }
    }

    #[test]
    fn test_random_init_seeded() {
        let data = arr2(&[[0.0, 0.0], [1.0, 1.0]]);
        let grid = Grid::new(UnitShape::Hexagon, &[3, 3]).unwrap();
        let a = InitMethod::Random.codebook(data.view(), &grid, Some(7)).unwrap();
        let b = InitMethod::Random.codebook(data.view(), &grid, Some(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_init_errors() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(random_init(empty.view(), 4, &mut rng).is_err());
        let data = arr2(&[[1.0, 2.0]]);
        assert!(random_init(data.view(), 0, &mut rng).is_err());
    }

    #[test]
    fn test_principal_components() {
        let data = arr2(&[[2.0, 0.0], [-2.0, 0.0], [0.0, 1.0], [0.0, -1.0]]);
        let (values, vectors) = principal_components(data.view(), 2).unwrap();

        assert!((values[0] - 8.0 / 3.0).abs() < 1e-6);
        assert!((values[1] - 2.0 / 3.0).abs() < 1e-6);
        assert!((vectors[[0, 0]].abs() - 1.0).abs() < 1e-6);
        assert!((vectors[[1, 1]].abs() - 1.0).abs() < 1e-6);

        assert!(principal_components(data.view(), 3).is_err());
        assert!(principal_components(data.view(), 0).is_err());
    }

    #[test]
    fn test_linear_init_follows_principal_axis() {
        let data = Array2::from_shape_fn((10, 2), |(i, _)| i as f64);
        let grid = Grid::new(UnitShape::Rectangle, &[2, 3]).unwrap();
        let cb = linear_init(data.view(), &grid).unwrap();

        assert_eq!(cb.dim(), (6, 2));
        for row in cb.outer_iter() {
            assert!((row[0] - row[1]).abs() < 1e-6);
        }
        let mean = cb.mean_axis(Axis(0)).unwrap();
        assert!((mean[0] - 4.5).abs() < 1e-6);
        assert!((mean[1] - 4.5).abs() < 1e-6);
    }

    #[test]
    fn test_linear_init_single_feature() {
        let data = arr2(&[[1.0], [2.0], [4.0]]);
        let grid = Grid::new(UnitShape::Hexagon, &[2, 2]).unwrap();
        let cb = linear_init(data.view(), &grid).unwrap();
        assert_eq!(cb.dim(), (4, 1));
        assert!(cb.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_linear_init_needs_two_samples() {
        let data = arr2(&[[1.0, 2.0]]);
        let grid = Grid::new(UnitShape::Hexagon, &[2, 2]).unwrap();
        assert!(linear_init(data.view(), &grid).is_err());
    }

    #[test]
    fn test_parse_init() {
        assert_eq!("linear".parse::<InitMethod>().unwrap(), InitMethod::Linear);
        assert_eq!("random".parse::<InitMethod>().unwrap(), InitMethod::Random);
        assert!("pca".parse::<InitMethod>().is_err());
    }
}

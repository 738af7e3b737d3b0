//! SOM training algorithms.
//!
//! Two algorithms are provided:
//!
//! - **Sequential**: one randomly drawn sample per iteration, each update
//!   applied to the codebook before the next sample is matched.
//! - **Batch**: every epoch matches the whole data set against the
//!   epoch-start codebook, split across rayon workers. The matches are then
//!   folded into a [`BatchAccumulator`] one unit per task, always in row
//!   order, and every unit is replaced by its weighted mean. The result does
//!   not depend on how the rows were split.
//!
//! Both algorithms work on a copy of the codebook that is committed only
//! when the whole run succeeds.

use crate::config::TrainConfig;
use crate::error::{Result, SomError};
use crate::som::decay;
use crate::som::distance::{closest_vec, Metric};
use crate::som::neighborhood::Neighborhood;
use log::{debug, info, trace};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Training algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// Stochastic per-sample updates.
    #[default]
    #[serde(rename = "seq")]
    Sequential,
    /// Parallel epoch-wise weighted-mean updates.
    #[serde(rename = "batch")]
    Batch,
}

impl Algorithm {
    /// Canonical short name.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sequential => "seq",
            Algorithm::Batch => "batch",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "seq" | "sequential" => Ok(Algorithm::Sequential),
            "batch" => Ok(Algorithm::Batch),
            other => Err(SomError::Config(format!(
                "unsupported training algorithm: {}",
                other
            ))),
        }
    }
}

/// Snapshot reported after every iteration (sequential) or epoch (batch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainProgress {
    /// Zero-based iteration or epoch that just finished.
    pub iteration: usize,
    /// Total number of iterations or epochs.
    pub total: usize,
    /// Neighborhood radius used.
    pub radius: f64,
    /// Learning rate used. `None` for batch training.
    pub learning_rate: Option<f64>,
}

/// Splits `rows` into contiguous ranges, one per worker.
///
/// Every range holds `rows / workers` rows except the last one, which also
/// takes the remainder. The worker count is clamped to `1..=rows`.
pub fn partition(rows: usize, workers: usize) -> Vec<Range<usize>> {
    if rows == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, rows);
    let chunk = rows / workers;
    (0..workers)
        .map(|w| {
            let start = w * chunk;
            let end = if w + 1 == workers { rows } else { start + chunk };
            start..end
        })
        .collect()
}

/// Per-unit weighted sums collected during one batch epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAccumulator {
    sums: Array2<f64>,
    weights: Array1<f64>,
}

impl BatchAccumulator {
    /// Accumulates `matches`, a list of `(row, bmu)` pairs, over the lattice.
    ///
    /// Every unit closer than `radius` to a sample's BMU receives the sample
    /// weighted by `kernel`. Units are filled in parallel; each one visits
    /// the matches in the order given.
    pub fn collect(
        data: ArrayView2<f64>,
        matches: &[(usize, usize)],
        unit_dist: ArrayView2<f64>,
        radius: f64,
        kernel: Neighborhood,
    ) -> Result<Self> {
        let units = unit_dist.nrows();
        if unit_dist.ncols() != units {
            return Err(SomError::DimensionMismatch {
                context: "unit distance matrix",
                expected: units,
                found: unit_dist.ncols(),
            });
        }
        if let Some(&(row, bmu)) = matches
            .iter()
            .find(|&&(row, bmu)| row >= data.nrows() || bmu >= units)
        {
            return Err(SomError::InvalidInput(format!(
                "invalid batch match: row {} of {}, unit {} of {}",
                row,
                data.nrows(),
                bmu,
                units
            )));
        }

        let dim = data.ncols();
        let per_unit: Vec<(Array1<f64>, f64)> = (0..units)
            .into_par_iter()
            .map(|u| {
                let mut sum = Array1::zeros(dim);
                let mut weight = 0.0;
                for &(row, bmu) in matches {
                    let d = unit_dist[[bmu, u]];
                    if d < radius {
                        let h = kernel.weight(d, radius);
                        sum.scaled_add(h, &data.row(row));
                        weight += h;
                    }
                }
                (sum, weight)
            })
            .collect();

        let mut sums = Array2::zeros((units, dim));
        let mut weights = Array1::zeros(units);
        for (u, (sum, weight)) in per_unit.into_iter().enumerate() {
            sums.row_mut(u).assign(&sum);
            weights[u] = weight;
        }
        Ok(Self { sums, weights })
    }

    /// Weighted vector sum per unit.
    pub fn sums(&self) -> ArrayView2<'_, f64> {
        self.sums.view()
    }

    /// Accumulated weight per unit.
    pub fn weights(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    /// Replaces every unit with nonzero weight by its weighted mean.
    ///
    /// Units with zero weight keep their prototype. Returns the number of
    /// updated units.
    pub fn apply(&self, codebook: &mut Array2<f64>) -> Result<usize> {
        if codebook.dim() != self.sums.dim() {
            return Err(SomError::DimensionMismatch {
                context: "batch update",
                expected: self.sums.nrows(),
                found: codebook.nrows(),
            });
        }
        let mut updated = 0;
        for ((mut proto, sum), &w) in codebook
            .outer_iter_mut()
            .zip(self.sums.outer_iter())
            .zip(self.weights.iter())
        {
            if w != 0.0 {
                Zip::from(&mut proto).and(&sum).for_each(|p, &s| *p = s / w);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

/// Trains a codebook against a fixed lattice.
pub struct Trainer<'a> {
    config: &'a TrainConfig,
    unit_dist: ArrayView2<'a, f64>,
    rng: ChaCha8Rng,
}

impl<'a> Trainer<'a> {
    /// Creates a trainer. Fails if the configuration is invalid.
    pub fn new(config: &'a TrainConfig, unit_dist: ArrayView2<'a, f64>) -> Result<Self> {
        config.validate()?;
        if unit_dist.nrows() != unit_dist.ncols() {
            return Err(SomError::DimensionMismatch {
                context: "unit distance matrix",
                expected: unit_dist.nrows(),
                found: unit_dist.ncols(),
            });
        }
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            config,
            unit_dist,
            rng,
        })
    }

    /// Runs `iterations` iterations (or epochs) on `codebook`.
    ///
    /// `codebook` is only modified if the whole run succeeds.
    pub fn train<F>(
        &mut self,
        codebook: &mut Array2<f64>,
        data: ArrayView2<f64>,
        iterations: usize,
        progress: F,
    ) -> Result<()>
    where
        F: FnMut(TrainProgress),
    {
        self.check(codebook, data, iterations)?;

        info!(
            "Training SOM ({}): {} samples, {} units, {} dim, {} iterations",
            self.config.algorithm,
            data.nrows(),
            codebook.nrows(),
            data.ncols(),
            iterations
        );

        let mut work = codebook.clone();
        match self.config.algorithm {
            Algorithm::Sequential => self.sequential(&mut work, data, iterations, progress)?,
            Algorithm::Batch => self.batch(&mut work, data, iterations, progress)?,
        }
        *codebook = work;

        info!("Training completed after {} iterations", iterations);
        Ok(())
    }

    fn check(&self, codebook: &Array2<f64>, data: ArrayView2<f64>, iterations: usize) -> Result<()> {
        if iterations == 0 {
            return Err(SomError::Config(
                "invalid number of training iterations: 0".to_string(),
            ));
        }
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(SomError::InvalidInput(format!(
                "invalid data supplied: {}x{}",
                data.nrows(),
                data.ncols()
            )));
        }
        if data.ncols() != codebook.ncols() {
            return Err(SomError::DimensionMismatch {
                context: "training data",
                expected: codebook.ncols(),
                found: data.ncols(),
            });
        }
        if codebook.nrows() != self.unit_dist.nrows() {
            return Err(SomError::DimensionMismatch {
                context: "codebook units",
                expected: self.unit_dist.nrows(),
                found: codebook.nrows(),
            });
        }
        Ok(())
    }

    fn sequential<F>(
        &mut self,
        codebook: &mut Array2<f64>,
        data: ArrayView2<f64>,
        iterations: usize,
        mut progress: F,
    ) -> Result<()>
    where
        F: FnMut(TrainProgress),
    {
        let cfg = self.config;
        let log_every = (iterations / 10).max(1);

        for it in 0..iterations {
            let sample = data.row(self.rng.gen_range(0..data.nrows()));
            let bmu = closest_vec(cfg.metric, sample, codebook.view())?;
            let radius = decay::radius(it, iterations, cfg.radius_decay, cfg.radius)?;
            let lr = decay::learning_rate(it, iterations, cfg.learning_rate_decay, cfg.learning_rate)?;

            for (u, &d) in self.unit_dist.row(bmu).iter().enumerate() {
                if d < radius {
                    let step = if d == 0.0 {
                        lr
                    } else {
                        lr * cfg.neighborhood.weight(d, radius)
                    };
                    codebook
                        .row_mut(u)
                        .zip_mut_with(&sample, |p, &x| *p += step * (x - *p));
                }
            }

            if it % log_every == 0 {
                debug!("Iteration {}/{}: radius={:.4}, lr={:.4}", it, iterations, radius, lr);
            }
            progress(TrainProgress {
                iteration: it,
                total: iterations,
                radius,
                learning_rate: Some(lr),
            });
        }
        Ok(())
    }

    fn batch<F>(
        &mut self,
        codebook: &mut Array2<f64>,
        data: ArrayView2<f64>,
        epochs: usize,
        mut progress: F,
    ) -> Result<()>
    where
        F: FnMut(TrainProgress),
    {
        let cfg = self.config;
        let workers = if cfg.workers == 0 {
            rayon::current_num_threads()
        } else {
            cfg.workers
        };
        let ranges = partition(data.nrows(), workers);
        let log_every = (epochs / 10).max(1);
        debug!("Batch training with {} partitions", ranges.len());

        for epoch in 0..epochs {
            let radius = decay::radius(epoch, epochs, cfg.radius_decay, cfg.radius)?;
            let acc = batch_epoch(
                codebook.view(),
                data,
                self.unit_dist,
                &ranges,
                radius,
                cfg.neighborhood,
                cfg.metric,
            )?;
            let updated = acc.apply(codebook)?;

            if epoch % log_every == 0 {
                debug!(
                    "Epoch {}/{}: radius={:.4}, {} units updated",
                    epoch, epochs, radius, updated
                );
            }
            progress(TrainProgress {
                iteration: epoch,
                total: epochs,
                radius,
                learning_rate: None,
            });
        }
        Ok(())
    }
}

/// Accumulates one batch epoch over `ranges` of `data`.
///
/// Every partition is matched against the same read-only `codebook` on a
/// rayon worker. The matches are sorted by row before accumulation, so the
/// sums are identical for any split of the rows.
pub fn batch_epoch(
    codebook: ArrayView2<f64>,
    data: ArrayView2<f64>,
    unit_dist: ArrayView2<f64>,
    ranges: &[Range<usize>],
    radius: f64,
    kernel: Neighborhood,
    metric: Metric,
) -> Result<BatchAccumulator> {
    if unit_dist.nrows() != codebook.nrows() {
        return Err(SomError::DimensionMismatch {
            context: "codebook units",
            expected: unit_dist.nrows(),
            found: codebook.nrows(),
        });
    }

    let partials: Vec<Vec<(usize, usize)>> = ranges
        .par_iter()
        .map(|range| -> Result<Vec<(usize, usize)>> {
            let found = range
                .clone()
                .map(|i| closest_vec(metric, data.row(i), codebook).map(|bmu| (i, bmu)))
                .collect::<Result<Vec<_>>>()?;
            trace!("Partition {:?} matched", range);
            Ok(found)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut matches: Vec<(usize, usize)> = partials.into_iter().flatten().collect();
    matches.sort_by_key(|&(row, _)| row);
    BatchAccumulator::collect(data, &matches, unit_dist, radius, kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::som::decay::Decay;
    use crate::som::grid::{Grid, UnitShape};
    use ndarray::arr2;

    fn sample_data() -> Array2<f64> {
        arr2(&[
            [5.1, 3.5, 1.4, 0.1],
            [4.9, 3.0, 1.4, 0.2],
            [4.7, 3.2, 1.3, 0.3],
            [4.6, 3.1, 1.5, 0.4],
            [5.0, 3.6, 1.4, 0.5],
        ])
    }

    fn sample_codebook() -> Array2<f64> {
        Array2::from_shape_fn((6, 4), |(i, j)| 0.5 * i as f64 + 0.25 * j as f64)
    }

    #[test]
    fn test_partition_is_exact() {
        for rows in [1, 5, 7, 10, 101] {
            for workers in [1, 2, 3, 4, 8, 200] {
                let ranges = partition(rows, workers);
                assert_eq!(ranges.len(), workers.min(rows));
                assert_eq!(ranges[0].start, 0);
                assert_eq!(ranges.last().unwrap().end, rows);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }
                let covered: usize = ranges.iter().map(|r| r.len()).sum();
                assert_eq!(covered, rows);
            }
        }
        assert_eq!(partition(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(partition(10, 0), vec![0..10]);
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn test_accumulator_skips_zero_weight_units() {
        // units on a line at 0, 1 and 5
        let ud = arr2(&[[0.0, 1.0, 5.0], [1.0, 0.0, 4.0], [5.0, 4.0, 0.0]]);
        let data = arr2(&[[2.0, 4.0], [4.0, 8.0]]);
        let acc = BatchAccumulator::collect(data.view(), &[(0, 0), (1, 0)], ud.view(), 2.0, Neighborhood::Bubble)
            .unwrap();
        assert_eq!(acc.weights(), ndarray::aview1(&[2.0, 2.0, 0.0]));

        let mut codebook = arr2(&[[0.0, 0.0], [0.0, 0.0], [9.0, 9.0]]);
        let updated = acc.apply(&mut codebook).unwrap();
        assert_eq!(updated, 2);
        assert_eq!(codebook, arr2(&[[3.0, 6.0], [3.0, 6.0], [9.0, 9.0]]));
    }

    #[test]
    fn test_accumulator_rejects_bad_matches() {
        let ud = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        let data = arr2(&[[1.0], [2.0]]);
        let kernel = Neighborhood::Gaussian;
        assert!(BatchAccumulator::collect(data.view(), &[(2, 0)], ud.view(), 2.0, kernel).is_err());
        assert!(BatchAccumulator::collect(data.view(), &[(0, 2)], ud.view(), 2.0, kernel).is_err());

        let acc = BatchAccumulator::collect(data.view(), &[(0, 1)], ud.view(), 2.0, kernel).unwrap();
        let mut wrong = Array2::zeros((3, 1));
        assert!(acc.apply(&mut wrong).is_err());
    }

    #[test]
    fn test_batch_epoch_deterministic() {
        let data = sample_data();
        let grid = Grid::new(UnitShape::Hexagon, &[2, 3]).unwrap();
        let ud = grid.unit_distance().unwrap();
        let codebook = sample_codebook();
        let ranges = partition(data.nrows(), 2);

        let run = || {
            batch_epoch(
                codebook.view(),
                data.view(),
                ud.view(),
                &ranges,
                3.0,
                Neighborhood::Gaussian,
                Metric::Euclidean,
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_batch_epoch_independent_of_partitioning() {
        let data = sample_data();
        let grid = Grid::new(UnitShape::Rectangle, &[2, 3]).unwrap();
        let ud = grid.unit_distance().unwrap();
        let codebook = sample_codebook();

        let epoch = |workers| {
            batch_epoch(
                codebook.view(),
                data.view(),
                ud.view(),
                &partition(data.nrows(), workers),
                2.0,
                Neighborhood::Gaussian,
                Metric::Euclidean,
            )
            .unwrap()
        };
        let one = epoch(1);
        for workers in [2, 3, 5] {
            assert_eq!(epoch(workers), one);
        }
    }

    #[test]
    fn test_sequential_moves_bmu_toward_sample() {
        let data = arr2(&[[1.0, 1.0]]);
        let grid = Grid::new(UnitShape::Rectangle, &[1, 2]).unwrap();
        let ud = grid.unit_distance().unwrap();
        let cfg = TrainConfig {
            radius: 1.0,
            learning_rate: 0.5,
            learning_rate_decay: Decay::Linear,
            seed: Some(1),
            ..Default::default()
        };
        let mut codebook = arr2(&[[0.0, 0.0], [-5.0, -5.0]]);

        let mut trainer = Trainer::new(&cfg, ud.view()).unwrap();
        trainer.train(&mut codebook, data.view(), 1, |_| {}).unwrap();

        // radius 1 excludes the neighbour at distance 1
        assert_eq!(codebook, arr2(&[[0.5, 0.5], [-5.0, -5.0]]));
    }

    #[test]
    fn test_sequential_neighbour_step() {
        let data = arr2(&[[1.0, 1.0]]);
        let grid = Grid::new(UnitShape::Rectangle, &[1, 2]).unwrap();
        let ud = grid.unit_distance().unwrap();
        let cfg = TrainConfig {
            radius: 2.0,
            learning_rate: 0.5,
            seed: Some(1),
            ..Default::default()
        };
        let mut codebook = arr2(&[[0.0, 0.0], [-5.0, -5.0]]);

        let mut trainer = Trainer::new(&cfg, ud.view()).unwrap();
        trainer.train(&mut codebook, data.view(), 1, |_| {}).unwrap();

        // BMU takes the full step, the neighbour at distance 1 a kernel-scaled one
        let step = 0.5 * crate::som::neighborhood::gaussian(1.0, 2.0);
        assert_eq!(codebook.row(0), ndarray::aview1(&[0.5, 0.5]));
        for &v in codebook.row(1).iter() {
            assert!((v - (-5.0 + step * 6.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unit_at_radius_is_not_updated() {
        let data = arr2(&[[1.0, 1.0]]);
        let grid = Grid::new(UnitShape::Rectangle, &[1, 3]).unwrap();
        let ud = grid.unit_distance().unwrap();
        assert_eq!(ud[[0, 2]], 2.0);

        for algorithm in [Algorithm::Sequential, Algorithm::Batch] {
            let cfg = TrainConfig {
                algorithm,
                radius: 2.0,
                neighborhood: Neighborhood::Bubble,
                learning_rate: 0.5,
                seed: Some(1),
                ..Default::default()
            };
            let mut codebook = arr2(&[[0.0, 0.0], [5.0, 5.0], [9.0, 9.0]]);

            let mut trainer = Trainer::new(&cfg, ud.view()).unwrap();
            trainer.train(&mut codebook, data.view(), 1, |_| {}).unwrap();

            // bubble weighs distance 2 fully, the strict cutoff still skips it
            assert_ne!(codebook.row(1), ndarray::aview1(&[5.0, 5.0]), "{}", algorithm);
            assert_eq!(codebook.row(2), ndarray::aview1(&[9.0, 9.0]), "{}", algorithm);
        }
    }

    #[test]
    fn test_train_rejects_bad_input_without_mutation() {
        let data = sample_data();
        let grid = Grid::new(UnitShape::Hexagon, &[2, 3]).unwrap();
        let ud = grid.unit_distance().unwrap();
        let cfg = TrainConfig::default();
        let original = sample_codebook();
        let mut codebook = original.clone();

        let mut trainer = Trainer::new(&cfg, ud.view()).unwrap();
        assert!(trainer.train(&mut codebook, data.view(), 0, |_| {}).is_err());

        let narrow = arr2(&[[1.0, 2.0, 3.0]]);
        assert!(trainer.train(&mut codebook, narrow.view(), 10, |_| {}).is_err());
        assert_eq!(codebook, original);

        let bad = TrainConfig {
            radius: -1.0,
            ..Default::default()
        };
        assert!(Trainer::new(&bad, ud.view()).is_err());
    }

    #[test]
    fn test_progress_reports_every_iteration() {
        let data = sample_data();
        let grid = Grid::new(UnitShape::Hexagon, &[2, 3]).unwrap();
        let ud = grid.unit_distance().unwrap();

        for algorithm in [Algorithm::Sequential, Algorithm::Batch] {
            let cfg = TrainConfig {
                algorithm,
                seed: Some(3),
                ..Default::default()
            };
            let mut codebook = sample_codebook();
            let mut seen = Vec::new();
            let mut trainer = Trainer::new(&cfg, ud.view()).unwrap();
            trainer
                .train(&mut codebook, data.view(), 20, |p| seen.push(p))
                .unwrap();

            assert_eq!(seen.len(), 20);
            assert_eq!(seen[0].radius, cfg.radius);
            assert!((seen[19].radius - 1.0).abs() < 1e-9);
            assert_eq!(seen[0].learning_rate.is_some(), algorithm == Algorithm::Sequential);
        }
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("seq".parse::<Algorithm>().unwrap(), Algorithm::Sequential);
        assert_eq!("batch".parse::<Algorithm>().unwrap(), Algorithm::Batch);
        assert!("online".parse::<Algorithm>().is_err());
    }
}

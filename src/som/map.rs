//! Self-Organizing Map aggregate.

use crate::config::{MapConfig, TrainConfig};
use crate::error::{Result, SomError};
use crate::som::distance::{bmus, Metric};
use crate::som::grid::Grid;
use crate::som::quality::{quant_error, topo_error, topo_product, QualityReport};
use crate::som::training::{TrainProgress, Trainer};
use crate::storage::ModelFormat;
use crate::umatrix::umatrix;
use log::info;
use ndarray::{Array1, Array2, ArrayView2};
use std::path::Path;

/// A Self-Organizing Map: a lattice of units, each owning a prototype
/// vector in data space.
///
/// Row `i` of the codebook is the prototype of lattice unit `i`. The lattice
/// and the unit distance matrix never change after construction; training
/// only rewrites codebook values.
#[derive(Debug, Clone)]
pub struct Map {
    config: MapConfig,
    grid: Grid,
    codebook: Array2<f64>,
    unit_dist: Array2<f64>,
}

impl Map {
    /// Builds the lattice described by `config` and initializes the codebook
    /// from `data`.
    pub fn new(config: &MapConfig, data: ArrayView2<f64>) -> Result<Self> {
        config.validate()?;
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(SomError::InvalidInput(format!(
                "invalid data supplied: {}x{}",
                data.nrows(),
                data.ncols()
            )));
        }

        let grid = Grid::new(config.grid.shape, &config.grid.size)?;
        let codebook = config
            .codebook
            .init
            .codebook(data, &grid, config.codebook.seed)?;

        info!(
            "Created SOM: grid {:?} {}, {} init, {} dim",
            grid.size(),
            grid.shape(),
            config.codebook.init,
            codebook.ncols()
        );
        Self::with_codebook(config.clone(), grid, codebook)
    }

    /// Builds a map around an existing codebook.
    pub fn from_codebook(config: &MapConfig, codebook: Array2<f64>) -> Result<Self> {
        config.validate()?;
        let grid = Grid::new(config.grid.shape, &config.grid.size)?;
        if codebook.nrows() != grid.units() {
            return Err(SomError::DimensionMismatch {
                context: "codebook units",
                expected: grid.units(),
                found: codebook.nrows(),
            });
        }
        if codebook.ncols() == 0 {
            return Err(SomError::InvalidInput("codebook has no columns".to_string()));
        }
        Self::with_codebook(config.clone(), grid, codebook)
    }

    fn with_codebook(config: MapConfig, grid: Grid, codebook: Array2<f64>) -> Result<Self> {
        let unit_dist = grid.unit_distance()?;
        Ok(Self {
            config,
            grid,
            codebook,
            unit_dist,
        })
    }

    /// Trains the map for `iterations` iterations (sequential) or epochs
    /// (batch), continuing from the current codebook.
    pub fn train(&mut self, config: &TrainConfig, data: ArrayView2<f64>, iterations: usize) -> Result<()> {
        self.train_with_progress(config, data, iterations, |_| {})
    }

    /// Like [`Map::train`], calling `progress` after every iteration or epoch.
    pub fn train_with_progress<F>(
        &mut self,
        config: &TrainConfig,
        data: ArrayView2<f64>,
        iterations: usize,
        progress: F,
    ) -> Result<()>
    where
        F: FnMut(TrainProgress),
    {
        let mut trainer = Trainer::new(config, self.unit_dist.view())?;
        trainer.train(&mut self.codebook, data, iterations, progress)
    }

    /// The map configuration.
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// The codebook (units x features).
    pub fn codebook(&self) -> ArrayView2<'_, f64> {
        self.codebook.view()
    }

    /// The lattice.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Distances between lattice units (units x units).
    pub fn unit_dist(&self) -> ArrayView2<'_, f64> {
        self.unit_dist.view()
    }

    /// Feature dimension of the codebook.
    pub fn dim(&self) -> usize {
        self.codebook.ncols()
    }

    /// BMU index of every row of `data`.
    pub fn bmus(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        bmus(Metric::Euclidean, data, self.codebook.view())
    }

    /// Mean distance between each sample and its BMU.
    pub fn quant_error(&self, data: ArrayView2<f64>) -> Result<f64> {
        quant_error(data, self.codebook.view())
    }

    /// Fraction of samples whose two closest units are not adjacent.
    pub fn topo_error(&self, data: ArrayView2<f64>) -> Result<f64> {
        topo_error(data, self.codebook.view(), self.unit_dist.view())
    }

    /// Topographic product of the codebook.
    pub fn topo_product(&self) -> Result<f64> {
        topo_product(self.codebook.view(), self.unit_dist.view())
    }

    /// All quality measures for `data`.
    pub fn quality(&self, data: ArrayView2<f64>) -> QualityReport {
        QualityReport::compute(data, self.codebook.view(), self.unit_dist.view())
    }

    /// U-matrix values, one per unit.
    pub fn umatrix(&self) -> Result<Array1<f64>> {
        umatrix(self.codebook.view(), self.unit_dist.view())
    }

    /// Saves the map to a model file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ModelFormat::write(path, &self.config, self.codebook.view())
    }

    /// Loads a map from a model file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (_, config, codebook) = ModelFormat::read(path)?;
        Self::from_codebook(&config, codebook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CodebookConfig, GridConfig};
    use crate::som::grid::UnitShape;
    use crate::som::init::InitMethod;
    use crate::som::training::Algorithm;
    use ndarray::arr2;

    fn test_config(init: InitMethod) -> MapConfig {
        MapConfig {
            grid: GridConfig {
                size: vec![3, 4],
                shape: UnitShape::Hexagon,
            },
            codebook: CodebookConfig {
                init,
                seed: Some(42),
            },
        }
    }

    fn test_data() -> Array2<f64> {
        Array2::from_shape_fn((40, 3), |(i, j)| ((i * 7 + j * 3) % 11) as f64 / 11.0)
    }

    #[test]
    fn test_new_map() {
        let data = test_data();
        for init in [InitMethod::Random, InitMethod::Linear] {
            let map = Map::new(&test_config(init), data.view()).unwrap();
            assert_eq!(map.codebook().dim(), (12, 3));
            assert_eq!(map.grid().units(), 12);
            assert_eq!(map.unit_dist().dim(), (12, 12));
            assert_eq!(map.dim(), 3);
        }
    }

    #[test]
    fn test_new_map_errors() {
        let mut cfg = test_config(InitMethod::Random);
        cfg.grid.size = vec![1, 1];
        assert!(Map::new(&cfg, test_data().view()).is_err());

        let empty = Array2::<f64>::zeros((0, 3));
        assert!(Map::new(&test_config(InitMethod::Random), empty.view()).is_err());
    }

    #[test]
    fn test_train_reduces_quant_error() {
        let data = test_data();
        for algorithm in [Algorithm::Sequential, Algorithm::Batch] {
            let mut map = Map::new(&test_config(InitMethod::Random), data.view()).unwrap();
            let before = map.quant_error(data.view()).unwrap();

            let cfg = TrainConfig {
                algorithm,
                radius: 3.0,
                seed: Some(5),
                ..Default::default()
            };
            map.train(&cfg, data.view(), 200).unwrap();
            let after = map.quant_error(data.view()).unwrap();
            assert!(after < before, "{}: {} >= {}", algorithm, after, before);
        }
    }

    #[test]
    fn test_failed_training_keeps_codebook() {
        let data = test_data();
        let mut map = Map::new(&test_config(InitMethod::Random), data.view()).unwrap();
        let before = map.codebook().to_owned();

        let bad = TrainConfig {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(map.train(&bad, data.view(), 10).is_err());
        assert!(map.train(&TrainConfig::default(), data.view(), 0).is_err());
        assert_eq!(map.codebook(), before.view());
    }

    #[test]
    fn test_from_codebook_mismatch() {
        let cfg = test_config(InitMethod::Random);
        assert!(Map::from_codebook(&cfg, Array2::zeros((11, 3))).is_err());
        assert!(Map::from_codebook(&cfg, Array2::zeros((12, 3))).is_ok());
    }

    #[test]
    fn test_bmus() {
        let cfg = MapConfig {
            grid: GridConfig {
                size: vec![1, 2],
                shape: UnitShape::Rectangle,
            },
            ..Default::default()
        };
        let map = Map::from_codebook(&cfg, arr2(&[[0.0, 0.0], [1.0, 1.0]])).unwrap();
        let data = arr2(&[[0.9, 0.8], [0.1, 0.0], [0.6, 0.6]]);
        assert_eq!(map.bmus(data.view()).unwrap(), vec![1, 0, 1]);
    }
}

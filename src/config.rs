//! Configuration for map construction and training.

use crate::error::{Result, SomError};
use crate::som::decay::Decay;
use crate::som::distance::Metric;
use crate::som::grid::{check_size, UnitShape};
use crate::som::init::InitMethod;
use crate::som::neighborhood::Neighborhood;
use crate::som::training::Algorithm;
use serde::{Deserialize, Serialize};

/// Lattice configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Lattice dimensions as `[rows, columns]`.
    /// Default: [10, 10].
    pub size: Vec<usize>,

    /// Unit shape.
    /// Default: hexagon.
    pub shape: UnitShape,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: vec![10, 10],
            shape: UnitShape::Hexagon,
        }
    }
}

impl GridConfig {
    /// Total number of lattice units.
    #[inline]
    pub fn units(&self) -> usize {
        self.size.iter().product()
    }
}

/// Codebook configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodebookConfig {
    /// Initialization method.
    /// Default: random.
    pub init: InitMethod,

    /// Random seed for random initialization.
    /// Default: None (random).
    pub seed: Option<u64>,
}

/// Map configuration: lattice plus codebook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Lattice configuration.
    pub grid: GridConfig,

    /// Codebook configuration.
    pub codebook: CodebookConfig,
}

impl MapConfig {
    /// Checks the lattice dimensions.
    pub fn validate(&self) -> Result<()> {
        check_size(&self.grid.size)?;
        Ok(())
    }
}

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Training algorithm.
    /// Default: sequential.
    pub algorithm: Algorithm,

    /// Initial neighborhood radius.
    /// Default: 10.0.
    pub radius: f64,

    /// Radius decay strategy.
    /// Default: linear.
    pub radius_decay: Decay,

    /// Neighborhood kernel.
    /// Default: gaussian.
    pub neighborhood: Neighborhood,

    /// Initial learning rate. Only used by sequential training.
    /// Default: 0.5.
    pub learning_rate: f64,

    /// Learning rate decay strategy.
    /// Default: linear.
    pub learning_rate_decay: Decay,

    /// Metric used for the BMU search during training.
    /// Default: euclidean.
    pub metric: Metric,

    /// Number of batch workers.
    /// Default: 0 (one per thread of the rayon pool).
    pub workers: usize,

    /// Random seed for sample selection in sequential training.
    /// Default: None (random).
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Sequential,
            radius: 10.0,
            radius_decay: Decay::Linear,
            neighborhood: Neighborhood::Gaussian,
            learning_rate: 0.5,
            learning_rate_decay: Decay::Linear,
            metric: Metric::Euclidean,
            workers: 0,
            seed: None,
        }
    }
}

impl TrainConfig {
    /// Rejects a non-positive radius, and a non-positive learning rate when
    /// training sequentially.
    pub fn validate(&self) -> Result<()> {
        if !(self.radius > 0.0) || !self.radius.is_finite() {
            return Err(SomError::Config(format!(
                "invalid SOM unit radius: {}",
                self.radius
            )));
        }
        if self.algorithm == Algorithm::Sequential
            && (!(self.learning_rate > 0.0) || !self.learning_rate.is_finite())
        {
            return Err(SomError::Config(format!(
                "invalid SOM learning rate: {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

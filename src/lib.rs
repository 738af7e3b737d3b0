//! # Kohonen - Self-Organizing Map training engine
//!
//! A Self-Organizing Map (SOM) is a 2D lattice of prototype vectors (the
//! codebook) adapted so that neighbouring lattice units model neighbouring
//! regions of the input space.
//!
//! ## Key Features
//!
//! - **Rectangular and hexagonal lattices**
//! - **Random and linear (PCA) codebook initialization**
//! - **Sequential training** with decaying radius and learning rate
//! - **Parallel batch training** on rayon with per-worker accumulators
//! - **Quality measures**: quantization error, topographic error, topographic product
//! - **U-matrix** rendering to SVG
//! - **Binary format** for trained maps
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kohonen::{DataSet, Map, MapConfig, TrainConfig};
//!
//! let ds = DataSet::load("iris.csv", None)?;
//!
//! let mut map = Map::new(&MapConfig::default(), ds.data())?;
//! map.train(&TrainConfig::default(), ds.data(), 1000)?;
//!
//! println!("{}", map.quality(ds.data()));
//! map.save("iris.ksom")?;
//! ```
//!
//! ## Architecture
//!
//! - [`som`] - lattice, BMU search, initialization, training and quality measures
//! - [`config`] - map and training configuration
//! - [`dataset`] - CSV/LRN/CLS loading and synthetic data
//! - [`umatrix`] - U-matrix computation and SVG output
//! - [`storage`] - binary model persistence

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod som;
pub mod storage;
pub mod umatrix;

pub use config::{CodebookConfig, GridConfig, MapConfig, TrainConfig};
pub use dataset::DataSet;
pub use error::{Result, SomError};
pub use som::{
    Algorithm, Decay, Grid, InitMethod, Map, Metric, Neighborhood, QualityReport, TrainProgress,
    UnitShape, METRIC_SENTINEL,
};
pub use storage::{ModelFormat, ModelHeader};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

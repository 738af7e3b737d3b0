//! Self-Organizing Map (SOM) training engine.
//!
//! Components, leaves first:
//!
//! - **Lattice** (grid.rs): unit coordinates and unit distances
//! - **Distance & BMU search** (distance.rs, heap.rs)
//! - **Codebook initialization** (init.rs)
//! - **Decay schedules** (decay.rs) and **neighborhood kernels** (neighborhood.rs)
//! - **Training** (training.rs): sequential and parallel batch algorithms
//! - **Quality measures** (quality.rs)
//! - **Map** (map.rs): lattice plus codebook

pub mod decay;
pub mod distance;
pub mod grid;
pub mod heap;
pub mod init;
mod map;
pub mod neighborhood;
pub mod quality;
pub mod training;

pub use decay::Decay;
pub use distance::Metric;
pub use grid::{Grid, UnitShape};
pub use init::InitMethod;
pub use map::Map;
pub use neighborhood::Neighborhood;
pub use quality::{QualityReport, METRIC_SENTINEL};
pub use training::{Algorithm, BatchAccumulator, TrainProgress, Trainer};

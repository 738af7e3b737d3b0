//! SOM lattice topology.
//!
//! Units are laid out on a planar 2D lattice. Unit `i` sits at column
//! `x = i / rows` and row `y = i % rows`, where `rows = size[0]`. Hexagonal
//! lattices shift every odd row right by half a unit and compress rows by
//! `√0.75` so that the six neighbours of a unit are equidistant.

use crate::error::{Result, SomError};
use crate::som::distance::{distance_matrix, Metric};
use crate::som::init::principal_components;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Row compression factor of hexagonal lattices.
pub const HEX_ROW_SCALE: f64 = 0.866_025_403_784_438_6; // √0.75

/// Lattice distance below which two units count as neighbours. Covers the
/// diagonal neighbours of rectangular lattices.
pub const NEIGHBOR_THRESHOLD: f64 = 1.01 * std::f64::consts::SQRT_2;

/// Shape of a lattice unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitShape {
    /// Six neighbours per unit.
    #[default]
    Hexagon,
    /// Four (eight with diagonals) neighbours per unit.
    Rectangle,
}

impl UnitShape {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            UnitShape::Hexagon => "hexagon",
            UnitShape::Rectangle => "rectangle",
        }
    }

    /// Numeric tag used by the binary model format.
    pub fn to_tag(self) -> u8 {
        match self {
            UnitShape::Hexagon => 0,
            UnitShape::Rectangle => 1,
        }
    }

    /// Inverse of [`UnitShape::to_tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(UnitShape::Hexagon),
            1 => Some(UnitShape::Rectangle),
            _ => None,
        }
    }
}

impl fmt::Display for UnitShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnitShape {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hexagon" | "hexa" => Ok(UnitShape::Hexagon),
            "rectangle" | "rect" => Ok(UnitShape::Rectangle),
            other => Err(SomError::Config(format!("unsupported unit shape: {}", other))),
        }
    }
}

/// Validates lattice dimensions and returns them as a pair.
pub fn check_size(size: &[usize]) -> Result<[usize; 2]> {
    if size.len() != 2 {
        return Err(SomError::Config(format!(
            "incorrect number of grid dimensions supplied: {}",
            size.len()
        )));
    }
    let dims = [size[0], size[1]];
    if dims.iter().any(|&d| d == 0) || dims[0] * dims[1] < 2 {
        return Err(SomError::Config(format!(
            "incorrect grid dimensions supplied: {:?}",
            size
        )));
    }
    Ok(dims)
}

/// Planar coordinates of every lattice unit, one row per unit.
pub fn grid_coords(shape: UnitShape, size: &[usize]) -> Result<Array2<f64>> {
    let [rows, cols] = check_size(size)?;

    let mut coords = Array2::zeros((rows * cols, 2));
    for x in 0..cols {
        for y in 0..rows {
            let i = x * rows + y;
            let (mut cx, mut cy) = (x as f64, y as f64);
            if shape == UnitShape::Hexagon {
                if y % 2 == 1 {
                    cx += 0.5;
                }
                cy *= HEX_ROW_SCALE;
            }
            coords[[i, 0]] = cx;
            coords[[i, 1]] = cy;
        }
    }
    Ok(coords)
}

/// An immutable SOM lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    size: [usize; 2],
    shape: UnitShape,
    coords: Array2<f64>,
}

impl Grid {
    /// Builds a lattice of `size[0]` rows by `size[1]` columns.
    pub fn new(shape: UnitShape, size: &[usize]) -> Result<Self> {
        let coords = grid_coords(shape, size)?;
        Ok(Self {
            size: [size[0], size[1]],
            shape,
            coords,
        })
    }

    /// Lattice dimensions.
    pub fn size(&self) -> [usize; 2] {
        self.size
    }

    /// Unit shape.
    pub fn shape(&self) -> UnitShape {
        self.shape
    }

    /// Unit coordinates (units x 2).
    pub fn coords(&self) -> ArrayView2<'_, f64> {
        self.coords.view()
    }

    /// Number of lattice units.
    pub fn units(&self) -> usize {
        self.coords.nrows()
    }

    /// Pairwise Euclidean distances between unit coordinates.
    pub fn unit_distance(&self) -> Result<Array2<f64>> {
        distance_matrix(Metric::Euclidean, self.coords.view())
    }
}

/// Heuristic lattice size for a data set.
///
/// Aims at `ceil(5·√samples)` units. The ratio of the two sides follows the
/// ratio of the two leading principal axes of the data, unless the leading
/// axis dominates by more than the unit count, in which case the map is
/// square. The longer side comes first.
pub fn grid_dims(data: ArrayView2<f64>, shape: UnitShape) -> Result<[usize; 2]> {
    let (samples, features) = data.dim();
    if samples == 0 || features == 0 {
        return Err(SomError::InvalidInput(format!(
            "invalid data supplied: {}x{}",
            samples, features
        )));
    }

    let munits = (5.0 * (samples as f64).sqrt()).ceil();
    if samples == 1 {
        let side = (munits.sqrt().round() as usize).max(2);
        return Ok([side, side]);
    }
    if features == 1 {
        return Ok([1, munits as usize]);
    }

    let (eigenvalues, _) = principal_components(data, 2)?;
    let ratio = match eigenvalues.as_slice() {
        [l1, l2] if *l1 > 0.0 && l2 * munits >= *l1 => (l1 / l2).sqrt(),
        _ => 1.0,
    };

    let mut short = munits / ratio;
    if shape == UnitShape::Hexagon {
        short *= HEX_ROW_SCALE;
    }
    let short = (short.sqrt().round().min(munits) as usize).max(2);
    let long = ((munits / short as f64).round() as usize).max(2);
    Ok([long.max(short), long.min(short)])
}

//! U-matrix computation and SVG rendering.
//!
//! The U-matrix value of a unit is the mean codebook distance to its lattice
//! neighbours. Large values mark cluster borders.

use crate::error::{Result, SomError};
use crate::som::distance::{distance_matrix, Metric};
use crate::som::grid::{Grid, UnitShape, NEIGHBOR_THRESHOLD};
use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2};
use plotters::prelude::*;
use std::fmt;
use std::io::Write;

/// Pixels per lattice unit.
const SCALE: f64 = 50.0;

/// Margin around the drawing in pixels.
const MARGIN: f64 = 10.0;

/// Height reserved for the title in pixels.
const TITLE_HEIGHT: f64 = 30.0;

/// Mean codebook distance of every unit to its lattice neighbours.
///
/// `unit_dist` is the lattice distance matrix of the map.
pub fn umatrix(codebook: ArrayView2<f64>, unit_dist: ArrayView2<f64>) -> Result<Array1<f64>> {
    if unit_dist.nrows() != unit_dist.ncols() || codebook.nrows() != unit_dist.nrows() {
        return Err(SomError::DimensionMismatch {
            context: "U-matrix",
            expected: unit_dist.nrows(),
            found: codebook.nrows(),
        });
    }
    let code_dist = distance_matrix(Metric::Euclidean, codebook)?;

    let values = unit_dist
        .outer_iter()
        .zip(code_dist.outer_iter())
        .map(|(lattice, code)| {
            let (sum, count) = lattice
                .iter()
                .zip(code.iter())
                .filter(|&(&l, _)| l > 0.0 && l < NEIGHBOR_THRESHOLD)
                .fold((0.0, 0usize), |(s, c), (_, &d)| (s + d, c + 1));
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        })
        .collect();
    Ok(values)
}

/// Outline of a unit centred at `(cx, cy)` in lattice coordinates.
fn unit_outline(shape: UnitShape, cx: f64, cy: f64) -> Vec<(f64, f64)> {
    match shape {
        UnitShape::Rectangle => vec![
            (cx - 0.5, cy - 0.5),
            (cx + 0.5, cy - 0.5),
            (cx + 0.5, cy + 0.5),
            (cx - 0.5, cy + 0.5),
        ],
        UnitShape::Hexagon => {
            // pointy-top hexagon with unit width
            let r = 1.0 / 3f64.sqrt();
            (0..6)
                .map(|k| {
                    let angle = (30.0 + 60.0 * k as f64).to_radians();
                    (cx + r * angle.cos(), cy + r * angle.sin())
                })
                .collect()
        }
    }
}

fn render_error<E: fmt::Display>(err: E) -> SomError {
    SomError::Render(err.to_string())
}

/// Writes an SVG rendering of `values` laid out on `grid`.
///
/// Units are filled in greyscale, white for the smallest value and black
/// for the largest.
pub fn write_svg<W: Write>(values: ArrayView1<f64>, grid: &Grid, title: &str, writer: &mut W) -> Result<()> {
    if values.len() != grid.units() {
        return Err(SomError::DimensionMismatch {
            context: "U-matrix rendering",
            expected: grid.units(),
            found: values.len(),
        });
    }

    let coords = grid.coords();
    let max_x = coords.column(0).fold(0.0f64, |m, &v| m.max(v));
    let max_y = coords.column(1).fold(0.0f64, |m, &v| m.max(v));
    let width = ((max_x + 1.0) * SCALE + 2.0 * MARGIN).ceil() as u32;
    let height = ((max_y + 1.0) * SCALE + 2.0 * MARGIN + TITLE_HEIGHT).ceil() as u32;

    let lo = values.fold(f64::INFINITY, |m, &v| m.min(v));
    let hi = values.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    let range = hi - lo;

    let to_px = |(x, y): (f64, f64)| {
        (
            ((x + 0.5) * SCALE + MARGIN).round() as i32,
            ((y + 0.5) * SCALE + MARGIN + TITLE_HEIGHT).round() as i32,
        )
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        root.draw(&Text::new(
            title,
            (MARGIN as i32, MARGIN as i32),
            ("sans-serif", 16).into_font(),
        ))
        .map_err(render_error)?;

        for (unit, &value) in values.iter().enumerate() {
            let shade = if range > 0.0 { 1.0 - (value - lo) / range } else { 1.0 };
            let grey = (shade * 255.0).round() as u8;

            let outline: Vec<(i32, i32)> = unit_outline(grid.shape(), coords[[unit, 0]], coords[[unit, 1]])
                .into_iter()
                .map(to_px)
                .collect();
            let mut border = outline.clone();
            border.extend(outline.first().copied());

            root.draw(&Polygon::new(outline, RGBColor(grey, grey, grey).filled()))
                .map_err(render_error)?;
            root.draw(&PathElement::new(border, BLACK.stroke_width(1)))
                .map_err(render_error)?;
        }
        root.present().map_err(render_error)?;
    }

    writer.write_all(svg.as_bytes())?;
    debug!("Rendered U-matrix of {} units", values.len());
    Ok(())
}

//! D8 steepest-descent flow direction.
//!
//! Direction codes follow [`d8`]: `-1` for cells with no strictly lower
//! neighbor (pits, flats, no-data), `0`–`7` clockwise from north otherwise.
//! The input should be hydrologically conditioned for meaningful results;
//! within this crate the grid also serves the threshold filter and the
//! optional direction output of the priority-flood engine.

use demflow_core::raster::d8;
use demflow_core::{Algorithm, Error, Raster, Result};
use ndarray::Array2;

use crate::maybe_rayon::*;

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<i8>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Steepest-descent D8 flow direction from an elevation model"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input)
    }
}

/// Steepest-descent direction of a single cell, `-1` when no valid neighbor
/// lies strictly lower.
pub(crate) fn steepest_descent(dem: &Raster<f64>, row: usize, col: usize) -> i8 {
    if !dem.is_valid(row, col) {
        return d8::NONE;
    }

    let z = unsafe { dem.get_unchecked(row, col) };
    let cell_size = dem.cell_size();
    let mut best = d8::NONE;
    let mut best_drop = 0.0_f64;

    for dir in 0..8_i8 {
        if let Some((nr, nc)) = dem.neighbor(row, col, dir) {
            if !dem.is_valid(nr, nc) {
                continue;
            }
            let nz = unsafe { dem.get_unchecked(nr, nc) };
            let drop = (z - nz) / (d8::DISTANCES[dir as usize] * cell_size);
            if drop > best_drop {
                best = dir;
                best_drop = drop;
            }
        }
    }

    best
}

/// Calculate the D8 flow direction grid of `dem`.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<i8>> {
    let (rows, cols) = dem.shape();

    let data: Vec<i8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![d8::NONE; cols];
            for (col, slot) in row_data.iter_mut().enumerate() {
                *slot = steepest_descent(dem, row, col);
            }
            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<i8>();
    *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

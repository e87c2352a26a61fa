//! Depth-threshold suppression of deep depression routing.
//!
//! Given the routed direction grid, re-derives a working direction for every
//! cell (the routed direction where present, the local steepest descent
//! otherwise) and walks downstream from every pit-member cell in ascending
//! elevation order, accumulating the highest elevation met before the walk
//! leaves the depression. A walk that climbs more than the threshold above
//! its starting cell marks its whole path as suppressed: those cells lose
//! their routing and the depression survives as a genuine basin. A
//! visited-lock bounds every cell to one walk, so the pass is linear; pit
//! bottoms sort first and therefore decide their depression's fate.

use demflow_core::raster::d8;
use demflow_core::{Error, Progress, Raster, Result};
use ndarray::Array2;

use super::flow_direction::steepest_descent;
use super::pits::PitScan;
use super::sorted_cells;

/// Suppress routing of depressions deeper than `threshold`. Returns the
/// number of walks that exceeded the threshold (≈ preserved depressions;
/// one depression may count more than once when several of its flat-bottom
/// cells start walks).
pub(crate) fn apply_threshold(
    dem: &Raster<f64>,
    scan: &PitScan,
    route: &mut Raster<i8>,
    threshold: f64,
    progress: &mut dyn Progress,
) -> Result<usize> {
    let (rows, cols) = dem.shape();

    // working directions: routed where routed, steepest descent elsewhere
    let mut work = Array2::<i8>::from_elem((rows, cols), d8::NONE);
    for row in 0..rows {
        for col in 0..cols {
            if !dem.is_valid(row, col) {
                continue;
            }
            let routed = unsafe { route.get_unchecked(row, col) };
            work[(row, col)] = if routed >= 0 {
                routed
            } else {
                steepest_descent(dem, row, col)
            };
        }
    }

    let mut locked = Array2::<bool>::from_elem((rows, cols), false);
    let mut suppressed = Array2::<bool>::from_elem((rows, cols), false);
    let mut path: Vec<(usize, usize)> = Vec::new();
    let mut preserved = 0_usize;

    let order = sorted_cells(dem);
    let total = order.len();

    for (done, &(row, col)) in order.iter().enumerate() {
        if done % 4096 == 0 && !progress.update(done, total) {
            return Err(Error::Cancelled);
        }

        if unsafe { scan.pits.get_unchecked(row, col) } == 0 {
            continue;
        }

        let z = unsafe { dem.get_unchecked(row, col) };
        let z_threshold = z + threshold;
        let mut z_max = z;

        path.clear();
        let (mut r, mut c) = (row, col);

        loop {
            if locked[(r, c)] {
                break;
            }
            locked[(r, c)] = true;
            path.push((r, c));

            let here = unsafe { dem.get_unchecked(r, c) };
            if here > z_max {
                z_max = here;
            }

            let dir = work[(r, c)];
            let Some((nr, nc)) = dem.neighbor(r, c, dir) else {
                break;
            };
            if !dem.is_valid(nr, nc) {
                break;
            }

            // keep walking while climbing out of the depression, or while
            // the path maximum is still below the threshold level
            if here < unsafe { dem.get_unchecked(nr, nc) } || z_max < z_threshold {
                r = nr;
                c = nc;
            } else {
                break;
            }
        }

        if z_max > z_threshold {
            preserved += 1;
            for &(pr, pc) in &path {
                suppressed[(pr, pc)] = true;
            }
        }
    }

    // keep only routes that differ from natural drainage and were not
    // suppressed
    for row in 0..rows {
        for col in 0..cols {
            let dir = work[(row, col)];
            let keep =
                dir >= 0 && !suppressed[(row, col)] && dir != steepest_descent(dem, row, col);
            unsafe {
                route.set_unchecked(row, col, if keep { dir } else { d8::NONE });
            }
        }
    }

    Ok(preserved)
}

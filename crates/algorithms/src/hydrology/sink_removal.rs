//! Sink removal: apply resolved drainage routes to the surface.
//!
//! Two mutually exclusive strategies consume the route grid:
//!
//! - **Dig channels** walks downstream from every remaining local minimum,
//!   carving a monotonically descending channel along the route. The pit
//!   cell keeps its elevation; the spill path is lowered beneath it.
//! - **Fill sinks** raises every cell whose drainage receiver sits higher,
//!   traversing the receiver forest (resolved routes plus natural steepest
//!   descent) upstream from its terminals. The depression interior comes up
//!   to (at least) spill level; nothing is lowered.
//!
//! With a zero minimum slope the corrected regions are perfectly level; a
//! positive slope makes every routed step strictly monotonic, so no new flat
//! spots appear. A caller-supplied route grid (from an earlier
//! [`sink_route`](super::sink_route) run, possibly thresholded) skips the
//! internal routing entirely.

use demflow_core::raster::d8;
use demflow_core::{Algorithm, Error, Progress, Raster, Result, Silent};
use ndarray::Array2;
use tracing::warn;

use super::flow_direction::steepest_descent;
use super::router::{sink_route_with_progress, SinkRouteParams};
use super::EpsilonGradient;

/// Elimination strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkRemovalMethod {
    /// Carve descending channels from pit bottoms along the routes
    DigChannels,
    /// Raise pit interiors to their spill level
    #[default]
    FillSinks,
}

/// Parameters for sink removal
#[derive(Debug, Clone)]
pub struct SinkRemovalParams {
    /// Elimination strategy
    pub method: SinkRemovalMethod,
    /// Minimum slope to enforce along corrected paths, in degrees.
    /// Zero leaves filled/dug regions perfectly flat.
    pub min_slope: f64,
    /// Depth threshold passed to the internal router; ignored when the
    /// caller supplies a route grid.
    pub threshold: Option<f64>,
}

impl Default for SinkRemovalParams {
    fn default() -> Self {
        Self {
            method: SinkRemovalMethod::default(),
            min_slope: 0.01,
            threshold: None,
        }
    }
}

/// Result of sink removal.
#[derive(Debug, Clone)]
pub struct SinkRemovalOutput {
    /// The corrected surface
    pub surface: Raster<f64>,
    /// The route grid that was applied (caller-supplied or computed)
    pub route: Raster<i8>,
    /// Pit/catchment identifiers; `None` when the caller supplied routes
    pub pits: Option<Raster<i32>>,
}

/// Sink removal algorithm
#[derive(Debug, Clone, Default)]
pub struct SinkRemoval;

impl Algorithm for SinkRemoval {
    type Input = Raster<f64>;
    type Output = SinkRemovalOutput;
    type Params = SinkRemovalParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Sink Removal"
    }

    fn description(&self) -> &'static str {
        "Eliminate depressions by digging drainage channels or filling basins"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        remove_sinks(&input, None, params)
    }
}

/// Remove the sinks of `dem` along resolved drainage routes.
///
/// When `route` is `None` the drainage router runs internally; a supplied
/// grid must live on the same grid system as `dem`.
pub fn remove_sinks(
    dem: &Raster<f64>,
    route: Option<&Raster<i8>>,
    params: SinkRemovalParams,
) -> Result<SinkRemovalOutput> {
    remove_sinks_with_progress(dem, route, params, &mut Silent)
}

/// [`remove_sinks`] with host progress reporting and cancellation.
pub fn remove_sinks_with_progress(
    dem: &Raster<f64>,
    route: Option<&Raster<i8>>,
    params: SinkRemovalParams,
    progress: &mut dyn Progress,
) -> Result<SinkRemovalOutput> {
    if !(params.min_slope >= 0.0 && params.min_slope < 90.0) {
        return Err(Error::InvalidParameter {
            name: "min_slope",
            value: params.min_slope.to_string(),
            reason: "slope angle must lie in [0°, 90°)".into(),
        });
    }

    let (route, pits) = match route {
        Some(supplied) => {
            dem.same_grid_as(supplied, "elevation", "sink route")?;
            (supplied.clone(), None)
        }
        None => {
            let routing = sink_route_with_progress(
                dem,
                SinkRouteParams {
                    threshold: params.threshold,
                },
                progress,
            )?;
            (routing.route, Some(routing.pits))
        }
    };

    let epsilon = EpsilonGradient::from_slope(params.min_slope, dem.cell_size());
    let mut surface = dem.clone();

    match params.method {
        SinkRemovalMethod::DigChannels => dig_channels(&mut surface, &route, &epsilon, progress)?,
        SinkRemovalMethod::FillSinks => fill_routed(&mut surface, &route, &epsilon, progress)?,
    }

    Ok(SinkRemovalOutput {
        surface,
        route,
        pits,
    })
}

/// Whether the cell has no strictly lower valid neighbor. Off-grid and
/// no-data neighbors count as an escape.
fn is_local_minimum(surface: &Raster<f64>, row: usize, col: usize) -> bool {
    let z = unsafe { surface.get_unchecked(row, col) };
    for dir in 0..8_i8 {
        match surface.neighbor(row, col, dir) {
            Some((nr, nc)) if surface.is_valid(nr, nc) => {
                if unsafe { surface.get_unchecked(nr, nc) } < z {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

/// Carve a monotonically descending channel downstream of every local
/// minimum.
fn dig_channels(
    surface: &mut Raster<f64>,
    route: &Raster<i8>,
    epsilon: &EpsilonGradient,
    progress: &mut dyn Progress,
) -> Result<()> {
    let (rows, cols) = surface.shape();
    // caller-supplied grids are untrusted; a cyclic route must not hang
    let max_steps = rows * cols;

    for row in 0..rows {
        if !progress.update(row, rows) {
            return Err(Error::Cancelled);
        }

        for col in 0..cols {
            if !surface.is_valid(row, col) || !is_local_minimum(surface, row, col) {
                continue;
            }

            let mut z = unsafe { surface.get_unchecked(row, col) };
            let (mut r, mut c) = (row, col);

            for step in 0..=max_steps {
                if step == max_steps {
                    warn!(row, col, "drainage route cycles; channel truncated");
                    break;
                }

                let dir = unsafe { route.get_unchecked(r, c) };
                let Some((nr, nc)) = surface.neighbor(r, c, dir) else {
                    break;
                };
                if !surface.is_valid(nr, nc) {
                    break;
                }

                z -= epsilon.along(dir);
                if unsafe { surface.get_unchecked(nr, nc) } < z {
                    break; // natural gradient resumes
                }

                unsafe { surface.set_unchecked(nr, nc, z) };
                r = nr;
                c = nc;
            }
        }
    }

    Ok(())
}

/// Raise every cell above the receiver it drains into, upstream through the
/// receiver forest.
///
/// A cell's receiver is its routed direction where one was resolved and its
/// local steepest descent otherwise; routes alone only cover the carved
/// chains, and raising a chain without its flanks would dam the cells
/// draining into it. The traversal starts at the forest's terminals (cells
/// with no receiver, or whose receiver is off-grid or a void) and visits
/// every cell exactly once under a visited-lock, lifting it to at least
/// receiver elevation + epsilon step. Cells with no receiver are never
/// raised, which is what keeps thresholded depressions intact.
fn fill_routed(
    surface: &mut Raster<f64>,
    route: &Raster<i8>,
    epsilon: &EpsilonGradient,
    progress: &mut dyn Progress,
) -> Result<()> {
    let (rows, cols) = surface.shape();

    // receiver forest, frozen before any elevation changes
    let mut receivers = Array2::<i8>::from_elem((rows, cols), d8::NONE);
    for row in 0..rows {
        for col in 0..cols {
            if !surface.is_valid(row, col) {
                continue;
            }
            let routed = unsafe { route.get_unchecked(row, col) };
            receivers[(row, col)] = if routed >= 0 {
                routed
            } else {
                steepest_descent(surface, row, col)
            };
        }
    }

    let mut locked = Array2::<bool>::from_elem((rows, cols), false);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for row in 0..rows {
        if !progress.update(row, rows) {
            return Err(Error::Cancelled);
        }

        for col in 0..cols {
            if locked[(row, col)] || !surface.is_valid(row, col) {
                continue;
            }

            let dir = receivers[(row, col)];
            let terminal = match surface.neighbor(row, col, dir) {
                Some((nr, nc)) => !surface.is_valid(nr, nc),
                None => true, // no receiver, or it lies off-grid
            };
            if !terminal {
                continue;
            }

            locked[(row, col)] = true;
            stack.clear();
            stack.push((row, col));

            while let Some((r, c)) = stack.pop() {
                let z = unsafe { surface.get_unchecked(r, c) };

                for dir in 0..8_i8 {
                    let Some((nr, nc)) = surface.neighbor(r, c, dir) else {
                        continue;
                    };
                    if locked[(nr, nc)] || !surface.is_valid(nr, nc) {
                        continue;
                    }
                    // does the neighbor drain into this cell?
                    if receivers[(nr, nc)] != d8::opposite(dir) {
                        continue;
                    }

                    locked[(nr, nc)] = true;
                    let floor = z + epsilon.along(dir);
                    if unsafe { surface.get_unchecked(nr, nc) } < floor {
                        unsafe { surface.set_unchecked(nr, nc, floor) };
                    }
                    stack.push((nr, nc));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::find_pits;

    /// 3×5 strip: high walls, middle row [10, 10, 0, 10, 10]. The center is
    /// a single-cell pit that must drain through one of the 10-cells.
    fn walled_trough() -> Raster<f64> {
        let values = [
            99.0, 99.0, 99.0, 99.0, 99.0, //
            10.0, 10.0, 0.0, 10.0, 10.0, //
            99.0, 99.0, 99.0, 99.0, 99.0,
        ];
        Raster::from_vec(values.to_vec(), 3, 5).unwrap()
    }

    #[test]
    fn test_fill_raises_pit_to_spill() {
        let dem = walled_trough();
        let out = remove_sinks(
            &dem,
            None,
            SinkRemovalParams {
                method: SinkRemovalMethod::FillSinks,
                min_slope: 0.0,
                threshold: None,
            },
        )
        .unwrap();

        let center = out.surface.get(1, 2).unwrap();
        assert!(
            center >= 10.0,
            "pit must be raised to spill level, got {center}"
        );
        assert!(out.pits.is_some());
    }

    #[test]
    fn test_dig_carves_descending_channel() {
        let dem = walled_trough();
        let out = remove_sinks(
            &dem,
            None,
            SinkRemovalParams {
                method: SinkRemovalMethod::DigChannels,
                min_slope: 0.0,
                threshold: None,
            },
        )
        .unwrap();

        // the pit cell itself keeps its elevation
        assert_eq!(out.surface.get(1, 2).unwrap(), 0.0);

        // the channel along the route never rises above the pit
        let (mut r, mut c) = (1_usize, 2_usize);
        let mut prev = out.surface.get(r, c).unwrap();
        let mut hops = 0;
        loop {
            let dir = out.route.get(r, c).unwrap();
            let Some((nr, nc)) = out.route.neighbor(r, c, dir) else {
                break;
            };
            let z = out.surface.get(nr, nc).unwrap();
            assert!(
                z <= prev,
                "dug channel must descend: {prev} -> {z} at ({nr}, {nc})"
            );
            prev = z;
            r = nr;
            c = nc;
            hops += 1;
            assert!(hops < 16, "channel walk must terminate");
        }
        assert!(hops > 0, "the pit must be routed somewhere");
    }

    #[test]
    fn test_dig_and_fill_share_routes_but_not_elevations() {
        let dem = walled_trough();
        let dig = remove_sinks(
            &dem,
            None,
            SinkRemovalParams {
                method: SinkRemovalMethod::DigChannels,
                min_slope: 0.0,
                threshold: None,
            },
        )
        .unwrap();
        let fill = remove_sinks(
            &dem,
            None,
            SinkRemovalParams {
                method: SinkRemovalMethod::FillSinks,
                min_slope: 0.0,
                threshold: None,
            },
        )
        .unwrap();

        assert_eq!(dig.route.data(), fill.route.data(), "identical routing");
        assert_ne!(
            dig.surface.get(1, 2).unwrap(),
            fill.surface.get(1, 2).unwrap(),
            "strategies must disagree at the pit cell"
        );
    }

    #[test]
    fn test_external_route_must_match_grid() {
        let dem = walled_trough();
        let route: Raster<i8> = Raster::new(4, 4);
        let result = remove_sinks(&dem, Some(&route), SinkRemovalParams::default());
        assert!(matches!(result, Err(Error::GridMismatch { .. })));
    }

    #[test]
    fn test_external_route_is_applied() {
        let dem = walled_trough();
        let routing = crate::hydrology::sink_route(&dem, Default::default()).unwrap();

        let out = remove_sinks(
            &dem,
            Some(&routing.route),
            SinkRemovalParams {
                method: SinkRemovalMethod::FillSinks,
                min_slope: 0.0,
                threshold: None,
            },
        )
        .unwrap();

        assert!(out.pits.is_none(), "no internal routing ran");
        assert!(out.surface.get(1, 2).unwrap() >= 10.0);
    }

    #[test]
    fn test_fill_leaves_clean_surface_alone() {
        let mut dem = Raster::new(6, 6);
        for row in 0..6 {
            for col in 0..6 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }

        let out = remove_sinks(&dem, None, SinkRemovalParams::default()).unwrap();
        assert_eq!(find_pits(&out.surface).unwrap().pit_count(), 0);
        for row in 0..6 {
            for col in 0..6 {
                assert_eq!(out.surface.get(row, col).unwrap(), dem.get(row, col).unwrap());
            }
        }
    }

    #[test]
    fn test_invalid_min_slope_rejected() {
        let dem = walled_trough();
        let result = remove_sinks(
            &dem,
            None,
            SinkRemovalParams {
                method: SinkRemovalMethod::FillSinks,
                min_slope: -1.0,
                threshold: None,
            },
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }
}

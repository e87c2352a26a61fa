//! Drainage route resolution over the pit graph.
//!
//! Consumes the outlet node list produced by outlet discovery. An outlet
//! that connects drained terrain with at least one undrained pit performs
//! the draining action: the outlet cell is routed toward its best drained
//! neighbor, every undrained pit it touches is marked drained, and
//! directions are propagated inward: a steepest chain through the pit's
//! catchment, plus a breadth-first wave across a flat bottom. Fully drained
//! nodes are dropped without action. After any pass that drains a pit the
//! node list is rescanned from the head, because earlier nodes may have
//! become resolvable.
//!
//! If a complete sweep drains nothing while undrained pits remain (possible
//! when thresholding has suppressed reachable outlets), one remaining pit is
//! force-drained so the loop stays total; each forced drain is logged and
//! counted in the output so the caller knows those routes are approximate.

use std::collections::VecDeque;

use demflow_core::raster::d8;
use demflow_core::{Algorithm, Error, Progress, Raster, Result, Silent};
use tracing::{debug, warn};

use super::outlets::{find_outlets, OutletNode};
use super::pits::{find_pits_with_progress, PitScan};
use super::threshold::apply_threshold;

/// Parameters for sink route detection
#[derive(Debug, Clone, Default)]
pub struct SinkRouteParams {
    /// Depth threshold in elevation units. Depressions deeper than this keep
    /// their routing suppressed and survive as genuine basins; `None` routes
    /// every depression.
    pub threshold: Option<f64>,
}

/// Result of drainage routing.
#[derive(Debug, Clone)]
pub struct RoutingOutput {
    /// Flow directions: `-1` = no route (natural drainage or preserved
    /// depression), `0`–`7` = D8 neighbor receiving this cell's flow.
    pub route: Raster<i8>,
    /// Pit/catchment identifier grid grown during outlet discovery.
    pub pits: Raster<i32>,
    /// Number of depressions detected.
    pub pit_count: usize,
    /// Depressions whose routing survived thresholding.
    pub routed_pits: usize,
    /// Pits drained by the stall fallback rather than through an outlet.
    pub forced_drains: usize,
}

/// Sink drainage route detection algorithm
#[derive(Debug, Clone, Default)]
pub struct SinkRoute;

impl Algorithm for SinkRoute {
    type Input = Raster<f64>;
    type Output = RoutingOutput;
    type Params = SinkRouteParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Sink Drainage Route Detection"
    }

    fn description(&self) -> &'static str {
        "Resolve drainage directions for every depression of an elevation model"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        sink_route(&input, params)
    }
}

/// Resolve drainage routes for all depressions of `dem`.
pub fn sink_route(dem: &Raster<f64>, params: SinkRouteParams) -> Result<RoutingOutput> {
    sink_route_with_progress(dem, params, &mut Silent)
}

/// [`sink_route`] with host progress reporting and cancellation.
pub fn sink_route_with_progress(
    dem: &Raster<f64>,
    params: SinkRouteParams,
    progress: &mut dyn Progress,
) -> Result<RoutingOutput> {
    if let Some(t) = params.threshold {
        if !(t > 0.0) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                value: t.to_string(),
                reason: "depth threshold must be positive".into(),
            });
        }
    }

    let mut route = dem.with_same_meta::<i8>();
    route.data_mut().fill(d8::NONE);

    let mut scan = find_pits_with_progress(dem, progress)?;
    let pit_count = scan.pit_count();

    if pit_count == 0 {
        debug!("no sinks detected");
        return Ok(RoutingOutput {
            route,
            pits: scan.pits,
            pit_count: 0,
            routed_pits: 0,
            forced_drains: 0,
        });
    }

    let (nodes, _junctions) = find_outlets(dem, &mut scan, progress)?;
    debug!(pits = pit_count, outlets = nodes.len(), "outlet scan complete");

    let mut live = vec![true; nodes.len()];
    let mut drained = 0_usize;
    let mut forced = 0_usize;
    let mut passes = 0_usize;

    while drained < pit_count {
        passes += 1;
        if passes > pit_count + 1 {
            return Err(Error::RoutingFailure { passes });
        }

        let mut i = 0;
        while i < nodes.len() {
            if !live[i] {
                i += 1;
                continue;
            }
            if !progress.update(drained, pit_count) {
                return Err(Error::Cancelled);
            }

            match resolve_outlet(dem, &mut scan, &mut route, &nodes[i]) {
                Resolution::Kept => i += 1,
                Resolution::Removed(n) => {
                    live[i] = false;
                    if n > 0 {
                        drained += n;
                        i = 0; // rescan: earlier nodes may now resolve
                    }
                }
            }
        }

        if drained < pit_count {
            if let Some(idx) = scan.records.iter().position(|p| !p.drained) {
                scan.records[idx].drained = true;
                drained += 1;
                forced += 1;
                warn!(pit = idx + 1, "no reachable outlet; pit force-drained");
            }
        }
    }

    let mut routed_pits = pit_count;
    if let Some(t) = params.threshold {
        let preserved = apply_threshold(dem, &scan, &mut route, t, progress)?;
        routed_pits = routed_pits.saturating_sub(preserved);
        debug!(preserved, "deep depressions kept unrouted");
    }

    debug!(
        pits = pit_count,
        forced_drains = forced,
        "sink routing complete"
    );

    Ok(RoutingOutput {
        route,
        pits: scan.pits,
        pit_count,
        routed_pits,
        forced_drains: forced,
    })
}

enum Resolution {
    /// Node touches no drained membership yet; keep for a later pass.
    Kept,
    /// Node resolved and removed; carries the number of pits it drained.
    Removed(usize),
}

fn resolve_outlet(
    dem: &Raster<f64>,
    scan: &mut PitScan,
    route: &mut Raster<i8>,
    node: &OutletNode,
) -> Resolution {
    let mut touches_drained = false;
    let mut touches_undrained = false;

    for &id in &node.memberships {
        if id == 0 {
            touches_drained = true;
        } else if id > 0 {
            if scan.records[id as usize - 1].drained {
                touches_drained = true;
            } else {
                touches_undrained = true;
            }
        }
    }

    if !touches_drained {
        return Resolution::Kept;
    }

    let mut n_drained = 0;

    if touches_undrained {
        let (row, col) = (node.row, node.col);
        let z = unsafe { dem.get_unchecked(row, col) };

        // route the outlet cell itself toward drained terrain
        if unsafe { route.get_unchecked(row, col) } < 0 {
            let cell_size = dem.cell_size();
            let mut best: i8 = d8::NONE;
            let mut best_drop = 0.0_f64;

            for dir in 0..8_i8 {
                match dem.neighbor(row, col, dir) {
                    // off-grid, a void, or an already routed cell: take it
                    Some((nr, nc)) if dem.is_valid(nr, nc) => {
                        if unsafe { route.get_unchecked(nr, nc) } >= 0 {
                            best = dir;
                            break;
                        }
                        let id = node.memberships[dir as usize];
                        let to_drained =
                            id == 0 || (id > 0 && scan.records[id as usize - 1].drained);
                        if to_drained {
                            let nz = unsafe { dem.get_unchecked(nr, nc) };
                            let drop = (z - nz) / (d8::DISTANCES[dir as usize] * cell_size);
                            if best < 0 || drop > best_drop {
                                best = dir;
                                best_drop = drop;
                            }
                        }
                    }
                    _ => {
                        best = dir;
                        break;
                    }
                }
            }

            if best >= 0 {
                unsafe { route.set_unchecked(row, col, best) };
            } else {
                warn!(row, col, "outlet has no drained receiver");
            }
        }

        // drain every undrained pit this outlet touches
        for &id in &node.memberships {
            if id > 0 && !scan.records[id as usize - 1].drained {
                scan.records[id as usize - 1].drained = true;
                drain_pit(dem, scan, route, row, col, id);
                n_drained += 1;
            }
        }
    }

    Resolution::Removed(n_drained)
}

/// Walk the steepest chain from the outlet down into the pit's catchment,
/// pointing every entered cell back at its predecessor. Reaching a flat
/// member hands over to the flat wave.
fn drain_pit(
    dem: &Raster<f64>,
    scan: &mut PitScan,
    route: &mut Raster<i8>,
    row: usize,
    col: usize,
    pit_id: i32,
) {
    let cell_size = dem.cell_size();
    let (mut r, mut c) = (row, col);

    loop {
        if unsafe { scan.flats.get_unchecked(r, c) } > 0 {
            drain_flat(scan, route, r, c);
            return;
        }

        let z = unsafe { dem.get_unchecked(r, c) };
        let mut best: i8 = d8::NONE;
        let mut best_drop = 0.0_f64;
        let mut best_cell = (r, c);

        for dir in 0..8_i8 {
            if let Some((nr, nc)) = dem.neighbor(r, c, dir) {
                if unsafe { scan.pits.get_unchecked(nr, nc) } == pit_id
                    && unsafe { route.get_unchecked(nr, nc) } < 0
                {
                    let nz = unsafe { dem.get_unchecked(nr, nc) };
                    let drop = (z - nz) / (d8::DISTANCES[dir as usize] * cell_size);
                    if drop > best_drop {
                        best = dir;
                        best_drop = drop;
                        best_cell = (nr, nc);
                    }
                }
            }
        }

        if best < 0 {
            return;
        }

        let (nr, nc) = best_cell;
        unsafe { route.set_unchecked(nr, nc, d8::opposite(best)) };
        r = nr;
        c = nc;
    }
}

/// Breadth-first wave across a flat region: every reached cell's direction
/// points back toward the cell it was reached from, so the whole flat drains
/// to the entry point. Flat markers are cleared as the wave passes.
fn drain_flat(scan: &mut PitScan, route: &mut Raster<i8>, row: usize, col: usize) {
    let flat_id = unsafe { scan.flats.get_unchecked(row, col) };
    if flat_id <= 0 {
        return;
    }
    let rect = scan.flat_rects[flat_id as usize - 1];
    let (rows, cols) = scan.flats.shape();

    let mut wave: VecDeque<(usize, usize)> = VecDeque::new();
    unsafe { scan.flats.set_unchecked(row, col, 0) };
    wave.push_back((row, col));

    while let Some((r, c)) = wave.pop_front() {
        debug_assert!(rect.contains(r, c), "flat wave left its bounding box");

        for dir in 0..8_i8 {
            if let Some((nr, nc)) = d8::step(r, c, dir, rows, cols) {
                if unsafe { scan.flats.get_unchecked(nr, nc) } == flat_id {
                    unsafe {
                        scan.flats.set_unchecked(nr, nc, 0);
                        route.set_unchecked(nr, nc, d8::opposite(dir));
                    }
                    wave.push_back((nr, nc));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Follow `route` from `(row, col)`; returns the cells visited.
    fn walk(route: &Raster<i8>, mut row: usize, mut col: usize) -> Vec<(usize, usize)> {
        let mut path = vec![(row, col)];
        for _ in 0..route.len() {
            let dir = route.get(row, col).unwrap();
            if dir < 0 {
                break;
            }
            match route.neighbor(row, col, dir) {
                Some((nr, nc)) => {
                    row = nr;
                    col = nc;
                    path.push((row, col));
                }
                None => break,
            }
        }
        path
    }

    fn bowl_with_pit() -> Raster<f64> {
        // 7×7 funnel with center sink, as in the detection tests
        let values = [
            9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, //
            9.0, 8.0, 8.0, 8.0, 8.0, 8.0, 9.0, //
            9.0, 8.0, 7.0, 7.0, 7.0, 8.0, 9.0, //
            9.0, 8.0, 7.0, 3.0, 7.0, 8.0, 9.0, //
            9.0, 8.0, 7.0, 7.0, 7.0, 8.0, 9.0, //
            9.0, 8.0, 8.0, 8.0, 8.0, 8.0, 9.0, //
            9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0,
        ];
        Raster::from_vec(values.to_vec(), 7, 7).unwrap()
    }

    #[test]
    fn test_route_reaches_exterior() {
        let dem = bowl_with_pit();
        let out = sink_route(&dem, SinkRouteParams::default()).unwrap();

        assert_eq!(out.pit_count, 1);
        assert_eq!(out.routed_pits, 1);
        assert_eq!(out.forced_drains, 0);

        // the pit bottom is routed, and its chain ends off the pit
        let path = walk(&out.route, 3, 3);
        assert!(path.len() > 1, "pit bottom must be routed");
        let (lr, lc) = *path.last().unwrap();
        let end_dir = out.route.get(lr, lc).unwrap();
        // chain ends where the route grid stops or leaves the grid
        assert!(
            end_dir < 0 || out.route.neighbor(lr, lc, end_dir).is_none(),
            "chain must terminate"
        );
    }

    #[test]
    fn test_clean_surface_short_circuits() {
        let mut dem = Raster::new(6, 6);
        for row in 0..6 {
            for col in 0..6 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }

        let out = sink_route(&dem, SinkRouteParams::default()).unwrap();
        assert_eq!(out.pit_count, 0);
        assert!(out.route.data().iter().all(|&d| d < 0));
    }

    /// Tilted plane with `z = row + col`; depressions carved below it keep
    /// strictly-lower spill neighbors on all sides.
    fn tilted_plane(rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_flat_bottom_fully_routed() {
        // flat trench sunk into a tilted plane: every flat cell gets a
        // direction from the wave
        let mut dem = tilted_plane(5, 7);
        for col in 2..5 {
            dem.set(2, col, 1.0).unwrap();
        }

        let out = sink_route(&dem, SinkRouteParams::default()).unwrap();
        assert_eq!(out.pit_count, 1);
        assert_eq!(out.forced_drains, 0);
        for col in 2..5 {
            assert!(
                out.route.get(2, col).unwrap() >= 0,
                "flat cell (2, {col}) unrouted"
            );
        }
    }

    #[test]
    fn test_two_pits_both_drained() {
        let mut dem = tilted_plane(5, 9);
        dem.set(2, 2, -5.0).unwrap();
        dem.set(2, 6, -3.0).unwrap();

        let out = sink_route(&dem, SinkRouteParams::default()).unwrap();
        assert_eq!(out.pit_count, 2);
        assert_eq!(out.forced_drains, 0);
        assert!(out.route.get(2, 2).unwrap() >= 0);
        assert!(out.route.get(2, 6).unwrap() >= 0);
    }

    #[test]
    fn test_unreachable_pit_is_force_drained() {
        // a depression in a perfectly level plain never produces an outlet:
        // membership sampling needs strictly lower neighbors. The stall
        // fallback must still terminate the loop and report itself.
        let mut dem = Raster::filled(7, 7, 10.0_f64);
        dem.set(3, 3, 1.0).unwrap();

        let out = sink_route(&dem, SinkRouteParams::default()).unwrap();
        assert_eq!(out.pit_count, 1);
        assert_eq!(out.forced_drains, 1);
    }

    #[test]
    fn test_threshold_must_be_positive() {
        let dem = bowl_with_pit();
        let result = sink_route(
            &dem,
            SinkRouteParams {
                threshold: Some(-1.0),
            },
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_deep_pit_kept_by_threshold() {
        let dem = bowl_with_pit();

        // depth from bottom (3) over the rim (9) is 6: a threshold of 2
        // preserves the depression, a threshold of 10 routes it
        let kept = sink_route(
            &dem,
            SinkRouteParams {
                threshold: Some(2.0),
            },
        )
        .unwrap();
        assert_eq!(kept.routed_pits, 0);
        assert!(kept.route.get(3, 3).unwrap() < 0, "deep pit stays unrouted");

        let routed = sink_route(
            &dem,
            SinkRouteParams {
                threshold: Some(10.0),
            },
        )
        .unwrap();
        assert_eq!(routed.routed_pits, 1);
    }
}

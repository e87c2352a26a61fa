//! Outlet discovery between pits and the exterior.
//!
//! Traverses all valid cells once in ascending elevation order. A cell that
//! does not belong to a pit becomes an outlet candidate when its strictly
//! lower neighbors span at least two distinct memberships (pit ids or the
//! exterior) whose pairing has not been seen before. The junction set keeps
//! one record per pit pair, so a shared boundary produces exactly one outlet
//! no matter how long it is.
//!
//! As a side effect each traversed cell is annexed to the membership of its
//! steepest downhill neighbor (the exterior wins unconditionally), which
//! grows the pit identifier grid into full catchments by the time the scan
//! completes; higher cells always resolve after the neighbors they drain
//! into.

use std::collections::HashSet;

use demflow_core::raster::d8;
use demflow_core::{Error, Progress, Raster, Result};

use super::pits::PitScan;
use super::sorted_cells;

/// A spill candidate: the cell position plus the membership of each of its
/// eight neighbors at discovery time. `-1` marks a neighbor that does not
/// drain through this cell, `0` the exterior, positive values pit ids.
#[derive(Debug, Clone)]
pub(crate) struct OutletNode {
    pub row: usize,
    pub col: usize,
    pub memberships: [i32; 8],
}

/// Sparse pit-pair adjacency set. Pairs are stored normalized; a pair of
/// identical ids is always considered present.
#[derive(Debug, Default)]
pub(crate) struct JunctionSet {
    pairs: HashSet<(i32, i32)>,
}

impl JunctionSet {
    pub fn contains(&self, a: i32, b: i32) -> bool {
        a == b || self.pairs.contains(&Self::normalize(a, b))
    }

    pub fn insert(&mut self, a: i32, b: i32) {
        if a != b {
            self.pairs.insert(Self::normalize(a, b));
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    fn normalize(a: i32, b: i32) -> (i32, i32) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// Scan `dem` in ascending elevation order, collecting outlet nodes and
/// annexing every non-pit cell to its steepest downhill membership.
pub(crate) fn find_outlets(
    dem: &Raster<f64>,
    scan: &mut PitScan,
    progress: &mut dyn Progress,
) -> Result<(Vec<OutletNode>, JunctionSet)> {
    let mut nodes: Vec<OutletNode> = Vec::new();
    let mut junctions = JunctionSet::default();

    let order = sorted_cells(dem);
    let total = order.len();
    let cell_size = dem.cell_size();

    for (done, &(row, col)) in order.iter().enumerate() {
        if done % 4096 == 0 && !progress.update(done, total) {
            return Err(Error::Cancelled);
        }

        if unsafe { scan.pits.get_unchecked(row, col) } != 0 {
            continue;
        }

        let z = unsafe { dem.get_unchecked(row, col) };

        let mut memberships = [-1_i32; 8];
        let mut is_outlet = false;
        let mut best: i8 = d8::NONE;
        let mut best_drop = 0.0_f64;
        let mut goes_exterior = false;

        for dir in 0..8_i8 {
            // off-grid and no-data neighbors are the exterior
            let receiver = match dem.neighbor(row, col, dir) {
                Some((nr, nc)) if dem.is_valid(nr, nc) => Some((nr, nc)),
                _ => None,
            };

            let id = match receiver {
                Some((nr, nc)) => {
                    let nz = unsafe { dem.get_unchecked(nr, nc) };
                    if z <= nz {
                        continue; // does not drain this way
                    }
                    // steepest downhill candidate, unless the exterior won
                    if !goes_exterior {
                        let drop = (z - nz) / (d8::DISTANCES[dir as usize] * cell_size);
                        if best < 0 || drop > best_drop {
                            best = dir;
                            best_drop = drop;
                        }
                    }
                    unsafe { scan.pits.get_unchecked(nr, nc) }
                }
                None => {
                    if !goes_exterior {
                        goes_exterior = true;
                        best = dir;
                    }
                    0
                }
            };
            memberships[dir as usize] = id;

            if !is_outlet {
                for other in memberships.iter().take(dir as usize) {
                    if *other >= 0 && !junctions.contains(id, *other) {
                        is_outlet = true;
                        break;
                    }
                }
            }
        }

        if is_outlet {
            for i in 1..8 {
                let a = memberships[i];
                if a < 0 {
                    continue;
                }
                for j in 0..i {
                    let b = memberships[j];
                    if b >= 0 && !junctions.contains(a, b) {
                        junctions.insert(a, b);
                    }
                }
            }
            nodes.push(OutletNode {
                row,
                col,
                memberships,
            });
        }

        if best >= 0 {
            let id = memberships[best as usize];
            unsafe { scan.pits.set_unchecked(row, col, id) };
        }
    }

    Ok((nodes, junctions))
}

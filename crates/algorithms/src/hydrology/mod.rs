//! Hydrological conditioning of raster elevation models.
//!
//! Every algorithm here serves the same contract: given an elevation surface
//! with depressions, produce a surface on which every cell has a
//! non-increasing path to the grid boundary (or a no-data void), optionally
//! together with a flow direction grid and a pit/basin label grid.
//!
//! Two algorithm families solve it:
//!
//! 1. The **pit graph** family ([`find_pits`], outlet resolution,
//!    [`sink_route`], [`remove_sinks`]) builds an explicit graph of
//!    depressions and spill points, supports a depth threshold that keeps
//!    significant depressions intact, and can either carve drainage channels
//!    or fill basins.
//! 2. The **whole-grid** family, [`priority_flood`] (Barnes et al. 2014)
//!    and [`fill_sinks`] (Planchon & Darboux 2001), fills the surface
//!    directly without building a pit graph.
//!
//! [`condition`] dispatches between all four strategies behind one
//! parameter struct.

mod conditioning;
mod fill_sinks;
mod flow_direction;
mod outlets;
mod pits;
mod priority_flood;
mod router;
mod sink_removal;
mod threshold;

pub use conditioning::{
    condition, condition_with_progress, Conditioning, ConditioningMethod, ConditioningOutput,
    ConditioningParams,
};
pub use fill_sinks::{fill_sinks, fill_sinks_with_progress, FillSinks, FillSinksParams};
pub use flow_direction::{flow_direction, FlowDirection};
pub use pits::{find_pits, find_pits_with_progress, CellRect, PitScan};
pub use priority_flood::{
    priority_flood, priority_flood_with_progress, PriorityFlood, PriorityFloodOutput,
    PriorityFloodParams,
};
pub use router::{
    sink_route, sink_route_with_progress, RoutingOutput, SinkRoute, SinkRouteParams,
};
pub use sink_removal::{
    remove_sinks, remove_sinks_with_progress, SinkRemoval, SinkRemovalMethod, SinkRemovalOutput,
    SinkRemovalParams,
};

use demflow_core::raster::d8;
use demflow_core::Raster;

/// Per-direction minimum elevation increments enforced while filling or
/// digging.
///
/// Converted once per invocation from a minimum slope angle in degrees:
/// `tan(slope) × cell size × neighbor distance`. A zero slope produces
/// perfectly flat filled/dug regions; a positive slope guarantees that every
/// step along a corrected drainage path changes elevation by at least the
/// increment, so no new flat spots appear.
#[derive(Debug, Clone)]
pub struct EpsilonGradient {
    step: [f64; 8],
}

impl EpsilonGradient {
    /// Build from a minimum slope angle in degrees and a cell size in
    /// surface units.
    pub fn from_slope(min_slope_deg: f64, cell_size: f64) -> Self {
        let gradient = min_slope_deg.to_radians().tan() * cell_size;
        let mut step = [0.0; 8];
        for (dir, s) in step.iter_mut().enumerate() {
            *s = gradient * d8::DISTANCES[dir];
        }
        Self { step }
    }

    /// The all-zero gradient (flat filling).
    pub fn zero() -> Self {
        Self { step: [0.0; 8] }
    }

    /// Increment along direction `dir`; zero for [`d8::NONE`].
    #[inline]
    pub fn along(&self, dir: i8) -> f64 {
        if dir < 0 {
            0.0
        } else {
            self.step[dir as usize]
        }
    }

    /// Whether the gradient is exactly zero in every direction.
    pub fn is_flat(&self) -> bool {
        self.step[0] == 0.0
    }
}

/// All valid cells of `dem` in ascending elevation order.
///
/// The sort is stable, so equal elevations keep row-major scan order. This
/// is the traversal order of outlet discovery and threshold checking.
pub(crate) fn sorted_cells(dem: &Raster<f64>) -> Vec<(usize, usize)> {
    let (rows, cols) = dem.shape();
    let mut cells: Vec<(usize, usize)> = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            if dem.is_valid(row, col) {
                cells.push((row, col));
            }
        }
    }
    cells.sort_by(|&(ar, ac), &(br, bc)| {
        let za = unsafe { dem.get_unchecked(ar, ac) };
        let zb = unsafe { dem.get_unchecked(br, bc) };
        za.partial_cmp(&zb).unwrap_or(std::cmp::Ordering::Equal)
    });
    cells
}

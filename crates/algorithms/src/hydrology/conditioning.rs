//! One-call dispatch over the four conditioning strategies.
//!
//! Callers pick a [`ConditioningMethod`] once per invocation; every arm
//! implements the same contract: corrected surface in, plus optional flow
//! direction and basin label grids out. Basins are only available on the
//! priority-flood and graph-router paths; the relaxation engine produces a
//! surface only, so its direction output is derived from the filled surface
//! on request.

use demflow_core::{Algorithm, Error, Progress, Raster, Result, Silent};

use super::fill_sinks::{fill_sinks_with_progress, FillSinksParams};
use super::flow_direction::flow_direction;
use super::priority_flood::{priority_flood_with_progress, PriorityFloodParams};
use super::sink_removal::{
    remove_sinks_with_progress, SinkRemovalMethod, SinkRemovalParams,
};

/// The conditioning strategy to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditioningMethod {
    /// Priority-queue flood fill (Barnes 2014)
    #[default]
    PriorityFlood,
    /// Iterative relaxation fill (Planchon & Darboux 2001)
    FillSinks,
    /// Pit-graph routing, then channel digging
    RouteDig,
    /// Pit-graph routing, then basin filling
    RouteFill,
}

/// Parameters for [`condition`].
#[derive(Debug, Clone, Default)]
pub struct ConditioningParams {
    /// Strategy selection
    pub method: ConditioningMethod,
    /// Minimum slope across corrected areas, in degrees
    pub min_slope: f64,
    /// Depth threshold preserving significant depressions
    /// (graph-router methods only)
    pub threshold: Option<f64>,
    /// Caller-supplied drainage routes from an earlier run; skips pit
    /// detection and routing (graph-router methods only)
    pub route: Option<Raster<i8>>,
    /// Also return the flow direction grid
    pub directions: bool,
    /// Also return the basin label grid (ignored by the relaxation engine)
    pub basins: bool,
}

/// Result of [`condition`].
#[derive(Debug, Clone)]
pub struct ConditioningOutput {
    /// The corrected surface
    pub surface: Raster<f64>,
    /// Flow directions, when requested
    pub directions: Option<Raster<i8>>,
    /// Basin/pit labels, when requested and the method produces them
    pub basins: Option<Raster<i32>>,
}

/// Hydrological conditioning algorithm
#[derive(Debug, Clone, Default)]
pub struct Conditioning;

impl Algorithm for Conditioning {
    type Input = Raster<f64>;
    type Output = ConditioningOutput;
    type Params = ConditioningParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Hydrological Conditioning"
    }

    fn description(&self) -> &'static str {
        "Remove or bridge the depressions of an elevation model"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        condition(&input, params)
    }
}

/// Condition `dem` with the selected strategy.
pub fn condition(dem: &Raster<f64>, params: ConditioningParams) -> Result<ConditioningOutput> {
    condition_with_progress(dem, params, &mut Silent)
}

/// [`condition`] with host progress reporting and cancellation.
pub fn condition_with_progress(
    dem: &Raster<f64>,
    params: ConditioningParams,
    progress: &mut dyn Progress,
) -> Result<ConditioningOutput> {
    match params.method {
        ConditioningMethod::PriorityFlood => {
            let out = priority_flood_with_progress(
                dem,
                PriorityFloodParams {
                    min_slope: params.min_slope,
                    directions: params.directions,
                    basins: params.basins,
                },
                progress,
            )?;
            Ok(ConditioningOutput {
                surface: out.surface,
                directions: out.directions,
                basins: out.basins,
            })
        }

        ConditioningMethod::FillSinks => {
            let surface = fill_sinks_with_progress(
                dem,
                FillSinksParams {
                    min_slope: params.min_slope,
                },
                progress,
            )?;
            let directions = if params.directions {
                Some(flow_direction(&surface)?)
            } else {
                None
            };
            Ok(ConditioningOutput {
                surface,
                directions,
                basins: None,
            })
        }

        ConditioningMethod::RouteDig | ConditioningMethod::RouteFill => {
            let method = if params.method == ConditioningMethod::RouteDig {
                SinkRemovalMethod::DigChannels
            } else {
                SinkRemovalMethod::FillSinks
            };
            let out = remove_sinks_with_progress(
                dem,
                params.route.as_ref(),
                SinkRemovalParams {
                    method,
                    min_slope: params.min_slope,
                    threshold: params.threshold,
                },
                progress,
            )?;
            Ok(ConditioningOutput {
                surface: out.surface,
                directions: params.directions.then_some(out.route),
                basins: if params.basins { out.pits } else { None },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dem_with_sink() -> Raster<f64> {
        // graded bowl: rim falls toward the center sink, so outlets exist
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
    fn test_all_methods_produce_a_surface() {
        let dem = dem_with_sink();
        for method in [
            ConditioningMethod::PriorityFlood,
            ConditioningMethod::FillSinks,
            ConditioningMethod::RouteDig,
            ConditioningMethod::RouteFill,
        ] {
            let out = condition(
                &dem,
                ConditioningParams {
                    method,
                    ..Default::default()
                },
            )
            .unwrap();
            assert_eq!(out.surface.shape(), dem.shape(), "{method:?}");
            assert!(out.directions.is_none());
            assert!(out.basins.is_none());
        }
    }

    #[test]
    fn test_side_outputs_by_method() {
        let dem = dem_with_sink();

        let pf = condition(
            &dem,
            ConditioningParams {
                method: ConditioningMethod::PriorityFlood,
                directions: true,
                basins: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(pf.directions.is_some());
        assert!(pf.basins.is_some());

        let relax = condition(
            &dem,
            ConditioningParams {
                method: ConditioningMethod::FillSinks,
                directions: true,
                basins: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(relax.directions.is_some(), "derived from the filled surface");
        assert!(relax.basins.is_none(), "relaxation has no basin output");

        let routed = condition(
            &dem,
            ConditioningParams {
                method: ConditioningMethod::RouteFill,
                directions: true,
                basins: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(routed.directions.is_some());
        assert!(routed.basins.is_some());
    }

    #[test]
    fn test_supplied_route_reaches_the_eliminator() {
        let dem = dem_with_sink();
        let routing = crate::hydrology::sink_route(&dem, Default::default()).unwrap();

        let out = condition(
            &dem,
            ConditioningParams {
                method: ConditioningMethod::RouteFill,
                route: Some(routing.route),
                basins: true,
                ..Default::default()
            },
        )
        .unwrap();
        // with caller-supplied routes no pit scan runs, so no basins exist
        assert!(out.basins.is_none());
        assert!(out.surface.get(3, 3).unwrap() >= 7.0);
    }
}

//! # demflow algorithms
//!
//! Hydrological conditioning algorithms for digital elevation models:
//! depression (sink/pit) detection, drainage route resolution, and four
//! mutually exclusive sink elimination strategies.
//!
//! ## Entry points
//!
//! - [`hydrology::condition`]: one-call dispatcher over all four strategies
//! - [`hydrology::sink_route`]: explicit pit-graph drainage routing
//! - [`hydrology::remove_sinks`]: dig-channels / fill-sinks elimination
//! - [`hydrology::priority_flood`]: Barnes et al. (2014) single-pass filling
//! - [`hydrology::fill_sinks`]: Planchon–Darboux (2001) iterative relaxation

pub mod hydrology;

pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        condition, fill_sinks, flow_direction, priority_flood, remove_sinks, sink_route,
        ConditioningMethod, ConditioningOutput, ConditioningParams, FillSinksParams,
        PriorityFloodParams, RoutingOutput, SinkRemovalMethod, SinkRemovalParams,
        SinkRouteParams,
    };
    pub use demflow_core::prelude::*;
}

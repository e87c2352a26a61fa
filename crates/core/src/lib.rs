//! # demflow core
//!
//! Core types and traits for the demflow hydrological conditioning library.
//!
//! This crate provides:
//! - `Raster<T>`: the elevation/direction/label grid container
//! - `GeoTransform`: affine georeferencing
//! - `CRS`: coordinate reference system metadata
//! - `d8`: 8-connected neighbor geometry and direction codes
//! - `Algorithm`: the common algorithm trait
//! - `Progress`: cooperative progress reporting and cancellation
//!
//! demflow is an in-memory transform library: persistence, codecs and any
//! user interface belong to the embedding host, not to these crates.

pub mod crs;
pub mod error;
pub mod progress;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use progress::{Progress, Silent};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::progress::{Progress, Silent};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in demflow.
///
/// Algorithms are pure functions that transform input data according to
/// parameters; they never touch the filesystem or the network.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}

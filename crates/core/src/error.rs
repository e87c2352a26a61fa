//! Error types for demflow

use thiserror::Error;

/// Main error type for demflow operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Two rasters that must share a grid system do not: dimensions,
    /// transform or CRS differ between them.
    #[error("Grid mismatch between {left} and {right}: {reason}")]
    GridMismatch {
        left: &'static str,
        right: &'static str,
        reason: String,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The drainage router exhausted its pass budget with undrained pits
    /// remaining. Indicates a malformed surface rather than a deep one.
    #[error("Drainage routing failed to converge after {passes} passes")]
    RoutingFailure { passes: usize },

    /// The host requested cancellation through a [`Progress`](crate::Progress)
    /// callback. Any partially computed output has been discarded.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for demflow operations
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for cylindrical grid interpolation and land lookups.

use thiserror::Error;

/// Errors that can occur while building or applying a cylindrical grid.
#[derive(Error, Debug)]
pub enum GridError {
    /// The polar grid parameters are unusable.
    #[error("invalid polar grid: {0}")]
    InvalidPolarGrid(String),

    /// The source lon/lat grid is unusable.
    #[error("invalid source grid: {0}")]
    InvalidSourceGrid(String),

    /// A field does not match the shape of the source grid.
    #[error("field shape {actual:?} does not match source grid shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A requested radius lies outside the polar grid.
    #[error("radius {requested_km} km is outside the polar grid (max {max_km} km)")]
    RadiusOutOfRange { requested_km: f64, max_km: f64 },

    /// Triangulation of scattered source points failed.
    #[error("triangulation failed: {0}")]
    Triangulation(String),
}

impl GridError {
    /// Create an InvalidPolarGrid error.
    pub fn invalid_polar_grid(msg: impl Into<String>) -> Self {
        Self::InvalidPolarGrid(msg.into())
    }

    /// Create an InvalidSourceGrid error.
    pub fn invalid_source_grid(msg: impl Into<String>) -> Self {
        Self::InvalidSourceGrid(msg.into())
    }
}

/// Errors that can occur while reading or querying the land LUT.
#[derive(Error, Debug)]
pub enum LutError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header line could not be parsed.
    #[error("invalid LUT header: {0}")]
    InvalidHeader(String),

    /// A data token could not be parsed or the value count is wrong.
    #[error("invalid LUT data: {0}")]
    InvalidData(String),
}

/// Result type for cylindrical grid operations.
pub type Result<T> = std::result::Result<T, GridError>;

/// Result type for land LUT operations.
pub type LutResult<T> = std::result::Result<T, LutError>;

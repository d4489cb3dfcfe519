//! Interpolation of lon/lat fields onto the storm-centered polar grid.
//!
//! Two strategies share the [`CylindricalGridInterpolator`] contract:
//!
//! - [`BilinearInterpolator`]: regular source grids. Corner indices and
//!   weights are cached at construction so each call is a weighted sum.
//! - [`ScatterInterpolator`]: any source spacing. Triangulates the source
//!   points near the storm on every call and interpolates linearly inside
//!   each triangle. Slower; kept as the reference implementation.

pub mod bilinear;
pub mod scatter;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::polar::PolarGrid;

pub use bilinear::BilinearInterpolator;
pub use scatter::ScatterInterpolator;

/// Maps a field on the source lon/lat grid onto the polar grid.
pub trait CylindricalGridInterpolator: Send + Sync {
    /// The target polar grid.
    fn polar_grid(&self) -> &PolarGrid;

    /// Expected source field shape `(n_lat, n_lon)`.
    fn source_shape(&self) -> (usize, usize);

    /// Resample `field` (shape `(n_lat, n_lon)`) onto the polar grid.
    ///
    /// The result is shaped `(n_theta, n_radii)`.
    fn resample(&self, field: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// Interpolation strategy for the cylindrical grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Cached bilinear weights; requires a regular source grid.
    #[default]
    Bilinear,
    /// Scattered-data linear interpolation over a triangulation.
    Scatter,
}

impl InterpolationMethod {
    /// Get the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bilinear => "bilinear",
            Self::Scatter => "scatter",
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the interpolator for `method` centered on the storm.
pub fn build_interpolator(
    method: InterpolationMethod,
    polar_grid: PolarGrid,
    tc_lon: f64,
    tc_lat: f64,
    lons: &[f64],
    lats: &[f64],
) -> Result<Box<dyn CylindricalGridInterpolator>> {
    Ok(match method {
        InterpolationMethod::Bilinear => Box::new(BilinearInterpolator::new(
            polar_grid, tc_lon, tc_lat, lons, lats,
        )?),
        InterpolationMethod::Scatter => Box::new(ScatterInterpolator::new(
            polar_grid, tc_lon, tc_lat, lons, lats,
        )?),
    })
}

/// Reject fields that do not match the source grid.
pub(crate) fn check_shape(expected: (usize, usize), field: &ArrayView2<'_, f64>) -> Result<()> {
    let actual = field.dim();
    if actual != expected {
        return Err(GridError::ShapeMismatch { expected, actual });
    }
    Ok(())
}

/// Reject coordinate axes that cannot describe a grid.
pub(crate) fn check_axes(lons: &[f64], lats: &[f64]) -> Result<()> {
    if lons.len() < 2 || lats.len() < 2 {
        return Err(GridError::invalid_source_grid(format!(
            "need at least 2 points per axis, got {} lons and {} lats",
            lons.len(),
            lats.len()
        )));
    }
    if lons.iter().chain(lats).any(|v| !v.is_finite()) {
        return Err(GridError::invalid_source_grid("non-finite coordinate"));
    }
    Ok(())
}

//! Cached bilinear interpolation from a regular lon/lat grid.

use ndarray::{Array2, ArrayView2};
use tracing::debug;

use super::{check_axes, check_shape, CylindricalGridInterpolator};
use crate::error::{GridError, Result};
use crate::geo::{normalize_longitude, KM_PER_DEGREE};
use crate::polar::PolarGrid;

/// Relative tolerance when checking that axis spacing is uniform.
const SPACING_TOLERANCE: f64 = 1e-3;

/// Bilinear interpolator with precomputed corner indices and weights.
///
/// For every polar point the enclosing source cell is found once, at
/// construction. Points beyond the source grid use the nearest edge cell
/// with the fractional offset clamped, so they take edge values rather than
/// extrapolating. Global grids wrap in longitude.
#[derive(Debug, Clone)]
pub struct BilinearInterpolator {
    polar_grid: PolarGrid,
    source_shape: (usize, usize),
    /// Flat source indices of the four corners for each polar point.
    corners: Vec<[usize; 4]>,
    weights: Vec<[f64; 4]>,
}

impl BilinearInterpolator {
    /// Build the interpolator for a storm at (`tc_lon`, `tc_lat`).
    ///
    /// `lons` must increase; `lats` may run either way. Both must be evenly
    /// spaced.
    pub fn new(
        polar_grid: PolarGrid,
        tc_lon: f64,
        tc_lat: f64,
        lons: &[f64],
        lats: &[f64],
    ) -> Result<Self> {
        check_axes(lons, lats)?;
        let lon_axis = Axis::longitude(lons)?;
        let lat_axis = Axis::latitude(lats)?;

        let nx = lons.len();
        let ny = lats.len();
        let lon_scale_km = KM_PER_DEGREE * tc_lat.to_radians().cos();

        let n_points = polar_grid.n_theta() * polar_grid.n_radii();
        let mut corners = Vec::with_capacity(n_points);
        let mut weights = Vec::with_capacity(n_points);

        for (&x_km, &y_km) in polar_grid.x_km().iter().zip(polar_grid.y_km().iter()) {
            let lon = tc_lon + x_km / lon_scale_km.max(f64::EPSILON);
            let lat = tc_lat + y_km / KM_PER_DEGREE;

            let (i0, i1, fx) = lon_axis.locate(lon);
            let (j0, j1, fy) = lat_axis.locate(lat);

            corners.push([j0 * nx + i0, j0 * nx + i1, j1 * nx + i0, j1 * nx + i1]);
            weights.push([
                (1.0 - fx) * (1.0 - fy),
                fx * (1.0 - fy),
                (1.0 - fx) * fy,
                fx * fy,
            ]);
        }

        debug!(
            tc_lon = tc_lon,
            tc_lat = tc_lat,
            nx = nx,
            ny = ny,
            n_points = n_points,
            global = lon_axis.is_global(),
            "Built bilinear cylindrical grid interpolator"
        );

        Ok(Self {
            polar_grid,
            source_shape: (ny, nx),
            corners,
            weights,
        })
    }
}

impl CylindricalGridInterpolator for BilinearInterpolator {
    fn polar_grid(&self) -> &PolarGrid {
        &self.polar_grid
    }

    fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    fn resample(&self, field: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_shape(self.source_shape, &field)?;
        let flat: Vec<f64> = field.iter().copied().collect();

        let values: Vec<f64> = self
            .corners
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| {
                w[0] * flat[c[0]] + w[1] * flat[c[1]] + w[2] * flat[c[2]] + w[3] * flat[c[3]]
            })
            .collect();

        Array2::from_shape_vec(self.polar_grid.shape(), values)
            .map_err(|e| GridError::invalid_polar_grid(e.to_string()))
    }
}

/// How an axis maps coordinates to positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisKind {
    Latitude,
    Longitude,
    /// Longitude axis covering the full circle.
    GlobalLongitude,
}

/// One evenly spaced coordinate axis.
#[derive(Debug, Clone, Copy)]
struct Axis {
    first: f64,
    spacing: f64,
    len: usize,
    kind: AxisKind,
}

impl Axis {
    fn longitude(lons: &[f64]) -> Result<Self> {
        let axis = Self::regular(lons, "longitude")?;
        if axis.spacing <= 0.0 {
            return Err(GridError::invalid_source_grid(
                "longitudes must increase west to east",
            ));
        }
        let span = axis.spacing * axis.len as f64;
        let kind = if (span - 360.0).abs() < axis.spacing * 0.5 {
            AxisKind::GlobalLongitude
        } else {
            AxisKind::Longitude
        };
        Ok(Self { kind, ..axis })
    }

    fn latitude(lats: &[f64]) -> Result<Self> {
        Self::regular(lats, "latitude")
    }

    fn regular(values: &[f64], name: &str) -> Result<Self> {
        let mut spacing = values[1] - values[0];
        if spacing.abs() < f64::EPSILON {
            spacing = f64::EPSILON.copysign(spacing);
        }
        for pair in values.windows(2) {
            let step = pair[1] - pair[0];
            if ((step - spacing) / spacing).abs() > SPACING_TOLERANCE {
                return Err(GridError::invalid_source_grid(format!(
                    "{} spacing is not uniform ({} vs {})",
                    name, step, spacing
                )));
            }
        }
        Ok(Self {
            first: values[0],
            spacing,
            len: values.len(),
            kind: AxisKind::Latitude,
        })
    }

    fn is_global(&self) -> bool {
        self.kind == AxisKind::GlobalLongitude
    }

    /// Locate `coord`, returning the two bracketing indices and the
    /// fractional offset from the first toward the second.
    fn locate(&self, coord: f64) -> (usize, usize, f64) {
        let offset = match self.kind {
            AxisKind::Latitude => coord - self.first,
            AxisKind::Longitude => self.unwrapped_offset(coord),
            AxisKind::GlobalLongitude => normalize_longitude(coord - self.first),
        };
        let position = offset / self.spacing;

        if self.is_global() {
            let i0 = (position.floor() as usize).min(self.len - 1);
            let i1 = (i0 + 1) % self.len;
            let frac = (position - i0 as f64).clamp(0.0, 1.0);
            return (i0, i1, frac);
        }

        let max_start = self.len - 2;
        let i0 = if position <= 0.0 {
            0
        } else {
            (position.floor() as usize).min(max_start)
        };
        let frac = (position - i0 as f64).clamp(0.0, 1.0);
        (i0, i0 + 1, frac)
    }

    /// Offset from the first longitude, shifted by whole turns toward the
    /// middle of the grid so a storm at -80 lands on a 0..360 grid.
    fn unwrapped_offset(&self, coord: f64) -> f64 {
        let center = self.spacing * (self.len - 1) as f64 / 2.0;
        let offset = coord - self.first;
        offset - ((offset - center) / 360.0).round() * 360.0
    }
}

//! Distance-to-land lookup table.
//!
//! The table is a global lon/lat grid of distances (km) to the nearest land,
//! read once per run from a plain ASCII file:
//!
//! ```text
//! ll_lon ur_lon lon_spacing nx <ignored> ll_lat ur_lat lat_spacing ny
//! v(0,0) v(0,1) ... v(0,nx-1)
//! v(1,0) ...
//! ```
//!
//! Values are row-major with rows running north from `ll_lat`. Line breaks in
//! the data section carry no meaning.

use ndarray::Array2;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{LutError, LutResult};
use crate::geo::normalize_longitude;

/// Grid metadata from the LUT header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LUTExtents {
    pub ll_lon: f64,
    pub ll_lat: f64,
    pub ur_lon: f64,
    pub ur_lat: f64,
    pub nx: usize,
    pub ny: usize,
    pub lon_spacing: f64,
    pub lat_spacing: f64,
}

impl LUTExtents {
    pub fn width(&self) -> f64 {
        self.ur_lon - self.ll_lon
    }

    pub fn height(&self) -> f64 {
        self.ur_lat - self.ll_lat
    }

    /// Parse the header line.
    pub fn from_header(line: &str) -> LutResult<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 9 {
            return Err(LutError::InvalidHeader(format!(
                "expected 9 fields, got {}",
                tokens.len()
            )));
        }

        let float = |idx: usize| -> LutResult<f64> {
            tokens[idx].parse::<f64>().map_err(|e| {
                LutError::InvalidHeader(format!("field {} ({:?}): {}", idx, tokens[idx], e))
            })
        };
        // Counts are sometimes written as floats.
        let count = |idx: usize| -> LutResult<usize> {
            let value = float(idx)?;
            if value < 1.0 || value.fract() != 0.0 {
                return Err(LutError::InvalidHeader(format!(
                    "field {} must be a positive count, got {}",
                    idx, tokens[idx]
                )));
            }
            Ok(value as usize)
        };

        let extents = Self {
            ll_lon: float(0)?,
            ur_lon: float(1)?,
            lon_spacing: float(2)?,
            nx: count(3)?,
            ll_lat: float(5)?,
            ur_lat: float(6)?,
            lat_spacing: float(7)?,
            ny: count(8)?,
        };

        if extents.lon_spacing <= 0.0 || extents.lat_spacing <= 0.0 {
            return Err(LutError::InvalidHeader(format!(
                "spacing must be positive, got lon {} lat {}",
                extents.lon_spacing, extents.lat_spacing
            )));
        }
        Ok(extents)
    }
}

/// Distance-to-land table with bilinear-style lookups.
///
/// Lookups wrap across the date line in longitude and clamp at the top and
/// bottom edges in latitude.
#[derive(Debug, Clone)]
pub struct LandLUT {
    distances: Array2<f64>,
    extents: LUTExtents,
}

impl LandLUT {
    /// Units of [`LandLUT::distance`].
    pub const UNITS: &'static str = "km";

    /// Wrap a `(ny, nx)` distance grid.
    pub fn new(distances: Array2<f64>, extents: LUTExtents) -> LutResult<Self> {
        if distances.dim() != (extents.ny, extents.nx) {
            return Err(LutError::InvalidData(format!(
                "distance grid shape {:?} does not match header ({}, {})",
                distances.dim(),
                extents.ny,
                extents.nx
            )));
        }
        Ok(Self { distances, extents })
    }

    /// Read a LUT file.
    pub fn from_file(path: impl AsRef<Path>) -> LutResult<Self> {
        let path = path.as_ref();
        let (distances, extents) = read_land_lut_file(path)?;
        info!(
            path = %path.display(),
            nx = extents.nx,
            ny = extents.ny,
            "Loaded distance to land LUT"
        );
        Self::new(distances, extents)
    }

    pub fn extents(&self) -> &LUTExtents {
        &self.extents
    }

    pub fn distances(&self) -> &Array2<f64> {
        &self.distances
    }

    /// Distance in km from (`lon`, `lat`) to the nearest land.
    ///
    /// Blends the four surrounding table values with inverse-distance weights
    /// measured in index space. The right-hand column past the last one is
    /// column 0, so queries just west of the date line blend with the values
    /// just east of it.
    pub fn distance(&self, lon: f64, lat: f64) -> f64 {
        let ext = &self.extents;
        let lon = normalize_longitude(lon);

        let x = (lon - ext.ll_lon) / ext.lon_spacing;
        let y = (lat - ext.ll_lat) / ext.lat_spacing;

        let i = (x.floor().max(0.0) as usize).min(ext.nx - 1);
        let j = (y.floor().max(0.0) as usize).min(ext.ny - 1);

        // Position of the right column in index space is always i + 1, even
        // when it wraps to column 0.
        let i_right = if i + 1 >= ext.nx { 0 } else { i + 1 };
        let j_up = (j + 1).min(ext.ny - 1);

        let corners = [
            (i, i as f64, j, j as f64),
            (i_right, (i + 1) as f64, j, j as f64),
            (i, i as f64, j_up, j_up as f64),
            (i_right, (i + 1) as f64, j_up, j_up as f64),
        ];

        let mut weighted = 0.0;
        let mut weight_total = 0.0;
        for (col, col_pos, row, row_pos) in corners {
            let w = inverse_distance(x - col_pos, y - row_pos);
            weighted += w * self.distances[[row, col]];
            weight_total += w;
        }
        let result = weighted / weight_total;

        debug!(lon = lon, lat = lat, i = i, j = j, distance_km = result, "Land LUT lookup");
        result
    }
}

fn inverse_distance(dx: f64, dy: f64) -> f64 {
    let dx = if dx.abs() < f64::EPSILON { f64::EPSILON } else { dx };
    let dy = if dy.abs() < f64::EPSILON { f64::EPSILON } else { dy };
    1.0 / dx.hypot(dy)
}

/// Read the header and distance grid from an ASCII LUT file.
pub fn read_land_lut_file(path: &Path) -> LutResult<(Array2<f64>, LUTExtents)> {
    let contents = fs::read_to_string(path)?;
    parse_land_lut(&contents)
}

/// Parse LUT text already in memory.
pub fn parse_land_lut(contents: &str) -> LutResult<(Array2<f64>, LUTExtents)> {
    let mut lines = contents.lines();
    let header = lines
        .next()
        .ok_or_else(|| LutError::InvalidHeader("file is empty".to_string()))?;
    let extents = LUTExtents::from_header(header)?;

    let values = lines
        .flat_map(str::split_whitespace)
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|e| LutError::InvalidData(format!("{:?}: {}", token, e)))
        })
        .collect::<LutResult<Vec<f64>>>()?;

    let expected = extents.nx * extents.ny;
    if values.len() != expected {
        return Err(LutError::InvalidData(format!(
            "expected {} values ({} x {}), got {}",
            expected,
            extents.ny,
            extents.nx,
            values.len()
        )));
    }

    let distances = Array2::from_shape_vec((extents.ny, extents.nx), values)
        .map_err(|e| LutError::InvalidData(e.to_string()))?;
    Ok((distances, extents))
}

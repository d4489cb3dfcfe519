//! Storm-Centered Cylindrical Grid
//!
//! This crate converts lon/lat gridded model fields into storm-relative
//! coordinates. It provides:
//!
//! - **Polar grid**: radius x azimuth points around the storm center
//! - **Interpolators**: cached bilinear (regular grids) and triangulated
//!   scatter (any spacing) resampling onto the polar grid
//! - **Radial reductions**: azimuthal and radius-weighted area averages
//! - **Land LUT**: interpolated distance to the nearest land
//!
//! # Architecture
//!
//! ```text
//! lon/lat axes + storm (lon, lat)
//!      │
//!      ▼
//! build_interpolator(method, PolarGrid, ...)
//!      │
//!      ├─► Bilinear: locate each polar point once, cache corners + weights
//!      │
//!      └─► Scatter: keep source points near the storm
//!               │
//!               ▼
//! resample(field) ──► (n_theta, n_radii) field
//!      │
//!      ├─► azimuthal_average ──► radial profile
//!      │
//!      └─► area_average(min_km, max_km) ──► scalar
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cylindrical_grid::{build_interpolator, InterpolationMethod, PolarGrid};
//!
//! let grid = PolarGrid::new(151, 64, 10.0)?;
//! let interp = build_interpolator(InterpolationMethod::Bilinear, grid, tc_lon, tc_lat, &lons, &lats)?;
//! let polar_u = interp.resample(u.view())?;
//! ```

pub mod error;
pub mod geo;
pub mod interpolation;
pub mod land_lut;
pub mod polar;

// Re-export commonly used types at crate root
pub use error::{GridError, LutError, LutResult, Result};
pub use geo::{
    convert_grid_to_tc_centric_km, distances_from_tc, flat_earth_error, haversine_distance,
    normalize_longitude, KM_PER_DEGREE,
};
pub use interpolation::{
    build_interpolator, BilinearInterpolator, CylindricalGridInterpolator, InterpolationMethod,
    ScatterInterpolator,
};
pub use land_lut::{LUTExtents, LandLUT};
pub use polar::{area_average, azimuthal_average, PolarGrid};

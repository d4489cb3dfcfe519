//! Scattered-data linear interpolation over a Delaunay triangulation.

use ndarray::{Array2, ArrayView2};
use std::collections::HashMap;
use tracing::debug;

use super::{check_axes, check_shape, CylindricalGridInterpolator};
use crate::error::{GridError, Result};
use crate::geo::{lat_offsets_km, lon_offsets_km};
use crate::polar::PolarGrid;

/// Barycentric tolerance for points that sit on a triangle edge.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Linear interpolation on a triangulation of the source points.
///
/// Only source points inside the polar grid footprint (plus a margin of two
/// source cells) take part. The triangulation is rebuilt on every call, which
/// makes this strategy correct for any source spacing but much slower than
/// [`super::BilinearInterpolator`]. Polar points outside the triangulated hull
/// come back as NaN.
#[derive(Debug, Clone)]
pub struct ScatterInterpolator {
    polar_grid: PolarGrid,
    source_shape: (usize, usize),
    /// Flat source indices of the points that take part.
    source_indices: Vec<usize>,
    /// Storm-relative (x, y) km of those points.
    source_xy_km: Vec<(f64, f64)>,
}

impl ScatterInterpolator {
    pub fn new(
        polar_grid: PolarGrid,
        tc_lon: f64,
        tc_lat: f64,
        lons: &[f64],
        lats: &[f64],
    ) -> Result<Self> {
        check_axes(lons, lats)?;
        let x_km = lon_offsets_km(lons, tc_lon, tc_lat);
        let y_km = lat_offsets_km(lats, tc_lat);

        let max_cell_km = max_step(x_km.as_slice().unwrap_or(&[]))
            .max(max_step(y_km.as_slice().unwrap_or(&[])));
        let cutoff_km = polar_grid.max_radius_km() + 2.0 * max_cell_km;

        let nx = lons.len();
        let mut source_indices = Vec::new();
        let mut source_xy_km = Vec::new();
        for (j, &y) in y_km.iter().enumerate() {
            for (i, &x) in x_km.iter().enumerate() {
                if x.hypot(y) <= cutoff_km {
                    source_indices.push(j * nx + i);
                    source_xy_km.push((x, y));
                }
            }
        }

        if source_xy_km.len() < 3 {
            return Err(GridError::invalid_source_grid(format!(
                "only {} source points within {:.1} km of the storm",
                source_xy_km.len(),
                cutoff_km
            )));
        }

        debug!(
            tc_lon = tc_lon,
            tc_lat = tc_lat,
            n_source_points = source_xy_km.len(),
            cutoff_km = cutoff_km,
            "Built scatter cylindrical grid interpolator"
        );

        Ok(Self {
            polar_grid,
            source_shape: (lats.len(), nx),
            source_indices,
            source_xy_km,
        })
    }
}

impl CylindricalGridInterpolator for ScatterInterpolator {
    fn polar_grid(&self) -> &PolarGrid {
        &self.polar_grid
    }

    fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    fn resample(&self, field: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_shape(self.source_shape, &field)?;
        let flat: Vec<f64> = field.iter().copied().collect();
        let values: Vec<f64> = self.source_indices.iter().map(|&idx| flat[idx]).collect();

        let triangles = triangulate(&self.source_xy_km)?;

        let out: Vec<f64> = self
            .polar_grid
            .x_km()
            .iter()
            .zip(self.polar_grid.y_km().iter())
            .map(|(&x, &y)| {
                triangles
                    .iter()
                    .find_map(|tri| barycentric(&self.source_xy_km, tri, x, y))
                    .map(|(tri, w)| {
                        w[0] * values[tri[0]] + w[1] * values[tri[1]] + w[2] * values[tri[2]]
                    })
                    .unwrap_or(f64::NAN)
            })
            .collect();

        Array2::from_shape_vec(self.polar_grid.shape(), out)
            .map_err(|e| GridError::invalid_polar_grid(e.to_string()))
    }
}

fn max_step(values: &[f64]) -> f64 {
    values
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(0.0, f64::max)
}

/// Barycentric weights of (x, y) in `tri`, if the point lies inside it.
fn barycentric(
    points: &[(f64, f64)],
    tri: &[usize; 3],
    x: f64,
    y: f64,
) -> Option<([usize; 3], [f64; 3])> {
    let (x1, y1) = points[tri[0]];
    let (x2, y2) = points[tri[1]];
    let (x3, y3) = points[tri[2]];

    let det = (y2 - y3) * (x1 - x3) + (x3 - x2) * (y1 - y3);
    if det.abs() < f64::EPSILON {
        return None;
    }
    let l1 = ((y2 - y3) * (x - x3) + (x3 - x2) * (y - y3)) / det;
    let l2 = ((y3 - y1) * (x - x3) + (x1 - x3) * (y - y3)) / det;
    let l3 = 1.0 - l1 - l2;

    if l1 >= -EDGE_TOLERANCE && l2 >= -EDGE_TOLERANCE && l3 >= -EDGE_TOLERANCE {
        Some((*tri, [l1, l2, l3]))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    vertices: [usize; 3],
    center: (f64, f64),
    radius_sq: f64,
}

impl Triangle {
    fn new(points: &[(f64, f64)], vertices: [usize; 3]) -> Self {
        let (ax, ay) = points[vertices[0]];
        let (bx, by) = points[vertices[1]];
        let (cx, cy) = points[vertices[2]];

        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        if d.abs() < f64::EPSILON {
            // Collinear: no circumcircle, never considered for removal.
            return Self {
                vertices,
                center: (f64::NAN, f64::NAN),
                radius_sq: f64::NAN,
            };
        }

        let a2 = ax * ax + ay * ay;
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
        let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;

        Self {
            vertices,
            center: (ux, uy),
            radius_sq: (ax - ux).powi(2) + (ay - uy).powi(2),
        }
    }

    fn circumcircle_contains(&self, (x, y): (f64, f64)) -> bool {
        (x - self.center.0).powi(2) + (y - self.center.1).powi(2) < self.radius_sq
    }
}

/// Bowyer-Watson Delaunay triangulation.
///
/// Returns triangles as index triples into `points`.
fn triangulate(points: &[(f64, f64)]) -> Result<Vec<[usize; 3]>> {
    let n = points.len();
    if n < 3 {
        return Err(GridError::Triangulation(format!("need 3 points, got {}", n)));
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let mid_x = (min_x + max_x) / 2.0;
    let mid_y = (min_y + max_y) / 2.0;

    // Super-triangle vertices live after the real points.
    let mut all: Vec<(f64, f64)> = points.to_vec();
    all.push((mid_x - 20.0 * span, mid_y - span));
    all.push((mid_x, mid_y + 20.0 * span));
    all.push((mid_x + 20.0 * span, mid_y - span));

    let mut triangles = vec![Triangle::new(&all, [n, n + 1, n + 2])];

    for p in 0..n {
        let point = all[p];
        let (bad, good): (Vec<Triangle>, Vec<Triangle>) = triangles
            .into_iter()
            .partition(|t| t.circumcircle_contains(point));

        if bad.is_empty() {
            return Err(GridError::Triangulation(format!(
                "point {} at ({:.3}, {:.3}) is not inside any circumcircle",
                p, point.0, point.1
            )));
        }

        // Cavity boundary: edges used by exactly one bad triangle.
        let mut edge_counts: HashMap<(usize, usize), usize> = HashMap::new();
        for t in &bad {
            let [a, b, c] = t.vertices;
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edge_counts.entry((u.min(v), u.max(v))).or_insert(0) += 1;
            }
        }

        triangles = good;
        for ((u, v), count) in edge_counts {
            if count == 1 {
                triangles.push(Triangle::new(&all, [u, v, p]));
            }
        }
    }

    Ok(triangles
        .into_iter()
        .map(|t| t.vertices)
        .filter(|v| v.iter().all(|&idx| idx < n))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangulate_square() {
        let points = vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        let tris = triangulate(&points).unwrap();
        assert!(!tris.is_empty());
        for &(x, y) in &[(0.25, 0.25), (0.75, 0.75), (0.5, 0.5)] {
            assert!(tris.iter().any(|t| barycentric(&points, t, x, y).is_some()));
        }
    }

    #[test]
    fn test_triangulate_grid_covers_interior() {
        let mut points = Vec::new();
        for j in 0..5 {
            for i in 0..5 {
                points.push((i as f64, j as f64));
            }
        }
        let tris = triangulate(&points).unwrap();
        assert!(tris.iter().all(|t| t.iter().all(|&i| i < points.len())));
        for &(x, y) in &[(1.5, 1.5), (2.3, 2.7), (2.0, 2.0)] {
            assert!(tris.iter().any(|t| barycentric(&points, t, x, y).is_some()));
        }
    }

    #[test]
    fn test_scatter_linear_field() {
        let lons: Vec<f64> = (0..21).map(|i| 270.0 + i as f64 * 0.5).collect();
        let lats: Vec<f64> = (0..21).map(|j| 15.0 + j as f64 * 0.5).collect();
        let grid = PolarGrid::new(5, 8, 40.0).unwrap();
        let interp = ScatterInterpolator::new(grid, 275.0, 20.0, &lons, &lats).unwrap();

        let field = Array2::from_shape_fn((21, 21), |(j, i)| 2.0 * lons[i] - 3.0 * lats[j]);
        let out = interp.resample(field.view()).unwrap();
        let expected_center = 2.0 * 275.0 - 3.0 * 20.0;
        for k in 0..8 {
            assert!((out[[k, 0]] - expected_center).abs() < 1e-6);
        }
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_scatter_requires_nearby_points() {
        let lons: Vec<f64> = (0..3).map(|i| i as f64).collect();
        let lats: Vec<f64> = (0..3).map(|j| j as f64).collect();
        let grid = PolarGrid::new(2, 4, 10.0).unwrap();
        assert!(ScatterInterpolator::new(grid, 100.0, 50.0, &lons, &lats).is_err());
    }
}

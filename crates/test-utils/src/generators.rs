//! Synthetic lon/lat grids and fields with known values.

use ndarray::Array2;

/// Evenly spaced axis: `first, first + step, ...` with `n` points.
///
/// # Example
///
/// ```
/// use test_utils::regular_axis;
///
/// let lons = regular_axis(270.0, 0.5, 3);
/// assert_eq!(lons, vec![270.0, 270.5, 271.0]);
/// ```
pub fn regular_axis(first: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| first + step * i as f64).collect()
}

/// Lon/lat axes of a regular box centered on (`lon`, `lat`).
///
/// Each axis has `2 * half_width + 1` points so the center is a grid node.
pub fn centered_axes(lon: f64, lat: f64, step: f64, half_width: usize) -> (Vec<f64>, Vec<f64>) {
    let n = 2 * half_width + 1;
    let offset = step * half_width as f64;
    (
        regular_axis(lon - offset, step, n),
        regular_axis(lat - offset, step, n),
    )
}

/// Field shaped `(lats.len(), lons.len())` with `a * lon + b * lat + c`.
pub fn linear_field(lons: &[f64], lats: &[f64], a: f64, b: f64, c: f64) -> Array2<f64> {
    Array2::from_shape_fn((lats.len(), lons.len()), |(j, i)| {
        a * lons[i] + b * lats[j] + c
    })
}

/// Field shaped `(lats.len(), lons.len())` filled with `value`.
pub fn constant_field(lons: &[f64], lats: &[f64], value: f64) -> Array2<f64> {
    Array2::from_elem((lats.len(), lons.len()), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_axes() {
        let (lons, lats) = centered_axes(280.0, 20.0, 0.5, 4);
        assert_eq!(lons.len(), 9);
        assert_eq!(lons[4], 280.0);
        assert_eq!(lats[4], 20.0);
    }

    #[test]
    fn test_linear_field() {
        let field = linear_field(&[0.0, 1.0], &[10.0, 20.0, 30.0], 2.0, 1.0, 0.5);
        assert_eq!(field.dim(), (3, 2));
        assert_eq!(field[[2, 1]], 2.0 + 30.0 + 0.5);
    }
}

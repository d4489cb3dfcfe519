//! Gridded model fields on a regular lon/lat grid.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::InputVarSpec;
use crate::error::DatasetError;

type Result<T> = std::result::Result<T, DatasetError>;

/// One variable of a [`GridDataset`].
#[derive(Debug, Clone)]
pub enum FieldData {
    /// Shape `(n_lat, n_lon)`.
    Surface(Array2<f64>),
    /// Shape `(n_levels, n_lat, n_lon)`, levels in hPa.
    Profile {
        levels_hpa: Vec<f64>,
        data: Array3<f64>,
    },
}

/// Fields for one forecast hour, all sharing 1-D lon and lat axes.
#[derive(Debug, Clone)]
pub struct GridDataset {
    lons: Vec<f64>,
    lats: Vec<f64>,
    fields: BTreeMap<String, FieldData>,
}

impl GridDataset {
    pub fn new(lons: Vec<f64>, lats: Vec<f64>) -> Result<Self> {
        if lons.is_empty() || lats.is_empty() {
            return Err(DatasetError::InvalidCoordinates(format!(
                "empty axis: {} lons, {} lats",
                lons.len(),
                lats.len()
            )));
        }
        Ok(Self {
            lons,
            lats,
            fields: BTreeMap::new(),
        })
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    /// Horizontal shape `(n_lat, n_lon)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.lats.len(), self.lons.len())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn insert_surface(&mut self, name: impl Into<String>, data: Array2<f64>) -> Result<()> {
        let name = name.into();
        let (ny, nx) = self.shape();
        if data.dim() != (ny, nx) {
            return Err(DatasetError::ShapeMismatch {
                name,
                expected: vec![ny, nx],
                actual: data.shape().to_vec(),
            });
        }
        self.fields.insert(name, FieldData::Surface(data));
        Ok(())
    }

    pub fn insert_profile(
        &mut self,
        name: impl Into<String>,
        levels_hpa: Vec<f64>,
        data: Array3<f64>,
    ) -> Result<()> {
        let name = name.into();
        let (ny, nx) = self.shape();
        if data.dim() != (levels_hpa.len(), ny, nx) {
            return Err(DatasetError::ShapeMismatch {
                name,
                expected: vec![levels_hpa.len(), ny, nx],
                actual: data.shape().to_vec(),
            });
        }
        self.fields
            .insert(name, FieldData::Profile { levels_hpa, data });
        Ok(())
    }

    fn get(&self, name: &str) -> Result<&FieldData> {
        self.fields
            .get(name)
            .ok_or_else(|| DatasetError::UnknownVariable(name.to_string()))
    }

    /// A 2-D field. Profiles need `level_hpa` and must hold that exact
    /// level; surface fields ignore it.
    pub fn field(&self, name: &str, level_hpa: Option<f64>) -> Result<ArrayView2<'_, f64>> {
        match (self.get(name)?, level_hpa) {
            (FieldData::Surface(data), _) => Ok(data.view()),
            (FieldData::Profile { .. }, None) => Err(DatasetError::LevelRequired(name.to_string())),
            (FieldData::Profile { levels_hpa, data }, Some(level)) => levels_hpa
                .iter()
                .position(|&l| (l - level).abs() < 1e-6)
                .map(|idx| data.index_axis(Axis(0), idx))
                .ok_or_else(|| DatasetError::MissingLevel {
                    name: name.to_string(),
                    level_hpa: level,
                }),
        }
    }

    /// A profile field linearly interpolated in pressure to `level_hpa`.
    ///
    /// Exact levels are returned as-is; levels outside the profile are an
    /// error. Surface fields are returned unchanged.
    pub fn interp_level(&self, name: &str, level_hpa: f64) -> Result<Array2<f64>> {
        let (levels, data) = match self.get(name)? {
            FieldData::Surface(data) => return Ok(data.clone()),
            FieldData::Profile { levels_hpa, data } => (levels_hpa, data),
        };

        if let Ok(exact) = self.field(name, Some(level_hpa)) {
            return Ok(exact.to_owned());
        }

        // Nearest levels above and below, in whatever order they are stored.
        let mut below: Option<(usize, f64)> = None;
        let mut above: Option<(usize, f64)> = None;
        for (idx, &level) in levels.iter().enumerate() {
            if level < level_hpa && below.map_or(true, |(_, l)| level > l) {
                below = Some((idx, level));
            }
            if level > level_hpa && above.map_or(true, |(_, l)| level < l) {
                above = Some((idx, level));
            }
        }

        let ((i0, p0), (i1, p1)) = match (below, above) {
            (Some(b), Some(a)) => (b, a),
            _ => {
                return Err(DatasetError::MissingLevel {
                    name: name.to_string(),
                    level_hpa,
                })
            }
        };

        let t = (level_hpa - p0) / (p1 - p0);
        let lower = data.index_axis(Axis(0), i0);
        let upper = data.index_axis(Axis(0), i1);
        Ok(&lower + &((&upper - &lower) * t))
    }
}

/// Reads the configured input variables for one forecast hour.
pub trait GridLoader {
    /// Load `input_vars` from `path`.
    ///
    /// `nav_spec` selects the field whose grid defines the lon/lat axes;
    /// profile variables are read at `levels_hpa`.
    fn load(
        &self,
        path: &Path,
        nav_spec: &InputVarSpec,
        levels_hpa: &[i32],
        input_vars: &[InputVarSpec],
    ) -> Result<GridDataset>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn dataset() -> GridDataset {
        let mut ds = GridDataset::new(vec![0.0, 1.0, 2.0], vec![10.0, 11.0]).unwrap();
        ds.insert_surface("sst", Array2::from_elem((2, 3), 300.0)).unwrap();
        let data = Array3::from_shape_fn((2, 2, 3), |(k, _, _)| if k == 0 { 10.0 } else { 20.0 });
        ds.insert_profile("u", vec![850.0, 200.0], data).unwrap();
        ds
    }

    #[test]
    fn test_field_lookup() {
        let ds = dataset();
        assert_eq!(ds.field("sst", None).unwrap()[[1, 2]], 300.0);
        assert_eq!(ds.field("sst", Some(500.0)).unwrap()[[0, 0]], 300.0);
        assert_eq!(ds.field("u", Some(200.0)).unwrap()[[0, 0]], 20.0);
        assert!(matches!(ds.field("u", None), Err(DatasetError::LevelRequired(_))));
        assert!(matches!(
            ds.field("u", Some(500.0)),
            Err(DatasetError::MissingLevel { .. })
        ));
        assert!(matches!(ds.field("v", None), Err(DatasetError::UnknownVariable(_))));
    }

    #[test]
    fn test_interp_level() {
        let ds = dataset();
        let mid = ds.interp_level("u", 525.0).unwrap();
        assert!(mid.iter().all(|v| (v - 15.0).abs() < 1e-12));
        assert_eq!(ds.interp_level("u", 850.0).unwrap()[[0, 0]], 10.0);
        assert!(ds.interp_level("u", 925.0).is_err());
    }

    #[test]
    fn test_shape_checked() {
        let mut ds = dataset();
        assert!(matches!(
            ds.insert_surface("bad", Array2::zeros((3, 2))),
            Err(DatasetError::ShapeMismatch { .. })
        ));
    }
}

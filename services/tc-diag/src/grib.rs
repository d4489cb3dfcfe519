//! GRIB2 implementation of [`GridLoader`].
//!
//! Messages are matched by parameter short name and level type. Only the
//! messages a run asks for are decoded.

use ndarray::{Array2, Array3};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

use tc_diag_engine::{DatasetError, GridDataset, GridLoader, InputVarSpec};

type Result<T> = std::result::Result<T, DatasetError>;

/// One row of the parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GribParameter {
    discipline: u8,
    category: u8,
    number: u8,
    /// ecCodes style short name (`t`, `u`, `gh`).
    short_name: &'static str,
    /// NCEP abbreviation (`TMP`, `UGRD`, `HGT`).
    ncep_name: &'static str,
}

const fn param(
    discipline: u8,
    category: u8,
    number: u8,
    short_name: &'static str,
    ncep_name: &'static str,
) -> GribParameter {
    GribParameter {
        discipline,
        category,
        number,
        short_name,
        ncep_name,
    }
}

const PARAMETERS: &[GribParameter] = &[
    // Temperature
    param(0, 0, 0, "t", "TMP"),
    param(0, 0, 2, "pt", "POT"),
    param(0, 0, 6, "dpt", "DPT"),
    // Moisture
    param(0, 1, 0, "q", "SPFH"),
    param(0, 1, 1, "r", "RH"),
    param(0, 1, 3, "pwat", "PWAT"),
    // Momentum
    param(0, 2, 1, "wind", "WIND"),
    param(0, 2, 2, "u", "UGRD"),
    param(0, 2, 3, "v", "VGRD"),
    param(0, 2, 8, "w", "VVEL"),
    param(0, 2, 10, "absv", "ABSV"),
    param(0, 2, 22, "gust", "GUST"),
    // Mass
    param(0, 3, 0, "sp", "PRES"),
    param(0, 3, 1, "prmsl", "PRMSL"),
    param(0, 3, 5, "gh", "HGT"),
    // Stability
    param(0, 7, 6, "cape", "CAPE"),
    param(0, 7, 7, "cin", "CIN"),
    // Oceanographic surface temperature
    param(10, 3, 0, "wtmp", "WTMP"),
    // Land cover
    param(2, 0, 0, "lsm", "LAND"),
];

fn lookup_parameter(discipline: u8, category: u8, number: u8) -> Option<&'static GribParameter> {
    PARAMETERS
        .iter()
        .find(|p| p.discipline == discipline && p.category == category && p.number == number)
}

fn parameter_by_name(name: &str) -> Option<&'static GribParameter> {
    PARAMETERS
        .iter()
        .find(|p| p.short_name == name || p.ncep_name.eq_ignore_ascii_case(name))
}

const ISOBARIC: u8 = 100;

/// Fixed surface code for a level type name.
fn level_type_code(level_type: &str) -> Option<u8> {
    match level_type {
        "surface" => Some(1),
        "maxWind" => Some(6),
        "tropopause" => Some(7),
        "isobaricInhPa" => Some(ISOBARIC),
        "meanSea" => Some(101),
        "heightAboveSea" => Some(102),
        "heightAboveGround" => Some(103),
        _ => None,
    }
}

/// Level value in configuration units: hPa for isobaric surfaces, the raw
/// value otherwise.
fn level_value(surface_type: u8, raw: f64) -> f64 {
    if surface_type == ISOBARIC {
        raw / 100.0
    } else {
        raw
    }
}

// ============================================================================
// Requests
// ============================================================================

/// What one configured variable needs from the file.
#[derive(Debug, Clone)]
struct FieldRequest<'a> {
    spec: &'a InputVarSpec,
    parameter: &'static GribParameter,
    surface_type: u8,
}

impl<'a> FieldRequest<'a> {
    fn from_spec(spec: &'a InputVarSpec) -> Result<Self> {
        let parameter = parameter_by_name(spec.source()).ok_or_else(|| {
            DatasetError::Decode(format!(
                "variable {:?}: no GRIB2 parameter named {:?}",
                spec.name,
                spec.source()
            ))
        })?;
        let surface_type = level_type_code(&spec.level_type).ok_or_else(|| {
            DatasetError::Decode(format!(
                "variable {:?}: unsupported level type {:?}",
                spec.name, spec.level_type
            ))
        })?;
        if !spec.is_surface && surface_type != ISOBARIC {
            return Err(DatasetError::Decode(format!(
                "variable {:?}: profiles must use isobaricInhPa levels",
                spec.name
            )));
        }
        Ok(Self {
            spec,
            parameter,
            surface_type,
        })
    }

    /// Whether a message at `level` (configuration units) fills this request.
    fn matches(&self, parameter: &GribParameter, surface_type: u8, level: f64, levels_hpa: &[i32]) -> bool {
        if parameter != self.parameter || surface_type != self.surface_type {
            return false;
        }
        if self.spec.is_surface {
            self.spec
                .level
                .map_or(true, |wanted| (wanted - level).abs() < 1e-6)
        } else {
            levels_hpa.iter().any(|&l| (f64::from(l) - level).abs() < 1e-6)
        }
    }
}

/// Level key for collected profile slices.
fn level_key(level: f64) -> i64 {
    (level * 1000.0).round() as i64
}

// ============================================================================
// Loader
// ============================================================================

/// Reads regular lon/lat GRIB2 files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grib2Loader;

impl GridLoader for Grib2Loader {
    /// The nav field only supplies the grid; list it in `input_vars` too if
    /// a computation reads it.
    fn load(
        &self,
        path: &Path,
        nav_spec: &InputVarSpec,
        levels_hpa: &[i32],
        input_vars: &[InputVarSpec],
    ) -> Result<GridDataset> {
        let nav = FieldRequest::from_spec(nav_spec)?;
        let requests = input_vars
            .iter()
            .map(FieldRequest::from_spec)
            .collect::<Result<Vec<_>>>()?;

        let file = File::open(path)?;
        let grib2 = grib::from_reader(BufReader::new(file)).map_err(decode_error)?;

        let mut axes: Option<(Vec<f64>, Vec<f64>)> = None;
        let mut found: Vec<BTreeMap<i64, Vec<f64>>> = vec![BTreeMap::new(); requests.len()];

        for (_index, submessage) in grib2.iter() {
            let discipline = submessage.indicator().discipline;
            let prod_def = submessage.prod_def();
            let (Some(category), Some(number)) =
                (prod_def.parameter_category(), prod_def.parameter_number())
            else {
                continue;
            };
            let Some(parameter) = lookup_parameter(discipline, category, number) else {
                continue;
            };
            let Some((surface, _)) = prod_def.fixed_surfaces() else {
                continue;
            };
            let surface_type = surface.surface_type;
            let level = level_value(surface_type, surface.value());

            let is_nav = axes.is_none() && nav.matches(parameter, surface_type, level, levels_hpa);
            let wanted: Vec<usize> = requests
                .iter()
                .enumerate()
                .filter(|(i, request)| {
                    // Surface fields keep the first matching message.
                    let done = if request.spec.is_surface {
                        !found[*i].is_empty()
                    } else {
                        found[*i].contains_key(&level_key(level))
                    };
                    !done && request.matches(parameter, surface_type, level, levels_hpa)
                })
                .map(|(i, _)| i)
                .collect();
            if !is_nav && wanted.is_empty() {
                continue;
            }

            if is_nav {
                let points: Vec<(f32, f32)> = submessage.latlons().map_err(decode_error)?.collect();
                axes = Some(axes_from_latlons(&points)?);
                debug!(
                    parameter = parameter.short_name,
                    surface_type,
                    level,
                    "Read grid from nav field"
                );
            }
            if wanted.is_empty() {
                continue;
            }

            let decoder = grib::Grib2SubmessageDecoder::from(submessage).map_err(decode_error)?;
            let values: Vec<f64> = decoder
                .dispatch()
                .map_err(decode_error)?
                .map(f64::from)
                .collect();
            for i in wanted {
                found[i].insert(level_key(level), values.clone());
            }
        }

        let (lons, lats) = axes.ok_or_else(|| {
            DatasetError::Decode(format!(
                "{}: nav field {:?} ({}) not found",
                path.display(),
                nav_spec.source(),
                nav_spec.level_type
            ))
        })?;
        let shape = (lats.len(), lons.len());
        let mut dataset = GridDataset::new(lons, lats)?;

        for (request, mut slices) in requests.iter().zip(found) {
            let name = request.spec.name.clone();
            if request.spec.is_surface {
                let values = slices.pop_first().map(|(_, v)| v).ok_or_else(|| {
                    DatasetError::Decode(format!(
                        "{}: variable {:?} ({}) not found",
                        path.display(),
                        request.spec.source(),
                        request.spec.level_type
                    ))
                })?;
                dataset.insert_surface(name.clone(), to_array2(&name, shape, values)?)?;
            } else {
                let mut stacked = Vec::with_capacity(levels_hpa.len() * shape.0 * shape.1);
                for &level in levels_hpa {
                    let values = slices.remove(&level_key(f64::from(level))).ok_or_else(|| {
                        DatasetError::MissingLevel {
                            name: name.clone(),
                            level_hpa: f64::from(level),
                        }
                    })?;
                    stacked.extend(values);
                }
                let len = stacked.len();
                let data = Array3::from_shape_vec((levels_hpa.len(), shape.0, shape.1), stacked)
                    .map_err(|_| DatasetError::ShapeMismatch {
                        name: name.clone(),
                        expected: vec![levels_hpa.len(), shape.0, shape.1],
                        actual: vec![len],
                    })?;
                let levels = levels_hpa.iter().map(|&l| f64::from(l)).collect();
                dataset.insert_profile(name, levels, data)?;
            }
        }

        info!(
            path = %path.display(),
            variables = requests.len(),
            ny = shape.0,
            nx = shape.1,
            "Loaded GRIB2 fields"
        );
        Ok(dataset)
    }
}

fn decode_error(e: impl std::fmt::Display) -> DatasetError {
    DatasetError::Decode(e.to_string())
}

fn to_array2(name: &str, shape: (usize, usize), values: Vec<f64>) -> Result<Array2<f64>> {
    let len = values.len();
    Array2::from_shape_vec(shape, values).map_err(|_| DatasetError::ShapeMismatch {
        name: name.to_string(),
        expected: vec![shape.0, shape.1],
        actual: vec![len],
    })
}

/// Longitude and latitude axes of a regular grid from its points in scan
/// order (longitude varying fastest).
fn axes_from_latlons(points: &[(f32, f32)]) -> Result<(Vec<f64>, Vec<f64>)> {
    let (first_lat, _) = *points
        .first()
        .ok_or_else(|| DatasetError::InvalidCoordinates("grid has no points".into()))?;
    let nx = points.iter().take_while(|(lat, _)| *lat == first_lat).count();
    if points.len() % nx != 0 {
        return Err(DatasetError::InvalidCoordinates(format!(
            "{} points do not fill rows of {}",
            points.len(),
            nx
        )));
    }

    let lons = points[..nx].iter().map(|&(_, lon)| f64::from(lon)).collect();
    let lats = points
        .iter()
        .step_by(nx)
        .map(|&(lat, _)| f64::from(lat))
        .collect();
    Ok((lons, lats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, level_type: &str, is_surface: bool, level: Option<f64>) -> InputVarSpec {
        InputVarSpec {
            name: name.to_string(),
            source_name: None,
            level_type: level_type.to_string(),
            is_surface,
            level,
        }
    }

    #[test]
    fn test_parameter_lookup() {
        assert_eq!(lookup_parameter(0, 2, 2).unwrap().short_name, "u");
        assert_eq!(parameter_by_name("HGT").unwrap().short_name, "gh");
        assert_eq!(parameter_by_name("ugrd").unwrap().ncep_name, "UGRD");
        assert!(lookup_parameter(0, 99, 0).is_none());
    }

    #[test]
    fn test_level_value_converts_pascals() {
        assert_eq!(level_value(ISOBARIC, 85000.0), 850.0);
        assert_eq!(level_value(103, 10.0), 10.0);
    }

    #[test]
    fn test_profile_request_matches_configured_levels() {
        let u = spec("u", "isobaricInhPa", false, None);
        let request = FieldRequest::from_spec(&u).unwrap();
        let ugrd = parameter_by_name("u").unwrap();
        let levels = [850, 200];

        assert!(request.matches(ugrd, ISOBARIC, 850.0, &levels));
        assert!(!request.matches(ugrd, ISOBARIC, 500.0, &levels));
        assert!(!request.matches(ugrd, 103, 850.0, &levels));
        assert!(!request.matches(parameter_by_name("v").unwrap(), ISOBARIC, 850.0, &levels));
    }

    #[test]
    fn test_surface_request_level() {
        let mut u10 = spec("u10", "heightAboveGround", true, Some(10.0));
        u10.source_name = Some("u".into());
        let request = FieldRequest::from_spec(&u10).unwrap();
        let ugrd = parameter_by_name("u").unwrap();

        assert!(request.matches(ugrd, 103, 10.0, &[]));
        assert!(!request.matches(ugrd, 103, 80.0, &[]));

        let sst = spec("t", "surface", true, None);
        let request = FieldRequest::from_spec(&sst).unwrap();
        assert!(request.matches(parameter_by_name("t").unwrap(), 1, 0.0, &[]));
    }

    #[test]
    fn test_invalid_requests() {
        assert!(matches!(
            FieldRequest::from_spec(&spec("xyz", "surface", true, None)),
            Err(DatasetError::Decode(_))
        ));
        assert!(matches!(
            FieldRequest::from_spec(&spec("t", "hybrid", true, None)),
            Err(DatasetError::Decode(_))
        ));
        assert!(matches!(
            FieldRequest::from_spec(&spec("t", "heightAboveGround", false, None)),
            Err(DatasetError::Decode(_))
        ));
    }

    #[test]
    fn test_axes_from_latlons() {
        let mut points = Vec::new();
        for lat in [30.0_f32, 29.5, 29.0] {
            for lon in [270.0_f32, 270.5, 271.0, 271.5] {
                points.push((lat, lon));
            }
        }
        let (lons, lats) = axes_from_latlons(&points).unwrap();
        assert_eq!(lons, vec![270.0, 270.5, 271.0, 271.5]);
        assert_eq!(lats, vec![30.0, 29.5, 29.0]);

        points.pop();
        assert!(axes_from_latlons(&points).is_err());
        assert!(axes_from_latlons(&[]).is_err());
    }

    #[test]
    fn test_load_sample_file() {
        let path = test_utils::require_test_file!("gfs_sample.grib2");
        let nav = spec("t", "surface", true, None);
        let inputs = [spec("t", "surface", true, None)];

        let dataset = Grib2Loader.load(&path, &nav, &[], &inputs).unwrap();
        let (ny, nx) = dataset.shape();
        assert_eq!(dataset.lons().len(), nx);
        assert_eq!(dataset.lats().len(), ny);
        assert!(dataset.contains("t"));
    }
}

//! Configuration for diagnostic runs.
//!
//! Loads and validates YAML files for:
//! - Model specifications (grid, levels, inputs, computations, outputs)
//! - Model entries (which storm and model cycle to process)
//!
//! Supports environment variable substitution using ${VAR} and
//! ${VAR:-default} syntax.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use atcf_track::{format_yyyymmddhh, parse_yyyymmddhh, AtcfId};
use cylindrical_grid::{InterpolationMethod, PolarGrid};

use crate::error::ConfigError;
use crate::kwargs::Kwargs;
use crate::template::TemplateVars;

type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_MAX_FLAT_EARTH_RADIUS_KM: f64 = 1500.0;
pub const DEFAULT_MISSING_VALUE: i32 = 9999;
pub const DEFAULT_OUTPUT_FILE_FORMAT: &str = "{atcf_id}_{atcf_tech_id}_{model_time:%Y%m%d%H}.dat";

// ============================================================================
// Input variables
// ============================================================================

/// One field to extract from the gridded model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVarSpec {
    /// Name the field is stored under in the dataset.
    pub name: String,
    /// Name in the source file, when it differs from `name`.
    #[serde(default)]
    pub source_name: Option<String>,
    /// Level type, e.g. `isobaricInhPa`, `surface`, `heightAboveGround`.
    pub level_type: String,
    #[serde(default)]
    pub is_surface: bool,
    /// Level value of a surface field, e.g. 10 for 10 m winds.
    #[serde(default)]
    pub level: Option<f64>,
}

impl InputVarSpec {
    /// The name to look up in the source file.
    pub fn source(&self) -> &str {
        self.source_name.as_deref().unwrap_or(&self.name)
    }
}

// ============================================================================
// Computations
// ============================================================================

/// One entry of a computation mapping, keyed by computation name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationSpec {
    /// Registered identifier of the function to call.
    pub callable: String,
    #[serde(default)]
    pub batch_order: i32,
    #[serde(default)]
    pub kwargs: Kwargs,
    #[serde(default)]
    pub output_vars: Option<Vec<String>>,
    #[serde(default)]
    pub units: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub unit_converters: Option<Vec<String>>,
}

// ============================================================================
// Output
// ============================================================================

/// Section of the diagnostics file a variable is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputType {
    Storm,
    Surface,
    Sounding,
    Custom,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storm => "storm",
            Self::Surface => "surface",
            Self::Sounding => "sounding",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for OutputType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storm" => Ok(Self::Storm),
            "surface" => Ok(Self::Surface),
            "sounding" => Ok(Self::Sounding),
            "custom" => Ok(Self::Custom),
            other => Err(ConfigError::invalid(format!(
                "output type must be one of storm, surface, sounding, custom; received {:?}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for OutputType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<OutputType> for String {
    fn from(value: OutputType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_scale_factor() -> f64 {
    1.0
}

/// How one result variable is written to the diagnostics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagVarOutputSpec {
    pub var_name: String,
    pub units: String,
    pub output_type: OutputType,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default)]
    pub output_float: bool,
}

// ============================================================================
// Model specification
// ============================================================================

fn default_output_file_format() -> String {
    DEFAULT_OUTPUT_FILE_FORMAT.to_string()
}

fn default_nav_is_surface() -> bool {
    true
}

fn default_max_flat_earth_radius_km() -> f64 {
    DEFAULT_MAX_FLAT_EARTH_RADIUS_KM
}

fn default_missing_value() -> i32 {
    DEFAULT_MISSING_VALUE
}

/// Static description of one model's diagnostic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Path template of the model file for one forecast hour.
    pub model_file_format: String,
    #[serde(default = "default_output_file_format")]
    pub output_file_format: String,
    /// ATCF technique whose track positions the storm; also the model id
    /// in the output header.
    pub atcf_tech_id: String,

    pub forecast_hours: Vec<i32>,
    #[serde(rename = "levels_hPa")]
    pub levels_hpa: Vec<i32>,

    pub n_radii: usize,
    pub n_theta: usize,
    pub radii_step_km: f64,
    #[serde(default)]
    pub interpolation: InterpolationMethod,
    #[serde(default = "default_max_flat_earth_radius_km")]
    pub max_flat_earth_radius_km: f64,

    pub nav_var_name: String,
    pub nav_var_level_type: String,
    #[serde(default = "default_nav_is_surface")]
    pub nav_var_is_surface: bool,
    #[serde(default)]
    pub nav_var_level: Option<f64>,

    #[serde(default)]
    pub input_var_specs: Vec<InputVarSpec>,
    #[serde(default)]
    pub pressure_independent_computation_specs: BTreeMap<String, ComputationSpec>,
    #[serde(default)]
    pub sounding_computation_specs: BTreeMap<String, ComputationSpec>,
    #[serde(default)]
    pub output_specs: Vec<DiagVarOutputSpec>,

    #[serde(default = "default_missing_value")]
    pub missing_value: i32,
}

impl ModelSpec {
    /// Load, expand environment variables and validate a model spec file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = read_expanded(path)?;
        let spec: Self = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse and validate a model spec from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let spec: Self = serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        ensure(!self.forecast_hours.is_empty(), "forecast_hours cannot be empty")?;
        ensure(
            is_unique(&self.forecast_hours),
            "forecast_hours must not contain duplicates",
        )?;
        ensure(!self.levels_hpa.is_empty(), "levels_hPa cannot be empty")?;
        ensure(is_unique(&self.levels_hpa), "levels_hPa must not contain duplicates")?;
        ensure(
            self.levels_hpa.iter().all(|&level| level > 0),
            "levels_hPa must be positive",
        )?;

        self.polar_grid()?;
        ensure(
            self.max_flat_earth_radius_km > 0.0,
            "max_flat_earth_radius_km must be greater than 0",
        )?;

        ensure(!self.atcf_tech_id.trim().is_empty(), "atcf_tech_id cannot be empty")?;
        ensure(!self.nav_var_name.trim().is_empty(), "nav_var_name cannot be empty")?;

        let mut input_names = HashSet::new();
        for var in &self.input_var_specs {
            ensure(
                input_names.insert(var.name.as_str()),
                format!("input var {:?} is defined twice", var.name),
            )?;
        }

        for name in self.pressure_independent_computation_specs.keys() {
            ensure(
                !self.sounding_computation_specs.contains_key(name),
                format!("computation {:?} is both pressure independent and sounding", name),
            )?;
        }

        for output in &self.output_specs {
            ensure(
                output.scale_factor.is_finite(),
                format!("output {:?} has a non-finite scale_factor", output.var_name),
            )?;
        }

        // Render both templates once so bad placeholders fail at load time.
        let epoch = DateTime::<Utc>::default();
        self.make_model_path(self.forecast_hours[0], epoch)?;
        output_template_vars(epoch, "al012000", &self.atcf_tech_id)
            .render(&self.output_file_format)?;

        Ok(())
    }

    /// The storm-centered target grid.
    pub fn polar_grid(&self) -> Result<PolarGrid> {
        PolarGrid::new(self.n_radii, self.n_theta, self.radii_step_km)
            .map_err(|e| ConfigError::invalid(e.to_string()))
    }

    /// The field whose grid defines the dataset's lon/lat axes.
    pub fn nav_spec(&self) -> InputVarSpec {
        InputVarSpec {
            name: self.nav_var_name.clone(),
            source_name: None,
            level_type: self.nav_var_level_type.clone(),
            is_surface: self.nav_var_is_surface,
            level: self.nav_var_level,
        }
    }

    /// Model file for forecast `hour` of the cycle `model_time`.
    pub fn make_model_path(&self, hour: i32, model_time: DateTime<Utc>) -> Result<PathBuf> {
        let rendered = TemplateVars::new()
            .time("model_time", model_time)
            .int("forecast_hour", i64::from(hour))
            .text("atcf_tech_id", self.atcf_tech_id.as_str())
            .render(&self.model_file_format)?;
        Ok(PathBuf::from(rendered))
    }
}

/// Variables available to the output file-name template.
pub(crate) fn output_template_vars(
    model_time: DateTime<Utc>,
    atcf_id: &str,
    atcf_tech_id: &str,
) -> TemplateVars {
    TemplateVars::new()
        .time("model_time", model_time)
        .text("atcf_id", atcf_id)
        .text("atcf_tech_id", atcf_tech_id)
}

// ============================================================================
// Model entries
// ============================================================================

/// One storm and model cycle to process.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub model_spec: ModelSpec,
    pub atcf_id: AtcfId,
    pub atcf_file: PathBuf,
    pub model_time: DateTime<Utc>,
    pub output_dir: PathBuf,
}

impl fmt::Display for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.atcf_id,
            self.model_spec.atcf_tech_id,
            format_yyyymmddhh(&self.model_time)
        )
    }
}

#[derive(Debug, Deserialize)]
struct ModelEntriesFile {
    model_entries: Vec<RawModelEntry>,
}

#[derive(Debug, Deserialize)]
struct RawModelEntry {
    model_spec: PathBuf,
    atcf_id: String,
    atcf_file: PathBuf,
    model_time: serde_yaml::Value,
    output_dir: PathBuf,
}

/// Load every entry of a model entries file.
///
/// Relative paths are resolved against the directory holding the file.
pub fn model_entries_from_file(path: impl AsRef<Path>) -> Result<Vec<ModelEntry>> {
    let path = path.as_ref();
    let contents = read_expanded(path)?;
    let file: ModelEntriesFile =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    file.model_entries
        .into_iter()
        .map(|raw| -> Result<ModelEntry> {
            let model_spec = ModelSpec::from_file(resolve(base_dir, &raw.model_spec))?;
            let atcf_id = raw
                .atcf_id
                .parse::<AtcfId>()
                .map_err(|e| ConfigError::invalid(e.to_string()))?;
            Ok(ModelEntry {
                model_spec,
                atcf_id,
                atcf_file: resolve(base_dir, &raw.atcf_file),
                model_time: parse_model_time(&raw.model_time)?,
                output_dir: resolve(base_dir, &raw.output_dir),
            })
        })
        .collect()
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// `model_time` may be written as `2022092600`, `"2022092600"` or RFC 3339.
fn parse_model_time(value: &serde_yaml::Value) -> Result<DateTime<Utc>> {
    let text = match value {
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.trim().to_string(),
        other => {
            return Err(ConfigError::invalid(format!(
                "model_time must be YYYYMMDDHH or RFC 3339, got {:?}",
                other
            )))
        }
    };

    if let Ok(time) = parse_yyyymmddhh(&text) {
        return Ok(time);
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(&text) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| {
            ConfigError::invalid(format!(
                "model_time must be YYYYMMDDHH or RFC 3339, got {:?}",
                text
            ))
        })
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

fn read_expanded(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    expand_env_vars(&contents, path)
}

/// Substitute `${VAR}` and `${VAR:-default}` in configuration text.
///
/// A default may itself hold file-name placeholders, e.g.
/// `${GFS_FILES:-/data/gfs.{model_time:%Y%m%d%H}.f{forecast_hour:03}}`,
/// which are left for template rendering. `$${` writes a literal `${`.
/// A required variable that is unset or empty is an error naming the
/// file and line.
fn expand_env_vars(content: &str, path: &Path) -> Result<String> {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        let (before, tail) = rest.split_at(start);
        let body = &tail[2..];

        if let Some(literal) = before.strip_suffix('$') {
            out.push_str(literal);
            out.push_str("${");
            rest = body;
            continue;
        }
        out.push_str(before);

        let offset = content.len() - tail.len();
        let env_error = |message: String| ConfigError::EnvVar {
            path: path.to_path_buf(),
            line: content[..offset].matches('\n').count() + 1,
            message,
        };

        let end = closing_brace(body)
            .ok_or_else(|| env_error("unclosed \"${\" substitution".to_string()))?;
        out.push_str(&resolve_env_expr(&body[..end]).map_err(env_error)?);
        rest = &body[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Byte index of the `}` closing a substitution, stepping over nested
/// `{placeholder}` braces in its default.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(idx),
            '}' => depth -= 1,
            '\n' => return None,
            _ => {}
        }
    }
    None
}

fn resolve_env_expr(expr: &str) -> std::result::Result<String, String> {
    let (name, default) = match expr.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (expr, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("invalid environment variable name {:?}", name));
    }

    match (std::env::var(name), default) {
        (Ok(value), _) if !value.is_empty() => Ok(value),
        (_, Some(default)) => Ok(default.to_string()),
        (Ok(_), None) => Err(format!("environment variable {} is empty", name)),
        (Err(_), None) => Err(format!("environment variable {} is not set", name)),
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

fn ensure(condition: bool, msg: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::invalid(msg))
    }
}

fn is_unique(values: &[i32]) -> bool {
    let mut seen = HashSet::new();
    values.iter().all(|v| seen.insert(*v))
}

// ============================================================================
// Tests
// ============================================================================

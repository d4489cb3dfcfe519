//! Fixed-width diagnostics file writer.
//!
//! Layout:
//!
//! ```text
//!                *   AVNO  2022092600   *
//!                *   AL09  IAN       *
//!
//!                 ----- STORM DATA -----
//!
//! NTIME 003   DELTAT 006
//! TIME    (HR)         0     6    12
//! VMAX    (KT)        45    50    55
//!
//!                 ----- SOUNDING DATA -----
//!
//! NLEV 003 SURF 0850 0200
//! TIME    (HR)         0     6    12
//! SST     (10C)      290   289  9999
//! U_0850  (10KT)      12    10     9
//! ...
//!
//!                 ----- CUSTOM DATA -----
//!
//! NVAR 001
//! DTL     (KM)       120   118   101
//! ```

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{output_template_vars, DiagVarOutputSpec, OutputType, DEFAULT_MISSING_VALUE};
use crate::error::{ConfigError, EngineError, ResultsError};
use crate::results::ForecastHourResults;

pub const STORM_HEADER: &str = "                ------------------------------------------------------     STORM DATA     ----------------------------------------------------------";
pub const SOUNDING_HEADER: &str = "                ------------------------------------------------------     SOUNDING DATA     -------------------------------------------------------";
pub const CUSTOM_HEADER: &str = "                ------------------------------------------------------     CUSTOM DATA     ---------------------------------------------------------";

pub const DIAG_MISSING_VALUE: i32 = DEFAULT_MISSING_VALUE;

/// Identifies the model run and storm in the file header.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagHeaderInfo {
    pub model_id: String,
    pub model_time: DateTime<Utc>,
    pub basin: String,
    pub storm_number: u32,
    pub storm_name: String,
}

impl DiagHeaderInfo {
    pub fn header_lines(&self) -> [String; 2] {
        [
            format!(
                "               *   {}  {}   *",
                self.model_id.to_uppercase(),
                self.model_time.format("%Y%m%d%H")
            ),
            format!(
                "               *   {}{:02}  {}       *",
                self.basin.to_uppercase(),
                self.storm_number,
                self.storm_name.to_uppercase()
            ),
        ]
    }
}

/// Output path: `output_dir` joined with the rendered, lower-cased template.
pub fn diag_filename(
    filename_format: &str,
    output_dir: &Path,
    model_time: DateTime<Utc>,
    atcf_id: &str,
    atcf_tech_id: &str,
) -> Result<PathBuf, ConfigError> {
    let basename = output_template_vars(model_time, atcf_id, atcf_tech_id)
        .render(filename_format)?
        .to_lowercase();
    Ok(output_dir.join(basename))
}

/// Render the whole diagnostics file.
pub fn to_diag_string(
    results: &ForecastHourResults,
    output_specs: &[DiagVarOutputSpec],
    header: &DiagHeaderInfo,
    missing_value: i32,
) -> Result<String, ResultsError> {
    let writer = DiagWriter {
        results,
        output_specs,
        missing_value,
    };

    let mut out = String::new();
    for line in header.header_lines() {
        push_line(&mut out, &line);
    }
    out.push('\n');
    for line in writer.storm_lines()? {
        push_line(&mut out, &line);
    }
    out.push('\n');
    for line in writer.sounding_lines()? {
        push_line(&mut out, &line);
    }
    out.push('\n');
    for line in writer.custom_lines()? {
        push_line(&mut out, &line);
    }
    Ok(out)
}

/// Render and write the diagnostics file to `path`.
pub fn to_diag_file(
    path: &Path,
    results: &ForecastHourResults,
    output_specs: &[DiagVarOutputSpec],
    header: &DiagHeaderInfo,
    missing_value: i32,
) -> Result<(), EngineError> {
    let text = to_diag_string(results, output_specs, header, missing_value)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;
    info!(path = %path.display(), "Wrote diagnostics file");
    Ok(())
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

struct DiagWriter<'a> {
    results: &'a ForecastHourResults,
    output_specs: &'a [DiagVarOutputSpec],
    missing_value: i32,
}

impl DiagWriter<'_> {
    fn specs_of(&self, output_type: OutputType) -> Vec<&DiagVarOutputSpec> {
        self.output_specs
            .iter()
            .filter(|spec| spec.output_type == output_type)
            .collect()
    }

    fn sorted_hours(&self) -> Vec<i32> {
        let mut hours = self.results.forecast_hours().to_vec();
        hours.sort_unstable();
        hours
    }

    /// Levels from the bottom of the atmosphere up.
    fn sorted_levels(&self) -> Vec<i32> {
        let mut levels = self.results.levels_hpa().to_vec();
        levels.sort_unstable_by(|a, b| b.cmp(a));
        levels
    }

    fn storm_lines(&self) -> Result<Vec<String>, ResultsError> {
        let hours = self.results.forecast_hours();
        let delta_t = match hours {
            [first, second, ..] => second - first,
            _ => 0,
        };

        let mut lines = vec![
            STORM_HEADER.to_string(),
            String::new(),
            format!("NTIME {:03}   DELTAT {:03}", hours.len(), delta_t),
            hours_header(&self.sorted_hours()),
        ];
        for spec in self.specs_of(OutputType::Storm) {
            lines.push(self.pressure_independent_row(spec)?);
        }
        Ok(lines)
    }

    fn sounding_lines(&self) -> Result<Vec<String>, ResultsError> {
        let levels = self.sorted_levels();
        let joined_levels = levels
            .iter()
            .map(|level| format!("{:04}", level))
            .collect::<Vec<_>>()
            .join(" ");

        let mut lines = vec![
            SOUNDING_HEADER.to_string(),
            String::new(),
            format!("NLEV {:03} SURF {}", levels.len() + 1, joined_levels),
            hours_header(&self.sorted_hours()),
        ];
        for spec in self.specs_of(OutputType::Surface) {
            lines.push(self.pressure_independent_row(spec)?);
        }
        let sounding_specs = self.specs_of(OutputType::Sounding);
        for &level in &levels {
            for spec in &sounding_specs {
                lines.push(self.sounding_row(spec, level)?);
            }
        }
        Ok(lines)
    }

    fn custom_lines(&self) -> Result<Vec<String>, ResultsError> {
        let specs = self.specs_of(OutputType::Custom);
        let mut lines = vec![
            CUSTOM_HEADER.to_string(),
            String::new(),
            format!("NVAR {:03}", specs.len()),
        ];
        for spec in specs {
            lines.push(self.pressure_independent_row(spec)?);
        }
        Ok(lines)
    }

    fn pressure_independent_row(&self, spec: &DiagVarOutputSpec) -> Result<String, ResultsError> {
        let values = self
            .sorted_hours()
            .into_iter()
            .map(|hour| self.results.pressure_independent_value(&spec.var_name, hour))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.format_row(spec, &spec.var_name.to_uppercase(), &values))
    }

    fn sounding_row(&self, spec: &DiagVarOutputSpec, level: i32) -> Result<String, ResultsError> {
        let values = self
            .sorted_hours()
            .into_iter()
            .map(|hour| self.results.sounding_value(&spec.var_name, hour, level))
            .collect::<Result<Vec<_>, _>>()?;
        let name = format!("{}_{:04}", spec.var_name.to_uppercase(), level);
        Ok(self.format_row(spec, &name, &values))
    }

    fn format_row(&self, spec: &DiagVarOutputSpec, name: &str, values: &[f64]) -> String {
        let columns = values
            .iter()
            .map(|&value| format_value(value, spec, self.missing_value))
            .collect::<Vec<_>>()
            .join(" ");
        let units = format!("({})", spec.units.to_uppercase());
        format!("{:<8}{:<9}{}", name, units, columns)
    }
}

fn hours_header(hours: &[i32]) -> String {
    let joined = hours
        .iter()
        .map(|hour| format!("{:5}", hour))
        .collect::<Vec<_>>()
        .join(" ");
    format!("TIME    (HR)     {}", joined)
}

/// One 5-wide column. Missing values are written unscaled; integers are
/// truncated toward zero.
fn format_value(value: f64, spec: &DiagVarOutputSpec, missing_value: i32) -> String {
    let out = if value.is_nan() {
        f64::from(missing_value)
    } else {
        value * spec.scale_factor
    };

    if spec.output_float {
        format!("{:5.1}", out)
    } else {
        if !out.is_finite() {
            warn!(var_name = %spec.var_name, value = out, "Non-finite value written as missing");
            return format!("{:5}", missing_value);
        }
        format!("{:5}", out.trunc() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec(name: &str, units: &str, output_type: OutputType) -> DiagVarOutputSpec {
        DiagVarOutputSpec {
            var_name: name.to_string(),
            units: units.to_string(),
            output_type,
            scale_factor: 1.0,
            output_float: false,
        }
    }

    #[test]
    fn test_header_lines() {
        let header = DiagHeaderInfo {
            model_id: "avno".into(),
            model_time: Utc.with_ymd_and_hms(2022, 9, 26, 0, 0, 0).unwrap(),
            basin: "al".into(),
            storm_number: 9,
            storm_name: "Ian".into(),
        };
        let [line1, line2] = header.header_lines();
        assert_eq!(line1, "               *   AVNO  2022092600   *");
        assert_eq!(line2, "               *   AL09  IAN       *");
    }

    #[test]
    fn test_format_value() {
        let mut s = spec("x", "kt", OutputType::Storm);
        assert_eq!(format_value(12.9, &s, 9999), "   12");
        assert_eq!(format_value(-12.9, &s, 9999), "  -12");
        assert_eq!(format_value(f64::NAN, &s, 9999), " 9999");
        s.scale_factor = 0.1;
        assert_eq!(format_value(f64::NAN, &s, 9999), " 9999");
        s.output_float = true;
        assert_eq!(format_value(250.0, &s, 9999), " 25.0");
        assert_eq!(format_value(f64::INFINITY, &s, 9999), "  inf");
    }

    #[test]
    fn test_diag_filename_lowercased() {
        let time = Utc.with_ymd_and_hms(2022, 9, 26, 6, 0, 0).unwrap();
        let path = diag_filename(
            "{atcf_id}_{atcf_tech_id}_{model_time:%Y%m%d%H}.DAT",
            Path::new("/out"),
            time,
            "al092022",
            "AVNO",
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/out/al092022_avno_2022092606.dat"));
    }

    #[test]
    fn test_hours_header() {
        assert_eq!(hours_header(&[0, 6, 12]), "TIME    (HR)         0     6    12");
    }
}

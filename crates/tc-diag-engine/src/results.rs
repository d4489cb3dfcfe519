//! Per forecast hour result tables.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::collections::{BTreeMap, HashMap};

use crate::error::ResultsError;

type Result<T> = std::result::Result<T, ResultsError>;

/// One variable: its values and the unit attached by the first write.
#[derive(Debug, Clone)]
struct ResultVar<T> {
    values: T,
    units: Option<String>,
}

impl<T> ResultVar<T> {
    fn attach_units(&mut self, units: Option<&str>) {
        if self.units.is_none() {
            self.units = units.map(str::to_string);
        }
    }
}

/// Computed diagnostics for every forecast hour of a model run.
///
/// Pressure independent variables hold one value per hour; sounding
/// variables hold one value per (hour, level). Every cell starts as NaN, so
/// hours that are skipped stay missing.
#[derive(Debug, Clone)]
pub struct ForecastHourResults {
    forecast_hours: Vec<i32>,
    levels_hpa: Vec<i32>,
    hour_index: HashMap<i32, usize>,
    level_index: HashMap<i32, usize>,
    pressure_independent: BTreeMap<String, ResultVar<Array1<f64>>>,
    soundings: BTreeMap<String, ResultVar<Array2<f64>>>,
}

impl ForecastHourResults {
    pub fn new<P, S>(
        forecast_hours: &[i32],
        levels_hpa: &[i32],
        pressure_independent_names: P,
        sounding_names: S,
    ) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let n_hours = forecast_hours.len();
        let n_levels = levels_hpa.len();

        let pressure_independent = pressure_independent_names
            .into_iter()
            .map(|name| {
                let var = ResultVar {
                    values: Array1::from_elem(n_hours, f64::NAN),
                    units: None,
                };
                (name.into(), var)
            })
            .collect();

        let soundings = sounding_names
            .into_iter()
            .map(|name| {
                let var = ResultVar {
                    values: Array2::from_elem((n_hours, n_levels), f64::NAN),
                    units: None,
                };
                (name.into(), var)
            })
            .collect();

        Self {
            forecast_hours: forecast_hours.to_vec(),
            levels_hpa: levels_hpa.to_vec(),
            hour_index: forecast_hours.iter().enumerate().map(|(i, &h)| (h, i)).collect(),
            level_index: levels_hpa.iter().enumerate().map(|(i, &l)| (l, i)).collect(),
            pressure_independent,
            soundings,
        }
    }

    pub fn forecast_hours(&self) -> &[i32] {
        &self.forecast_hours
    }

    pub fn levels_hpa(&self) -> &[i32] {
        &self.levels_hpa
    }

    pub fn pressure_independent_names(&self) -> impl Iterator<Item = &str> {
        self.pressure_independent.keys().map(String::as_str)
    }

    pub fn sounding_names(&self) -> impl Iterator<Item = &str> {
        self.soundings.keys().map(String::as_str)
    }

    fn hour_idx(&self, hour: i32) -> Result<usize> {
        self.hour_index
            .get(&hour)
            .copied()
            .ok_or(ResultsError::UnknownHour(hour))
    }

    fn level_idx(&self, level_hpa: i32) -> Result<usize> {
        self.level_index
            .get(&level_hpa)
            .copied()
            .ok_or(ResultsError::UnknownLevel(level_hpa))
    }

    fn pi_var(&self, name: &str) -> Result<&ResultVar<Array1<f64>>> {
        self.pressure_independent
            .get(name)
            .ok_or_else(|| ResultsError::UnknownPressureIndependentVar(name.to_string()))
    }

    fn snd_var(&self, name: &str) -> Result<&ResultVar<Array2<f64>>> {
        self.soundings
            .get(name)
            .ok_or_else(|| ResultsError::UnknownSoundingVar(name.to_string()))
    }

    /// Store a pressure independent value. Units attach only on the first
    /// write that supplies them.
    pub fn add_pressure_independent_result(
        &mut self,
        var_name: &str,
        hour: i32,
        value: f64,
        units: Option<&str>,
    ) -> Result<()> {
        let h = self.hour_idx(hour)?;
        let var = self
            .pressure_independent
            .get_mut(var_name)
            .ok_or_else(|| ResultsError::UnknownPressureIndependentVar(var_name.to_string()))?;
        var.values[h] = value;
        var.attach_units(units);
        Ok(())
    }

    /// Store a sounding value at one level.
    pub fn add_sounding_result(
        &mut self,
        var_name: &str,
        hour: i32,
        level_hpa: i32,
        value: f64,
        units: Option<&str>,
    ) -> Result<()> {
        let h = self.hour_idx(hour)?;
        let l = self.level_idx(level_hpa)?;
        let var = self
            .soundings
            .get_mut(var_name)
            .ok_or_else(|| ResultsError::UnknownSoundingVar(var_name.to_string()))?;
        var.values[[h, l]] = value;
        var.attach_units(units);
        Ok(())
    }

    pub fn pressure_independent_value(&self, var_name: &str, hour: i32) -> Result<f64> {
        let h = self.hour_idx(hour)?;
        Ok(self.pi_var(var_name)?.values[h])
    }

    pub fn sounding_value(&self, var_name: &str, hour: i32, level_hpa: i32) -> Result<f64> {
        let h = self.hour_idx(hour)?;
        let l = self.level_idx(level_hpa)?;
        Ok(self.snd_var(var_name)?.values[[h, l]])
    }

    /// Values of a pressure independent variable, one per forecast hour.
    pub fn pressure_independent_row(&self, var_name: &str) -> Result<ArrayView1<'_, f64>> {
        Ok(self.pi_var(var_name)?.values.view())
    }

    /// Full `(hour, level)` table of a sounding variable.
    pub fn sounding_table(&self, var_name: &str) -> Result<ArrayView2<'_, f64>> {
        Ok(self.snd_var(var_name)?.values.view())
    }

    /// Profile of a sounding variable at one hour, in level order.
    pub fn sounding_profile(&self, var_name: &str, hour: i32) -> Result<ArrayView1<'_, f64>> {
        let h = self.hour_idx(hour)?;
        Ok(self.snd_var(var_name)?.values.row(h))
    }

    /// Sounding variable linearly interpolated to `pressure_hpa`.
    ///
    /// Pressures outside the stored levels give NaN, as do NaN neighbors.
    pub fn sounding_at_pressure(&self, var_name: &str, hour: i32, pressure_hpa: f64) -> Result<f64> {
        let profile = self.sounding_profile(var_name, hour)?;

        let mut points: Vec<(f64, f64)> = self
            .levels_hpa
            .iter()
            .zip(profile.iter())
            .map(|(&level, &value)| (level as f64, value))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(interp_sorted(&points, pressure_hpa))
    }

    pub fn pressure_independent_units(&self, var_name: &str) -> Result<Option<&str>> {
        Ok(self.pi_var(var_name)?.units.as_deref())
    }

    pub fn sounding_units(&self, var_name: &str) -> Result<Option<&str>> {
        Ok(self.snd_var(var_name)?.units.as_deref())
    }
}

/// Piecewise-linear interpolation over points sorted by x.
fn interp_sorted(points: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return f64::NAN,
    };
    if x.is_nan() || x < first.0 || x > last.0 {
        return f64::NAN;
    }
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x == x0 {
            return y0;
        }
        if x <= x1 {
            if x == x1 {
                return y1;
            }
            let t = (x - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    last.1
}

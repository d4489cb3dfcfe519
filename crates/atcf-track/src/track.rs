//! A-deck track tables.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, TrackError};
use crate::storm_id::AtcfId;
use crate::time::parse_yyyymmddhh;

/// Storm name used by ATCF for systems that are not yet named.
pub const INVEST: &str = "INVEST";

const COL_BASIN: usize = 0;
const COL_CY: usize = 1;
const COL_TIME: usize = 2;
const COL_TECH: usize = 4;
const COL_TAU: usize = 5;
const COL_LAT: usize = 6;
const COL_LON: usize = 7;
const COL_VMAX: usize = 8;
const COL_MSLP: usize = 9;
const COL_STORM_NAME: usize = 27;

/// One forecast position of the storm.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub basin: String,
    pub storm_number: u32,
    /// Cycle (model initialization) time.
    pub init_time: DateTime<Utc>,
    pub tech: String,
    /// Forecast lead in hours.
    pub tau: i32,
    /// Degrees, positive north.
    pub lat: f64,
    /// Degrees, positive east, in `[-180, 180]` as written in the file.
    pub lon: f64,
    pub vmax_kt: Option<f64>,
    pub mslp_hpa: Option<f64>,
    pub storm_name: Option<String>,
}

impl TrackRow {
    /// Storm center as `(lon in [0, 360), lat)`.
    pub fn tc_location(&self) -> (f64, f64) {
        (self.lon.rem_euclid(360.0), self.lat)
    }

    /// Numeric column by name: `lat`, `lon`, `tau`, `vmax` or `mslp`.
    ///
    /// Missing values come back as NaN; unknown names as `None`.
    pub fn column(&self, name: &str) -> Option<f64> {
        match name {
            "lat" => Some(self.lat),
            "lon" => Some(self.lon),
            "tau" => Some(self.tau as f64),
            "vmax" => Some(self.vmax_kt.unwrap_or(f64::NAN)),
            "mslp" => Some(self.mslp_hpa.unwrap_or(f64::NAN)),
            _ => None,
        }
    }
}

/// Track rows for one forecast technique.
#[derive(Debug, Clone, Default)]
pub struct Track {
    tech: String,
    rows: Vec<TrackRow>,
}

impl Track {
    /// Parse a-deck text, keeping the rows of `tech`.
    ///
    /// Wind-radii repeats of the same `(init_time, tau)` keep the first row.
    /// Lines of other techniques are skipped without being fully parsed.
    pub fn from_adeck_str(text: &str, tech: &str) -> Result<Self> {
        let tech = tech.trim().to_ascii_uppercase();
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let columns: Vec<&str> = line.split(',').map(str::trim).collect();
            if columns.len() <= COL_LON {
                return Err(TrackError::parse(
                    line_no,
                    format!("expected at least {} columns, got {}", COL_LON + 1, columns.len()),
                ));
            }
            if !columns[COL_TECH].eq_ignore_ascii_case(&tech) {
                continue;
            }

            let row = parse_row(&columns, line_no)?;
            if seen.insert((row.init_time, row.tau)) {
                rows.push(row);
            }
        }

        debug!(tech = %tech, n_rows = rows.len(), "Parsed a-deck track");
        Ok(Self { tech, rows })
    }

    pub fn tech(&self) -> &str {
        &self.tech
    }

    pub fn rows(&self) -> &[TrackRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The row for cycle `init_time` at lead `tau`, if the storm was tracked.
    pub fn forecast_row(&self, init_time: DateTime<Utc>, tau: i32) -> Option<&TrackRow> {
        self.rows
            .iter()
            .find(|row| row.init_time == init_time && row.tau == tau)
    }

    /// All rows of one cycle ordered by lead time.
    pub fn cycle(&self, init_time: DateTime<Utc>) -> Vec<&TrackRow> {
        let mut rows: Vec<&TrackRow> = self
            .rows
            .iter()
            .filter(|row| row.init_time == init_time)
            .collect();
        rows.sort_by_key(|row| row.tau);
        rows
    }

    /// Storm name for the output header.
    ///
    /// Falls back to `BBNN` when no row carries a name, and to `INVEST` when
    /// the only names are invest placeholders.
    pub fn storm_name(&self, id: &AtcfId) -> String {
        let names: Vec<&str> = self
            .rows
            .iter()
            .filter_map(|row| row.storm_name.as_deref())
            .collect();
        if names.is_empty() {
            return id.fallback_name();
        }

        names
            .iter()
            .find(|name| !name.eq_ignore_ascii_case(INVEST))
            .map(|name| name.to_ascii_uppercase())
            .unwrap_or_else(|| INVEST.to_string())
    }
}

/// Read an a-deck file and keep the rows of technique `tech`.
pub fn get_adeck_track(path: impl AsRef<Path>, tech: &str) -> Result<Track> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let track = Track::from_adeck_str(&text, tech)?;
    info!(
        path = %path.display(),
        tech = tech,
        n_rows = track.len(),
        "Loaded a-deck track"
    );
    Ok(track)
}

fn parse_row(columns: &[&str], line_no: usize) -> Result<TrackRow> {
    let int = |col: usize| -> Result<i32> {
        columns[col].parse::<i32>().map_err(|e| {
            TrackError::parse(line_no, format!("column {} ({:?}): {}", col + 1, columns[col], e))
        })
    };
    // Blank or zero intensity means "not given".
    let optional = |col: usize| -> Option<f64> {
        columns
            .get(col)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| *v > 0.0)
    };

    let storm_number = int(COL_CY)?;
    let init_time = parse_yyyymmddhh(columns[COL_TIME])
        .map_err(|e| TrackError::parse(line_no, e.to_string()))?;

    Ok(TrackRow {
        basin: columns[COL_BASIN].to_ascii_uppercase(),
        storm_number: storm_number.max(0) as u32,
        init_time,
        tech: columns[COL_TECH].to_ascii_uppercase(),
        tau: int(COL_TAU)?,
        lat: parse_coordinate(columns[COL_LAT], 'N', 'S', line_no)?,
        lon: parse_coordinate(columns[COL_LON], 'E', 'W', line_no)?,
        vmax_kt: optional(COL_VMAX),
        mslp_hpa: optional(COL_MSLP),
        storm_name: columns
            .get(COL_STORM_NAME)
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string()),
    })
}

/// Parse `220N` / `828W` style tenths-of-a-degree coordinates.
fn parse_coordinate(token: &str, positive: char, negative: char, line_no: usize) -> Result<f64> {
    let last = token
        .chars()
        .last()
        .ok_or_else(|| TrackError::parse(line_no, "empty coordinate"))?;
    let hemisphere = last.to_ascii_uppercase();
    let sign = if hemisphere == positive {
        1.0
    } else if hemisphere == negative {
        -1.0
    } else {
        return Err(TrackError::parse(
            line_no,
            format!("coordinate {:?} must end in {} or {}", token, positive, negative),
        ));
    };

    let digits = &token[..token.len() - last.len_utf8()];
    let tenths: f64 = digits.trim().parse().map_err(|_| {
        TrackError::parse(line_no, format!("coordinate {:?} is not a number", token))
    })?;
    Ok(sign * tenths / 10.0)
}

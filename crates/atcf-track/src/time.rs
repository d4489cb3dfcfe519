//! `YYYYMMDDHH` times used by ATCF files and file names.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::error::{Result, TrackError};

/// Parse a `YYYYMMDDHH` string as a UTC time.
pub fn parse_yyyymmddhh(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TrackError::InvalidTime(s.to_string()));
    }

    let date = NaiveDate::parse_from_str(&s[..8], "%Y%m%d")
        .map_err(|_| TrackError::InvalidTime(s.to_string()))?;
    let hour: u32 = s[8..]
        .parse()
        .map_err(|_| TrackError::InvalidTime(s.to_string()))?;
    let naive = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| TrackError::InvalidTime(s.to_string()))?;

    Ok(Utc.from_utc_datetime(&naive))
}

/// Format a time as `YYYYMMDDHH`.
pub fn format_yyyymmddhh(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%d%H").to_string()
}

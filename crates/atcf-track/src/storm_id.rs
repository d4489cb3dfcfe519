//! ATCF storm identifiers such as `al092022`.

use std::fmt;
use std::str::FromStr;

use crate::error::TrackError;

/// A parsed ATCF storm id: two-letter basin, storm number and year.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtcfId {
    /// Upper-case basin code, e.g. `AL`.
    pub basin: String,
    pub storm_number: u32,
    pub year: i32,
}

impl AtcfId {
    /// Name used when a track carries no storm name, e.g. `AL09`.
    pub fn fallback_name(&self) -> String {
        format!("{}{:02}", self.basin, self.storm_number)
    }
}

impl FromStr for AtcfId {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let bytes = normalized.as_bytes();
        let well_formed = bytes.len() == 8
            && bytes[..2].iter().all(u8::is_ascii_alphabetic)
            && bytes[2..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(TrackError::InvalidAtcfId(s.to_string()));
        }

        let storm_number = normalized[2..4]
            .parse()
            .map_err(|_| TrackError::InvalidAtcfId(s.to_string()))?;
        let year = normalized[4..]
            .parse()
            .map_err(|_| TrackError::InvalidAtcfId(s.to_string()))?;

        Ok(Self {
            basin: normalized[..2].to_ascii_uppercase(),
            storm_number,
            year,
        })
    }
}

impl fmt::Display for AtcfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:02}{:04}",
            self.basin.to_ascii_lowercase(),
            self.storm_number,
            self.year
        )
    }
}

//! ATCF storm tracks.
//!
//! Reads comma-delimited a-deck files, keeps the rows of one forecast
//! technique, and answers "where is the storm at this forecast hour".
//!
//! ```ignore
//! use atcf_track::{get_adeck_track, AtcfId};
//!
//! let track = get_adeck_track("aal092022.dat", "AVNO")?;
//! let row = track.forecast_row(model_time, 24).expect("tracked at 24h");
//! let (tc_lon, tc_lat) = row.tc_location();
//! let id: AtcfId = "al092022".parse()?;
//! let name = track.storm_name(&id);
//! ```

pub mod error;
pub mod storm_id;
pub mod time;
pub mod track;

pub use error::{Result, TrackError};
pub use storm_id::AtcfId;
pub use time::{format_yyyymmddhh, parse_yyyymmddhh};
pub use track::{get_adeck_track, Track, TrackRow, INVEST};

//! Error types for ATCF track reading.

use thiserror::Error;

/// Errors that can occur while reading a track or parsing a storm id.
#[derive(Error, Debug)]
pub enum TrackError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A track line could not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A storm id such as `al092022` could not be parsed.
    #[error("can not parse atcf id: {0:?}")]
    InvalidAtcfId(String),

    /// A `YYYYMMDDHH` time could not be parsed.
    #[error("invalid time {0:?}, expected YYYYMMDDHH")]
    InvalidTime(String),
}

impl TrackError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type for track operations.
pub type Result<T> = std::result::Result<T, TrackError>;

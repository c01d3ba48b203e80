//! Typed access to individual entry fields.

use std::fmt;

use serde::Serialize;

use crate::error::{BridgeError, BridgeResult};

/// Entry field addressable through `get_field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryField {
    Id,
    PlaylistId,
    Position,
    Filename,
    /// Duration in milliseconds.
    Duration,
    Rating,
    SourceType,
    Title,
    Artist,
    Album,
    Date,
    Genre,
    Bitrate,
    Channels,
    SampleRate,
    FileSize,
}

impl EntryField {
    pub const ALL: [EntryField; 16] = [
        Self::Id,
        Self::PlaylistId,
        Self::Position,
        Self::Filename,
        Self::Duration,
        Self::Rating,
        Self::SourceType,
        Self::Title,
        Self::Artist,
        Self::Album,
        Self::Date,
        Self::Genre,
        Self::Bitrate,
        Self::Channels,
        Self::SampleRate,
        Self::FileSize,
    ];

    /// Column name in `playlist_entries`; also the caller-facing field name.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::PlaylistId => "playlist_id",
            Self::Position => "position",
            Self::Filename => "filename",
            Self::Duration => "duration",
            Self::Rating => "rating",
            Self::SourceType => "source_type",
            Self::Title => "title",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Date => "date",
            Self::Genre => "genre",
            Self::Bitrate => "bitrate",
            Self::Channels => "channels",
            Self::SampleRate => "samplerate",
            Self::FileSize => "filesize",
        }
    }

    /// Parses a caller-supplied field name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] for unknown names.
    pub fn parse(name: &str) -> BridgeResult<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.column().eq_ignore_ascii_case(name))
            .ok_or_else(|| BridgeError::invalid(format!("unknown entry field '{}'", name)))
    }
}

/// Value of one entry field as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl FieldValue {
    /// String form of any value; numbers are formatted.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            other => other.to_string(),
        }
    }

    pub fn as_i64(&self) -> BridgeResult<i64> {
        match self {
            Self::Integer(v) => Ok(*v),
            other => Err(BridgeError::invalid(format!(
                "field is not an integer: {}",
                other
            ))),
        }
    }

    pub fn as_i32(&self) -> BridgeResult<i32> {
        let v = self.as_i64()?;
        i32::try_from(v)
            .map_err(|_| BridgeError::invalid(format!("value {} does not fit in 32 bits", v)))
    }

    pub fn as_f64(&self) -> BridgeResult<f64> {
        match self {
            Self::Real(v) => Ok(*v),
            Self::Integer(v) => Ok(*v as f64),
            Self::Text(s) => Err(BridgeError::invalid(format!(
                "field is not numeric: '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Real(v) => write!(f, "{}", v),
        }
    }
}

impl From<rusqlite::types::Value> for FieldValue {
    fn from(value: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value;
        match value {
            Value::Null => Self::Text(String::new()),
            Value::Integer(v) => Self::Integer(v),
            Value::Real(v) => Self::Real(v),
            Value::Text(s) => Self::Text(s),
            Value::Blob(b) => Self::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

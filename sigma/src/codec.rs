//! Dual-format state codec.
//!
//! Compact payloads are postcard, prefixed with [`COMPACT_MARKER`]. Text
//! payloads are plain JSON. The marker byte can never start a UTF-8 JSON
//! document, so [`decode`] tells the two apart without being told which
//! format the writer was configured with.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{DecodeError, StorageError};

/// Leading byte of every compact payload. Never valid in UTF-8.
pub const COMPACT_MARKER: u8 = 0xC1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Dense positional binary encoding.
    #[default]
    Compact,
    /// Self-describing, human readable JSON.
    Text,
}

// Implementations

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "binary" => Ok(Format::Compact),
            "text" | "json" => Ok(Format::Text),
            _ => Err(format!("expected `compact` or `text`, got `{s}`")),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Compact => f.write_str("compact"),
            Format::Text => f.write_str("text"),
        }
    }
}

pub fn encode<T>(state: &T, format: Format) -> Result<Vec<u8>, StorageError>
where
    T: Serialize + ?Sized,
{
    match format {
        Format::Compact => {
            postcard::to_extend(state, vec![COMPACT_MARKER]).map_err(StorageError::encode)
        }
        Format::Text => serde_json::to_vec(state).map_err(StorageError::encode),
    }
}

/// Decode a payload written in either format.
///
/// JSON fields unknown to `T` are ignored.
pub fn decode<T>(payload: &[u8]) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
{
    match detect(payload)? {
        Format::Compact => {
            let (state, rest) = postcard::take_from_bytes(&payload[1..])?;
            if !rest.is_empty() {
                return Err(DecodeError::TrailingBytes(rest.len()));
            }
            Ok(state)
        }
        Format::Text => Ok(serde_json::from_slice(payload)?),
    }
}

/// Detect the format a payload was written in.
pub fn detect(payload: &[u8]) -> Result<Format, DecodeError> {
    let first = *payload.first().ok_or(DecodeError::Empty)?;

    if first == COMPACT_MARKER {
        return Ok(Format::Compact);
    }

    let lead = payload
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .copied()
        .ok_or(DecodeError::Empty)?;

    match lead {
        b'{' | b'[' | b'"' | b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => Ok(Format::Text),
        other => Err(DecodeError::UnknownMarker(other)),
    }
}

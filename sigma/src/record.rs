//! Conversion between codec payloads and backend records.
//!
//! The slot family doubles as a field-based format marker: on backends with
//! [`TextLayout::Utf16`] text payloads go to `text_N` string columns, and
//! everything else to `slot_N` binary columns.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    backend::{BackendProfile, TextLayout},
    chunk::{self, ChunkSet, SlotNaming},
    codec::{self, Format},
    errors::{DecodeError, StorageError},
};

/// Slots to upsert and slots to remove in one conditional put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordWrite {
    pub slots: ChunkSet,
    pub removals: Vec<String>,
}

// Implementations

impl RecordWrite {
    /// Apply onto the columns of an existing record.
    pub fn merge_into(self, columns: &mut BTreeMap<String, Bytes>) {
        for name in &self.removals {
            columns.remove(name);
        }
        columns.extend(self.slots.into_slots());
    }

    /// The columns of a record replaced wholesale by this write.
    pub fn into_columns(self) -> BTreeMap<String, Bytes> {
        self.slots.into_slots().into_iter().collect()
    }
}

/// Lay a payload written in `format` out as slots for a backend with `profile`.
///
/// On bounded backends every slot the new payload does not use is listed for
/// removal, whichever family an earlier write used.
pub fn to_record(
    payload: Vec<u8>,
    format: Format,
    profile: &BackendProfile,
) -> Result<RecordWrite, StorageError> {
    let (bytes, naming) = match (format, profile.text_layout) {
        (Format::Text, TextLayout::Utf16) => {
            let text = std::str::from_utf8(&payload).map_err(StorageError::encode)?;
            (widen(text), SlotNaming::TEXT)
        }
        _ => (Bytes::from(payload), SlotNaming::BINARY),
    };

    let slots = chunk::split(bytes, &profile.limits, naming)?;

    let removals = [SlotNaming::BINARY, SlotNaming::TEXT]
        .into_iter()
        .flat_map(|family| {
            let used = if family == naming { slots.len() } else { 0 };
            chunk::stale_slots(used, &profile.limits, family)
        })
        .collect();

    Ok(RecordWrite { slots, removals })
}

/// Reassemble the codec payload held by a record's columns.
pub fn from_record(columns: &BTreeMap<String, Bytes>) -> Result<Vec<u8>, DecodeError> {
    if let Some(wide) = chunk::join(columns, SlotNaming::TEXT) {
        return Ok(narrow(&wide)?.into_bytes());
    }

    chunk::join(columns, SlotNaming::BINARY)
        .map(Vec::from)
        .ok_or(DecodeError::Empty)
}

/// Serialize `state` straight into record form, without any I/O.
pub fn encode_record<T>(
    state: &T,
    format: Format,
    profile: &BackendProfile,
) -> Result<RecordWrite, StorageError>
where
    T: Serialize + ?Sized,
{
    to_record(codec::encode(state, format)?, format, profile)
}

/// Deserialize state straight from record columns, without any I/O.
pub fn decode_record<T>(columns: &BTreeMap<String, Bytes>) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
{
    codec::decode(&from_record(columns)?)
}

fn widen(text: &str) -> Bytes {
    text.encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect::<Vec<_>>()
        .into()
}

fn narrow(wide: &[u8]) -> Result<String, DecodeError> {
    if wide.len() % 2 != 0 {
        return Err(DecodeError::OddTextLength(wide.len()));
    }

    let units: Vec<u16> = wide
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|_| DecodeError::InvalidText)
}

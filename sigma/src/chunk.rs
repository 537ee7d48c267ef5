//! Splitting payloads into bounded, deterministically named slots.
//!
//! A payload of `n` bytes becomes `ceil(n / max_slot_bytes)` contiguous slots
//! named `{prefix}_0`, `{prefix}_1`, ... The names alone carry the order, so
//! [`join`] needs nothing but the record's slot map. Reassembly stops at the
//! first missing index: a record that previously held more slots must have
//! its stale tail removed by the writer, see [`stale_slots`].

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use bytes::{Bytes, BytesMut};

use crate::errors::{ConfigError, StorageError};

/// Capacity limits of one backend record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotLimits {
    pub max_slot_bytes: usize,
    pub max_slots: usize,
    pub max_total_bytes: usize,
}

/// Prefix of a family of slot names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotNaming(&'static str);

/// Ordered, bounded slots produced by [`split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSet {
    naming: SlotNaming,
    slots: Vec<(String, Bytes)>,
}

// Implementations

impl SlotLimits {
    /// Limits of a backend storing any payload in a single slot.
    pub const UNBOUNDED: Self = Self {
        max_slot_bytes: usize::MAX,
        max_slots: 1,
        max_total_bytes: usize::MAX,
    };

    pub fn new(
        max_slot_bytes: usize,
        max_slots: usize,
        max_total_bytes: usize,
    ) -> Result<Self, ConfigError> {
        if max_slot_bytes == 0 {
            return Err(ConfigError::invalid("max_slot_bytes", "0", "must be positive"));
        }
        if max_slots == 0 {
            return Err(ConfigError::invalid("max_slots", "0", "must be positive"));
        }

        Ok(Self {
            max_slot_bytes,
            max_slots,
            max_total_bytes,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::UNBOUNDED
    }

    /// Number of slots a payload of `len` bytes occupies.
    pub fn slots_needed(&self, len: usize) -> usize {
        len.div_ceil(self.max_slot_bytes)
    }

    /// Largest payload that fits.
    pub fn capacity(&self) -> usize {
        self.max_slot_bytes
            .saturating_mul(self.max_slots)
            .min(self.max_total_bytes)
    }
}

impl Display for SlotLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            return f.write_str("(unbounded)");
        }
        write!(
            f,
            "({} bytes/slot, {} slots, {} bytes total)",
            self.max_slot_bytes, self.max_slots, self.max_total_bytes
        )
    }
}

impl SlotNaming {
    /// Slots holding raw payload bytes.
    pub const BINARY: Self = Self("slot");
    /// Slots holding text as UTF-16 code units.
    pub const TEXT: Self = Self("text");

    pub fn prefix(&self) -> &'static str {
        self.0
    }

    pub fn name(&self, index: usize) -> String {
        format!("{}_{index}", self.0)
    }

    /// Index of `name` within this family, if it belongs to it.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        name.strip_prefix(self.0)?.strip_prefix('_')?.parse().ok()
    }
}

impl ChunkSet {
    pub fn naming(&self) -> SlotNaming {
        self.naming
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.slots.iter().map(|(_, b)| b.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.slots.iter().map(|(name, bytes)| (name.as_str(), bytes))
    }

    pub fn into_slots(self) -> Vec<(String, Bytes)> {
        self.slots
    }
}

/// Split `payload` into slots, failing before any I/O if it cannot fit.
pub fn split(
    payload: Bytes,
    limits: &SlotLimits,
    naming: SlotNaming,
) -> Result<ChunkSet, StorageError> {
    let size = payload.len();
    let slots_needed = limits.slots_needed(size);

    if slots_needed > limits.max_slots || size > limits.max_total_bytes {
        return Err(StorageError::Capacity {
            size,
            slots: slots_needed,
            limits: *limits,
        });
    }

    let slots = (0..slots_needed)
        .map(|i| {
            let start = i * limits.max_slot_bytes;
            let end = size.min(start.saturating_add(limits.max_slot_bytes));
            (naming.name(i), payload.slice(start..end))
        })
        .collect();

    Ok(ChunkSet { naming, slots })
}

/// Reassemble the payload stored under `naming`.
///
/// Returns `None` when the record holds no slot of that family. A gap in the
/// sequence ends the payload.
pub fn join(slots: &BTreeMap<String, Bytes>, naming: SlotNaming) -> Option<Bytes> {
    let first = slots.get(&naming.name(0))?;

    let mut payload = BytesMut::from(first.as_ref());
    for bytes in (1..).map_while(|i| slots.get(&naming.name(i))) {
        payload.extend_from_slice(bytes);
    }

    Some(payload.freeze())
}

/// Names of the slots of `naming` beyond the first `used` that a bounded
/// record may still hold from an earlier, larger write.
pub fn stale_slots(used: usize, limits: &SlotLimits, naming: SlotNaming) -> Vec<String> {
    if limits.is_unbounded() {
        return Vec::new();
    }
    (used..limits.max_slots).map(|i| naming.name(i)).collect()
}

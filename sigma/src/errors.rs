use thiserror::Error;

use crate::{chunk::SlotLimits, token::VersionToken};

/// Errors surfaced by [`StorageProvider`](crate::provider::StorageProvider) and [`Backend`](crate::backend::Backend) calls.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The payload cannot fit the backend even after chunking.
    /// Always raised before the record is mutated.
    #[error("{size} bytes in {slots} slots exceed backend limits {limits}")]
    Capacity {
        size: usize,
        slots: usize,
        limits: SlotLimits,
    },

    /// The supplied token does not match the stored one.
    #[error("version conflict on {key}: expected {expected:?}, stored {stored:?}")]
    Conflict {
        key: String,
        expected: VersionToken,
        stored: Option<VersionToken>,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to encode state: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Transport-level failure of the backend, never masked as another kind.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A stored payload could not be turned back into state.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("unknown format marker {0:#04x}")]
    UnknownMarker(u8),
    #[error(transparent)]
    Compact(#[from] postcard::Error),
    #[error("{0} trailing bytes after compact payload")]
    TrailingBytes(usize),
    #[error(transparent)]
    Text(#[from] serde_json::Error),
    #[error("text column holds an odd number of bytes ({0})")]
    OddTextLength(usize),
    #[error("text column is not valid UTF-16")]
    InvalidText,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration key `{0}`")]
    Missing(&'static str),
    #[error("invalid value {value:?} for `{key}`: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    pub fn is_capacity(&self) -> bool {
        matches!(self, StorageError::Capacity { .. })
    }

    pub(crate) fn encode(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        StorageError::Encode(Box::new(e))
    }
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

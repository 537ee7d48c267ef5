//! Backends holding one record per actor identity.
//!
//! A backend only needs three conditional operations. Every token check runs
//! inside the same critical section as the mutation it guards; nothing above
//! this trait takes a lock.
//!
//! A backend that cannot update all slots of a record at once may, after a
//! failure in the middle of a put, hold a mix of old and new slots. Nothing
//! repairs this: the next read surfaces it as a [`DecodeError`] or a payload
//! cut short at the first missing slot.
//!
//! [`DecodeError`]: crate::errors::DecodeError

use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::{chunk::SlotLimits, errors::StorageError, record::RecordWrite, token::VersionToken};

pub mod file;
pub mod latency;
pub mod memory;
pub mod table;

pub use file::FileBackend;
pub use latency::Delayed;
pub use memory::MemoryBackend;
pub use table::{TableBackend, TableService};

/// How text payloads are laid out in slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLayout {
    /// Stored as the UTF-8 bytes of the payload.
    Utf8,
    /// Stored in string columns of UTF-16 code units, two bytes each.
    Utf16,
}

/// Whether the backend enforces version tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Versioning {
    Enforced,
    /// Tokens are issued but never checked.
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendProfile {
    pub limits: SlotLimits,
    pub text_layout: TextLayout,
    pub versioning: Versioning,
}

/// A record as read back from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub slots: BTreeMap<String, Bytes>,
    pub token: VersionToken,
}

pub trait Backend: Debug + Send + Sync {
    fn profile(&self) -> &BackendProfile;

    /// Fetch the record stored under `key`, `None` if there is none.
    fn get_record<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StorageError>>;

    /// Store `write` under `key` if `expected` matches, returning the new token.
    fn put_record<'a>(
        &'a self,
        key: &'a str,
        write: RecordWrite,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<VersionToken, StorageError>>;

    /// Remove the record under `key` if `expected` matches.
    fn delete_record<'a>(
        &'a self,
        key: &'a str,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<(), StorageError>>;
}

// Implementations

impl BackendProfile {
    /// Profile of a process-local or file backend: one slot, UTF-8 text.
    pub const fn unbounded(versioning: Versioning) -> Self {
        Self {
            limits: SlotLimits::UNBOUNDED,
            text_layout: TextLayout::Utf8,
            versioning,
        }
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn profile(&self) -> &BackendProfile {
        (**self).profile()
    }

    fn get_record<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StorageError>> {
        (**self).get_record(key)
    }

    fn put_record<'a>(
        &'a self,
        key: &'a str,
        write: RecordWrite,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<VersionToken, StorageError>> {
        (**self).put_record(key, write, expected)
    }

    fn delete_record<'a>(
        &'a self,
        key: &'a str,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        (**self).delete_record(key, expected)
    }
}

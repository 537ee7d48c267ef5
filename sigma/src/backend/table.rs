//! Column-store backend.
//!
//! [`TableService`] stands in for a remote table service: rows of named
//! binary or string columns, merge-style updates, server-issued tokens and
//! hard per-row limits. [`TableBackend`] is the client side, which applies
//! the (usually tighter) limits it was configured with before any request
//! leaves the process.

use std::{
    collections::BTreeMap,
    io,
    sync::{
        Arc, LazyLock, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use rustc_hash::FxHashMap;

use crate::{
    backend::{Backend, BackendProfile, StoredRecord, TextLayout, Versioning},
    base::lock,
    chunk::SlotLimits,
    debug,
    errors::StorageError,
    record::RecordWrite,
    token::{TokenIssuer, VersionToken},
    trace,
};

/// Largest column value the service accepts.
pub const MAX_COLUMN_BYTES: usize = 64 * 1024;
/// Most columns one row may hold.
pub const MAX_COLUMNS: usize = 252;
/// Largest row the service accepts, all columns included.
pub const MAX_ROW_BYTES: usize = 1024 * 1024;

/// Default client limits: fifteen full columns stay below the row limit.
pub const DEFAULT_LIMITS: SlotLimits = SlotLimits {
    max_slot_bytes: MAX_COLUMN_BYTES,
    max_slots: 15,
    max_total_bytes: MAX_ROW_BYTES,
};

const SERVICE_LIMITS: SlotLimits = SlotLimits {
    max_slot_bytes: MAX_COLUMN_BYTES,
    max_slots: MAX_COLUMNS,
    max_total_bytes: MAX_ROW_BYTES,
};

static SHARED: LazyLock<Mutex<FxHashMap<String, Arc<TableService>>>> =
    LazyLock::new(Default::default);

/// In-process table service.
#[derive(Debug)]
pub struct TableService {
    name: String,
    issuer: TokenIssuer,
    rows: Mutex<FxHashMap<String, StoredRecord>>,
    available: AtomicBool,
}

/// Client of a [`TableService`] with its own slot limits.
#[derive(Debug, Clone)]
pub struct TableBackend {
    service: Arc<TableService>,
    profile: BackendProfile,
}

// Implementations

impl TableService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            issuer: TokenIssuer::new(),
            rows: Mutex::new(FxHashMap::default()),
            available: AtomicBool::new(true),
        }
    }

    /// The process-wide service registered under `name`, created on first use.
    pub fn shared(name: &str) -> Arc<Self> {
        lock(&SHARED)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Self::new(name)))
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make every following request fail as if the service were unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.rows).is_empty()
    }

    /// Column names of the row under `key`, for inspection.
    pub fn columns(&self, key: &str) -> Option<Vec<String>> {
        lock(&self.rows)
            .get(key)
            .map(|row| row.slots.keys().cloned().collect())
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            return Ok(());
        }
        Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("table service `{}` is unreachable", self.name),
        )
        .into())
    }

    fn get(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
        self.ensure_available()?;
        Ok(lock(&self.rows).get(key).cloned())
    }

    fn merge(
        &self,
        key: &str,
        write: RecordWrite,
        expected: &VersionToken,
    ) -> Result<VersionToken, StorageError> {
        self.ensure_available()?;

        let mut rows = lock(&self.rows);
        let existing = rows.get(key);
        expected.check(key, existing.map(|row| &row.token))?;

        let mut columns = existing.map(|row| row.slots.clone()).unwrap_or_default();
        write.merge_into(&mut columns);
        validate_row(&columns)?;

        let token = self.issuer.issue();
        rows.insert(
            key.to_string(),
            StoredRecord {
                slots: columns,
                token: token.clone(),
            },
        );

        Ok(token)
    }

    fn delete(&self, key: &str, expected: &VersionToken) -> Result<(), StorageError> {
        self.ensure_available()?;

        let mut rows = lock(&self.rows);
        expected.check(key, rows.get(key).map(|row| &row.token))?;
        rows.remove(key);

        Ok(())
    }
}

impl TableBackend {
    pub fn new(service: Arc<TableService>, limits: SlotLimits) -> Self {
        Self {
            service,
            profile: BackendProfile {
                limits,
                text_layout: TextLayout::Utf16,
                versioning: Versioning::Enforced,
            },
        }
    }

    pub fn service(&self) -> &Arc<TableService> {
        &self.service
    }
}

impl Backend for TableBackend {
    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn get_record<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StorageError>> {
        async move {
            trace!(table = self.service.name(), %key, "table get");
            self.service.get(key)
        }
        .boxed()
    }

    fn put_record<'a>(
        &'a self,
        key: &'a str,
        write: RecordWrite,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<VersionToken, StorageError>> {
        async move {
            debug!(
                table = self.service.name(),
                %key,
                columns = write.slots.len(),
                removed = write.removals.len(),
                "table merge"
            );
            self.service.merge(key, write, expected)
        }
        .boxed()
    }

    fn delete_record<'a>(
        &'a self,
        key: &'a str,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        async move {
            trace!(table = self.service.name(), %key, "table delete");
            self.service.delete(key, expected)
        }
        .boxed()
    }
}

fn validate_row(columns: &BTreeMap<String, Bytes>) -> Result<(), StorageError> {
    let size: usize = columns.values().map(Bytes::len).sum();
    let oversized = columns.values().any(|value| value.len() > MAX_COLUMN_BYTES);

    if oversized || columns.len() > MAX_COLUMNS || size > MAX_ROW_BYTES {
        return Err(StorageError::Capacity {
            size,
            slots: columns.len(),
            limits: SERVICE_LIMITS,
        });
    }
    Ok(())
}

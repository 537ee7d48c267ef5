use std::sync::{Arc, LazyLock, Mutex};

use futures::{FutureExt, future::BoxFuture};
use rustc_hash::FxHashMap;

use crate::{
    backend::{Backend, BackendProfile, StoredRecord, Versioning},
    base::lock,
    errors::StorageError,
    record::RecordWrite,
    token::{TokenIssuer, VersionToken},
    trace,
};

static SHARED: LazyLock<Mutex<FxHashMap<String, Arc<MemoryBackend>>>> =
    LazyLock::new(Default::default);

/// Process-local backend keeping every record in a map.
///
/// Tokens are enforced: the check and the mutation share one lock. State is
/// lost when the process exits.
#[derive(Debug)]
pub struct MemoryBackend {
    profile: BackendProfile,
    issuer: TokenIssuer,
    records: Mutex<FxHashMap<String, StoredRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            profile: BackendProfile::unbounded(Versioning::Enforced),
            issuer: TokenIssuer::new(),
            records: Mutex::new(FxHashMap::default()),
        }
    }

    /// The process-wide store registered under `name`, created on first use.
    pub fn shared(name: &str) -> Arc<Self> {
        lock(&SHARED)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Self::new()))
            .clone()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    /// Drop every record.
    pub fn clear(&self) {
        lock(&self.records).clear();
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn get_record<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StorageError>> {
        async move {
            trace!(%key, "memory get");
            Ok(lock(&self.records).get(key).cloned())
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
            let mut records = lock(&self.records);
            expected.check(key, records.get(key).map(|r| &r.token))?;

            let token = self.issuer.issue();
            records.insert(
                key.to_string(),
                StoredRecord {
                    slots: write.into_columns(),
                    token: token.clone(),
                },
            );

            trace!(%key, %token, "memory put");
            Ok(token)
        }
        .boxed()
    }

    fn delete_record<'a>(
        &'a self,
        key: &'a str,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        async move {
            let mut records = lock(&self.records);
            expected.check(key, records.get(key).map(|r| &r.token))?;

            records.remove(key);

            trace!(%key, "memory delete");
            Ok(())
        }
        .boxed()
    }
}

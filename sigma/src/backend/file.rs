use std::{
    collections::BTreeMap,
    fmt::Write as _,
    hash::{Hash, Hasher},
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use rustc_hash::FxHasher;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::{
    backend::{Backend, BackendProfile, StoredRecord, Versioning},
    chunk::SlotNaming,
    debug,
    errors::StorageError,
    record::RecordWrite,
    token::VersionToken,
    trace,
};

const EXTENSION: &str = "state";

/// One file per record under a root directory.
///
/// Tokens hash the file contents and modification time. They are advisory:
/// puts and deletes never check them.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
    profile: BackendProfile,
}

// Implementation

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            profile: BackendProfile::unbounded(Versioning::Advisory),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding the record under `key`.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", escape(key)))
    }

    async fn read(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
        let path = self.path(key);

        // Contents and mtime come from one handle
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = file.metadata().await?.modified()?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;

        trace!(?path, bytes = contents.len(), "file read");

        let token = file_token(&contents, modified);
        let mut slots = BTreeMap::new();
        slots.insert(SlotNaming::BINARY.name(0), Bytes::from(contents));

        Ok(Some(StoredRecord { slots, token }))
    }

    async fn write(&self, key: &str, write: RecordWrite) -> Result<VersionToken, StorageError> {
        let path = self.path(key);
        let contents: Vec<u8> = write
            .slots
            .iter()
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect();

        tokio::fs::create_dir_all(&self.root).await?;

        // Replace atomically so a reader never sees a half-written file
        let staging = path.with_extension(format!("{EXTENSION}.{}.tmp", Uuid::new_v4().simple()));
        let staged = async {
            tokio::fs::write(&staging, &contents).await?;
            // Rename keeps the mtime
            let modified = tokio::fs::metadata(&staging).await?.modified()?;
            tokio::fs::rename(&staging, &path).await?;
            Ok::<_, io::Error>(modified)
        };
        let modified = match staged.await {
            Ok(modified) => modified,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e.into());
            }
        };

        debug!(?path, bytes = contents.len(), "file written");

        Ok(file_token(&contents, modified))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(?path, "file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Backend for FileBackend {
    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn get_record<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StorageError>> {
        self.read(key).boxed()
    }

    fn put_record<'a>(
        &'a self,
        key: &'a str,
        write: RecordWrite,
        _expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<VersionToken, StorageError>> {
        self.write(key, write).boxed()
    }

    fn delete_record<'a>(
        &'a self,
        key: &'a str,
        _expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        self.remove(key).boxed()
    }
}

fn file_token(contents: &[u8], modified: SystemTime) -> VersionToken {
    let mut hasher = FxHasher::default();
    contents.hash(&mut hasher);
    modified.hash(&mut hasher);
    VersionToken::new(format!("{:016x}", hasher.finish()))
}

/// Map a record key to a portable file name.
fn escape(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => name.push(byte as char),
            _ => {
                let _ = write!(name, "%{byte:02X}");
            }
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{codec::Format, record::to_record};

    fn write(backend: &FileBackend, payload: &[u8]) -> RecordWrite {
        to_record(payload.to_vec(), Format::Text, backend.profile()).unwrap()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("Counter/a:b"), "Counter%2Fa%3Ab");
        assert_eq!(escape("x.y"), "x%2Ey");
        assert_ne!(escape("a/b"), escape("a_b"));
    }

    #[tokio::test]
    async fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("nested"));

        let token = backend
            .put_record("T/a", write(&backend, b"{\"x\":1}"), &VersionToken::NEW_RECORD)
            .await
            .unwrap();

        let record = backend.get_record("T/a").await.unwrap().unwrap();
        assert_eq!(record.token, token);
        assert_eq!(record.slots["slot_0"], Bytes::from_static(b"{\"x\":1}"));
        assert!(backend.path("T/a").exists());

        backend.delete_record("T/a", &token).await.unwrap();
        assert!(backend.get_record("T/a").await.unwrap().is_none());
        // Removing twice is not an error
        backend.delete_record("T/a", &token).await.unwrap();
    }

    #[tokio::test]
    async fn test_tokens_are_advisory() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        backend
            .put_record("k", write(&backend, b"[1]"), &VersionToken::NEW_RECORD)
            .await
            .unwrap();
        backend
            .put_record("k", write(&backend, b"[2]"), &VersionToken::new("stale"))
            .await
            .unwrap();

        let record = backend.get_record("k").await.unwrap().unwrap();
        assert_eq!(record.slots["slot_0"], Bytes::from_static(b"[2]"));
    }

    #[tokio::test]
    async fn test_failed_rename_removes_staging_file() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());
        std::fs::create_dir(backend.path("k")).unwrap();

        let err = backend
            .put_record("k", write(&backend, b"[1]"), &VersionToken::NEW_RECORD)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BackendUnavailable(_)));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "staging files left: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_token_tracks_contents() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        let first = backend
            .put_record("k", write(&backend, b"[1]"), &VersionToken::UNCONDITIONAL)
            .await
            .unwrap();
        let second = backend
            .put_record("k", write(&backend, b"[2]"), &first)
            .await
            .unwrap();

        assert_ne!(first, second);
    }
}

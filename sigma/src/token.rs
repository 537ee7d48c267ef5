use std::{
    borrow::Cow,
    fmt::{self, Display},
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StorageError;

/// Opaque optimistic-concurrency version marker.
///
/// Besides backend-issued concrete tokens there are two reserved values:
/// [`VersionToken::NEW_RECORD`] asserts that no record exists yet, and
/// [`VersionToken::UNCONDITIONAL`] skips the check entirely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(Cow<'static, str>);

/// Issues tokens that are distinct from every token previously issued by any
/// issuer: a random epoch per issuer followed by a monotonic sequence.
#[derive(Debug)]
pub struct TokenIssuer {
    epoch: Uuid,
    seq: AtomicU64,
}

// Implementations

impl VersionToken {
    pub const NEW_RECORD: Self = Self(Cow::Borrowed(""));
    pub const UNCONDITIONAL: Self = Self(Cow::Borrowed("*"));

    /// Wrap a concrete backend token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Cow::Owned(token.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_new_record(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_unconditional(&self) -> bool {
        self.0 == "*"
    }

    pub fn is_concrete(&self) -> bool {
        !self.is_new_record() && !self.is_unconditional()
    }

    /// Check this token, supplied by a caller, against the token currently
    /// stored for `key` (`None` when no record exists).
    ///
    /// Must run inside the same critical section as the mutation it guards.
    pub fn check(&self, key: &str, stored: Option<&VersionToken>) -> Result<(), StorageError> {
        let accepted = match (self, stored) {
            (expected, _) if expected.is_unconditional() => true,
            (expected, None) => expected.is_new_record(),
            (expected, Some(stored)) => expected.is_concrete() && expected == stored,
        };

        if accepted {
            return Ok(());
        }

        crate::warn!(%key, expected = ?self, ?stored, "version conflict");

        Err(StorageError::Conflict {
            key: key.to_string(),
            expected: self.clone(),
            stored: stored.cloned(),
        })
    }
}

impl Default for VersionToken {
    fn default() -> Self {
        Self::NEW_RECORD
    }
}

impl Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TokenIssuer {
    pub fn new() -> Self {
        Self {
            epoch: Uuid::new_v4(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn issue(&self) -> VersionToken {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        VersionToken::new(format!("{}-{seq:x}", self.epoch.simple()))
    }
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

//! Versioned, chunked persistence of actor state.
//!
//! A [`StorageProvider`](provider::StorageProvider) reads, writes and clears
//! one state blob per actor identity on a pluggable
//! [`Backend`](backend::Backend). State is encoded in a compact binary or a
//! JSON text [`Format`](codec::Format), either of which is readable no matter
//! which one the provider writes, split into bounded slots where the backend
//! limits record size, and guarded by optimistic
//! [`VersionToken`](token::VersionToken)s.
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use sigma::prelude::*;
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Counter {
//!     value: i64,
//! }
//!
//! # async fn run() -> Result<(), StorageError> {
//! let config = ProviderConfig::new().with("provider", "memory");
//! let storage = StorageProvider::activate("Default", &config)?;
//!
//! let id = ActorIdentity::new("Counter", "a");
//! let mut counter = ActorState::<Counter>::default();
//!
//! storage.read_state("Counter", &id, &mut counter).await?;
//! counter.state.value += 1;
//! storage.write_state("Counter", &id, &mut counter).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod base;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod errors;
pub mod identity;
pub mod provider;
pub mod record;
pub mod state;
pub mod token;

// Re-exports

pub mod prelude {
    pub use crate::backend::{Backend, Delayed, FileBackend, MemoryBackend, TableBackend, TableService};
    pub use crate::codec::Format;
    pub use crate::config::{ProviderConfig, ProviderKind};
    pub use crate::errors::{ConfigError, DecodeError, StorageError};
    pub use crate::identity::ActorIdentity;
    pub use crate::provider::StorageProvider;
    pub use crate::state::ActorState;
    pub use crate::token::VersionToken;
}

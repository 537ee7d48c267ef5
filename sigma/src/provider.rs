use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    backend::{Backend, Delayed, FileBackend, MemoryBackend, TableBackend, TableService},
    codec::{self, Format},
    config::{self, ProviderConfig, ProviderKind, ProviderOptions},
    debug,
    errors::{ConfigError, StorageError},
    identity::ActorIdentity,
    info,
    record,
    state::ActorState,
    token::VersionToken,
    trace,
};

/// Reads, writes and clears actor state on one backend.
///
/// Writes use the configured [`Format`]; reads accept either format, so a
/// provider may be reconfigured while old records persist. Every write and
/// clear is guarded by the token held in the caller's [`ActorState`], and a
/// [`StorageError::Conflict`] is returned as is: whether to re-read and
/// retry is the caller's decision.
#[derive(Debug, Clone)]
pub struct StorageProvider {
    name: String,
    backend: Arc<dyn Backend>,
    format: Format,
}

// Implementations

impl StorageProvider {
    pub fn new(name: impl Into<String>, backend: Arc<dyn Backend>, format: Format) -> Self {
        Self {
            name: name.into(),
            backend,
            format,
        }
    }

    /// Activate a provider from its flat configuration.
    ///
    /// Validation happens here, synchronously; no backend I/O is performed.
    /// Memory and table providers attach to the process-wide store of the
    /// same name, so activating twice reopens the same records.
    pub fn activate(name: &str, config: &ProviderConfig) -> Result<Self, StorageError> {
        let options = ProviderOptions::from_config(config)?;
        Self::from_options(name, options)
    }

    pub fn from_options(name: &str, options: ProviderOptions) -> Result<Self, StorageError> {
        let backend: Arc<dyn Backend> = match options.kind {
            ProviderKind::Memory => MemoryBackend::shared(name),
            ProviderKind::File => {
                let root = options
                    .root_directory
                    .ok_or(ConfigError::Missing(config::ROOT_DIRECTORY))?;
                Arc::new(FileBackend::new(root))
            }
            ProviderKind::Table => {
                let table = options.table_name.as_deref().unwrap_or(name);
                Arc::new(TableBackend::new(
                    TableService::shared(table),
                    options.limits,
                ))
            }
        };

        // Mocking without a latency still wraps, with no delay
        let backend: Arc<dyn Backend> = match (options.latency, options.mock_calls_only) {
            (None, false) => backend,
            (latency, mock_calls_only) => Arc::new(
                Delayed::new(backend, latency.unwrap_or_default()).mock_calls_only(mock_calls_only),
            ),
        };

        info!(
            provider = name,
            kind = %options.kind,
            format = %options.format,
            limits = %options.limits,
            latency = ?options.latency,
            "storage provider activated"
        );

        Ok(Self::new(name, backend, options.format))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format new writes use.
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Load the stored state of `identity` into `state`.
    ///
    /// Without a stored record the state is left as supplied and the token
    /// set to [`VersionToken::NEW_RECORD`]. On error `state` is untouched.
    pub async fn read_state<T>(
        &self,
        actor_type: &str,
        identity: &ActorIdentity,
        state: &mut ActorState<T>,
    ) -> Result<(), StorageError>
    where
        T: DeserializeOwned,
    {
        let key = identity.record_key(actor_type);

        let Some(stored) = self.backend.get_record(&key).await? else {
            trace!(provider = %self.name, %key, "no stored state");
            state.token = VersionToken::NEW_RECORD;
            return Ok(());
        };

        let payload = record::from_record(&stored.slots)?;
        let value = codec::decode(&payload)?;

        debug!(
            provider = %self.name,
            %key,
            bytes = payload.len(),
            token = %stored.token,
            "state read"
        );

        state.state = value;
        state.token = stored.token;

        Ok(())
    }

    /// Persist `state` if its token still matches, then store the new token.
    pub async fn write_state<T>(
        &self,
        actor_type: &str,
        identity: &ActorIdentity,
        state: &mut ActorState<T>,
    ) -> Result<(), StorageError>
    where
        T: Serialize,
    {
        let key = identity.record_key(actor_type);

        let payload = codec::encode(&state.state, self.format)?;
        let write = record::to_record(payload, self.format, self.backend.profile())?;
        let (slots, bytes) = (write.slots.len(), write.slots.total_bytes());

        let token = self.backend.put_record(&key, write, &state.token).await?;

        debug!(
            provider = %self.name,
            %key,
            format = %self.format,
            slots,
            bytes,
            %token,
            "state written"
        );

        state.token = token;

        Ok(())
    }

    /// Remove the stored state if its token still matches, then reset `state`.
    pub async fn clear_state<T>(
        &self,
        actor_type: &str,
        identity: &ActorIdentity,
        state: &mut ActorState<T>,
    ) -> Result<(), StorageError>
    where
        T: Default,
    {
        let key = identity.record_key(actor_type);

        self.backend.delete_record(&key, &state.token).await?;

        debug!(provider = %self.name, %key, "state cleared");

        state.state = T::default();
        state.token = VersionToken::NEW_RECORD;

        Ok(())
    }
}

//! Flat string configuration read once when a provider is activated.

use std::{
    collections::HashMap,
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use crate::{backend::table, chunk::SlotLimits, codec::Format, errors::ConfigError};

pub const PROVIDER: &str = "provider";
pub const FORMAT: &str = "format";
pub const USE_JSON: &str = "use_json";
pub const ROOT_DIRECTORY: &str = "root_directory";
pub const TABLE_NAME: &str = "table_name";
pub const MAX_SLOT_BYTES: &str = "max_slot_bytes";
pub const MAX_SLOTS: &str = "max_slots";
pub const MAX_TOTAL_BYTES: &str = "max_total_bytes";
pub const LATENCY_MS: &str = "latency_ms";
pub const MOCK_CALLS_ONLY: &str = "mock_calls_only";

/// Provider configuration as a flat map of string keys to string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig(HashMap<String, String>);

/// Backend a provider is activated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Memory,
    File,
    Table,
}

/// Validated provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOptions {
    pub kind: ProviderKind,
    pub format: Format,
    pub root_directory: Option<PathBuf>,
    pub table_name: Option<String>,
    pub limits: SlotLimits,
    pub latency: Option<Duration>,
    pub mock_calls_only: bool,
}

// Implementations

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    /// Parse the value under `key`, `None` when absent.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|value| {
                value
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::invalid(key, value, e))
            })
            .transpose()
    }
}

impl<K, V> FromIterator<(K, V)> for ProviderConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for ProviderConfig {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "memory" | "memorystorage" | "inmemory" => Ok(ProviderKind::Memory),
            "file" | "filestorage" | "flatfile" => Ok(ProviderKind::File),
            "table" | "tablestorage" | "columnstore" => Ok(ProviderKind::Table),
            _ => Err(format!("unknown provider `{s}`")),
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Memory => f.write_str("memory"),
            ProviderKind::File => f.write_str("file"),
            ProviderKind::Table => f.write_str("table"),
        }
    }
}

impl ProviderOptions {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let kind: ProviderKind = config
            .parse(PROVIDER)?
            .ok_or(ConfigError::Missing(PROVIDER))?;

        let format = match (config.parse::<Format>(FORMAT)?, config.parse::<bool>(USE_JSON)?) {
            (Some(format), _) => format,
            (None, Some(true)) => Format::Text,
            (None, _) => Format::Compact,
        };

        let root_directory = match kind {
            ProviderKind::File => Some(PathBuf::from(config.require(ROOT_DIRECTORY)?)),
            _ => None,
        };

        let limits = match kind {
            ProviderKind::Table => {
                let defaults = table::DEFAULT_LIMITS;
                SlotLimits::new(
                    config.parse(MAX_SLOT_BYTES)?.unwrap_or(defaults.max_slot_bytes),
                    config.parse(MAX_SLOTS)?.unwrap_or(defaults.max_slots),
                    config.parse(MAX_TOTAL_BYTES)?.unwrap_or(defaults.max_total_bytes),
                )?
            }
            _ => SlotLimits::UNBOUNDED,
        };

        Ok(Self {
            kind,
            format,
            root_directory,
            table_name: config.get(TABLE_NAME).map(str::to_string),
            limits,
            latency: config.parse::<u64>(LATENCY_MS)?.map(Duration::from_millis),
            mock_calls_only: config.parse(MOCK_CALLS_ONLY)?.unwrap_or(false),
        })
    }
}

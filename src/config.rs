use crate::record::Identity;
use crate::sampler::{ResetPolicy, StartAt};
use crate::scraper::DEFAULT_INTERFACE;
use crate::sink::{MAX_FILE_SIZE_KB, OutputConfig};
use crate::storage::LAST_COUNT_KEY;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub identity: Identity,
    pub samplers: Vec<SamplerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the last observed counter per sampler.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    pub name: String,
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_interface")]
    pub interface: String,
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub start_at: StartAt,
    #[serde(default)]
    pub reset_policy: ResetPolicy,
    /// Persister key for this sampler's last value. Must be unique across samplers.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    pub output: OutputConfig,
}

fn default_uri() -> String {
    "/proc/net/dev".into()
}

fn default_interface() -> String {
    DEFAULT_INTERFACE.into()
}

fn default_storage_key() -> String {
    LAST_COUNT_KEY.into()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.storage.path.is_empty(),
            "storage.path must be non-empty"
        );
        anyhow::ensure!(
            !self.samplers.is_empty(),
            "samplers must contain at least one sampler"
        );

        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        for s in &self.samplers {
            anyhow::ensure!(!s.name.is_empty(), "samplers.name must be non-empty");
            anyhow::ensure!(
                names.insert(s.name.as_str()),
                "samplers.name '{}' is duplicated",
                s.name
            );
            anyhow::ensure!(
                !s.storage_key.is_empty(),
                "samplers[{}].storage_key must be non-empty",
                s.name
            );
            anyhow::ensure!(
                keys.insert(s.storage_key.as_str()),
                "samplers[{}].storage_key '{}' is shared with another sampler",
                s.name,
                s.storage_key
            );
            anyhow::ensure!(
                !s.uri.is_empty(),
                "samplers[{}].uri must be non-empty",
                s.name
            );
            anyhow::ensure!(
                s.poll_interval_ms > 0,
                "samplers[{}].poll_interval_ms must be > 0, got {}",
                s.name,
                s.poll_interval_ms
            );
            match &s.output {
                OutputConfig::File {
                    path, max_size_kb, ..
                } => {
                    anyhow::ensure!(
                        !path.is_empty(),
                        "samplers[{}].output.path must be non-empty",
                        s.name
                    );
                    anyhow::ensure!(
                        *max_size_kb > 0 && *max_size_kb <= MAX_FILE_SIZE_KB,
                        "samplers[{}].output.max_size_kb must be in 1..={}, got {}",
                        s.name,
                        MAX_FILE_SIZE_KB,
                        max_size_kb
                    );
                }
                OutputConfig::Pipeline { capacity } => {
                    anyhow::ensure!(
                        *capacity > 0,
                        "samplers[{}].output.capacity must be > 0, got {}",
                        s.name,
                        capacity
                    );
                }
            }
        }
        Ok(())
    }
}

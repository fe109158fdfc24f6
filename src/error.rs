// Error taxonomy: scrape (parse), storage, sample (io | parse | storage), poller lifecycle.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a stats blob into [`crate::scraper::NetworkStats`].
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to read stats source: {0}")]
    Read(#[source] std::io::Error),
    #[error("interface '{interface}' not found in file info")]
    InterfaceNotFound { interface: String },
    #[error("interface '{interface}': missing field {index}")]
    MissingField { interface: String, index: usize },
    #[error("interface '{interface}': field {index} is not an unsigned integer: '{value}'")]
    InvalidField {
        interface: String,
        index: usize,
        value: String,
    },
}

/// Persistence backend failure. Absence of a stored value is never an error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("stored value for '{key}' is not a base-10 u64: '{value}'")]
    Decode { key: String, value: String },
    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ScrapeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("sampler task join: {0}")]
    Task(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollerError {
    #[error("poller is already running")]
    AlreadyRunning,
    #[error("poller has been stopped; create a new instance to poll again")]
    Stopped,
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

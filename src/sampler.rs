// Samplers: cumulative counter from a stats file, and the delta variant backed by Storage.

use crate::error::{SampleError, ScrapeError};
use crate::scraper::{NetDevScraper, NetworkStatsScraper};
use crate::storage::Storage;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Produces one counter value per call.
#[async_trait]
pub trait Sampler: Send {
    async fn sample(&mut self) -> Result<u64, SampleError>;
}

/// Samples `received + transmitted` from a stats file. Persists nothing.
pub struct FileSampler<S> {
    path: PathBuf,
    scraper: Arc<S>,
}

impl FileSampler<NetDevScraper> {
    /// Sampler over a /proc/net/dev style file for one interface (empty = eth0).
    pub fn net_dev(path: impl Into<PathBuf>, interface: &str) -> Self {
        Self::new(path, NetDevScraper::new(interface))
    }
}

impl<S: NetworkStatsScraper + 'static> FileSampler<S> {
    pub fn new(path: impl Into<PathBuf>, scraper: S) -> Self {
        Self {
            path: path.into(),
            scraper: Arc::new(scraper),
        }
    }

    fn sample_blocking(path: &Path, scraper: &S) -> Result<u64, SampleError> {
        // File handle is dropped on every return path, including scrape failures.
        let mut file = std::fs::File::open(path).map_err(|source| SampleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stats = scraper.scrape(&mut file).map_err(|e| match e {
            ScrapeError::Read(source) => SampleError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => SampleError::Parse(other),
        })?;
        Ok(stats.total())
    }
}

#[async_trait]
impl<S: NetworkStatsScraper + 'static> Sampler for FileSampler<S> {
    #[instrument(skip(self), fields(sampler = "file", path = %self.path.display()))]
    async fn sample(&mut self) -> Result<u64, SampleError> {
        let path = self.path.clone();
        let scraper = self.scraper.clone();
        tokio::task::spawn_blocking(move || Self::sample_blocking(&path, &scraper))
            .await
            .map_err(|e| SampleError::Task(e.to_string()))?
    }
}

/// What to report when the counter went down since the last sample (interface reset, rollover).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// `current - last` in wrapping u64 arithmetic. A decrease yields a value near 2^64.
    #[default]
    Wrap,
    /// A decrease reports 0.
    #[serde(rename = "clamp")]
    ClampToZero,
    /// A decrease reports `current`: the counter restarted from zero.
    ResetBaseline,
}

impl ResetPolicy {
    pub fn delta(self, last: u64, current: u64) -> u64 {
        match self {
            ResetPolicy::Wrap => current.wrapping_sub(last),
            ResetPolicy::ClampToZero => current.saturating_sub(last),
            ResetPolicy::ResetBaseline => current.checked_sub(last).unwrap_or(current),
        }
    }
}

/// Where the first-ever sample (nothing stored) starts counting from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartAt {
    /// Baseline 0: the first sample reports the whole cumulative counter.
    #[default]
    Beginning,
    /// The first sample only records the baseline and reports 0.
    End,
}

/// Wraps a cumulative sampler and returns the change since the last persisted value.
pub struct DeltaSampler<B, St> {
    base: B,
    storage: St,
    policy: ResetPolicy,
    start_at: StartAt,
}

impl<B: Sampler, St: Storage> DeltaSampler<B, St> {
    pub fn new(base: B, storage: St) -> Self {
        Self {
            base,
            storage,
            policy: ResetPolicy::default(),
            start_at: StartAt::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_start_at(mut self, start_at: StartAt) -> Self {
        self.start_at = start_at;
        self
    }
}

#[async_trait]
impl<B: Sampler, St: Storage> Sampler for DeltaSampler<B, St> {
    #[instrument(skip(self), fields(sampler = "delta", policy = ?self.policy))]
    async fn sample(&mut self) -> Result<u64, SampleError> {
        let stored = self.storage.load_stored().await?;
        let current = self.base.sample().await?;

        let delta = match stored {
            None if self.start_at == StartAt::End => 0,
            None => current,
            Some(last) => {
                if current < last {
                    warn!(
                        last,
                        current,
                        policy = ?self.policy,
                        "counter decreased since last sample"
                    );
                }
                self.policy.delta(last, current)
            }
        };

        self.storage.save(current).await?;
        debug!(current, delta, "sample persisted");
        Ok(delta)
    }
}

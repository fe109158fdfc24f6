// Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use netsampler::error::SampleError;
use netsampler::poller::Emitter;
use netsampler::sampler::Sampler;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Duration;

pub fn net_dev_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/testdata/net_dev.data")
}

/// Returns the queued cumulative values in order, then keeps returning the last one.
pub struct SequenceSampler {
    values: VecDeque<u64>,
    last: u64,
}

impl SequenceSampler {
    pub fn new(values: &[u64]) -> Self {
        Self {
            values: values.iter().copied().collect(),
            last: 0,
        }
    }
}

#[async_trait]
impl Sampler for SequenceSampler {
    async fn sample(&mut self) -> Result<u64, SampleError> {
        if let Some(v) = self.values.pop_front() {
            self.last = v;
        }
        Ok(self.last)
    }
}

/// Emitter that counts calls, optionally sleeps and fails, and tracks overlapping calls.
#[derive(Clone, Default)]
pub struct CountingEmitter {
    pub calls: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub delay: Duration,
    pub fail: bool,
}

impl CountingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Emitter for CountingEmitter {
    async fn emit(&mut self) -> anyhow::Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("emit failed on purpose");
        }
        Ok(())
    }
}

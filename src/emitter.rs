// Emit callback: sample -> usage record -> sink.

use crate::poller::Emitter;
use crate::record::{Identity, UsageRecord};
use crate::sampler::Sampler;
use crate::sink::Sink;
use anyhow::Context;
use async_trait::async_trait;

pub struct SampleEmitter<S> {
    sampler: S,
    identity: Identity,
    sink: Sink,
}

impl<S: Sampler + 'static> SampleEmitter<S> {
    pub fn new(sampler: S, identity: Identity, sink: Sink) -> Self {
        Self {
            sampler,
            identity,
            sink,
        }
    }
}

#[async_trait]
impl<S: Sampler + 'static> Emitter for SampleEmitter<S> {
    async fn emit(&mut self) -> anyhow::Result<()> {
        let usage_bytes = self.sampler.sample().await.context("sample")?;
        let record = UsageRecord::new(
            &self.identity,
            usage_bytes,
            chrono::Utc::now().timestamp_millis(),
        );
        let line = record.to_json()?;
        self.sink.accept(&line).await.context("sink")?;
        tracing::debug!(operation = "emit", usage_bytes, "usage record emitted");
        Ok(())
    }
}

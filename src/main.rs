use anyhow::Result;
use netsampler::config::{AppConfig, SamplerConfig};
use netsampler::emitter::SampleEmitter;
use netsampler::poller::Poller;
use netsampler::record::Identity;
use netsampler::sampler::{DeltaSampler, FileSampler};
use netsampler::sink::Sink;
use netsampler::storage::{PersisterStorage, SqlitePersister};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Builds the poller for one sampler. Pipeline outputs also get a consumer task
/// that forwards records to the log; it ends when the poller drops its sink.
fn build_poller(
    sampler: &SamplerConfig,
    persister: Arc<SqlitePersister>,
    identity: Identity,
) -> (Poller, Option<JoinHandle<()>>) {
    let storage = PersisterStorage::with_key(persister, sampler.storage_key.clone());
    let delta = DeltaSampler::new(
        FileSampler::net_dev(&sampler.uri, &sampler.interface),
        storage,
    )
    .with_policy(sampler.reset_policy)
    .with_start_at(sampler.start_at);

    let (sink, rx) = Sink::from_config(&sampler.output);
    let consumer = rx.map(|mut rx| {
        let name = sampler.name.clone();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                tracing::info!(sampler = %name, record = %record, "usage record");
            }
            tracing::debug!(sampler = %name, "pipeline consumer shutting down");
        })
    });

    let poller = Poller::new(
        sampler.name.clone(),
        Duration::from_millis(sampler.poll_interval_ms),
        SampleEmitter::new(delta, identity, sink),
    );
    (poller, consumer)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = AppConfig::load()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        samplers = app_config.samplers.len(),
        "netsampler starting"
    );

    let persister = Arc::new(SqlitePersister::connect(&app_config.storage.path).await?);
    persister.init().await?;

    let mut pollers = Vec::with_capacity(app_config.samplers.len());
    let mut consumers = Vec::new();
    for sampler in &app_config.samplers {
        let (mut poller, consumer) =
            build_poller(sampler, persister.clone(), app_config.identity.clone());
        poller.start()?;
        pollers.push(poller);
        consumers.extend(consumer);
    }

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");

    for poller in &mut pollers {
        poller.stop().await;
    }
    for consumer in consumers {
        let _ = consumer.await;
    }
    persister.close().await;

    Ok(())
}

// Background poll loop: one task per Poller, emit runs serially on each tick.
// Idle -> Running -> Stopped. Stopped is terminal for the instance.

use crate::error::PollerError;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tracing::Instrument;

/// Callback invoked once per tick. Errors are logged by the poll loop, never fatal.
/// An in-flight emit is never cancelled: `stop` waits for it to finish.
#[async_trait]
pub trait Emitter: Send + 'static {
    async fn emit(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopped,
}

pub struct Poller {
    name: String,
    interval: Duration,
    emitter: Option<Box<dyn Emitter>>,
    state: PollerState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(name: impl Into<String>, interval: Duration, emitter: impl Emitter) -> Self {
        Self {
            name: name.into(),
            interval,
            emitter: Some(Box::new(emitter)),
            state: PollerState::Idle,
            shutdown_tx: None,
            handle: None,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Spawns the poll loop and returns immediately. Must be called inside a tokio runtime.
    pub fn start(&mut self) -> Result<(), PollerError> {
        match self.state {
            PollerState::Running => return Err(PollerError::AlreadyRunning),
            PollerState::Stopped => return Err(PollerError::Stopped),
            PollerState::Idle => {}
        }
        if self.interval.is_zero() {
            return Err(PollerError::ZeroInterval);
        }
        let Some(emitter) = self.emitter.take() else {
            return Err(PollerError::Stopped);
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let span = tracing::info_span!(
            "poller",
            name = %self.name,
            interval_ms = self.interval.as_millis() as u64
        );
        self.handle = Some(tokio::spawn(
            run(self.interval, emitter, shutdown_rx).instrument(span),
        ));
        self.shutdown_tx = Some(shutdown_tx);
        self.state = PollerState::Running;
        tracing::info!(
            poller = %self.name,
            interval_ms = self.interval.as_millis() as u64,
            "poller started"
        );
        Ok(())
    }

    /// Signals the loop and waits for it to exit. No emit runs after this returns.
    /// A no-op when the poller never started or is already stopped.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(e) = handle.await {
            tracing::warn!(poller = %self.name, error = %e, "poll loop did not exit cleanly");
        }
        self.state = PollerState::Stopped;
        tracing::info!(poller = %self.name, "poller stopped");
    }
}

async fn run(
    period: Duration,
    mut emitter: Box<dyn Emitter>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    // First tick fires one full period after start; a slow emit pushes later ticks back.
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Also resolves when the Poller is dropped without stop().
            _ = &mut shutdown_rx => {
                tracing::debug!("poll loop shutting down");
                break;
            }
            _ = tick.tick() => {
                if let Err(e) = emitter.emit().await {
                    let error = format!("{e:#}");
                    tracing::warn!(error = %error, operation = "emit", "emit failed");
                }
            }
        }
    }
}

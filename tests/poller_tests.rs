// Poller lifecycle tests: start/stop, double start, stop without start, no overlap, error absorption

mod common;

use common::CountingEmitter;
use netsampler::error::PollerError;
use netsampler::poller::{Poller, PollerState};
use std::sync::atomic::Ordering;
use tokio::time::{Duration, sleep};

const TICK: Duration = Duration::from_millis(10);

#[tokio::test(start_paused = true)]
async fn poller_ticks_on_interval() {
    let emitter = CountingEmitter::new();
    let mut poller = Poller::new("test", TICK, emitter.clone());
    poller.start().unwrap();
    assert_eq!(poller.state(), PollerState::Running);

    sleep(Duration::from_millis(55)).await;
    poller.stop().await;

    let calls = emitter.calls();
    assert!((4..=5).contains(&calls), "expected ~5 ticks, got {calls}");
    assert_eq!(poller.state(), PollerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn poller_first_tick_waits_one_interval() {
    let emitter = CountingEmitter::new();
    let mut poller = Poller::new("test", Duration::from_secs(60), emitter.clone());
    poller.start().unwrap();
    sleep(Duration::from_secs(30)).await;
    assert_eq!(emitter.calls(), 0);
    poller.stop().await;
}

#[tokio::test]
async fn start_then_stop_immediately_emits_nothing_afterwards() {
    let emitter = CountingEmitter::new();
    let mut poller = Poller::new("test", Duration::from_millis(1), emitter.clone());
    poller.start().unwrap();
    poller.stop().await;

    let after_stop = emitter.calls();
    sleep(Duration::from_millis(20)).await;
    assert_eq!(emitter.calls(), after_stop);
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_in_flight_emit() {
    let emitter = CountingEmitter::slow(Duration::from_millis(50));
    let mut poller = Poller::new("test", TICK, emitter.clone());
    poller.start().unwrap();

    // First emit starts at 10ms and is still running at 15ms.
    sleep(Duration::from_millis(15)).await;
    assert_eq!(emitter.in_flight.load(Ordering::SeqCst), 1);
    poller.stop().await;

    assert_eq!(emitter.in_flight.load(Ordering::SeqCst), 0);
    let after_stop = emitter.calls();
    assert_eq!(after_stop, 1);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(emitter.calls(), after_stop);
}

#[tokio::test(start_paused = true)]
async fn slow_emit_never_overlaps() {
    let emitter = CountingEmitter::slow(Duration::from_millis(35));
    let mut poller = Poller::new("test", TICK, emitter.clone());
    poller.start().unwrap();
    sleep(Duration::from_millis(300)).await;
    poller.stop().await;

    assert!(emitter.calls() >= 2);
    assert_eq!(emitter.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn emit_errors_do_not_stop_the_loop() {
    let emitter = CountingEmitter::failing();
    let mut poller = Poller::new("test", TICK, emitter.clone());
    poller.start().unwrap();
    sleep(Duration::from_millis(55)).await;
    poller.stop().await;
    assert!(emitter.calls() >= 3, "loop kept ticking after failures");
}

#[tokio::test]
async fn stop_without_start_is_noop() {
    let mut poller = Poller::new("test", TICK, CountingEmitter::new());
    poller.stop().await;
    poller.stop().await;
    assert_eq!(poller.state(), PollerState::Idle);
}

#[tokio::test]
async fn double_start_is_rejected() {
    let mut poller = Poller::new("test", TICK, CountingEmitter::new());
    poller.start().unwrap();
    assert_eq!(poller.start(), Err(PollerError::AlreadyRunning));
    poller.stop().await;
}

#[tokio::test]
async fn stopped_poller_cannot_restart_and_stop_is_idempotent() {
    let mut poller = Poller::new("test", TICK, CountingEmitter::new());
    poller.start().unwrap();
    poller.stop().await;
    poller.stop().await;
    assert_eq!(poller.state(), PollerState::Stopped);
    assert_eq!(poller.start(), Err(PollerError::Stopped));
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let mut poller = Poller::new("test", Duration::ZERO, CountingEmitter::new());
    assert_eq!(poller.start(), Err(PollerError::ZeroInterval));
    assert_eq!(poller.state(), PollerState::Idle);
}

#[tokio::test]
async fn dropping_running_poller_ends_loop() {
    let emitter = CountingEmitter::new();
    let mut poller = Poller::new("test", Duration::from_millis(1), emitter.clone());
    poller.start().unwrap();
    drop(poller);
    sleep(Duration::from_millis(10)).await;
    let settled = emitter.calls();
    sleep(Duration::from_millis(20)).await;
    assert_eq!(emitter.calls(), settled);
}

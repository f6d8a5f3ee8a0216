//! Integration tests for the hardware-to-run door handoff.

mod common;

use std::sync::Arc;

use common::{on_hardware_thread, FakeHardware};
use liquid_run_core::config::EngineConfig;
use liquid_run_core::core::{DoorState, EngineStatus, QueueStatus};
use liquid_run_core::runtime::{HardwareEvent, RunEngine, TokioSpawner};
use parking_lot::Mutex;

fn engine(block_on_door_open: bool) -> RunEngine {
    let config = EngineConfig::default().with_block_on_door_open(block_on_door_open);
    RunEngine::new(config, DoorState::Closed).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_and_stop_are_idempotent() {
    let engine = engine(true);
    let hardware = Arc::new(FakeHardware::default());
    let watcher = engine.door_watcher(hardware.clone(), TokioSpawner::current());

    assert!(!watcher.is_watching());
    watcher.start();
    watcher.start();
    assert!(watcher.is_watching());
    assert_eq!(hardware.registrations(), 1);

    watcher.stop_soon();
    watcher.stop_soon();
    assert!(!watcher.is_watching());
    assert!(!hardware.is_registered());

    let hw = hardware.clone();
    let delivered = on_hardware_thread(move || hw.door(DoorState::Closed, DoorState::Open)).await;
    assert!(!delivered);
    assert!(!engine.state().is_door_blocking());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_door_event_applied_before_hardware_call_returns() {
    let engine = engine(true);
    let hardware = Arc::new(FakeHardware::default());
    let watcher = engine.door_watcher(hardware.clone(), TokioSpawner::current());
    watcher.start();
    engine.play().unwrap();

    let store = engine.store().clone();
    let notifier = Arc::clone(engine.notifier());
    let before = notifier.generation();
    let hw = hardware.clone();
    let (blocking, status, generation) = on_hardware_thread(move || {
        hw.door(DoorState::Closed, DoorState::Open);
        let state = store.read();
        (state.is_door_blocking(), state.get_status(), notifier.generation())
    })
    .await;

    assert!(blocking);
    assert_eq!(status, EngineStatus::BlockedByOpenDoor);
    assert!(generation > before);
    assert_eq!(hardware.log.lock().as_slice(), ["hardware_pause:Pause"]);
    watcher.stop_soon();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_pause_when_not_running_or_not_blocking() {
    // Not running yet: state changes, hardware is not paused.
    let engine_a = engine(true);
    let hardware_a = Arc::new(FakeHardware::default());
    let watcher_a = engine_a.door_watcher(hardware_a.clone(), TokioSpawner::current());
    watcher_a.start();
    let hw = hardware_a.clone();
    on_hardware_thread(move || hw.door(DoorState::Closed, DoorState::Open)).await;
    assert!(engine_a.state().is_door_blocking());
    assert_eq!(engine_a.state().queue_status(), QueueStatus::Setup);
    assert!(hardware_a.log.lock().is_empty());

    // Running without the interlock: nothing changes.
    let engine_b = engine(false);
    let hardware_b = Arc::new(FakeHardware::default());
    let watcher_b = engine_b.door_watcher(hardware_b.clone(), TokioSpawner::current());
    watcher_b.start();
    engine_b.play().unwrap();
    let hw = hardware_b.clone();
    on_hardware_thread(move || hw.door(DoorState::Closed, DoorState::Open)).await;
    assert_eq!(engine_b.state().get_status(), EngineStatus::Running);
    assert!(hardware_b.log.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_non_door_events_are_ignored() {
    let engine = engine(true);
    let log = Arc::new(Mutex::new(Vec::new()));
    let hardware = Arc::new(FakeHardware::new(Arc::clone(&log)));
    let watcher = engine.door_watcher(hardware.clone(), TokioSpawner::current());
    watcher.start();
    engine.play().unwrap();

    let before = engine.notifier().generation();
    let hw = hardware.clone();
    let delivered = on_hardware_thread(move || {
        hw.fire(&HardwareEvent::ErrorMessage {
            message: "motor stall".into(),
        })
    })
    .await;

    assert!(delivered);
    assert_eq!(engine.notifier().generation(), before);
    assert_eq!(engine.state().get_status(), EngineStatus::Running);
    assert!(log.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_closing_door_does_not_resume() {
    let engine = engine(true);
    let hardware = Arc::new(FakeHardware::default());
    let watcher = engine.door_watcher(hardware.clone(), TokioSpawner::current());
    watcher.start();
    engine.play().unwrap();

    let hw = hardware.clone();
    on_hardware_thread(move || {
        hw.door(DoorState::Closed, DoorState::Open);
        hw.door(DoorState::Open, DoorState::Closed);
    })
    .await;

    let state = engine.state();
    assert!(!state.is_door_blocking());
    assert_eq!(state.get_status(), EngineStatus::Paused);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropping_watcher_unregisters() {
    let engine = engine(true);
    let hardware = Arc::new(FakeHardware::default());
    {
        let watcher = engine.door_watcher(hardware.clone(), TokioSpawner::current());
        watcher.start();
        assert!(hardware.is_registered());
    }
    assert!(!hardware.is_registered());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_door_open_racing_play_pauses_hardware_whenever_play_wins() {
    for _ in 0..200 {
        let engine = engine(true);
        let hardware = Arc::new(FakeHardware::default());
        let watcher = engine.door_watcher(hardware.clone(), TokioSpawner::current());
        watcher.start();
        engine.play().unwrap();
        engine.pause().unwrap();

        let player = engine.clone();
        let play = std::thread::spawn(move || player.play());
        let hw = hardware.clone();
        on_hardware_thread(move || hw.door(DoorState::Closed, DoorState::Open)).await;
        let played = play.join().unwrap();

        // Play first: the door interrupts a running run and must pause the
        // hardware. Door first: play is refused and nothing moved.
        let hardware_paused = !hardware.log.lock().is_empty();
        assert_eq!(played.is_ok(), hardware_paused, "play result: {played:?}");
        assert_eq!(engine.state().get_status(), EngineStatus::BlockedByOpenDoor);
        watcher.stop_soon();
    }
}

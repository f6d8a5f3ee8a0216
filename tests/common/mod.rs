//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use liquid_run_core::core::{Command, CommandError, CommandExecutor, DoorState, ExecutionContext};
use liquid_run_core::runtime::{
    HardwareControl, HardwareEvent, HardwareEventHandler, PauseType, Unregister,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Hardware double that records pauses into a shared event log.
#[derive(Default)]
pub struct FakeHardware {
    callback: Arc<Mutex<Option<HardwareEventHandler>>>,
    registrations: Mutex<usize>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl FakeHardware {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Deliver an event on the calling thread. Returns false if nobody is registered.
    pub fn fire(&self, event: &HardwareEvent) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(cb) => {
                cb(event);
                true
            }
            None => false,
        }
    }

    pub fn door(&self, old_state: DoorState, new_state: DoorState) -> bool {
        self.fire(&HardwareEvent::DoorStateNotification {
            old_state,
            new_state,
        })
    }

    pub fn registrations(&self) -> usize {
        *self.registrations.lock()
    }

    pub fn is_registered(&self) -> bool {
        self.callback.lock().is_some()
    }
}

impl HardwareControl for FakeHardware {
    fn register_callback(&self, callback: HardwareEventHandler) -> Unregister {
        *self.callback.lock() = Some(callback);
        *self.registrations.lock() += 1;
        let slot = Arc::clone(&self.callback);
        Unregister::new(move || {
            slot.lock().take();
        })
    }

    fn pause(&self, pause_type: PauseType) {
        self.log.lock().push(format!("hardware_pause:{pause_type:?}"));
    }
}

/// Executor that succeeds every command, except that commands whose payload is
/// `"gated"` wait for the gate and commands whose payload is `"fail"` fail.
#[derive(Clone, Default)]
pub struct GatedExecutor {
    pub gate: Arc<Notify>,
}

#[async_trait]
impl CommandExecutor for GatedExecutor {
    async fn execute(
        &self,
        command: &Command,
        _ctx: &ExecutionContext,
    ) -> Result<Option<serde_json::Value>, CommandError> {
        match command.payload.as_str() {
            Some("gated") => {
                self.gate.notified().await;
                Ok(Some(serde_json::json!({ "id": command.id })))
            }
            Some("fail") => Err(CommandError::new("Scripted", format!("{} failed", command.id))),
            _ => Ok(Some(serde_json::json!({ "id": command.id }))),
        }
    }
}

/// Run a blocking closure on a plain OS thread and await its result.
pub async fn on_hardware_thread<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("hardware thread finished in time")
        .expect("hardware thread sent a result")
}

//! Bridges hardware door events into run state.
//!
//! The hardware reports events on a thread it owns. The watcher hands each
//! door event to a consumer task on the engine's runtime and blocks the
//! hardware thread until that task has applied the change. This gives
//! backpressure without buffering: the hardware cannot report a second door
//! event before the first has been fully incorporated.
//!
//! # Shutdown
//!
//! [`DoorWatcher::stop_soon`] unregisters from the hardware but does not wait
//! for an event already in flight. Callers that need the consumer to be idle
//! must arrange that themselves.

use std::sync::Arc;

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::{ActionDispatcher, DoorState, Spawn};

/// Kind of pause requested from the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseType {
    /// Pause motion after the current move.
    Pause,
    /// Pause for a protocol-requested delay.
    DelayPause,
}

/// Events delivered by the hardware on its own thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HardwareEvent {
    /// The door switch changed.
    DoorStateNotification {
        /// Position before the change.
        old_state: DoorState,
        /// Position after the change.
        new_state: DoorState,
    },
    /// Free-form message accompanying a hardware pause.
    ErrorMessage {
        /// Message text.
        message: String,
    },
}

/// Callback registered with the hardware.
pub type HardwareEventHandler = Arc<dyn Fn(&HardwareEvent) + Send + Sync>;

/// Unregisters a hardware callback when invoked.
pub struct Unregister(Box<dyn FnOnce() + Send>);

impl Unregister {
    /// Wrap the closure that removes the callback.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Remove the callback.
    pub fn unregister(self) {
        (self.0)();
    }
}

impl std::fmt::Debug for Unregister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Unregister")
    }
}

/// The slice of hardware control the run core needs.
pub trait HardwareControl: Send + Sync + 'static {
    /// Register a callback invoked on the hardware thread for every event.
    ///
    /// The callback blocks, so it must not be invoked from inside an async
    /// runtime.
    fn register_callback(&self, callback: HardwareEventHandler) -> Unregister;

    /// Synchronously request that motion pause.
    ///
    /// Called while run state is locked for the door change, so it must not
    /// read run state or dispatch.
    fn pause(&self, pause_type: PauseType);
}

/// A door event crossing from the hardware thread to the engine's runtime.
struct DoorHandoff {
    new_state: DoorState,
    done: crossbeam_channel::Sender<()>,
}

/// Watches the hardware for door events and dispatches them.
///
/// Stopped until [`start`](Self::start); both `start` and
/// [`stop_soon`](Self::stop_soon) are idempotent.
pub struct DoorWatcher<S> {
    hardware: Arc<dyn HardwareControl>,
    dispatcher: ActionDispatcher,
    spawner: S,
    handoff_capacity: usize,
    unregister: Mutex<Option<Unregister>>,
}

impl<S: Spawn> DoorWatcher<S> {
    /// Create a stopped watcher.
    pub fn new(hardware: Arc<dyn HardwareControl>, dispatcher: ActionDispatcher, spawner: S) -> Self {
        Self {
            hardware,
            dispatcher,
            spawner,
            handoff_capacity: 1,
            unregister: Mutex::new(None),
        }
    }

    /// Bound the handoff channel; zero is raised to one.
    #[must_use]
    pub fn with_handoff_capacity(mut self, capacity: usize) -> Self {
        self.handoff_capacity = capacity.max(1);
        self
    }

    /// Whether the watcher is registered with the hardware.
    pub fn is_watching(&self) -> bool {
        self.unregister.lock().is_some()
    }

    /// Spawn the consumer task and register with the hardware.
    pub fn start(&self) {
        let mut unregister = self.unregister.lock();
        if unregister.is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::channel::<DoorHandoff>(self.handoff_capacity);
        let dispatcher = self.dispatcher.clone();
        let hardware = Arc::clone(&self.hardware);
        self.spawner.spawn(async move {
            while let Some(handoff) = rx.recv().await {
                apply_door_change(&dispatcher, hardware.as_ref(), handoff.new_state);
                let _ = handoff.done.send(());
            }
            debug!("door handoff consumer exited");
        });

        let callback: HardwareEventHandler =
            Arc::new(move |event: &HardwareEvent| on_hardware_door_event(&tx, event));
        *unregister = Some(self.hardware.register_callback(callback));
        info!("door watcher started");
    }

    /// Unregister from the hardware without waiting for in-flight events.
    pub fn stop_soon(&self) {
        if let Some(unregister) = self.unregister.lock().take() {
            unregister.unregister();
            info!("door watcher stopped");
        }
    }
}

impl<S> Drop for DoorWatcher<S> {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.get_mut().take() {
            unregister.unregister();
        }
    }
}

/// Runs on the hardware thread; blocks until the change is applied.
fn on_hardware_door_event(tx: &mpsc::Sender<DoorHandoff>, event: &HardwareEvent) {
    let HardwareEvent::DoorStateNotification { new_state, .. } = event else {
        return;
    };

    let (done_tx, done_rx) = bounded(1);
    let handoff = DoorHandoff {
        new_state: *new_state,
        done: done_tx,
    };
    if tx.blocking_send(handoff).is_err() {
        warn!(door_state = ?new_state, "door event dropped: consumer has shut down");
        return;
    }
    if done_rx.recv().is_err() {
        warn!(door_state = ?new_state, "door event consumer exited before applying change");
    }
}

/// Runs on the engine's runtime: pause first if required, then dispatch.
fn apply_door_change(dispatcher: &ActionDispatcher, hardware: &dyn HardwareControl, new_state: DoorState) {
    dispatcher.dispatch_door_change(new_state, || {
        warn!("door opened during run, pausing hardware");
        hardware.pause(PauseType::Pause);
    });
}

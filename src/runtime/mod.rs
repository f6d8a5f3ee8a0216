//! Components that touch threads or the async runtime.

pub mod door_watcher;
pub mod engine;
pub mod queue_worker;
pub mod tokio_spawner;

pub use door_watcher::{
    DoorWatcher, HardwareControl, HardwareEvent, HardwareEventHandler, PauseType, Unregister,
};
pub use engine::{RunEngine, DEFAULT_TIP_RACK};
pub use queue_worker::QueueWorker;
pub use tokio_spawner::TokioSpawner;

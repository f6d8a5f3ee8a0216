//! Error types for queue, tip tracking and run-control operations.

use thiserror::Error;

/// Errors produced by run-core components.
///
/// None of these are retried inside the core. Queue lookups and duplicate IDs
/// are caller bugs; running out of tips is an expected runtime condition that
/// the executor surfaces as a command failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A command with this ID was already added.
    #[error("duplicate command id: {0}")]
    DuplicateId(String),
    /// No command with this ID has been added.
    #[error("command not found: {0}")]
    CommandNotFound(String),
    /// Strict tip pick-up found an empty slot in the target run.
    #[error("tip rack {rack} is out of tips at {slot}")]
    TipRackOutOfTips {
        /// Rack display name.
        rack: String,
        /// Slot where the search or pick-up failed.
        slot: String,
    },
    /// A tip was returned to a slot that still holds one.
    #[error("cannot return tip to {slot}: slot already occupied")]
    SlotAlreadyOccupied {
        /// Name of the first occupied slot in the target run.
        slot: String,
    },
    /// A well name or coordinate does not address a slot of the rack.
    #[error("invalid slot: {0}")]
    InvalidSlot(String),
    /// The run already has a result; no further control actions apply.
    #[error("run has already stopped")]
    RunStopped,
    /// The run cannot be paused in its current state.
    #[error("pause not allowed: {0}")]
    PauseNotAllowed(String),
    /// Setup commands are only accepted before the run starts.
    #[error("setup commands are not allowed after the run has started")]
    SetupCommandNotAllowed,
    /// The door interlock blocks resuming the run.
    #[error("front door or top window is currently open")]
    RobotDoorOpen,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

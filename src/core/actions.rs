//! State-changing actions applied by the dispatcher.

use serde::{Deserialize, Serialize};

use crate::core::{Command, CommandError};

/// Position of the enclosure door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    /// Door or top window open.
    Open,
    /// Door closed.
    Closed,
}

/// Every change to run state, as a closed set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Record a new command and put it in its FIFO.
    QueueCommand {
        /// The freshly queued command.
        command: Command,
    },
    /// Take a command off its FIFO and mark it running.
    RunCommand {
        /// Command to start.
        command_id: String,
        /// Start time in milliseconds since epoch.
        started_at_ms: u128,
    },
    /// Record a successful result.
    SucceedCommand {
        /// Finished command.
        command_id: String,
        /// Executor output.
        result: Option<serde_json::Value>,
        /// Completion time in milliseconds since epoch.
        completed_at_ms: u128,
    },
    /// Record a failure.
    FailCommand {
        /// Failed command.
        command_id: String,
        /// What went wrong.
        error: CommandError,
        /// Failure time in milliseconds since epoch.
        failed_at_ms: u128,
    },
    /// Start or resume pulling commands from the main FIFO.
    Play,
    /// Stop pulling commands from the main FIFO.
    Pause,
    /// Stop the run; queued commands will never execute.
    Stop,
    /// Mark the run finished, failed if an error is given.
    Finish {
        /// Run-level error, if the run failed.
        error: Option<CommandError>,
    },
    /// The enclosure door moved.
    DoorChange {
        /// New door position.
        door_state: DoorState,
    },
}

impl Action {
    /// Short name used in log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::QueueCommand { .. } => "queue_command",
            Self::RunCommand { .. } => "run_command",
            Self::SucceedCommand { .. } => "succeed_command",
            Self::FailCommand { .. } => "fail_command",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Finish { .. } => "finish",
            Self::DoorChange { .. } => "door_change",
        }
    }
}

//! Command records and their lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Waiting in one of the FIFOs.
    Queued,
    /// Currently executing.
    Running,
    /// Finished without error.
    Succeeded,
    /// Finished with an error, or cancelled because an earlier command failed.
    Failed,
}

impl CommandStatus {
    /// Whether the status is final.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Which FIFO a command is queued into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandIntent {
    /// Part of the main protocol run.
    #[default]
    Protocol,
    /// Setup work run before the protocol starts.
    Setup,
}

/// Error recorded on a failed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    /// Short machine-readable error kind, e.g. `TipRackOutOfTips`.
    pub error_type: String,
    /// Human-readable description.
    pub detail: String,
}

impl CommandError {
    /// Build a command error from a kind and detail.
    pub fn new(error_type: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            detail: detail.into(),
        }
    }
}

impl From<&crate::core::EngineError> for CommandError {
    fn from(err: &crate::core::EngineError) -> Self {
        use crate::core::EngineError;

        let kind = match err {
            EngineError::DuplicateId(_) => "DuplicateId",
            EngineError::CommandNotFound(_) => "CommandNotFound",
            EngineError::TipRackOutOfTips { .. } => "TipRackOutOfTips",
            EngineError::SlotAlreadyOccupied { .. } => "SlotAlreadyOccupied",
            EngineError::InvalidSlot(_) => "InvalidSlot",
            EngineError::RunStopped => "RunStopped",
            EngineError::PauseNotAllowed(_) => "PauseNotAllowed",
            EngineError::SetupCommandNotAllowed => "SetupCommandNotAllowed",
            EngineError::RobotDoorOpen => "RobotDoorOpen",
            EngineError::InvalidConfig(_) => "InvalidConfig",
        };
        Self::new(kind, err.to_string())
    }
}

/// A request to add a command to the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Caller-supplied ID; one is generated when absent.
    pub id: Option<String>,
    /// Caller-supplied idempotency key; defaults to the command ID.
    pub key: Option<String>,
    /// Target FIFO.
    pub intent: CommandIntent,
    /// Opaque payload handed to the executor.
    pub payload: serde_json::Value,
}

impl CommandRequest {
    /// Protocol command with the given payload.
    pub fn protocol(payload: serde_json::Value) -> Self {
        Self {
            id: None,
            key: None,
            intent: CommandIntent::Protocol,
            payload,
        }
    }

    /// Setup command with the given payload.
    pub fn setup(payload: serde_json::Value) -> Self {
        Self {
            id: None,
            key: None,
            intent: CommandIntent::Setup,
            payload,
        }
    }

    /// Use a fixed command ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// One recorded command.
///
/// Everything except the status, timestamps and outcome is fixed when the
/// command is queued. Updates replace the stored entry in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Unique identifier.
    pub id: String,
    /// Idempotency key.
    pub key: String,
    /// Target FIFO.
    pub intent: CommandIntent,
    /// Opaque payload.
    pub payload: serde_json::Value,
    /// Lifecycle status.
    pub status: CommandStatus,
    /// Executor output on success.
    pub result: Option<serde_json::Value>,
    /// Recorded failure, if any.
    pub error: Option<CommandError>,
    /// Queue time in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Start time in milliseconds since epoch.
    pub started_at_ms: Option<u128>,
    /// Completion time in milliseconds since epoch.
    pub completed_at_ms: Option<u128>,
}

impl Command {
    /// Create a freshly queued command.
    pub fn queued(
        id: impl Into<String>,
        key: Option<String>,
        intent: CommandIntent,
        payload: serde_json::Value,
        created_at_ms: u128,
    ) -> Self {
        let id = id.into();
        Self {
            key: key.unwrap_or_else(|| id.clone()),
            id,
            intent,
            payload,
            status: CommandStatus::Queued,
            result: None,
            error: None,
            created_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
        }
    }
}

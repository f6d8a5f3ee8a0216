//! Run-scoped state and its read-only views.
//!
//! [`RunState`] is only mutated by the [`ActionDispatcher`](crate::core::ActionDispatcher).
//! Readers share it through a [`StateStore`].

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::core::{
    Action, Command, CommandError, CommandIntent, CommandQueue, DoorState, EngineError,
};

/// Whether the run is pulling commands off the main FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Run not started; setup commands execute, protocol commands wait.
    Setup,
    /// Protocol commands execute.
    Running,
    /// Protocol commands wait. A command already in flight may still finish.
    Paused,
}

/// Final outcome of a run. Once set it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    /// Every command ran to completion.
    Succeeded,
    /// A command or the run itself failed.
    Failed,
    /// The run was stopped by request.
    Stopped,
}

/// Externally reported status of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Created but not yet played.
    Idle,
    /// Executing protocol commands.
    Running,
    /// Paused by request.
    Paused,
    /// Paused because the door opened.
    BlockedByOpenDoor,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped by request.
    Stopped,
}

/// A window of the command history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSlice {
    /// Commands in insertion order.
    pub commands: Vec<Command>,
    /// Insertion index of the first returned command.
    pub cursor: usize,
    /// Total number of recorded commands.
    pub total_length: usize,
}

/// Everything that changes during a run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub(crate) commands: CommandQueue,
    pub(crate) queue_status: QueueStatus,
    pub(crate) run_result: Option<RunResult>,
    pub(crate) run_error: Option<CommandError>,
    pub(crate) is_door_blocking: bool,
    pub(crate) block_on_door_open: bool,
    pub(crate) failed_command_id: Option<String>,
}

impl RunState {
    /// Fresh state for a run.
    pub fn new(block_on_door_open: bool, initial_door: DoorState) -> Self {
        Self {
            commands: CommandQueue::new(),
            queue_status: QueueStatus::Setup,
            run_result: None,
            run_error: None,
            is_door_blocking: block_on_door_open && initial_door == DoorState::Open,
            block_on_door_open,
            failed_command_id: None,
        }
    }

    /// The command history and FIFOs.
    pub const fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// Current queue status.
    pub const fn queue_status(&self) -> QueueStatus {
        self.queue_status
    }

    /// Final outcome, once there is one.
    pub const fn run_result(&self) -> Option<RunResult> {
        self.run_result
    }

    /// Run-level error recorded by a failed finish.
    pub const fn run_error(&self) -> Option<&CommandError> {
        self.run_error.as_ref()
    }

    /// Whether the door is open and the run is configured to block on it.
    pub const fn is_door_blocking(&self) -> bool {
        self.is_door_blocking
    }

    /// Whether the run blocks when the door opens.
    pub const fn block_on_door_open(&self) -> bool {
        self.block_on_door_open
    }

    /// Whether protocol commands are being executed.
    pub fn get_is_running(&self) -> bool {
        self.queue_status == QueueStatus::Running
    }

    /// Whether the run has a result.
    pub const fn get_is_terminal(&self) -> bool {
        self.run_result.is_some()
    }

    /// ID of the most recent command that failed with its own error.
    pub fn failed_command_id(&self) -> Option<&str> {
        self.failed_command_id.as_deref()
    }

    /// Reported status.
    pub fn get_status(&self) -> EngineStatus {
        match (self.run_result, self.queue_status) {
            (Some(RunResult::Succeeded), _) => EngineStatus::Succeeded,
            (Some(RunResult::Failed), _) => EngineStatus::Failed,
            (Some(RunResult::Stopped), _) => EngineStatus::Stopped,
            (None, QueueStatus::Running) => EngineStatus::Running,
            (None, QueueStatus::Paused) if self.is_door_blocking => EngineStatus::BlockedByOpenDoor,
            (None, QueueStatus::Paused) => EngineStatus::Paused,
            (None, QueueStatus::Setup) => EngineStatus::Idle,
        }
    }

    /// Whether a command has reached a terminal status.
    pub fn get_command_is_final(&self, command_id: &str) -> Result<bool, EngineError> {
        Ok(self.commands.get(command_id)?.command.status.is_terminal())
    }

    /// ID of the next command the run loop should execute.
    ///
    /// Setup commands come first unless the run is paused; protocol commands
    /// only while running. Fails with [`EngineError::RunStopped`] once the run
    /// has a result, because nothing else will ever execute.
    pub fn get_next_to_execute(&self) -> Result<Option<String>, EngineError> {
        if self.run_result.is_some() {
            return Err(EngineError::RunStopped);
        }
        if self.queue_status != QueueStatus::Paused {
            if let Some(id) = self.commands.setup_queue_head() {
                return Ok(Some(id.to_owned()));
            }
        }
        if self.queue_status == QueueStatus::Running {
            return Ok(self.commands.queue_head().map(str::to_owned));
        }
        Ok(None)
    }

    /// A window of at most `length` commands starting at `cursor`.
    ///
    /// Without a cursor, the window starts at the running command, else just
    /// before the first queued command, else at the failed command of a failed
    /// run, else it shows the tail of the history.
    pub fn get_slice(&self, cursor: Option<usize>, length: usize) -> CommandSlice {
        let total_length = self.commands.len();
        let cursor = cursor.unwrap_or_else(|| self.default_cursor(length));
        let actual_cursor = cursor.min(total_length.saturating_sub(1));
        let stop = total_length.min(actual_cursor.saturating_add(length));

        CommandSlice {
            commands: self.commands.get_slice(actual_cursor, stop),
            cursor: actual_cursor,
            total_length,
        }
    }

    fn default_cursor(&self, length: usize) -> usize {
        if let Some(running) = self.commands.get_running() {
            return running.index;
        }
        if let Some(head) = self.commands.queue_head().and_then(|id| self.commands.get_if_present(id)) {
            return head.index.saturating_sub(1);
        }
        if self.run_result == Some(RunResult::Failed) {
            if let Some(failed) = self
                .failed_command_id
                .as_deref()
                .and_then(|id| self.commands.get_if_present(id))
            {
                return failed.index;
            }
        }
        self.commands.len().saturating_sub(length)
    }

    /// Check whether a control action may be dispatched now.
    ///
    /// Only run-control and queueing actions are checked; everything else is
    /// issued by the run loop itself and always allowed.
    pub fn validate_action_allowed(&self, action: &Action) -> Result<(), EngineError> {
        if self.run_result.is_some() {
            return match action {
                Action::Play | Action::Pause | Action::QueueCommand { .. } => Err(EngineError::RunStopped),
                _ => Ok(()),
            };
        }
        match action {
            Action::Play if self.get_status() == EngineStatus::BlockedByOpenDoor => {
                Err(EngineError::RobotDoorOpen)
            }
            Action::Pause if !self.get_is_running() => Err(EngineError::PauseNotAllowed(
                "cannot pause a run that is not running".into(),
            )),
            Action::QueueCommand { command }
                if command.intent == CommandIntent::Setup
                    && self.queue_status != QueueStatus::Setup =>
            {
                Err(EngineError::SetupCommandNotAllowed)
            }
            _ => Ok(()),
        }
    }
}

/// Shared handle to run state.
///
/// Writers are confined to the dispatcher; any thread may read.
#[derive(Debug, Clone)]
pub struct StateStore {
    inner: Arc<RwLock<RunState>>,
}

impl StateStore {
    /// Wrap an initial state.
    pub fn new(state: RunState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Read access.
    pub fn read(&self) -> RwLockReadGuard<'_, RunState> {
        self.inner.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RunState> {
        self.inner.write()
    }
}

//! The single place where run state changes.
//!
//! Every mutation is expressed as an [`Action`]. [`ActionDispatcher::dispatch`]
//! applies it under the state write lock, releases the lock, and only then
//! notifies, so anything woken by the notification sees the finished update.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::{
    Action, ChangeNotifier, Command, CommandError, CommandIntent, CommandStatus, DoorState,
    EngineError, QueueStatus, RunResult, RunState, StateStore,
};

/// Applies actions to run state and announces each change.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    store: StateStore,
    notifier: Arc<ChangeNotifier>,
}

impl ActionDispatcher {
    /// Create a dispatcher over a store and its notifier.
    pub fn new(store: StateStore, notifier: Arc<ChangeNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Shared state handle.
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// Notifier fired after every dispatch.
    pub const fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Apply an action, then notify exactly once.
    ///
    /// Never blocks on anything but the state lock and never fails.
    ///
    /// # Panics
    ///
    /// Panics if the action names a command that was never queued, or queues
    /// an ID twice. Either is a bug in whoever built the action, and carrying
    /// on would break command ordering. Subscribers called from the
    /// notification must not dispatch.
    pub fn dispatch(&self, action: Action) {
        let kind = action.kind();
        {
            let mut state = self.store.write();
            apply(&mut state, action);
        }
        debug!(action = kind, "action dispatched");
        self.notifier.notify();
    }

    /// Validate a control action and apply it under the same write lock.
    ///
    /// Nothing is applied or notified when validation fails.
    pub fn try_dispatch(&self, action: Action) -> Result<(), EngineError> {
        let kind = action.kind();
        {
            let mut state = self.store.write();
            state.validate_action_allowed(&action)?;
            if let Action::QueueCommand { command } = &action {
                if state.commands.contains(&command.id) {
                    return Err(EngineError::DuplicateId(command.id.clone()));
                }
            }
            apply(&mut state, action);
        }
        debug!(action = kind, "action dispatched");
        self.notifier.notify();
        Ok(())
    }

    /// Pick the next executable command and mark it running under one lock.
    ///
    /// Returns `Ok(None)` when nothing may execute now and
    /// [`EngineError::RunStopped`] once the run has a result. A `Stop`,
    /// `Pause` or door change from another thread lands wholly before or
    /// wholly after the claim, so a cancelled or paused command never starts.
    /// Notifies only when a command was claimed.
    pub fn claim_next(&self, started_at_ms: u128) -> Result<Option<Command>, EngineError> {
        let claimed = {
            let mut state = self.store.write();
            let Some(command_id) = state.get_next_to_execute()? else {
                return Ok(None);
            };
            apply(
                &mut state,
                Action::RunCommand {
                    command_id: command_id.clone(),
                    started_at_ms,
                },
            );
            state.commands.get(&command_id)?.command.clone()
        };
        debug!(command_id = %claimed.id, "action dispatched");
        self.notifier.notify();
        Ok(Some(claimed))
    }

    /// Apply a door change, calling `pause_hardware` first if it interrupts a
    /// running run.
    ///
    /// The check, the call and the change share one write lock, so a `Play`
    /// from another thread cannot start the run between them. `pause_hardware`
    /// runs with the state locked and must not read or dispatch. Returns
    /// whether `pause_hardware` was called.
    pub fn dispatch_door_change<F>(&self, door_state: DoorState, pause_hardware: F) -> bool
    where
        F: FnOnce(),
    {
        let paused = {
            let mut state = self.store.write();
            let pausing =
                door_state == DoorState::Open && state.block_on_door_open && state.get_is_running();
            if pausing {
                pause_hardware();
            }
            apply(&mut state, Action::DoorChange { door_state });
            pausing
        };
        debug!(action = "door_change", paused, "action dispatched");
        self.notifier.notify();
        paused
    }
}

fn fatal(action: &str, err: &EngineError) -> ! {
    panic!("invalid {action} action: {err}")
}

fn apply(state: &mut RunState, action: Action) {
    match action {
        Action::QueueCommand { command } => {
            let id = command.id.clone();
            let intent = command.intent;
            if let Err(e) = state.commands.add(command) {
                fatal("queue_command", &e);
            }
            let queued = match intent {
                CommandIntent::Protocol => state.commands.enqueue_main(&id),
                CommandIntent::Setup => state.commands.enqueue_setup(&id),
            };
            if let Err(e) = queued {
                fatal("queue_command", &e);
            }
        }
        Action::RunCommand {
            command_id,
            started_at_ms,
        } => {
            let mut command = match state.commands.get(&command_id) {
                Ok(entry) => entry.command.clone(),
                Err(e) => fatal("run_command", &e),
            };
            match command.intent {
                CommandIntent::Protocol if state.commands.queue_head() == Some(command_id.as_str()) => {
                    state.commands.dequeue_main();
                }
                CommandIntent::Setup
                    if state.commands.setup_queue_head() == Some(command_id.as_str()) =>
                {
                    state.commands.dequeue_setup();
                }
                _ => {
                    state.commands.remove_from_queue(&command_id);
                    state.commands.remove_from_setup_queue(&command_id);
                }
            }
            command.status = CommandStatus::Running;
            command.started_at_ms = Some(started_at_ms);
            replace(state, command, "run_command");
            state.commands.set_running(Some(command_id));
        }
        Action::SucceedCommand {
            command_id,
            result,
            completed_at_ms,
        } => {
            let mut command = match state.commands.get(&command_id) {
                Ok(entry) => entry.command.clone(),
                Err(e) => fatal("succeed_command", &e),
            };
            command.status = CommandStatus::Succeeded;
            command.result = result;
            command.completed_at_ms = Some(completed_at_ms);
            replace(state, command, "succeed_command");
            finish_running(state, &command_id);
        }
        Action::FailCommand {
            command_id,
            error,
            failed_at_ms,
        } => {
            let intent = match state.commands.get(&command_id) {
                Ok(entry) => entry.command.intent,
                Err(e) => fatal("fail_command", &e),
            };
            mark_failed(state, &command_id, Some(error), failed_at_ms);
            finish_running(state, &command_id);
            state.failed_command_id = Some(command_id);

            let cancelled: Vec<String> = match intent {
                CommandIntent::Setup => {
                    let ids = state.commands.setup_queue_ids().map(str::to_owned).collect();
                    state.commands.clear_setup_queue();
                    ids
                }
                CommandIntent::Protocol => {
                    let ids = state.commands.queue_ids().map(str::to_owned).collect();
                    state.commands.clear_queue();
                    ids
                }
            };
            for id in &cancelled {
                mark_failed(state, id, None, failed_at_ms);
            }
        }
        Action::Play => {
            if state.run_result.is_none() {
                state.queue_status = match state.queue_status {
                    QueueStatus::Setup if state.is_door_blocking => QueueStatus::Paused,
                    QueueStatus::Setup | QueueStatus::Paused | QueueStatus::Running => {
                        QueueStatus::Running
                    }
                };
                info!(status = ?state.queue_status, "run played");
            }
        }
        Action::Pause => {
            state.queue_status = QueueStatus::Paused;
            info!("run paused");
        }
        Action::Stop => {
            if state.run_result.is_none() {
                state.queue_status = QueueStatus::Paused;
                state.run_result = Some(RunResult::Stopped);
                cancel_all_queued(state);
                info!("run stopped");
            }
        }
        Action::Finish { error } => {
            if state.run_result.is_none() {
                state.queue_status = QueueStatus::Paused;
                state.run_result = Some(if error.is_some() {
                    RunResult::Failed
                } else {
                    RunResult::Succeeded
                });
                state.run_error = error;
                cancel_all_queued(state);
                info!(result = ?state.run_result, "run finished");
            }
        }
        Action::DoorChange { door_state } => {
            if state.block_on_door_open {
                match door_state {
                    DoorState::Open => {
                        state.is_door_blocking = true;
                        if state.queue_status == QueueStatus::Running {
                            state.queue_status = QueueStatus::Paused;
                            warn!("door opened, run paused");
                        }
                    }
                    DoorState::Closed => state.is_door_blocking = false,
                }
            }
        }
    }
}

fn replace(state: &mut RunState, command: Command, action: &str) {
    if let Err(e) = state.commands.replace(command) {
        fatal(action, &e);
    }
}

fn finish_running(state: &mut RunState, command_id: &str) {
    state.commands.remove_from_queue(command_id);
    state.commands.remove_from_setup_queue(command_id);
    if state.commands.get_running_id() == Some(command_id) {
        state.commands.set_running(None);
    }
}

fn mark_failed(state: &mut RunState, command_id: &str, error: Option<CommandError>, at_ms: u128) {
    let mut command = match state.commands.get(command_id) {
        Ok(entry) => entry.command.clone(),
        Err(e) => fatal("fail_command", &e),
    };
    command.status = CommandStatus::Failed;
    command.error = error;
    command.completed_at_ms = Some(at_ms);
    replace(state, command, "fail_command");
}

fn cancel_all_queued(state: &mut RunState) {
    let now = crate::util::clock::now_ms();
    let ids: Vec<String> = state
        .commands
        .setup_queue_ids()
        .chain(state.commands.queue_ids())
        .map(str::to_owned)
        .collect();
    state.commands.clear_setup_queue();
    state.commands.clear_queue();
    for id in &ids {
        mark_failed(state, id, None, now);
    }
}

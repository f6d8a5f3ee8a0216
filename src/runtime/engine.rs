//! Run engine façade.
//!
//! [`RunEngine`] owns the state store, the notifier and the run-scoped tip
//! racks, and hands out the components that drive a run: a
//! [`QueueWorker`](crate::runtime::QueueWorker) to execute commands and a
//! [`DoorWatcher`](crate::runtime::DoorWatcher) to follow the door.
//!
//! ```rust,ignore
//! use liquid_run_core::config::EngineConfig;
//! use liquid_run_core::core::{CommandRequest, DoorState};
//! use liquid_run_core::runtime::RunEngine;
//!
//! let engine = RunEngine::new(EngineConfig::default(), DoorState::Closed)?;
//! let worker = tokio::spawn(engine.queue_worker(my_executor).run());
//! let cmd = engine.add_command(CommandRequest::protocol(serde_json::json!({"op": "aspirate"})))?;
//! engine.play()?;
//! let done = engine.wait_for_command(&cmd.id).await?;
//! engine.finish(None)?;
//! ```

use std::sync::Arc;

use parking_lot::{MutexGuard, RwLockReadGuard};
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::core::{
    Action, ActionDispatcher, ChangeNotifier, Command, CommandError, CommandExecutor,
    CommandRequest, DoorState, EngineError, ExecutionContext, RunResult, RunState, Spawn,
    StateStore, TipResourceGrid,
};
use crate::runtime::{DoorWatcher, HardwareControl, QueueWorker};
use crate::util::clock::now_ms;

/// Name of the rack built from the configured geometry.
pub const DEFAULT_TIP_RACK: &str = "tiprack_1";

/// One protocol run.
#[derive(Debug, Clone)]
pub struct RunEngine {
    config: EngineConfig,
    dispatcher: ActionDispatcher,
    ctx: ExecutionContext,
}

impl RunEngine {
    /// Create a run with a single full rack of the configured geometry.
    pub fn new(config: EngineConfig, initial_door: DoorState) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let rack = config.tip_rack(DEFAULT_TIP_RACK)?;
        Self::with_tip_racks(config, initial_door, vec![rack])
    }

    /// Create a run over caller-supplied racks, in selection order.
    pub fn with_tip_racks(
        config: EngineConfig,
        initial_door: DoorState,
        tip_racks: Vec<TipResourceGrid>,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let store = StateStore::new(RunState::new(config.block_on_door_open, initial_door));
        let dispatcher = ActionDispatcher::new(store, Arc::new(ChangeNotifier::new()));
        info!(
            block_on_door_open = config.block_on_door_open,
            door_state = ?initial_door,
            racks = tip_racks.len(),
            "run engine created"
        );
        Ok(Self {
            config,
            dispatcher,
            ctx: ExecutionContext::new(tip_racks),
        })
    }

    /// Configuration the run was created with.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatcher for this run.
    pub const fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Shared state handle.
    pub const fn store(&self) -> &StateStore {
        self.dispatcher.store()
    }

    /// Notifier fired after every state change.
    pub const fn notifier(&self) -> &Arc<ChangeNotifier> {
        self.dispatcher.notifier()
    }

    /// Read access to the current state.
    pub fn state(&self) -> RwLockReadGuard<'_, RunState> {
        self.dispatcher.store().read()
    }

    /// Resources handed to executors.
    pub const fn execution_context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Exclusive access to the run's tip racks.
    pub fn tips(&self) -> MutexGuard<'_, Vec<TipResourceGrid>> {
        self.ctx.tip_racks.lock()
    }

    /// Queue a command and return it as recorded.
    ///
    /// A missing ID is generated. Fails if the ID is taken, if the run has
    /// stopped, or if a setup command arrives after the run started.
    pub fn add_command(&self, request: CommandRequest) -> Result<Command, EngineError> {
        let id = request.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let command = Command::queued(id, request.key, request.intent, request.payload, now_ms());
        self.dispatcher.try_dispatch(Action::QueueCommand {
            command: command.clone(),
        })?;
        info!(command_id = %command.id, intent = ?command.intent, "command queued");
        Ok(command)
    }

    /// Start or resume the run.
    pub fn play(&self) -> Result<(), EngineError> {
        self.dispatcher.try_dispatch(Action::Play)
    }

    /// Pause the run after the current command.
    pub fn pause(&self) -> Result<(), EngineError> {
        self.dispatcher.try_dispatch(Action::Pause)
    }

    /// Stop the run, cancelling everything still queued.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.dispatcher.try_dispatch(Action::Stop)
    }

    /// Finish the run, failed if an error is given.
    pub fn finish(&self, error: Option<CommandError>) -> Result<(), EngineError> {
        self.dispatcher.try_dispatch(Action::Finish { error })
    }

    /// Wait until a command reaches a terminal status and return it.
    pub async fn wait_for_command(&self, command_id: &str) -> Result<Command, EngineError> {
        loop {
            let changed = self.notifier().wait();
            {
                let state = self.state();
                let entry = state.commands().get(command_id)?;
                if entry.command.status.is_terminal() {
                    return Ok(entry.command.clone());
                }
            }
            changed.await;
        }
    }

    /// Wait until the run has a result.
    pub async fn wait_for_result(&self) -> RunResult {
        loop {
            let changed = self.notifier().wait();
            if let Some(result) = self.state().run_result() {
                return result;
            }
            changed.await;
        }
    }

    /// A worker that executes this run's commands.
    pub fn queue_worker<E: CommandExecutor>(&self, executor: E) -> QueueWorker<E> {
        QueueWorker::new(self.dispatcher.clone(), executor, self.ctx.clone())
    }

    /// A stopped door watcher bound to this run.
    pub fn door_watcher<S: Spawn>(
        &self,
        hardware: Arc<dyn HardwareControl>,
        spawner: S,
    ) -> DoorWatcher<S> {
        DoorWatcher::new(hardware, self.dispatcher.clone(), spawner)
            .with_handoff_capacity(self.config.handoff_capacity)
    }
}

//! Command queue, change notification, tip tracking and state dispatch.

pub mod actions;
pub mod command;
pub mod command_queue;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod state;
pub mod tip_grid;

pub use actions::{Action, DoorState};
pub use command::{Command, CommandError, CommandIntent, CommandRequest, CommandStatus};
pub use command_queue::{CommandEntry, CommandQueue};
pub use dispatcher::ActionDispatcher;
pub use error::{AppResult, EngineError};
pub use executor::{CommandExecutor, ExecutionContext, Spawn};
pub use notifier::{ChangeNotifier, Subscription};
pub use state::{CommandSlice, EngineStatus, QueueStatus, RunResult, RunState, StateStore};
pub use tip_grid::{select_tiprack_from_list, TipResourceGrid, WellSlot};

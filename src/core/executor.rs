//! Command execution and task spawning abstractions.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{Command, CommandError, TipResourceGrid};

/// Run-scoped resources an executor may touch while a command runs.
///
/// Only the command currently running holds the tip lock, since at most one
/// command runs at a time.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Tip racks available to the run, in selection order.
    pub tip_racks: Arc<Mutex<Vec<TipResourceGrid>>>,
}

impl ExecutionContext {
    /// Context over the given racks.
    pub fn new(tip_racks: Vec<TipResourceGrid>) -> Self {
        Self {
            tip_racks: Arc::new(Mutex::new(tip_racks)),
        }
    }
}

/// Executes the opaque payload of a command.
///
/// The run loop treats every command as a black box: it hands the executor the
/// command and records whatever comes back. Tip-handling executors reserve or
/// release slots through the [`ExecutionContext`] before returning.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use liquid_run_core::core::{Command, CommandError, CommandExecutor, ExecutionContext};
///
/// #[derive(Clone)]
/// struct Echo;
///
/// #[async_trait]
/// impl CommandExecutor for Echo {
///     async fn execute(
///         &self,
///         command: &Command,
///         _ctx: &ExecutionContext,
///     ) -> Result<Option<serde_json::Value>, CommandError> {
///         Ok(Some(command.payload.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait CommandExecutor: Send + Sync + Clone + 'static {
    /// Execute one command and return its result or failure.
    async fn execute(
        &self,
        command: &Command,
        ctx: &ExecutionContext,
    ) -> Result<Option<serde_json::Value>, CommandError>;
}

/// Abstraction for spawning work on a runtime.
pub trait Spawn {
    /// Spawn a future that runs to completion in the background.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

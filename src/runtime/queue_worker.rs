//! The run loop: pull the next executable command, run it, record the outcome.

use tracing::{debug, error, info};

use crate::core::{
    Action, ActionDispatcher, Command, CommandExecutor, CommandIntent, EngineError,
    ExecutionContext, RunResult,
};
use crate::util::clock::now_ms;

/// Drives queued commands through a [`CommandExecutor`], one at a time.
///
/// The loop sleeps on the change notifier while nothing is executable. A
/// failed protocol command finishes the run with that command's error. The
/// loop returns once the run has a result.
#[derive(Debug, Clone)]
pub struct QueueWorker<E> {
    dispatcher: ActionDispatcher,
    executor: E,
    ctx: ExecutionContext,
}

impl<E: CommandExecutor> QueueWorker<E> {
    /// Create a worker over a dispatcher, executor and execution context.
    pub fn new(dispatcher: ActionDispatcher, executor: E, ctx: ExecutionContext) -> Self {
        Self {
            dispatcher,
            executor,
            ctx,
        }
    }

    /// Run until the run has a result, then return it.
    pub async fn run(self) -> Option<RunResult> {
        info!("queue worker started");
        loop {
            // Subscribe before claiming so a change made in between still wakes us.
            let changed = self.dispatcher.notifier().wait();
            match self.dispatcher.claim_next(now_ms()) {
                Ok(Some(command)) => self.execute(command).await,
                Ok(None) => changed.await,
                Err(EngineError::RunStopped) => break,
                Err(e) => {
                    error!(error = %e, "queue worker cannot claim next command");
                    break;
                }
            }
        }
        let result = self.dispatcher.store().read().run_result();
        info!(result = ?result, "queue worker exited");
        result
    }

    async fn execute(&self, command: Command) {
        debug!(command_id = %command.id, intent = ?command.intent, "command running");

        match self.executor.execute(&command, &self.ctx).await {
            Ok(result) => {
                self.dispatcher.dispatch(Action::SucceedCommand {
                    command_id: command.id.clone(),
                    result,
                    completed_at_ms: now_ms(),
                });
                info!(command_id = %command.id, "command succeeded");
            }
            Err(failure) => {
                error!(
                    command_id = %command.id,
                    error_type = %failure.error_type,
                    detail = %failure.detail,
                    "command failed"
                );
                self.dispatcher.dispatch(Action::FailCommand {
                    command_id: command.id.clone(),
                    error: failure.clone(),
                    failed_at_ms: now_ms(),
                });
                if command.intent == CommandIntent::Protocol {
                    self.dispatcher.dispatch(Action::Finish {
                        error: Some(failure),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use parking_lot::Mutex;

    use crate::core::{ChangeNotifier, CommandError, CommandStatus, DoorState, RunState, StateStore};

    /// Fails any command whose payload is `"fail"`, echoes the rest.
    #[derive(Debug, Clone)]
    struct Scripted;

    #[async_trait]
    impl CommandExecutor for Scripted {
        async fn execute(
            &self,
            command: &Command,
            _ctx: &ExecutionContext,
        ) -> Result<Option<serde_json::Value>, CommandError> {
            if command.payload == serde_json::json!("fail") {
                return Err(CommandError::new("Scripted", "asked to fail"));
            }
            Ok(Some(command.payload.clone()))
        }
    }

    /// Records what it ran and stops the run from inside the first command.
    #[derive(Debug, Clone)]
    struct StopsMidRun {
        dispatcher: ActionDispatcher,
        ran: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CommandExecutor for StopsMidRun {
        async fn execute(
            &self,
            command: &Command,
            _ctx: &ExecutionContext,
        ) -> Result<Option<serde_json::Value>, CommandError> {
            self.ran.lock().push(command.id.clone());
            self.dispatcher.dispatch(Action::Stop);
            Ok(None)
        }
    }

    fn worker() -> (ActionDispatcher, QueueWorker<Scripted>) {
        let d = ActionDispatcher::new(
            StateStore::new(RunState::new(false, DoorState::Closed)),
            Arc::new(ChangeNotifier::new()),
        );
        let w = QueueWorker::new(d.clone(), Scripted, ExecutionContext::new(Vec::new()));
        (d, w)
    }

    fn queue(d: &ActionDispatcher, id: &str, payload: serde_json::Value) {
        d.dispatch(Action::QueueCommand {
            command: Command::queued(id, None, CommandIntent::Protocol, payload, 0),
        });
    }

    #[tokio::test]
    async fn test_runs_queue_then_stops_on_finish() {
        let (d, w) = worker();
        queue(&d, "a", serde_json::json!(1));
        queue(&d, "b", serde_json::json!(2));
        let handle = tokio::spawn(w.run());

        d.dispatch(Action::Play);
        loop {
            let wait = d.notifier().wait();
            if d.store().read().commands().get("b").unwrap().command.status.is_terminal() {
                break;
            }
            wait.await;
        }
        d.dispatch(Action::Finish { error: None });

        assert_eq!(handle.await.unwrap(), Some(RunResult::Succeeded));
        let state = d.store().read();
        assert_eq!(state.commands().get("a").unwrap().command.result, Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn test_protocol_failure_finishes_run() {
        let (d, w) = worker();
        queue(&d, "a", serde_json::json!("fail"));
        queue(&d, "b", serde_json::json!(2));
        d.dispatch(Action::Play);

        assert_eq!(w.run().await, Some(RunResult::Failed));
        let state = d.store().read();
        assert_eq!(state.run_error().unwrap().error_type, "Scripted");
        assert_eq!(state.commands().get("b").unwrap().command.status, CommandStatus::Failed);
    }

    #[tokio::test]
    async fn test_commands_cancelled_by_stop_never_run() {
        let (d, _) = worker();
        for id in ["a", "b", "c"] {
            queue(&d, id, serde_json::json!(null));
        }
        let ran = Arc::new(Mutex::new(Vec::new()));
        let executor = StopsMidRun {
            dispatcher: d.clone(),
            ran: Arc::clone(&ran),
        };
        d.dispatch(Action::Play);

        let w = QueueWorker::new(d.clone(), executor, ExecutionContext::new(Vec::new()));
        assert_eq!(w.run().await, Some(RunResult::Stopped));

        assert_eq!(ran.lock().as_slice(), ["a"]);
        let state = d.store().read();
        assert_eq!(state.commands().get("a").unwrap().command.status, CommandStatus::Succeeded);
        for id in ["b", "c"] {
            let cmd = &state.commands().get(id).unwrap().command;
            assert_eq!(cmd.status, CommandStatus::Failed);
            assert!(cmd.started_at_ms.is_none());
        }
    }
}

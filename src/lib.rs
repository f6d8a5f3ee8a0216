//! # Liquid Run Core
//!
//! The run-time core of a liquid-handling robot controller.
//!
//! A protocol run is a stream of commands executed one at a time while
//! operators play, pause and stop the run and the robot's door opens and
//! closes. This crate provides the pieces that keep that stream consistent
//! across threads:
//!
//! - **Command queue**: an insertion-ordered history of every command, with a
//!   main FIFO for protocol commands and a setup FIFO for setup commands.
//! - **Change notifier**: a generation-counted broadcast. Async waiters,
//!   blocking waiters and synchronous subscribers all observe every change
//!   made after they started waiting.
//! - **Action dispatcher**: the single writer of run state. Every mutation is
//!   an [`Action`](core::Action) applied under a write lock, followed by
//!   exactly one notification.
//! - **Door watcher**: bridges door events from the hardware's own thread into
//!   run state, pausing the hardware first when an open door must stop motion.
//! - **Tip grids**: per-rack occupancy used to pick up and return tips in
//!   contiguous column runs.
//!
//! ## Running a protocol
//!
//! ```rust,ignore
//! use liquid_run_core::config::EngineConfig;
//! use liquid_run_core::core::{CommandRequest, DoorState};
//! use liquid_run_core::runtime::{RunEngine, TokioSpawner};
//!
//! liquid_run_core::util::init_tracing();
//!
//! let engine = RunEngine::new(EngineConfig::from_env()?, DoorState::Closed)?;
//! let watcher = engine.door_watcher(hardware.clone(), TokioSpawner::current());
//! watcher.start();
//!
//! let worker = tokio::spawn(engine.queue_worker(executor).run());
//! for step in protocol {
//!     engine.add_command(CommandRequest::protocol(step))?;
//! }
//! engine.play()?;
//! ```
//!
//! ## Door interlock
//!
//! With `block_on_door_open` set, opening the door while the run is playing
//! pauses the hardware and then the run. Closing the door clears the block but
//! never resumes the run; an operator must play again.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Command records, queue, notifier, tip grids and run state.
pub mod core;
/// Run configuration.
pub mod config;
/// Door watcher, queue worker, engine façade and spawners.
pub mod runtime;
/// Shared utilities.
pub mod util;

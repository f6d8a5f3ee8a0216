//! Run configuration models.

pub mod engine;

pub use engine::EngineConfig;

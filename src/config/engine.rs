//! Engine configuration: door interlock policy and default rack geometry.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::tip_grid::MAX_ROWS;
use crate::core::{AppResult, EngineError, TipResourceGrid};

const ENV_BLOCK_ON_DOOR_OPEN: &str = "LIQUID_RUN_BLOCK_ON_DOOR_OPEN";
const ENV_TIP_RACK_ROWS: &str = "LIQUID_RUN_TIP_RACK_ROWS";
const ENV_TIP_RACK_COLUMNS: &str = "LIQUID_RUN_TIP_RACK_COLUMNS";
const ENV_HANDOFF_CAPACITY: &str = "LIQUID_RUN_HANDOFF_CAPACITY";

/// Run configuration, read-only to the core once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pause the run when the door opens.
    pub block_on_door_open: bool,
    /// Rows of a default tip rack.
    pub tip_rack_rows: usize,
    /// Columns of a default tip rack.
    pub tip_rack_columns: usize,
    /// Bound of the hardware-to-engine door event channel.
    pub handoff_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_on_door_open: false,
            tip_rack_rows: 8,
            tip_rack_columns: 12,
            handoff_capacity: 1,
        }
    }
}

impl EngineConfig {
    /// Defaults with the door interlock switched on or off.
    #[must_use]
    pub const fn with_block_on_door_open(mut self, block: bool) -> Self {
        self.block_on_door_open = block;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.tip_rack_rows == 0 || self.tip_rack_rows > MAX_ROWS {
            return Err(format!("tip_rack_rows must be between 1 and {MAX_ROWS}"));
        }
        if self.tip_rack_columns == 0 {
            return Err("tip_rack_columns must be greater than 0".into());
        }
        if self.handoff_capacity == 0 {
            return Err("handoff_capacity must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment, reading `.env` first if present.
    ///
    /// Unset variables keep their defaults; unparseable ones are an error.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Some(v) = env_var(ENV_BLOCK_ON_DOOR_OPEN) {
            cfg.block_on_door_open = v
                .parse()
                .with_context(|| format!("{ENV_BLOCK_ON_DOOR_OPEN}={v} is not a bool"))?;
        }
        if let Some(v) = env_var(ENV_TIP_RACK_ROWS) {
            cfg.tip_rack_rows = v
                .parse()
                .with_context(|| format!("{ENV_TIP_RACK_ROWS}={v} is not a number"))?;
        }
        if let Some(v) = env_var(ENV_TIP_RACK_COLUMNS) {
            cfg.tip_rack_columns = v
                .parse()
                .with_context(|| format!("{ENV_TIP_RACK_COLUMNS}={v} is not a number"))?;
        }
        if let Some(v) = env_var(ENV_HANDOFF_CAPACITY) {
            cfg.handoff_capacity = v
                .parse()
                .with_context(|| format!("{ENV_HANDOFF_CAPACITY}={v} is not a number"))?;
        }

        cfg.validate().map_err(EngineError::InvalidConfig)?;
        Ok(cfg)
    }

    /// Build a full rack with the configured geometry.
    pub fn tip_rack(&self, name: impl Into<String>) -> Result<TipResourceGrid, EngineError> {
        TipResourceGrid::new(name, self.tip_rack_rows, self.tip_rack_columns)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

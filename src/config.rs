//! Configuration loading and management
//!
//! Handles parsing of `config.toml` in the data directory.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// User configuration
    #[serde(default)]
    pub user: UserConfig,

    /// Daily planner configuration
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Recovery configuration
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// User-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// User assumed when none is given or persisted
    #[serde(default = "default_user")]
    pub default: String,
}

fn default_user() -> String {
    "me".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            default: default_user(),
        }
    }
}

/// Daily planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Minutes available today when `suggest` is run without `--minutes`
    #[serde(default = "default_available_minutes")]
    pub available_minutes: u32,

    /// Hour of day (local) assigned to rescheduled tasks
    #[serde(default = "default_slot_hour")]
    pub slot_hour: u32,
}

fn default_available_minutes() -> u32 {
    240
}

fn default_slot_hour() -> u32 {
    9
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            available_minutes: default_available_minutes(),
            slot_hour: default_slot_hour(),
        }
    }
}

/// Order in which overdue tasks are fed to the recovery engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOrder {
    /// Priority descending, then oldest due date first
    #[default]
    Priority,
    /// Whatever order the task store returned
    Input,
}

/// Which plan proposer builds recovery plans.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProposerKind {
    #[default]
    Builtin,
    Command,
}

/// Recovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default)]
    pub order: RecoveryOrder,

    #[serde(default)]
    pub proposer: ProposerKind,

    /// Program and arguments for the command proposer
    #[serde(default)]
    pub command: Vec<String>,

    /// Seconds the command proposer may run before it is killed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            order: RecoveryOrder::default(),
            proposer: ProposerKind::default(),
            command: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data directory, or return defaults when
    /// the file is missing.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(crate::storage::CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.user.default.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "user.default cannot be empty".to_string(),
            ));
        }

        if self.planner.slot_hour > 23 {
            return Err(Error::InvalidConfig(format!(
                "planner.slot_hour must be 0-23, got {}",
                self.planner.slot_hour
            )));
        }

        if self.recovery.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "recovery.timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.recovery.proposer == ProposerKind::Command {
            let program = self.recovery.command.first().map(|s| s.trim());
            if program.map(str::is_empty).unwrap_or(true) {
                return Err(Error::InvalidConfig(
                    "recovery.command is required when recovery.proposer = \"command\""
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}

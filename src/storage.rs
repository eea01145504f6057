//! Storage layer for dayplan
//!
//! All state lives in a single data directory.
//!
//! # Directory Structure
//!
//! ```text
//! <data-dir>/
//!   config.toml            # Optional configuration
//!   user                   # Persisted current user
//!   tasks.jsonl            # Task event log (append-only)
//!   tasks.snapshot.json    # Materialized task list
//!   plans.jsonl            # Committed plan history
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Directory used when nothing else names one.
pub const FALLBACK_DIR: &str = ".dayplan";

/// Environment variable naming the data directory.
pub const DIR_ENV: &str = "DAYPLAN_DIR";

pub const CONFIG_FILE: &str = "config.toml";
const USER_FILE: &str = "user";
const TASKS_LOG: &str = "tasks.jsonl";
const TASKS_SNAPSHOT: &str = "tasks.snapshot.json";
const PLANS_LOG: &str = "plans.jsonl";

/// Storage manager for the dayplan data directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the data directory: explicit path, `DAYPLAN_DIR`, the platform
    /// data directory, then `./.dayplan`.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::new(path);
        }

        if let Ok(value) = std::env::var(DIR_ENV) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Self::new(trimmed);
            }
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "dayplan") {
            return Self::new(dirs.data_dir());
        }

        Self::new(FALLBACK_DIR)
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn user_file(&self) -> PathBuf {
        self.root.join(USER_FILE)
    }

    pub fn tasks_log(&self) -> PathBuf {
        self.root.join(TASKS_LOG)
    }

    pub fn tasks_snapshot(&self) -> PathBuf {
        self.root.join(TASKS_SNAPSHOT)
    }

    pub fn plans_log(&self) -> PathBuf {
        self.root.join(PLANS_LOG)
    }

    /// Create the data directory if it does not exist yet.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.root.is_dir()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON via temp file + rename so readers never see a partial file.
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_atomic(path, json.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Append one record to a JSONL file. Callers hold the file's lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        writeln!(file, "{}", json)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every record of a JSONL file; a missing file reads as empty.
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    // =========================================================================
    // User persistence
    // =========================================================================

    pub fn read_user(&self) -> Option<String> {
        fs::read_to_string(self.user_file())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn write_user(&self, user: &str) -> Result<()> {
        self.init()?;
        self.write_atomic(&self.user_file(), format!("{user}\n").as_bytes())
    }
}

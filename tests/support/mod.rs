#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Date every CLI test treats as today.
pub const TODAY: &str = "2026-10-16";

pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join("config.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// `dayplan` pinned to this data dir and [`TODAY`], with the ambient
    /// environment cleared.
    pub fn cmd(&self) -> Command {
        let mut cmd = dayplan_cmd();
        cmd.env_remove("DAYPLAN_DIR")
            .env_remove("DAYPLAN_USER")
            .env_remove("DAYPLAN_TODAY")
            .env_remove("RUST_LOG")
            .arg("--dir")
            .arg(self.path())
            .arg("--as-of")
            .arg(TODAY);
        cmd
    }

    /// Run with `--json`, assert success and return the `data` payload.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let envelope: Value = serde_json::from_slice(&output).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    /// Add a task and return its id.
    pub fn add_task(&self, title: &str, goal: &str, extra: &[&str]) -> String {
        let mut args = vec!["task", "add", title, "--goal", goal];
        args.extend_from_slice(extra);
        let data = self.json(&args);
        data["id"].as_str().expect("task id").to_string()
    }

    /// Due date of one task, from `task list --all`.
    pub fn due_date(&self, id: &str) -> Option<i64> {
        let data = self.json(&["task", "list", "--all"]);
        data["tasks"]
            .as_array()
            .expect("tasks array")
            .iter()
            .find(|task| task["id"] == id)
            .and_then(|task| task["due_date"].as_i64())
    }
}

pub fn dayplan_cmd() -> Command {
    Command::cargo_bin("dayplan").expect("binary")
}

pub fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|task| task["id"].as_str().expect("id").to_string())
        .collect()
}

//! Task storage.
//!
//! The schedulers only need a small contract from storage: list a user's
//! tasks and patch due dates. [`TaskStore`] is that contract.
//! [`FileTaskStore`] keeps tasks as append-only events in `tasks.jsonl`
//! with a materialized `tasks.snapshot.json`; [`MemoryTaskStore`] keeps
//! them in a vector for tests and embedders.

use std::fs;
use std::io;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::lock::with_lock;
use crate::storage::Storage;
use crate::task::Task;

const TASKS_SCHEMA_VERSION: &str = "dayplan.tasks.v1";

/// A new due date for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub task_id: String,
    pub new_date: i64,
}

impl Reassignment {
    pub fn new(task_id: impl Into<String>, new_date: i64) -> Self {
        Self {
            task_id: task_id.into(),
            new_date,
        }
    }
}

/// Storage contract consumed by the planner.
pub trait TaskStore {
    /// Every task owned by `user_id`, in store order.
    fn list_for_user(&self, user_id: &str) -> Result<Vec<Task>>;

    fn list_incomplete_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let mut tasks = self.list_for_user(user_id)?;
        tasks.retain(|task| !task.completed);
        Ok(tasks)
    }

    fn get(&self, task_id: &str) -> Result<Task>;

    fn insert(&self, task: Task) -> Result<()>;

    fn set_completed(&self, task_id: &str, completed: bool) -> Result<Task>;

    fn patch_due_date(&self, task_id: &str, new_date: i64) -> Result<()>;

    /// Apply reassignments in order, stopping at the first failure.
    ///
    /// Patches applied before the failure stay applied.
    fn patch_many(&self, reassignments: &[Reassignment]) -> Result<usize> {
        for reassignment in reassignments {
            self.patch_due_date(&reassignment.task_id, reassignment.new_date)?;
        }
        Ok(reassignments.len())
    }
}

/// Resolve a full or prefix task id (with or without the `t-` prefix) among
/// a user's tasks.
pub fn resolve_task_id(store: &dyn TaskStore, user_id: &str, input: &str) -> Result<String> {
    let needle = input.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }
    let bare = needle.strip_prefix("t-").unwrap_or(needle.as_str());

    let tasks = store.list_for_user(user_id)?;
    if let Some(task) = tasks.iter().find(|task| task.id.to_ascii_lowercase() == needle) {
        return Ok(task.id.clone());
    }

    let mut matches: Vec<String> = tasks
        .iter()
        .filter(|task| {
            let id = task.id.to_ascii_lowercase();
            id.strip_prefix("t-").unwrap_or(id.as_str()).starts_with(bare)
        })
        .map(|task| task.id.clone())
        .collect();

    match matches.len() {
        0 => Err(Error::TaskNotFound(input.trim().to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::InvalidArgument(format!(
            "ambiguous task id '{}': {}",
            input.trim(),
            matches.join(", ")
        ))),
    }
}

// =============================================================================
// File-backed store
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventType {
    TaskCreated,
    TaskDueDateChanged,
    TaskCompleted,
    TaskReopened,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_id: String,
    pub task_id: String,
    #[serde(rename = "type")]
    pub event_type: TaskEventType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
}

impl TaskEvent {
    pub fn new(event_type: TaskEventType, task_id: impl Into<String>) -> Self {
        Self {
            event_id: Ulid::new().to_string(),
            task_id: task_id.into(),
            event_type,
            timestamp: Utc::now(),
            task: None,
            due_date: None,
        }
    }

    fn created(task: Task) -> Self {
        let mut event = Self::new(TaskEventType::TaskCreated, task.id.clone());
        event.task = Some(task);
        event
    }

    fn due_date_changed(task_id: &str, due_date: i64) -> Self {
        let mut event = Self::new(TaskEventType::TaskDueDateChanged, task_id);
        event.due_date = Some(due_date);
        event
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl TaskSnapshot {
    pub fn empty() -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            tasks: Vec::new(),
        }
    }
}

/// Event-sourced task store in the data directory.
#[derive(Debug, Clone)]
pub struct FileTaskStore {
    storage: Storage,
}

impl FileTaskStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Regenerate the snapshot from the event log.
    pub fn rebuild(&self) -> Result<TaskSnapshot> {
        let log = self.storage.tasks_log();
        with_lock(&log, || {
            let events: Vec<TaskEvent> = self.storage.read_jsonl(&log)?;
            let snapshot = build_snapshot(&events)?;
            self.storage
                .write_json(&self.storage.tasks_snapshot(), &snapshot)?;
            Ok(snapshot)
        })
    }

    pub fn events(&self) -> Result<Vec<TaskEvent>> {
        self.storage.read_jsonl(&self.storage.tasks_log())
    }

    fn snapshot(&self) -> Result<TaskSnapshot> {
        let path = self.storage.tasks_snapshot();
        if path.exists() {
            return self.storage.read_json(&path);
        }
        let events = self.events()?;
        build_snapshot(&events)
    }

    /// Drop the snapshot so the next read replays the log.
    fn discard_snapshot(&self) {
        let path = self.storage.tasks_snapshot();
        match fs::remove_file(&path) {
            Ok(()) => tracing::warn!(path = %path.display(), "snapshot discarded after failed append"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "could not discard snapshot"),
        }
    }

    /// Append events as one locked batch.
    ///
    /// Each event is validated against the current snapshot before it is
    /// written. The first invalid event stops the batch; events already
    /// written stay written. If writing to the log fails, the snapshot is
    /// discarded instead.
    fn append_events(&self, events: Vec<TaskEvent>) -> Result<TaskSnapshot> {
        let log = self.storage.tasks_log();
        with_lock(&log, || {
            let mut snapshot = self.snapshot()?;
            let mut outcome = Ok(());
            for event in events {
                if let Err(err) = apply_event(&mut snapshot.tasks, &event) {
                    outcome = Err(err);
                    break;
                }
                if let Err(err) = self.storage.append_jsonl(&log, &event) {
                    self.discard_snapshot();
                    return Err(err);
                }
                tracing::debug!(task = %event.task_id, kind = ?event.event_type, "task event appended");
            }
            snapshot.generated_at = Utc::now();
            self.storage
                .write_json(&self.storage.tasks_snapshot(), &snapshot)?;
            outcome.map(|_| snapshot)
        })
    }
}

impl TaskStore for FileTaskStore {
    fn list_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .tasks
            .into_iter()
            .filter(|task| task.user_id == user_id)
            .collect())
    }

    fn get(&self, task_id: &str) -> Result<Task> {
        self.snapshot()?
            .tasks
            .into_iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    fn insert(&self, task: Task) -> Result<()> {
        self.append_events(vec![TaskEvent::created(task)])?;
        Ok(())
    }

    fn set_completed(&self, task_id: &str, completed: bool) -> Result<Task> {
        let event_type = if completed {
            TaskEventType::TaskCompleted
        } else {
            TaskEventType::TaskReopened
        };
        let snapshot = self.append_events(vec![TaskEvent::new(event_type, task_id)])?;
        snapshot
            .tasks
            .into_iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    fn patch_due_date(&self, task_id: &str, new_date: i64) -> Result<()> {
        self.append_events(vec![TaskEvent::due_date_changed(task_id, new_date)])?;
        Ok(())
    }

    fn patch_many(&self, reassignments: &[Reassignment]) -> Result<usize> {
        if reassignments.is_empty() {
            return Ok(0);
        }
        let events = reassignments
            .iter()
            .map(|r| TaskEvent::due_date_changed(&r.task_id, r.new_date))
            .collect();
        self.append_events(events)?;
        Ok(reassignments.len())
    }
}

fn build_snapshot(events: &[TaskEvent]) -> Result<TaskSnapshot> {
    let mut snapshot = TaskSnapshot::empty();
    for event in events {
        apply_event(&mut snapshot.tasks, event)?;
    }
    Ok(snapshot)
}

fn apply_event(tasks: &mut Vec<Task>, event: &TaskEvent) -> Result<()> {
    if event.event_type == TaskEventType::TaskCreated {
        let mut task = event.task.clone().ok_or_else(|| {
            Error::OperationFailed(format!("task event {} has no task body", event.event_id))
        })?;
        if tasks.iter().any(|existing| existing.id == event.task_id) {
            return Err(Error::InvalidArgument(format!(
                "task already exists: {}",
                event.task_id
            )));
        }
        task.id = event.task_id.clone();
        tasks.push(task);
        return Ok(());
    }

    let task = tasks
        .iter_mut()
        .find(|task| task.id == event.task_id)
        .ok_or_else(|| Error::TaskNotFound(event.task_id.clone()))?;

    match event.event_type {
        TaskEventType::TaskCreated => {}
        TaskEventType::TaskDueDateChanged => {
            task.due_date = event.due_date;
        }
        TaskEventType::TaskCompleted => {
            task.completed = true;
        }
        TaskEventType::TaskReopened => {
            task.completed = false;
        }
    }
    task.updated_at = event.timestamp;
    Ok(())
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks.into_iter().collect()),
        }
    }

    pub fn all(&self) -> Vec<Task> {
        self.guard().clone()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<F>(&self, task_id: &str, f: F) -> Result<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.guard();
        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        f(task);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }
}

impl TaskStore for MemoryTaskStore {
    fn list_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .guard()
            .iter()
            .filter(|task| task.user_id == user_id)
            .cloned()
            .collect())
    }

    fn get(&self, task_id: &str) -> Result<Task> {
        self.guard()
            .iter()
            .find(|task| task.id == task_id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    fn insert(&self, task: Task) -> Result<()> {
        let mut tasks = self.guard();
        if tasks.iter().any(|existing| existing.id == task.id) {
            return Err(Error::InvalidArgument(format!(
                "task already exists: {}",
                task.id
            )));
        }
        tasks.push(task);
        Ok(())
    }

    fn set_completed(&self, task_id: &str, completed: bool) -> Result<Task> {
        self.update(task_id, |task| task.completed = completed)
    }

    fn patch_due_date(&self, task_id: &str, new_date: i64) -> Result<()> {
        self.update(task_id, |task| task.due_date = Some(new_date))?;
        Ok(())
    }
}

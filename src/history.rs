//! Record of applied plans.
//!
//! Every committed plan and every applied recovery is appended to
//! `plans.jsonl` so a user can see when and how their schedule was changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::lock::with_lock;
use crate::storage::Storage;
use crate::store::Reassignment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Commit,
    Recovery,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::Commit => "commit",
            PlanKind::Recovery => "recovery",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: Uuid,
    pub kind: PlanKind,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub moves: Vec<Reassignment>,
}

impl PlanRecord {
    pub fn new(kind: PlanKind, user: impl Into<String>, moves: Vec<Reassignment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            user: user.into(),
            created_at: Utc::now(),
            moves,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanHistory {
    storage: Storage,
}

impl PlanHistory {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn append(&self, record: &PlanRecord) -> Result<()> {
        let path = self.storage.plans_log();
        with_lock(&path, || self.storage.append_jsonl(&path, record))?;
        tracing::debug!(id = %record.id, kind = record.kind.as_str(), moves = record.moves.len(), "plan recorded");
        Ok(())
    }

    /// Records for `user`, newest first.
    pub fn list(&self, user: &str, limit: Option<usize>) -> Result<Vec<PlanRecord>> {
        let mut records: Vec<PlanRecord> = self.storage.read_jsonl(&self.storage.plans_log())?;
        records.retain(|record| record.user == user);
        records.reverse();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_newest_first_per_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let history = PlanHistory::new(Storage::new(dir.path()));

        let first = PlanRecord::new(PlanKind::Commit, "ada", vec![Reassignment::new("t-a", 1)]);
        let other = PlanRecord::new(PlanKind::Commit, "bob", Vec::new());
        let second = PlanRecord::new(PlanKind::Recovery, "ada", vec![Reassignment::new("t-b", 2)]);
        for record in [&first, &other, &second] {
            history.append(record).expect("append");
        }

        let listed = history.list("ada", None).expect("list");
        let ids: Vec<Uuid> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(listed[0].kind, PlanKind::Recovery);

        let limited = history.list("ada", Some(1)).expect("list");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].moves[0].task_id, "t-b");
    }

    #[test]
    fn missing_log_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let history = PlanHistory::new(Storage::new(dir.path()));
        assert!(history.list("ada", None).expect("list").is_empty());
    }
}

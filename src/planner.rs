//! Caller-facing planning operations.
//!
//! [`Planner`] wires a [`TaskStore`] to the schedulers. Reads never mutate;
//! `commit_plan` and a non-dry `recover_schedule` write due dates back in a
//! single batch and record the change in the plan history when one is
//! attached.

use serde::Serialize;

use crate::bucket::{suggest, BucketPlan};
use crate::config::{Config, RecoveryOrder};
use crate::drift::{drift_metrics, DriftMetrics};
use crate::error::Result;
use crate::history::{PlanHistory, PlanKind, PlanRecord};
use crate::recovery::{PlanProposer, RecoveryEngine, RecoveryOutcome};
use crate::store::{Reassignment, TaskStore};

/// Result of a commit.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub today: usize,
    pub tomorrow: usize,
    pub moves: Vec<Reassignment>,
}

pub struct Planner<'a> {
    store: &'a dyn TaskStore,
    history: Option<PlanHistory>,
    order: RecoveryOrder,
    slot_hour: u32,
}

impl<'a> Planner<'a> {
    pub fn new(store: &'a dyn TaskStore) -> Self {
        let defaults = Config::default();
        Self {
            store,
            history: None,
            order: defaults.recovery.order,
            slot_hour: defaults.planner.slot_hour,
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.order = config.recovery.order;
        self.slot_hour = config.planner.slot_hour;
        self
    }

    pub fn with_history(mut self, history: PlanHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Split today's work into planned and overflow buckets.
    pub fn get_suggestion(
        &self,
        user_id: &str,
        available_minutes: u32,
        today_start: i64,
    ) -> Result<BucketPlan> {
        let tasks = self.store.list_incomplete_for_user(user_id)?;
        Ok(suggest(&tasks, available_minutes, today_start))
    }

    /// Write the user's final split: `today_ids` to `today_date`,
    /// `tomorrow_ids` to `tomorrow_date`.
    ///
    /// Only existence of the ids is checked, by the store. Patches are
    /// applied in one batch; on failure earlier patches stay applied.
    pub fn commit_plan(
        &self,
        user_id: &str,
        today_ids: &[String],
        tomorrow_ids: &[String],
        today_date: i64,
        tomorrow_date: i64,
    ) -> Result<CommitReport> {
        let moves: Vec<Reassignment> = today_ids
            .iter()
            .map(|id| Reassignment::new(id.clone(), today_date))
            .chain(
                tomorrow_ids
                    .iter()
                    .map(|id| Reassignment::new(id.clone(), tomorrow_date)),
            )
            .collect();

        self.store.patch_many(&moves)?;
        tracing::info!(
            user = user_id,
            today = today_ids.len(),
            tomorrow = tomorrow_ids.len(),
            "plan committed"
        );
        self.record(PlanKind::Commit, user_id, &moves)?;

        Ok(CommitReport {
            today: today_ids.len(),
            tomorrow: tomorrow_ids.len(),
            moves,
        })
    }

    pub fn get_drift_metrics(&self, user_id: &str, today_start: i64) -> Result<DriftMetrics> {
        let tasks = self.store.list_incomplete_for_user(user_id)?;
        Ok(drift_metrics(&tasks, today_start))
    }

    /// Build a recovery plan and, unless `dry_run`, apply it.
    ///
    /// Proposer failures come back as `Ok` with `success: false`; only
    /// store failures are errors.
    pub fn recover_schedule(
        &self,
        user_id: &str,
        today_start: i64,
        dry_run: bool,
        proposer: &dyn PlanProposer,
    ) -> Result<RecoveryOutcome> {
        let tasks = self.store.list_incomplete_for_user(user_id)?;
        let outcome = RecoveryEngine::new(proposer)
            .with_order(self.order)
            .with_slot_hour(self.slot_hour)
            .plan(&tasks, today_start);

        let moves = match &outcome.plan {
            Some(plan) if outcome.success && !plan.is_empty() => plan.reassignments(),
            _ => return Ok(outcome),
        };

        if dry_run {
            tracing::debug!(user = user_id, moves = moves.len(), "dry run, plan not applied");
            return Ok(outcome);
        }

        self.store.patch_many(&moves)?;
        tracing::info!(user = user_id, moves = moves.len(), "recovery plan applied");
        self.record(PlanKind::Recovery, user_id, &moves)?;
        Ok(outcome)
    }

    fn record(&self, kind: PlanKind, user_id: &str, moves: &[Reassignment]) -> Result<()> {
        match &self.history {
            Some(history) if !moves.is_empty() => {
                history.append(&PlanRecord::new(kind, user_id, moves.to_vec()))
            }
            _ => Ok(()),
        }
    }
}

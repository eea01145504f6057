//! Drift detection: how much overdue work has piled up.

use serde::{Deserialize, Serialize};

use crate::estimate::EstimatedTime;
use crate::task::{Priority, Task};

/// Overdue minutes above which drift is critical.
pub const CRITICAL_DRIFT_MINUTES: u64 = 180;

/// Overdue task count above which drift is critical.
pub const CRITICAL_OVERDUE_COUNT: usize = 5;

/// The fields of an overdue task a recovery plan needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueTask {
    pub id: String,
    pub title: String,
    pub goal_id: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<EstimatedTime>,
    pub minutes: u32,
    pub due_date: i64,
}

impl OverdueTask {
    fn from_task(task: &Task, due_date: i64) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            goal_id: task.goal_id.clone(),
            priority: task.priority,
            estimated_time: task.estimated_time.clone(),
            minutes: task.minutes(),
            due_date,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftMetrics {
    pub has_drift: bool,
    pub drift_minutes: u64,
    pub overdue_count: usize,
    pub is_critical: bool,
    pub overdue_tasks: Vec<OverdueTask>,
}

/// Measure overdue work. Tasks due today are not drift.
///
/// `overdue_tasks` keeps the input order.
pub fn drift_metrics(tasks: &[Task], today_start: i64) -> DriftMetrics {
    let overdue_tasks: Vec<OverdueTask> = tasks
        .iter()
        .filter(|task| !task.completed)
        .filter_map(|task| match task.due_date {
            Some(due) if due < today_start => Some(OverdueTask::from_task(task, due)),
            _ => None,
        })
        .collect();

    let drift_minutes = overdue_tasks
        .iter()
        .map(|task| u64::from(task.minutes))
        .sum();
    let overdue_count = overdue_tasks.len();

    DriftMetrics {
        has_drift: overdue_count > 0,
        drift_minutes,
        overdue_count,
        is_critical: is_critical(drift_minutes, overdue_count),
        overdue_tasks,
    }
}

/// Either threshold alone makes drift critical.
pub fn is_critical(drift_minutes: u64, overdue_count: usize) -> bool {
    drift_minutes > CRITICAL_DRIFT_MINUTES || overdue_count > CRITICAL_OVERDUE_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::DAY_MS;

    const TODAY: i64 = 1_760_572_800_000;

    fn overdue(id: &str, minutes: u32) -> Task {
        Task::new(id, "u1", "g1", id)
            .with_estimate(minutes)
            .with_due_date(TODAY - DAY_MS)
    }

    #[test]
    fn minutes_alone_can_be_critical() {
        let tasks = vec![overdue("a", 100), overdue("b", 60), overdue("c", 40)];
        let metrics = drift_metrics(&tasks, TODAY);
        assert!(metrics.has_drift);
        assert_eq!(metrics.overdue_count, 3);
        assert_eq!(metrics.drift_minutes, 200);
        assert!(metrics.is_critical);
    }

    #[test]
    fn count_alone_can_be_critical() {
        let tasks: Vec<Task> = (0..6).map(|i| overdue(&format!("t{i}"), 5)).collect();
        let metrics = drift_metrics(&tasks, TODAY);
        assert_eq!(metrics.drift_minutes, 30);
        assert!(metrics.is_critical);
    }

    #[test]
    fn thresholds_are_strict() {
        assert!(!is_critical(180, 5));
        assert!(is_critical(181, 0));
        assert!(is_critical(0, 6));
    }

    #[test]
    fn due_today_is_not_drift() {
        let today = Task::new("today", "u1", "g1", "today")
            .with_estimate(500u32)
            .with_due_date(TODAY);
        let mut done = overdue("done", 45);
        done.completed = true;
        let metrics = drift_metrics(&[today, done], TODAY);
        assert!(!metrics.has_drift);
        assert_eq!(metrics.drift_minutes, 0);
        assert!(!metrics.is_critical);
        assert!(metrics.overdue_tasks.is_empty());
    }

    #[test]
    fn missing_estimates_default_and_order_is_kept() {
        let mut a = overdue("a", 0);
        a.estimated_time = None;
        let b = overdue("b", 15);
        let metrics = drift_metrics(&[b, a], TODAY);
        assert_eq!(metrics.drift_minutes, 45);
        let ids: Vec<&str> = metrics.overdue_tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(metrics.overdue_tasks[1].minutes, 30);
    }
}

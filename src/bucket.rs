//! Daily bucket scheduler.
//!
//! Splits the tasks due today (or earlier) into a "planned" bucket bounded
//! by the minutes available today and an "overflow" bucket for the rest.
//! The walk is a single greedy pass in scheduling order: a task that does
//! not fit goes to overflow and later, shorter tasks may still fill the
//! remaining space. Nothing is retried or re-packed.

use serde::Serialize;

use crate::task::{sort_for_schedule, Task};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    pub total_tasks: usize,
    pub total_minutes: u64,
    pub planned_minutes: u64,
    pub overflow_minutes: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BucketPlan {
    pub planned: Vec<Task>,
    pub overflow: Vec<Task>,
    pub stats: BucketStats,
}

impl BucketPlan {
    pub fn planned_ids(&self) -> Vec<String> {
        self.planned.iter().map(|task| task.id.clone()).collect()
    }

    pub fn overflow_ids(&self) -> Vec<String> {
        self.overflow.iter().map(|task| task.id.clone()).collect()
    }
}

/// Fit today's candidates into `available_minutes`.
///
/// Candidates are incomplete tasks with a due date before the end of today.
/// Completed tasks are ignored even if the caller passes them in.
pub fn suggest(tasks: &[Task], available_minutes: u32, today_start: i64) -> BucketPlan {
    let mut candidates: Vec<Task> = tasks
        .iter()
        .filter(|task| !task.completed && task.is_due_by_end_of_today(today_start))
        .cloned()
        .collect();
    sort_for_schedule(&mut candidates);

    let budget = u64::from(available_minutes);
    let mut plan = BucketPlan::default();
    let mut running: u64 = 0;

    for task in candidates {
        let minutes = u64::from(task.minutes());
        plan.stats.total_tasks += 1;
        plan.stats.total_minutes += minutes;

        if running + minutes <= budget {
            running += minutes;
            plan.stats.planned_minutes += minutes;
            plan.planned.push(task);
        } else {
            plan.stats.overflow_minutes += minutes;
            plan.overflow.push(task);
        }
    }

    tracing::debug!(
        planned = plan.planned.len(),
        overflow = plan.overflow.len(),
        planned_minutes = plan.stats.planned_minutes,
        budget,
        "bucket plan built"
    );

    plan
}

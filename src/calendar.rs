//! Look-ahead calendar used by recovery.
//!
//! A calendar is rebuilt from the live task list on every recovery run and
//! never cached. Day 0 is today; each day carries the minutes already
//! committed to it and the tasks making up that load.

use serde::{Deserialize, Serialize};

use crate::task::{Task, DAY_MS};

/// Days in the recovery window (today plus six).
pub const WINDOW_DAYS: usize = 7;

/// Capacity ceiling for one calendar day, in minutes.
pub const MAX_DAILY_MINUTES: u64 = 720;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarTask {
    pub task_id: String,
    pub goal_id: String,
    pub estimated_time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub day_offset: usize,
    pub load_minutes: u64,
    pub tasks: Vec<CalendarTask>,
}

impl CalendarDay {
    pub fn empty(day_offset: usize) -> Self {
        Self {
            day_offset,
            load_minutes: 0,
            tasks: Vec::new(),
        }
    }

    /// Whether `minutes` more still fits under `ceiling`.
    pub fn has_room(&self, minutes: u32, ceiling: u64) -> bool {
        self.load_minutes + u64::from(minutes) <= ceiling
    }
}

/// Build the `WINDOW_DAYS` calendar starting at `today_start`.
///
/// Only incomplete tasks due inside the window count. Each day's manifest is
/// ordered by due date, then id.
pub fn build_calendar(tasks: &[Task], today_start: i64) -> Vec<CalendarDay> {
    let mut days: Vec<CalendarDay> = (0..WINDOW_DAYS).map(CalendarDay::empty).collect();
    let window_end = today_start + WINDOW_DAYS as i64 * DAY_MS;

    let mut in_window: Vec<(&Task, i64)> = tasks
        .iter()
        .filter(|task| !task.completed)
        .filter_map(|task| match task.due_date {
            Some(due) if due >= today_start && due < window_end => Some((task, due)),
            _ => None,
        })
        .collect();
    in_window.sort_by(|(a, a_due), (b, b_due)| a_due.cmp(b_due).then_with(|| a.id.cmp(&b.id)));

    for (task, due) in in_window {
        let offset = ((due - today_start) / DAY_MS) as usize;
        let minutes = task.minutes();
        let day = &mut days[offset];
        day.load_minutes += u64::from(minutes);
        day.tasks.push(CalendarTask {
            task_id: task.id.clone(),
            goal_id: task.goal_id.clone(),
            estimated_time: minutes,
        });
    }

    days
}

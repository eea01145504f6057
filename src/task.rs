//! Task records and the ordering rules shared by the schedulers.
//!
//! Timestamps are epoch milliseconds. "Today" is never read from the wall
//! clock here: callers pass the local-midnight timestamp they consider to be
//! the start of today.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::estimate::{minutes_or_default, EstimatedTime};

/// Milliseconds in one scheduling day.
pub const DAY_MS: i64 = 86_400_000;

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 3_600_000;

const TASK_ID_PREFIX: &str = "t";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "invalid priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<EstimatedTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        goal_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            goal_id: goal_id.into(),
            title: title.into(),
            priority: Priority::default(),
            estimated_time: None,
            due_date: None,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimate(mut self, estimate: impl Into<EstimatedTime>) -> Self {
        self.estimated_time = Some(estimate.into());
        self
    }

    pub fn with_due_date(mut self, due_date: i64) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Estimated minutes, defaulting missing or unreadable estimates.
    pub fn minutes(&self) -> u32 {
        minutes_or_default(self.estimated_time.as_ref())
    }

    /// Due strictly before the start of today.
    pub fn is_overdue(&self, today_start: i64) -> bool {
        matches!(self.due_date, Some(due) if due < today_start)
    }

    /// Due within `[today_start, today_start + 1 day)`.
    pub fn is_due_today(&self, today_start: i64) -> bool {
        matches!(self.due_date, Some(due) if due >= today_start && due < today_start + DAY_MS)
    }

    /// Due today or any earlier day.
    pub fn is_due_by_end_of_today(&self, today_start: i64) -> bool {
        matches!(self.due_date, Some(due) if due < today_start + DAY_MS)
    }
}

pub fn generate_task_id() -> String {
    format!("{}-{}", TASK_ID_PREFIX, Ulid::new().to_string().to_lowercase())
}

/// Scheduling order: priority descending, then due date ascending.
///
/// Tasks without a due date sort after dated ones of the same priority.
pub fn schedule_cmp(left: &Task, right: &Task) -> Ordering {
    right.priority.cmp(&left.priority).then_with(|| {
        let left_due = left.due_date.unwrap_or(i64::MAX);
        let right_due = right.due_date.unwrap_or(i64::MAX);
        left_due.cmp(&right_due)
    })
}

/// Stable sort into scheduling order; ties keep their input order.
pub fn sort_for_schedule(tasks: &mut [Task]) {
    tasks.sort_by(schedule_cmp);
}

/// Local midnight for `date`, as epoch milliseconds.
pub fn local_day_start(date: NaiveDate) -> Result<i64> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidDate(date.to_string()))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| Error::InvalidDate(format!("{date} has no local midnight")))?;
    Ok(local.timestamp_millis())
}

/// Local midnight of the current day.
pub fn today_start_local() -> Result<i64> {
    local_day_start(Local::now().date_naive())
}

/// Timestamp of `hour` o'clock on the day `offset` days after `today_start`.
pub fn slot_timestamp(today_start: i64, offset: i64, hour: u32) -> i64 {
    today_start + offset * DAY_MS + i64::from(hour) * HOUR_MS
}

/// Parse a due-date expression relative to `today`.
///
/// Accepts `YYYY-MM-DD`, `today`, `tomorrow`, `yesterday`, `+Nd` and `-Nd`.
pub fn parse_day(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let trimmed = input.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Some(rest) = trimmed.strip_suffix('d') {
        if rest.starts_with('+') || rest.starts_with('-') {
            let days: i64 = rest
                .parse()
                .map_err(|_| Error::InvalidDate(format!("invalid day offset '{trimmed}'")))?;
            return Ok(today + Duration::days(days));
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        Error::InvalidDate(format!(
            "'{trimmed}' (expected YYYY-MM-DD, today, tomorrow, yesterday or +Nd)"
        ))
    })
}

/// Human-readable local date for a millisecond timestamp.
pub fn format_day(timestamp: i64) -> String {
    match Local.timestamp_millis_opt(timestamp).earliest() {
        Some(local) => local.format("%Y-%m-%d %H:%M").to_string(),
        None => timestamp.to_string(),
    }
}

//! dayplan suggest / commit command implementations.

use serde::Serialize;

use crate::bucket::BucketPlan;
use crate::error::{Error, Result};
use crate::output::{emit_success, format_minutes, HumanOutput};
use crate::planner::{CommitReport, Planner};
use crate::store::resolve_task_id;
use crate::task::{format_day, slot_timestamp};

use super::task::describe;
use super::GlobalOptions;

pub struct SuggestOptions {
    pub minutes: Option<u32>,
    pub globals: GlobalOptions,
}

pub struct CommitOptions {
    pub today: Vec<String>,
    pub tomorrow: Vec<String>,
    pub globals: GlobalOptions,
}

#[derive(Serialize)]
struct SuggestOutput<'a> {
    user: &'a str,
    available_minutes: u32,
    #[serde(flatten)]
    plan: &'a BucketPlan,
}

#[derive(Serialize)]
struct CommitOutput<'a> {
    user: &'a str,
    today_date: i64,
    tomorrow_date: i64,
    #[serde(flatten)]
    report: &'a CommitReport,
}

pub fn run_suggest(options: SuggestOptions) -> Result<()> {
    let session = options.globals.session()?;
    let available = options
        .minutes
        .unwrap_or(session.config.planner.available_minutes);

    let store = session.store();
    let plan = Planner::new(&store)
        .with_config(&session.config)
        .get_suggestion(&session.user, available, session.today_start)?;

    let mut human = HumanOutput::new(format!(
        "dayplan suggest: {} planned, {} overflow",
        plan.planned.len(),
        plan.overflow.len()
    ));
    human.push_summary("available", format_minutes(u64::from(available)));
    human.push_summary("planned", format_minutes(plan.stats.planned_minutes));
    human.push_summary("overflow", format_minutes(plan.stats.overflow_minutes));
    for task in &plan.planned {
        human.push_item("Today", describe(task, session.today_start));
    }
    for task in &plan.overflow {
        human.push_item("Overflow", describe(task, session.today_start));
    }
    if plan.stats.total_tasks > 0 {
        human.push_next_step(format!(
            "dayplan commit --today {} --tomorrow {}",
            join_or_placeholder(&plan.planned_ids()),
            join_or_placeholder(&plan.overflow_ids())
        ));
    }

    let output = SuggestOutput {
        user: &session.user,
        available_minutes: available,
        plan: &plan,
    };
    emit_success(options.globals.output(), "suggest", &output, Some(&human))
}

pub fn run_commit(options: CommitOptions) -> Result<()> {
    let session = options.globals.session()?;
    let today_ids = normalize_ids(&options.today);
    let tomorrow_ids = normalize_ids(&options.tomorrow);
    if today_ids.is_empty() && tomorrow_ids.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to commit; pass --today and/or --tomorrow".to_string(),
        ));
    }

    let store = session.store();
    let resolve = |ids: &[String]| -> Result<Vec<String>> {
        ids.iter()
            .map(|id| resolve_task_id(&store, &session.user, id))
            .collect()
    };
    let today_ids = resolve(&today_ids)?;
    let tomorrow_ids = resolve(&tomorrow_ids)?;
    if let Some(dup) = today_ids.iter().find(|id| tomorrow_ids.contains(*id)) {
        return Err(Error::InvalidArgument(format!(
            "task {dup} listed for both today and tomorrow"
        )));
    }

    let slot_hour = session.config.planner.slot_hour;
    let today_date = slot_timestamp(session.today_start, 0, slot_hour);
    let tomorrow_date = slot_timestamp(session.today_start, 1, slot_hour);

    let report = Planner::new(&store)
        .with_config(&session.config)
        .with_history(session.history())
        .commit_plan(
            &session.user,
            &today_ids,
            &tomorrow_ids,
            today_date,
            tomorrow_date,
        )?;

    let mut human = HumanOutput::new(format!(
        "dayplan commit: {} today, {} tomorrow",
        report.today, report.tomorrow
    ));
    human.push_summary("today", format_day(today_date));
    human.push_summary("tomorrow", format_day(tomorrow_date));
    for id in &today_ids {
        human.push_item("Today", id.clone());
    }
    for id in &tomorrow_ids {
        human.push_item("Tomorrow", id.clone());
    }

    let output = CommitOutput {
        user: &session.user,
        today_date,
        tomorrow_date,
        report: &report,
    };
    emit_success(options.globals.output(), "commit", &output, Some(&human))
}

fn normalize_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_or_placeholder(ids: &[String]) -> String {
    if ids.is_empty() {
        "\"\"".to_string()
    } else {
        ids.join(",")
    }
}

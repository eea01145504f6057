//! dayplan drift / recover / history command implementations.

use std::time::Duration;

use serde::Serialize;

use crate::config::ProposerKind;
use crate::drift::{CRITICAL_DRIFT_MINUTES, CRITICAL_OVERDUE_COUNT};
use crate::error::{Error, Result};
use crate::history::PlanRecord;
use crate::output::{emit_success, format_minutes, HumanOutput};
use crate::planner::Planner;
use crate::recovery::{BuiltinProposer, CommandProposer, PlanProposer, RecoveryOutcome};
use crate::task::format_day;

use super::{GlobalOptions, Session};

pub struct RecoverOptions {
    pub dry_run: bool,
    pub globals: GlobalOptions,
}

pub struct HistoryOptions {
    pub limit: Option<usize>,
    pub globals: GlobalOptions,
}

#[derive(Serialize)]
struct RecoverOutput<'a> {
    user: &'a str,
    dry_run: bool,
    applied: bool,
    #[serde(flatten)]
    outcome: &'a RecoveryOutcome,
}

#[derive(Serialize)]
struct HistoryOutput<'a> {
    user: &'a str,
    total: usize,
    plans: &'a [PlanRecord],
}

pub fn run_drift(globals: GlobalOptions) -> Result<()> {
    let session = globals.session()?;
    let store = session.store();
    let metrics = Planner::new(&store).get_drift_metrics(&session.user, session.today_start)?;

    let header = if !metrics.has_drift {
        "dayplan drift: on track".to_string()
    } else if metrics.is_critical {
        "dayplan drift: critical".to_string()
    } else {
        "dayplan drift: behind".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("overdue", metrics.overdue_count.to_string());
    human.push_summary("minutes", format_minutes(metrics.drift_minutes));
    for task in &metrics.overdue_tasks {
        human.push_item(
            "Overdue",
            format!(
                "[{}] {} {} ({}, {}, due {})",
                task.priority,
                task.id,
                task.title,
                task.goal_id,
                format_minutes(u64::from(task.minutes)),
                format_day(task.due_date)
            ),
        );
    }
    if metrics.is_critical {
        human.push_warning(format!(
            "more than {} overdue or over {} overdue",
            plural(CRITICAL_OVERDUE_COUNT, "task"),
            format_minutes(CRITICAL_DRIFT_MINUTES)
        ));
    }
    if metrics.has_drift {
        human.push_next_step("dayplan recover --dry-run");
    }

    emit_success(globals.output(), "drift", &metrics, Some(&human))
}

pub fn run_recover(options: RecoverOptions) -> Result<()> {
    let session = options.globals.session()?;
    let proposer = build_proposer(&session)?;
    let store = session.store();

    let outcome = Planner::new(&store)
        .with_config(&session.config)
        .with_history(session.history())
        .recover_schedule(
            &session.user,
            session.today_start,
            options.dry_run,
            proposer.as_ref(),
        )?;

    if !outcome.success {
        return Err(match outcome.retryable {
            Some(true) => Error::PlanRejected(outcome.message),
            _ => Error::ProposerUnavailable(outcome.message),
        });
    }

    let move_count = outcome.plan.as_ref().map(|p| p.moves.len()).unwrap_or(0);
    let applied = !options.dry_run && move_count > 0;

    let header = if options.dry_run {
        "dayplan recover: dry run".to_string()
    } else {
        "dayplan recover".to_string()
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("result", outcome.message.clone());
    if let Some(plan) = &outcome.plan {
        human.push_summary("proposer", plan.proposer.clone());
        for mv in &plan.moves {
            let mut line = format!("{} -> {} (day {})", mv.task_id, format_day(mv.new_date), mv.day_offset);
            if let Some(reason) = mv.reason {
                line.push_str(&format!(" [{}]", reason.as_str()));
            }
            if mv.fallback {
                human.push_warning(format!(
                    "{}: no day in the window had room; placed on the least-loaded day",
                    mv.task_id
                ));
            }
            human.push_item("Moves", line);
        }
        if move_count > 0 {
            for (offset, load) in plan.day_loads.iter().enumerate() {
                human.push_item("Load", format!("day {offset}: {}", format_minutes(*load)));
            }
        }
    }
    if options.dry_run && move_count > 0 {
        human.push_next_step("dayplan recover");
    }

    let output = RecoverOutput {
        user: &session.user,
        dry_run: options.dry_run,
        applied,
        outcome: &outcome,
    };
    emit_success(options.globals.output(), "recover", &output, Some(&human))
}

pub fn run_history(options: HistoryOptions) -> Result<()> {
    let session = options.globals.session()?;
    let plans = session.history().list(&session.user, options.limit)?;

    let mut human = HumanOutput::new(format!("dayplan history: {}", plural(plans.len(), "plan")));
    for record in &plans {
        human.push_detail(format!(
            "{} {} {} ({})",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.kind.as_str(),
            record.id,
            plural(record.moves.len(), "move")
        ));
    }

    let output = HistoryOutput {
        user: &session.user,
        total: plans.len(),
        plans: &plans,
    };
    emit_success(options.globals.output(), "history", &output, Some(&human))
}

fn build_proposer(session: &Session) -> Result<Box<dyn PlanProposer>> {
    match session.config.recovery.proposer {
        ProposerKind::Builtin => Ok(Box::new(BuiltinProposer)),
        ProposerKind::Command => CommandProposer::from_argv(&session.config.recovery.command)
            .map(|proposer| {
                let timeout = Duration::from_secs(session.config.recovery.timeout_secs);
                Box::new(proposer.with_timeout(timeout)) as Box<dyn PlanProposer>
            })
            .ok_or_else(|| {
                Error::InvalidConfig("recovery.command is empty".to_string())
            }),
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

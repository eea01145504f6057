//! Overdue-task recovery.
//!
//! Recovery takes every overdue task and finds it a slot in the next seven
//! days without pushing any day past [`MAX_DAILY_MINUTES`]:
//!
//! 1. If today still has room, the task goes to today.
//! 2. Otherwise, if today already holds a task from the same goal, the
//!    overdue task takes today's slot and that task moves to the first later
//!    day with room (same-goal swap). Today may end up over the ceiling.
//! 3. Otherwise the task goes to the first later day with room.
//!
//! When no later day has room the task lands on the least-loaded later day
//! and the move is marked `fallback`. Loads are updated after every move, so
//! each task sees the calendar as left by the ones before it.
//!
//! Plans come from a [`PlanProposer`]. [`BuiltinProposer`] runs the rules
//! above; [`CommandProposer`] asks an external program. Whatever the source,
//! a proposal is validated before it is turned into reassignments.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{build_calendar, CalendarDay, CalendarTask, MAX_DAILY_MINUTES, WINDOW_DAYS};
use crate::config::RecoveryOrder;
use crate::drift::{drift_metrics, OverdueTask};
use crate::store::Reassignment;
use crate::task::{slot_timestamp, Task};

pub const MALFORMED_PLAN_MESSAGE: &str =
    "Couldn't put together a recovery plan this time. Please try again.";
pub const PROPOSER_UNAVAILABLE_MESSAGE: &str =
    "System error: the plan proposer could not be reached.";
pub const NOTHING_TO_RECOVER_MESSAGE: &str = "No overdue tasks to recover.";

/// How long a command proposer may run before it is killed.
pub const DEFAULT_PROPOSER_TIMEOUT: Duration = Duration::from_secs(60);

const PROPOSER_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveReason {
    /// Overdue task fit into today's remaining capacity
    Today,
    /// Overdue task entered a full today by swapping with a same-goal task
    SwapIn,
    /// Task already on today, pushed out by a same-goal swap
    Displaced,
    /// Overdue task moved to the first later day with room
    OpenDay,
}

impl MoveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveReason::Today => "today",
            MoveReason::SwapIn => "swap_in",
            MoveReason::Displaced => "displaced",
            MoveReason::OpenDay => "open_day",
        }
    }
}

/// One move as produced by a proposer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedMove {
    #[serde(alias = "taskId")]
    pub task_id: String,
    #[serde(alias = "dayOffset", alias = "day")]
    pub day_offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<MoveReason>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

/// Everything a proposer gets to see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub today_start: i64,
    pub max_daily_minutes: u64,
    pub overdue_tasks: Vec<OverdueTask>,
    pub calendar: Vec<CalendarDay>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProposerError {
    /// The proposer answered, but not with a usable plan.
    #[error("malformed plan: {0}")]
    Malformed(String),
    /// The proposer could not be reached or crashed.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Anything that can turn overdue tasks plus a calendar into moves.
pub trait PlanProposer {
    fn name(&self) -> &str;

    fn propose(&self, request: &ProposalRequest) -> Result<Vec<ProposedMove>, ProposerError>;
}

// =============================================================================
// Deterministic rebalancing
// =============================================================================

/// Result of running the recovery rules locally.
#[derive(Debug, Clone)]
pub struct Rebalance {
    pub moves: Vec<ProposedMove>,
    pub calendar: Vec<CalendarDay>,
}

/// Place every overdue task, in the order given.
pub fn rebalance(overdue: &[OverdueTask], calendar: &[CalendarDay], ceiling: u64) -> Rebalance {
    let mut days = normalize_calendar(calendar);
    let mut moves = Vec::with_capacity(overdue.len());
    let mut moved: HashSet<String> = HashSet::new();

    for task in overdue {
        let incoming = CalendarTask {
            task_id: task.id.clone(),
            goal_id: task.goal_id.clone(),
            estimated_time: task.minutes,
        };

        if days[0].has_room(task.minutes, ceiling) {
            place(&mut days, 0, incoming);
            moved.insert(task.id.clone());
            moves.push(proposed(&task.id, 0, MoveReason::Today, false));
            continue;
        }

        let swap = days[0]
            .tasks
            .iter()
            .position(|existing| existing.goal_id == task.goal_id && !moved.contains(&existing.task_id));

        if let Some(index) = swap {
            let displaced = days[0].tasks.remove(index);
            days[0].load_minutes = days[0]
                .load_minutes
                .saturating_sub(u64::from(displaced.estimated_time));

            place(&mut days, 0, incoming);
            moved.insert(task.id.clone());
            moves.push(proposed(&task.id, 0, MoveReason::SwapIn, false));

            let (day, fallback) = first_open_day(&days, displaced.estimated_time, ceiling);
            tracing::debug!(
                overdue = %task.id,
                displaced = %displaced.task_id,
                day,
                fallback,
                "same-goal swap"
            );
            let displaced_id = displaced.task_id.clone();
            place(&mut days, day, displaced);
            moved.insert(displaced_id.clone());
            moves.push(proposed(&displaced_id, day, MoveReason::Displaced, fallback));
            continue;
        }

        let (day, fallback) = first_open_day(&days, task.minutes, ceiling);
        place(&mut days, day, incoming);
        moved.insert(task.id.clone());
        moves.push(proposed(&task.id, day, MoveReason::OpenDay, fallback));
    }

    Rebalance {
        moves,
        calendar: days,
    }
}

fn normalize_calendar(calendar: &[CalendarDay]) -> Vec<CalendarDay> {
    let mut days: Vec<CalendarDay> = calendar.iter().take(WINDOW_DAYS).cloned().collect();
    while days.len() < WINDOW_DAYS {
        days.push(CalendarDay::empty(days.len()));
    }
    for (offset, day) in days.iter_mut().enumerate() {
        day.day_offset = offset;
    }
    days
}

fn place(days: &mut [CalendarDay], day: usize, task: CalendarTask) {
    days[day].load_minutes += u64::from(task.estimated_time);
    days[day].tasks.push(task);
}

/// First later day with room, or the least-loaded later day (earliest on
/// ties) flagged as a fallback.
fn first_open_day(days: &[CalendarDay], minutes: u32, ceiling: u64) -> (usize, bool) {
    if let Some(day) = (1..days.len()).find(|&d| days[d].has_room(minutes, ceiling)) {
        return (day, false);
    }
    let day = (1..days.len())
        .min_by_key(|&d| (days[d].load_minutes, d))
        .unwrap_or(0);
    (day, true)
}

fn proposed(task_id: &str, day_offset: usize, reason: MoveReason, fallback: bool) -> ProposedMove {
    ProposedMove {
        task_id: task_id.to_string(),
        day_offset,
        reason: Some(reason),
        fallback,
    }
}

/// Processing order for overdue tasks.
pub fn order_overdue(tasks: &mut [OverdueTask], order: RecoveryOrder) {
    if order == RecoveryOrder::Priority {
        tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.due_date.cmp(&b.due_date))
        });
    }
}

// =============================================================================
// Proposers
// =============================================================================

/// Runs [`rebalance`] in-process. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProposer;

impl PlanProposer for BuiltinProposer {
    fn name(&self) -> &str {
        "builtin"
    }

    fn propose(&self, request: &ProposalRequest) -> Result<Vec<ProposedMove>, ProposerError> {
        Ok(rebalance(
            &request.overdue_tasks,
            &request.calendar,
            request.max_daily_minutes,
        )
        .moves)
    }
}

/// Delegates planning to an external program.
///
/// The request is written to the program's stdin as JSON. The program must
/// print either `{"moves": [...]}` or a bare array of moves; surrounding
/// prose is tolerated. A program still running after the timeout is killed
/// and reported as a transport failure.
#[derive(Debug, Clone)]
pub struct CommandProposer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProposer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_PROPOSER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from an argv list; `None` when the list is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl PlanProposer for CommandProposer {
    fn name(&self) -> &str {
        &self.program
    }

    fn propose(&self, request: &ProposalRequest) -> Result<Vec<ProposedMove>, ProposerError> {
        let payload = serde_json::to_vec(request)
            .map_err(|err| ProposerError::Transport(format!("encode request: {err}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ProposerError::Transport(format!("spawn {}: {err}", self.program)))?;

        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || {
                // The program may exit without reading its input.
                let _ = stdin.write_all(&payload);
            })
        });
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        // On timeout the pipe threads are left detached; a grandchild may
        // still hold the pipes open.
        let status = self.wait(&mut child)?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if !status.success() {
            return Err(ProposerError::Transport(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        parse_proposal(&String::from_utf8_lossy(&stdout))
    }
}

impl CommandProposer {
    fn wait(&self, child: &mut Child) -> Result<ExitStatus, ProposerError> {
        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if start.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(program = %self.program, timeout = ?self.timeout, "proposer timed out");
                    return Err(ProposerError::Transport(format!(
                        "{} did not answer within {:?}",
                        self.program, self.timeout
                    )));
                }
                Ok(None) => std::thread::sleep(PROPOSER_POLL_INTERVAL),
                Err(err) => {
                    return Err(ProposerError::Transport(format!(
                        "wait for {}: {err}",
                        self.program
                    )))
                }
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProposalDocument {
    Wrapped { moves: Vec<ProposedMove> },
    Bare(Vec<ProposedMove>),
}

impl ProposalDocument {
    fn into_moves(self) -> Vec<ProposedMove> {
        match self {
            ProposalDocument::Wrapped { moves } => moves,
            ProposalDocument::Bare(moves) => moves,
        }
    }
}

/// Parse proposer output, falling back to the outermost JSON object or
/// array embedded in surrounding text.
pub fn parse_proposal(text: &str) -> Result<Vec<ProposedMove>, ProposerError> {
    let trimmed = text.trim();
    if let Ok(document) = serde_json::from_str::<ProposalDocument>(trimmed) {
        return Ok(document.into_moves());
    }

    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .iter()
        .filter_map(|&(open, close)| {
            let start = trimmed.find(open)?;
            let end = trimmed.rfind(close)?;
            (end > start).then_some((start, end))
        })
        .collect();
    spans.sort();

    for (start, end) in spans {
        if let Ok(document) = serde_json::from_str::<ProposalDocument>(&trimmed[start..=end]) {
            return Ok(document.into_moves());
        }
    }

    Err(ProposerError::Malformed(if trimmed.is_empty() {
        "empty response".to_string()
    } else {
        "no plan found in response".to_string()
    }))
}

/// Check a proposal against the request it answers.
///
/// Every overdue task must appear exactly once, any other task must come from
/// the calendar, no task may move twice, and every offset must be inside the
/// window. A day the plan pushes over the ceiling is accepted only when it
/// is today after a same-goal swap, or when one of its new tasks fit on no
/// other later day.
pub fn validate_proposal(
    request: &ProposalRequest,
    moves: &[ProposedMove],
) -> Result<(), ProposerError> {
    let overdue: HashSet<&str> = request.overdue_tasks.iter().map(|t| t.id.as_str()).collect();
    let scheduled: HashSet<&str> = request
        .calendar
        .iter()
        .flat_map(|day| day.tasks.iter().map(|t| t.task_id.as_str()))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    for mv in moves {
        let id = mv.task_id.as_str();
        if !seen.insert(id) {
            return Err(ProposerError::Malformed(format!("task {id} moved twice")));
        }
        if !overdue.contains(id) && !scheduled.contains(id) {
            return Err(ProposerError::Malformed(format!("unknown task {id}")));
        }
        if mv.day_offset >= WINDOW_DAYS {
            return Err(ProposerError::Malformed(format!(
                "task {id} placed on day {} outside the {WINDOW_DAYS}-day window",
                mv.day_offset
            )));
        }
    }

    if let Some(missing) = request
        .overdue_tasks
        .iter()
        .find(|task| !seen.contains(task.id.as_str()))
    {
        return Err(ProposerError::Malformed(format!(
            "overdue task {} left unplaced",
            missing.id
        )));
    }

    check_capacity(request, moves)
}

fn check_capacity(request: &ProposalRequest, moves: &[ProposedMove]) -> Result<(), ProposerError> {
    let ceiling = request.max_daily_minutes;
    let mut before: Vec<u64> = request.calendar.iter().map(|d| d.load_minutes).collect();
    before.resize(WINDOW_DAYS, 0);
    let after = loads_after(request, moves);
    let minutes = task_minutes(request);

    for (day, (&load, &prior)) in after.iter().zip(&before).enumerate() {
        if load <= ceiling || load <= prior {
            continue;
        }
        let excused = if day == 0 {
            has_same_goal_swap(request, moves)
        } else {
            moves.iter().filter(|mv| mv.day_offset == day).any(|mv| {
                let needed = u64::from(minutes.get(mv.task_id.as_str()).copied().unwrap_or(0));
                (1..WINDOW_DAYS)
                    .filter(|&other| other != day)
                    .all(|other| after[other] + needed > ceiling)
            })
        };
        if !excused {
            return Err(ProposerError::Malformed(format!(
                "day {day} would carry {load} minutes, over the {ceiling}-minute limit"
            )));
        }
    }
    Ok(())
}

fn task_minutes(request: &ProposalRequest) -> HashMap<&str, u32> {
    request
        .calendar
        .iter()
        .flat_map(|day| day.tasks.iter().map(|t| (t.task_id.as_str(), t.estimated_time)))
        .chain(request.overdue_tasks.iter().map(|t| (t.id.as_str(), t.minutes)))
        .collect()
}

/// True when an overdue task entered today while a same-goal task left it.
fn has_same_goal_swap(request: &ProposalRequest, moves: &[ProposedMove]) -> bool {
    let today: HashMap<&str, &str> = request
        .calendar
        .iter()
        .filter(|day| day.day_offset == 0)
        .flat_map(|day| day.tasks.iter())
        .map(|t| (t.task_id.as_str(), t.goal_id.as_str()))
        .collect();
    let overdue_goals: HashMap<&str, &str> = request
        .overdue_tasks
        .iter()
        .map(|t| (t.id.as_str(), t.goal_id.as_str()))
        .collect();

    let displaced_goals: HashSet<&str> = moves
        .iter()
        .filter(|mv| mv.day_offset != 0)
        .filter_map(|mv| today.get(mv.task_id.as_str()).copied())
        .collect();
    moves
        .iter()
        .filter(|mv| mv.day_offset == 0)
        .filter_map(|mv| overdue_goals.get(mv.task_id.as_str()))
        .any(|goal| displaced_goals.contains(goal))
}

// =============================================================================
// Plans and outcomes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryMove {
    pub task_id: String,
    pub day_offset: usize,
    pub new_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<MoveReason>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryPlan {
    pub proposer: String,
    pub moves: Vec<RecoveryMove>,
    /// Load per day offset once the plan is applied.
    pub day_loads: Vec<u64>,
}

impl RecoveryPlan {
    pub fn reassignments(&self) -> Vec<Reassignment> {
        self.moves
            .iter()
            .map(|mv| Reassignment::new(mv.task_id.clone(), mv.new_date))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<RecoveryPlan>,
    /// Set on failure: true when the proposer answered with garbage,
    /// false when it could not be reached at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl RecoveryOutcome {
    fn planned(plan: RecoveryPlan, overdue_count: usize) -> Self {
        let message = if plan.is_empty() {
            NOTHING_TO_RECOVER_MESSAGE.to_string()
        } else {
            let displaced = plan.moves.len().saturating_sub(overdue_count);
            if displaced == 0 {
                format!("Rescheduled {overdue_count} overdue task(s).")
            } else {
                format!(
                    "Rescheduled {overdue_count} overdue task(s); moved {displaced} task(s) to make room."
                )
            }
        };
        Self {
            success: true,
            message,
            plan: Some(plan),
            retryable: None,
        }
    }

    fn failed(err: &ProposerError) -> Self {
        let (message, retryable) = match err {
            ProposerError::Malformed(_) => (MALFORMED_PLAN_MESSAGE, true),
            ProposerError::Transport(_) => (PROPOSER_UNAVAILABLE_MESSAGE, false),
        };
        Self {
            success: false,
            message: message.to_string(),
            plan: None,
            retryable: Some(retryable),
        }
    }
}

/// Builds recovery plans from a live task list.
pub struct RecoveryEngine<'a> {
    proposer: &'a dyn PlanProposer,
    order: RecoveryOrder,
    slot_hour: u32,
    max_daily_minutes: u64,
}

impl<'a> RecoveryEngine<'a> {
    pub fn new(proposer: &'a dyn PlanProposer) -> Self {
        Self {
            proposer,
            order: RecoveryOrder::default(),
            slot_hour: 9,
            max_daily_minutes: MAX_DAILY_MINUTES,
        }
    }

    pub fn with_order(mut self, order: RecoveryOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_slot_hour(mut self, slot_hour: u32) -> Self {
        self.slot_hour = slot_hour;
        self
    }

    /// The request the proposer will receive for these tasks.
    pub fn request(&self, tasks: &[Task], today_start: i64) -> ProposalRequest {
        let mut overdue_tasks = drift_metrics(tasks, today_start).overdue_tasks;
        order_overdue(&mut overdue_tasks, self.order);
        ProposalRequest {
            today_start,
            max_daily_minutes: self.max_daily_minutes,
            overdue_tasks,
            calendar: build_calendar(tasks, today_start),
        }
    }

    /// Build a plan. Proposer failures come back as an unsuccessful outcome.
    pub fn plan(&self, tasks: &[Task], today_start: i64) -> RecoveryOutcome {
        let request = self.request(tasks, today_start);
        let overdue_count = request.overdue_tasks.len();
        if overdue_count == 0 {
            return RecoveryOutcome::planned(
                RecoveryPlan {
                    proposer: self.proposer.name().to_string(),
                    moves: Vec::new(),
                    day_loads: request.calendar.iter().map(|d| d.load_minutes).collect(),
                },
                0,
            );
        }

        tracing::info!(
            proposer = self.proposer.name(),
            overdue = overdue_count,
            "requesting recovery plan"
        );

        let moves = match self
            .proposer
            .propose(&request)
            .and_then(|moves| validate_proposal(&request, &moves).map(|_| moves))
        {
            Ok(moves) => moves,
            Err(err) => {
                tracing::warn!(proposer = self.proposer.name(), error = %err, "recovery plan failed");
                return RecoveryOutcome::failed(&err);
            }
        };

        let plan = RecoveryPlan {
            proposer: self.proposer.name().to_string(),
            day_loads: loads_after(&request, &moves),
            moves: moves
                .into_iter()
                .map(|mv| RecoveryMove {
                    new_date: slot_timestamp(today_start, mv.day_offset as i64, self.slot_hour),
                    task_id: mv.task_id,
                    day_offset: mv.day_offset,
                    reason: mv.reason,
                    fallback: mv.fallback,
                })
                .collect(),
        };
        RecoveryOutcome::planned(plan, overdue_count)
    }
}

/// Day loads after applying `moves` to the request's calendar.
pub fn loads_after(request: &ProposalRequest, moves: &[ProposedMove]) -> Vec<u64> {
    let mut loads: Vec<u64> = request.calendar.iter().map(|d| d.load_minutes).collect();
    loads.resize(WINDOW_DAYS, 0);

    let mut current_day: HashMap<&str, (usize, u32)> = HashMap::new();
    for day in &request.calendar {
        for task in &day.tasks {
            current_day.insert(task.task_id.as_str(), (day.day_offset, task.estimated_time));
        }
    }
    let overdue_minutes: HashMap<&str, u32> = request
        .overdue_tasks
        .iter()
        .map(|t| (t.id.as_str(), t.minutes))
        .collect();

    for mv in moves {
        let minutes = if let Some(&(from, minutes)) = current_day.get(mv.task_id.as_str()) {
            if let Some(load) = loads.get_mut(from) {
                *load = load.saturating_sub(u64::from(minutes));
            }
            minutes
        } else {
            overdue_minutes.get(mv.task_id.as_str()).copied().unwrap_or(0)
        };
        if let Some(load) = loads.get_mut(mv.day_offset) {
            *load += u64::from(minutes);
        }
    }
    loads
}

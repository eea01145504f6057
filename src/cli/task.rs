//! dayplan task command implementations.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::estimate::EstimatedTime;
use crate::output::{emit_success, format_minutes, HumanOutput};
use crate::store::{resolve_task_id, TaskStore};
use crate::task::{
    format_day, generate_task_id, local_day_start, parse_day, slot_timestamp, sort_for_schedule,
    Priority, Task,
};

use super::GlobalOptions;

pub struct AddOptions {
    pub title: String,
    pub goal: String,
    pub priority: String,
    pub estimate: Option<String>,
    pub due: Option<String>,
    pub globals: GlobalOptions,
}

pub struct ListOptions {
    pub all: bool,
    pub globals: GlobalOptions,
}

pub struct CompleteOptions {
    pub id: String,
    pub completed: bool,
    pub globals: GlobalOptions,
}

#[derive(Serialize)]
struct TaskListOutput {
    user: String,
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct TaskStatusOutput {
    id: String,
    completed: bool,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let session = options.globals.session()?;
    let title = options.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }
    let goal = options.goal.trim();
    if goal.is_empty() {
        return Err(Error::InvalidArgument("goal cannot be empty".to_string()));
    }
    let priority: Priority = options.priority.parse()?;

    let mut task = Task::new(generate_task_id(), &session.user, goal, title).with_priority(priority);
    if let Some(estimate) = options.estimate.as_deref().map(str::trim) {
        if !estimate.is_empty() {
            task = task.with_estimate(parse_estimate(estimate));
        }
    }
    if let Some(due) = options.due.as_deref() {
        let day = parse_day(due, session.today)?;
        let due_date = slot_timestamp(local_day_start(day)?, 0, session.config.planner.slot_hour);
        task = task.with_due_date(due_date);
    }

    session.store().insert(task.clone())?;
    tracing::info!(task = %task.id, user = %task.user_id, "task added");

    let mut human = HumanOutput::new("Task created");
    human.push_summary("ID", task.id.clone());
    human.push_summary("Goal", task.goal_id.clone());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary("Estimate", format_minutes(u64::from(task.minutes())));
    match task.due_date {
        Some(due) => human.push_summary("Due", format_day(due)),
        None => human.push_warning("no due date; the task will not be scheduled".to_string()),
    }

    emit_success(options.globals.output(), "task add", &task, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let session = options.globals.session()?;
    let store = session.store();
    let mut tasks = if options.all {
        store.list_for_user(&session.user)?
    } else {
        store.list_incomplete_for_user(&session.user)?
    };
    sort_for_schedule(&mut tasks);

    let mut human = HumanOutput::new(format!("Tasks for {}", session.user));
    human.push_summary("Total", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(describe(task, session.today_start));
    }
    if tasks.is_empty() {
        human.push_next_step("dayplan task add <title> --goal <goal> --due today");
    }

    let output = TaskListOutput {
        user: session.user.clone(),
        total: tasks.len(),
        tasks,
    };
    emit_success(options.globals.output(), "task list", &output, Some(&human))
}

pub fn run_set_completed(options: CompleteOptions) -> Result<()> {
    let session = options.globals.session()?;
    let store = session.store();
    let resolved = resolve_task_id(&store, &session.user, &options.id)?;
    let task = store.set_completed(&resolved, options.completed)?;

    let (command, header) = if options.completed {
        ("task done", "Task completed")
    } else {
        ("task reopen", "Task reopened")
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());

    let output = TaskStatusOutput {
        id: task.id,
        completed: task.completed,
    };
    emit_success(options.globals.output(), command, &output, Some(&human))
}

/// Plain integers are minutes; anything else is kept as text and parsed on
/// use.
fn parse_estimate(value: &str) -> EstimatedTime {
    match value.parse::<i64>() {
        Ok(minutes) => EstimatedTime::Minutes(minutes),
        Err(_) => EstimatedTime::Text(value.to_string()),
    }
}

pub(crate) fn describe(task: &Task, today_start: i64) -> String {
    let mark = if task.completed { "x" } else { " " };
    let due = match task.due_date {
        Some(due) if task.is_overdue(today_start) && !task.completed => {
            format!("due {} (overdue)", format_day(due))
        }
        Some(due) => format!("due {}", format_day(due)),
        None => "no due date".to_string(),
    };
    format!(
        "[{mark}][{}] {} {} ({}, {}, {due})",
        task.priority,
        task.id,
        task.title,
        task.goal_id,
        format_minutes(u64::from(task.minutes()))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_keeps_integers_as_minutes() {
        assert_eq!(parse_estimate("45"), EstimatedTime::Minutes(45));
        assert_eq!(parse_estimate("1.5h"), EstimatedTime::Text("1.5h".to_string()));
    }

    #[test]
    fn describe_marks_overdue_tasks() {
        let today = 1_760_572_800_000;
        let task = Task::new("t-1", "ada", "g1", "Write essay")
            .with_estimate(90u32)
            .with_due_date(today - 1);
        let line = describe(&task, today);
        assert!(line.contains("(overdue)"));
        assert!(line.contains("1h 30m"));
        assert!(line.starts_with("[ ][medium] t-1 Write essay"));
    }
}

//! Command-line interface for dayplan
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::history::PlanHistory;
use crate::output::OutputOptions;
use crate::storage::Storage;
use crate::store::FileTaskStore;
use crate::task::{local_day_start, parse_day};

mod init;
mod plan;
mod recover;
mod task;
mod user;

/// dayplan - fit today's tasks into today's time
///
/// Splits tasks due today into what fits and what overflows, measures
/// overdue drift, and rebalances overdue work across the coming week.
#[derive(Parser, Debug)]
#[command(name = "dayplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "DAYPLAN_DIR")]
    pub dir: Option<PathBuf>,

    /// User whose tasks to operate on
    #[arg(long, global = true, env = "DAYPLAN_USER")]
    pub user: Option<String>,

    /// Treat this date as today (YYYY-MM-DD, or relative like -1d)
    #[arg(long, global = true, env = "DAYPLAN_TODAY", value_name = "DATE", allow_hyphen_values = true)]
    pub as_of: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging when RUST_LOG is unset
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Suggest which of today's tasks fit the time available
    Suggest {
        /// Minutes available today (defaults to planner.available_minutes)
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Commit a day plan: move tasks to today or tomorrow
    Commit {
        /// Task ids to schedule today (comma separated)
        #[arg(long, value_delimiter = ',')]
        today: Vec<String>,

        /// Task ids to push to tomorrow (comma separated)
        #[arg(long, value_delimiter = ',')]
        tomorrow: Vec<String>,
    },

    /// Show overdue drift
    Drift,

    /// Rebalance overdue tasks across the next seven days
    Recover {
        /// Show the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show committed plans, newest first
    History {
        /// Maximum number of plans to show
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Set or show the current user
    #[command(subcommand)]
    User(UserCommands),

    /// Create the data directory and a default config
    Init,
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Goal the task belongs to
        #[arg(long)]
        goal: String,

        /// Priority: low, medium, high
        #[arg(long, default_value = "medium")]
        priority: String,

        /// Estimated time (e.g. 45, 30m, 1.5h)
        #[arg(long)]
        estimate: Option<String>,

        /// Due date (YYYY-MM-DD, today, tomorrow, yesterday, +Nd, -Nd)
        #[arg(long, allow_hyphen_values = true)]
        due: Option<String>,
    },

    /// List tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },

    /// Mark a task completed
    Done {
        /// Task id or unique prefix
        id: String,
    },

    /// Mark a completed task open again
    Reopen {
        /// Task id or unique prefix
        id: String,
    },
}

/// User subcommands
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Persist the current user
    Set {
        /// User name
        name: String,
    },

    /// Show the resolved user
    Show,
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub dir: Option<PathBuf>,
    pub user: Option<String>,
    pub as_of: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    pub fn storage(&self) -> Storage {
        Storage::resolve(self.dir.as_deref())
    }

    /// Resolve storage, config, user and today for a command.
    pub fn session(&self) -> Result<Session> {
        let storage = self.storage();
        let config = Config::load_from_dir(storage.root())?;
        let user = crate::user::resolve_user(&storage, &config, self.user.as_deref());

        let wall_clock = Local::now().date_naive();
        let today = match self.as_of.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => parse_day(value, wall_clock)?,
            _ => wall_clock,
        };
        let today_start = local_day_start(today)?;

        tracing::debug!(
            dir = %storage.root().display(),
            user = %user,
            today = %today,
            "session resolved"
        );

        Ok(Session {
            storage,
            config,
            user,
            today,
            today_start,
        })
    }
}

/// Everything a command needs once globals are resolved.
pub struct Session {
    pub storage: Storage,
    pub config: Config,
    pub user: String,
    pub today: NaiveDate,
    pub today_start: i64,
}

impl Session {
    pub fn store(&self) -> FileTaskStore {
        FileTaskStore::new(self.storage.clone())
    }

    pub fn history(&self) -> PlanHistory {
        PlanHistory::new(self.storage.clone())
    }
}

impl Cli {
    fn globals(&self) -> GlobalOptions {
        GlobalOptions {
            dir: self.dir.clone(),
            user: self.user.clone(),
            as_of: self.as_of.clone(),
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let globals = self.globals();
        match self.command {
            Commands::Init => init::run(globals),
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    title,
                    goal,
                    priority,
                    estimate,
                    due,
                } => task::run_add(task::AddOptions {
                    title,
                    goal,
                    priority,
                    estimate,
                    due,
                    globals,
                }),
                TaskCommands::List { all } => task::run_list(task::ListOptions { all, globals }),
                TaskCommands::Done { id } => task::run_set_completed(task::CompleteOptions {
                    id,
                    completed: true,
                    globals,
                }),
                TaskCommands::Reopen { id } => task::run_set_completed(task::CompleteOptions {
                    id,
                    completed: false,
                    globals,
                }),
            },
            Commands::Suggest { minutes } => {
                plan::run_suggest(plan::SuggestOptions { minutes, globals })
            }
            Commands::Commit { today, tomorrow } => plan::run_commit(plan::CommitOptions {
                today,
                tomorrow,
                globals,
            }),
            Commands::Drift => recover::run_drift(globals),
            Commands::Recover { dry_run } => {
                recover::run_recover(recover::RecoverOptions { dry_run, globals })
            }
            Commands::History { limit } => {
                recover::run_history(recover::HistoryOptions { limit, globals })
            }
            Commands::User(cmd) => match cmd {
                UserCommands::Set { name } => user::run_set(user::SetOptions { name, globals }),
                UserCommands::Show => user::run_show(globals),
            },
        }
    }
}

//! dayplan - day planning and overdue-task recovery
//!
//! This library provides the core of the dayplan CLI: fitting today's tasks
//! into the time available, measuring overdue drift, and rebalancing overdue
//! work across the coming week.
//!
//! # Core Concepts
//!
//! - **Bucket**: today's capacity; tasks are walked once in priority order
//!   and either fit or overflow
//! - **Drift**: overdue workload, counted in tasks and estimated minutes
//! - **Recovery**: moving overdue tasks into the next seven days under a
//!   daily ceiling, with the same-goal swap rule for a full today
//! - **Proposer**: the source of a recovery plan, built in or external
//!
//! # Module Organization
//!
//! - `bucket`: daily bucket scheduler
//! - `drift`: drift metrics
//! - `calendar`: seven-day load calendar
//! - `recovery`: recovery engine and plan proposers
//! - `planner`: caller-facing operations over a task store
//! - `store`: task store trait, file and memory stores
//! - `task`: task records, priorities, day arithmetic
//! - `estimate`: estimated-time parsing
//! - `history`: log of applied plans
//! - `config`: configuration loading from `config.toml`
//! - `storage`: data directory layout and file I/O
//! - `lock`: file locking for concurrent writers
//! - `user`: user identity resolution
//! - `output`: JSON and human output for the CLI
//! - `cli`: command-line interface using clap
//! - `error`: error types and result aliases

pub mod bucket;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod drift;
pub mod error;
pub mod estimate;
pub mod history;
pub mod lock;
pub mod output;
pub mod planner;
pub mod recovery;
pub mod storage;
pub mod store;
pub mod task;
pub mod user;

pub use error::{Error, Result};

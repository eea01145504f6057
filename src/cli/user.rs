//! dayplan user command implementation
//!
//! Provides user identity helpers (set/show).

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::user;

use super::GlobalOptions;

/// Options for `dayplan user set`
pub struct SetOptions {
    pub name: String,
    pub globals: GlobalOptions,
}

#[derive(serde::Serialize)]
struct UserSetReport {
    user: String,
    path: PathBuf,
}

#[derive(serde::Serialize)]
struct UserShowReport {
    user: String,
    persisted: bool,
}

pub fn run_set(options: SetOptions) -> Result<()> {
    let storage = options.globals.storage();
    let name = user::persist_user(&storage, &options.name)?;
    let path = storage.user_file();

    let report = UserSetReport {
        user: name.clone(),
        path: path.clone(),
    };

    let mut human = HumanOutput::new(format!("dayplan user set: {name}"));
    human.push_summary("user", name);
    human.push_summary("path", path.display().to_string());
    human.push_next_step("dayplan task add <title> --goal <goal>");

    emit_success(options.globals.output(), "user set", &report, Some(&human))
}

pub fn run_show(globals: GlobalOptions) -> Result<()> {
    let storage = globals.storage();
    let config = Config::load_from_dir(storage.root())?;
    let name = user::resolve_user(&storage, &config, globals.user.as_deref());
    let persisted = storage.read_user().is_some();

    let report = UserShowReport {
        user: name.clone(),
        persisted,
    };

    let mut human = HumanOutput::new(format!("dayplan user: {name}"));
    human.push_summary("user", name);
    if !persisted && globals.user.is_none() {
        human.push_warning("user not set; using default".to_string());
        human.push_next_step("dayplan user set <name>");
    }

    emit_success(globals.output(), "user show", &report, Some(&human))
}

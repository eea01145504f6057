//! dayplan init command implementation
//!
//! Creates the data directory and a default `config.toml`.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

use super::GlobalOptions;

#[derive(serde::Serialize)]
struct InitReport {
    dir: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    dir: bool,
    config: bool,
}

pub fn run(globals: GlobalOptions) -> Result<()> {
    let storage = globals.storage();

    let created_dir = !storage.is_initialized();
    if storage.root().exists() && created_dir {
        return Err(Error::OperationFailed(format!(
            "data path exists but is not a directory: {}",
            storage.root().display()
        )));
    }
    storage.init()?;
    let created_config = ensure_config(&storage.config_file())?;

    let report = InitReport {
        dir: storage.root().to_path_buf(),
        created: InitCreated {
            dir: created_dir,
            config: created_config,
        },
    };

    let mut created_items = Vec::new();
    if created_dir {
        created_items.push("data dir");
    }
    if created_config {
        created_items.push("config.toml");
    }

    let header = if created_items.is_empty() {
        "dayplan init: nothing to do".to_string()
    } else {
        "dayplan init: initialized".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("dir", storage.root().display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("dayplan user set <name>");
    human.push_next_step("dayplan task add <title> --goal <goal> --due today");

    emit_success(globals.output(), "init", &report, Some(&human))
}

fn ensure_config(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "config.toml exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(config_path)?;
    Ok(true)
}

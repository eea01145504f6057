mod support;

use predicates::str::contains;

use support::{dayplan_cmd, TestDir};

#[test]
fn dayplan_help_works() {
    dayplan_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("fit today's tasks"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "task", "suggest", "commit", "drift", "recover", "history", "user", "init",
    ];

    for cmd in subcommands {
        dayplan_cmd().arg(cmd).arg("--help").assert().success();
    }
}

#[test]
fn init_creates_default_config_once() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TestDir::new();
    let data = dir.json(&["init"]);
    assert_eq!(data["created"]["config"], true);

    let config = std::fs::read_to_string(dir.path().join("config.toml"))?;
    assert!(config.contains("available_minutes = 240"));

    let again = dir.json(&["init"]);
    assert_eq!(again["created"]["config"], false);
    assert_eq!(again["created"]["dir"], false);
    Ok(())
}

#[test]
fn user_set_persists_and_show_reads() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TestDir::new();

    dir.cmd()
        .args(["user", "show"])
        .assert()
        .success()
        .stdout(contains("dayplan user: me"));

    dir.cmd().args(["user", "set", "ada"]).assert().success();
    let contents = std::fs::read_to_string(dir.path().join("user"))?;
    assert!(contents.contains("ada"));

    let shown = dir.json(&["user", "show"]);
    assert_eq!(shown["user"], "ada");
    assert_eq!(shown["persisted"], true);

    dir.cmd()
        .env("DAYPLAN_USER", "env-user")
        .args(["user", "show"])
        .assert()
        .success()
        .stdout(contains("env-user"));
    Ok(())
}

#[test]
fn tasks_are_scoped_to_the_user() {
    let dir = TestDir::new();
    dir.add_task("Read chapter 3", "reading", &["--due", "today"]);
    dir.cmd()
        .args(["--user", "bob", "task", "add", "Bob's task", "--goal", "g"])
        .assert()
        .success();

    let mine = dir.json(&["task", "list"]);
    assert_eq!(mine["total"], 1);
    assert_eq!(mine["user"], "me");

    let bobs = dir.json(&["--user", "bob", "task", "list"]);
    assert_eq!(bobs["total"], 1);
}

#[test]
fn done_and_reopen_accept_id_prefixes() {
    let dir = TestDir::new();
    let id = dir.add_task("Essay draft", "writing", &["--due", "today"]);
    let prefix = &id[..8];

    let done = dir.json(&["task", "done", prefix]);
    assert_eq!(done["id"], id.as_str());
    assert_eq!(done["completed"], true);
    assert_eq!(dir.json(&["task", "list"])["total"], 0);
    assert_eq!(dir.json(&["task", "list", "--all"])["total"], 1);

    dir.json(&["task", "reopen", &id]);
    assert_eq!(dir.json(&["task", "list"])["total"], 1);
}

#[test]
fn unknown_task_is_a_user_error() {
    let dir = TestDir::new();
    dir.cmd()
        .args(["task", "done", "t-nope"])
        .assert()
        .code(2)
        .stderr(contains("Task not found"));
}

#[test]
fn bad_due_date_is_a_user_error() {
    let dir = TestDir::new();
    dir.cmd()
        .arg("--json")
        .args(["task", "add", "x", "--goal", "g", "--due", "next week"])
        .assert()
        .code(2)
        .stdout(contains("\"kind\": \"user_error\""))
        .stdout(contains("\"command\": \"task add\""));
}

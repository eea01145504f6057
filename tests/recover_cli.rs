mod support;

use predicates::str::contains;
use serde_json::Value;

use support::TestDir;

fn move_for<'a>(data: &'a Value, id: &str) -> &'a Value {
    data["plan"]["moves"]
        .as_array()
        .expect("moves")
        .iter()
        .find(|mv| mv["task_id"] == id)
        .expect("move for task")
}

#[test]
fn drift_reports_critical_by_minutes_alone() {
    let dir = TestDir::new();
    dir.add_task("a", "g1", &["--estimate", "100", "--due", "-1d"]);
    dir.add_task("b", "g1", &["--estimate", "60", "--due", "-2d"]);
    dir.add_task("c", "g1", &["--estimate", "40", "--due", "yesterday"]);
    dir.add_task("today", "g1", &["--estimate", "600", "--due", "today"]);

    let data = dir.json(&["drift"]);
    assert_eq!(data["has_drift"], true);
    assert_eq!(data["overdue_count"], 3);
    assert_eq!(data["drift_minutes"], 200);
    assert_eq!(data["is_critical"], true);
    assert_eq!(data["overdue_tasks"].as_array().expect("tasks").len(), 3);
}

#[test]
fn dry_run_previews_without_writing() {
    let dir = TestDir::new();
    let late = dir.add_task("late", "g1", &["--estimate", "30", "--due", "-1d"]);
    let before = dir.due_date(&late);

    let data = dir.json(&["recover", "--dry-run"]);
    assert_eq!(data["success"], true);
    assert_eq!(data["applied"], false);
    assert_eq!(move_for(&data, &late)["day_offset"], 0);
    assert_eq!(dir.due_date(&late), before);
    assert_eq!(dir.json(&["history"])["total"], 0);
}

#[test]
fn recover_swaps_same_goal_task_out_of_a_full_today() {
    let dir = TestDir::new();
    let full = dir.add_task("big block", "thesis", &["--estimate", "700", "--due", "today"]);
    let late = dir.add_task("late", "thesis", &["--estimate", "50", "--due", "-1d"]);

    let data = dir.json(&["recover"]);
    assert_eq!(data["success"], true);
    assert_eq!(data["applied"], true);

    let incoming = move_for(&data, &late);
    assert_eq!(incoming["day_offset"], 0);
    assert_eq!(incoming["reason"], "swap_in");
    let displaced = move_for(&data, &full);
    assert_eq!(displaced["day_offset"], 1);
    assert_eq!(displaced["reason"], "displaced");

    let today_date = incoming["new_date"].as_i64().expect("date");
    assert_eq!(dir.due_date(&late), Some(today_date));
    assert_eq!(dir.due_date(&full), Some(today_date + 86_400_000));

    assert_eq!(dir.json(&["drift"])["has_drift"], false);
    let history = dir.json(&["history", "--limit", "1"]);
    assert_eq!(history["plans"][0]["kind"], "recovery");
}

#[test]
fn recover_without_match_uses_first_open_day() {
    let dir = TestDir::new();
    dir.add_task("busy today", "other", &["--estimate", "700", "--due", "today"]);
    dir.add_task("busy tomorrow", "other", &["--estimate", "700", "--due", "tomorrow"]);
    let late = dir.add_task("late", "thesis", &["--estimate", "50", "--due", "-1d"]);

    let data = dir.json(&["recover", "--dry-run"]);
    let mv = move_for(&data, &late);
    assert_eq!(mv["day_offset"], 2);
    assert_eq!(mv["reason"], "open_day");
    assert_eq!(data["plan"]["moves"].as_array().expect("moves").len(), 1);
}

#[test]
fn recover_with_nothing_overdue_succeeds() {
    let dir = TestDir::new();
    dir.add_task("fine", "g1", &["--due", "today"]);

    let data = dir.json(&["recover"]);
    assert_eq!(data["success"], true);
    assert_eq!(data["applied"], false);
    assert_eq!(data["message"], "No overdue tasks to recover.");
}

#[cfg(unix)]
#[test]
fn malformed_command_plan_is_retryable() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TestDir::new();
    dir.write_config(
        "[recovery]\nproposer = \"command\"\ncommand = [\"sh\", \"-c\", \"cat >/dev/null; echo 'no plan today'\"]\n",
    )?;
    let late = dir.add_task("late", "g1", &["--due", "-1d"]);
    let before = dir.due_date(&late);

    dir.cmd()
        .arg("--json")
        .arg("recover")
        .assert()
        .code(3)
        .stdout(contains("\"kind\": \"retryable\""))
        .stdout(contains("Please try again"));
    assert_eq!(dir.due_date(&late), before);
    Ok(())
}

#[cfg(unix)]
#[test]
fn unreachable_command_proposer_is_a_system_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TestDir::new();
    dir.write_config(
        "[recovery]\nproposer = \"command\"\ncommand = [\"dayplan-proposer-that-does-not-exist\"]\n",
    )?;
    dir.add_task("late", "g1", &["--due", "-1d"]);

    dir.cmd()
        .arg("recover")
        .assert()
        .code(4)
        .stderr(contains("System error"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn command_proposer_plan_is_applied() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TestDir::new();
    let late = dir.add_task("late", "g1", &["--due", "-1d"]);
    let script = format!(
        "cat >/dev/null; echo 'Here you go: {{\"moves\": [{{\"taskId\": \"{late}\", \"dayOffset\": 3}}]}}'"
    );
    dir.write_config(&format!(
        "[recovery]\nproposer = \"command\"\ncommand = [\"sh\", \"-c\", {}]\n",
        toml_string(&script)
    ))?;

    let data = dir.json(&["recover"]);
    assert_eq!(data["plan"]["proposer"], "sh");
    let mv = move_for(&data, &late);
    assert_eq!(mv["day_offset"], 3);
    assert_eq!(dir.due_date(&late), mv["new_date"].as_i64());
    Ok(())
}

#[cfg(unix)]
#[test]
fn hung_command_proposer_times_out() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TestDir::new();
    dir.write_config(
        "[recovery]\nproposer = \"command\"\ncommand = [\"sh\", \"-c\", \"sleep 30\"]\ntimeout_secs = 1\n",
    )?;
    let late = dir.add_task("late", "g1", &["--due", "-1d"]);
    let before = dir.due_date(&late);

    dir.cmd()
        .arg("recover")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .code(4)
        .stderr(contains("System error"));
    assert_eq!(dir.due_date(&late), before);
    Ok(())
}

#[cfg(unix)]
#[test]
fn command_plan_overloading_a_day_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TestDir::new();
    dir.add_task("booked", "g2", &["--due", "+1d", "--estimate", "700"]);
    let late: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|title| dir.add_task(title, "g1", &["--due", "-1d", "--estimate", "300"]))
        .collect();
    let moves: Vec<String> = late
        .iter()
        .map(|id| format!("{{\"task_id\": \"{id}\", \"day_offset\": 1}}"))
        .collect();
    let script = format!("cat >/dev/null; echo '[{}]'", moves.join(", "));
    dir.write_config(&format!(
        "[recovery]\nproposer = \"command\"\ncommand = [\"sh\", \"-c\", {}]\n",
        toml_string(&script)
    ))?;
    let before: Vec<Option<i64>> = late.iter().map(|id| dir.due_date(id)).collect();

    dir.cmd()
        .arg("recover")
        .assert()
        .code(3)
        .stderr(contains("Please try again"));
    let after: Vec<Option<i64>> = late.iter().map(|id| dir.due_date(id)).collect();
    assert_eq!(after, before);
    Ok(())
}

fn toml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

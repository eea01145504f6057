//! Shared output formatting for dayplan CLI commands.
//!
//! Every command produces one payload. With `--json` it is wrapped in a
//! versioned envelope on stdout; otherwise a [`HumanOutput`] is rendered.

use serde::Serialize;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "dayplan.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    sections: Vec<(String, Vec<String>)>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            sections: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    /// Add a line under `title`, creating the section on first use.
    /// Sections render in the order they were first pushed.
    pub fn push_item(&mut self, title: &str, value: impl Into<String>) {
        match self.sections.iter_mut().find(|(name, _)| name == title) {
            Some((_, items)) => items.push(value.into()),
            None => self.sections.push((title.to_string(), vec![value.into()])),
        }
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.push_item("Details", value);
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();
        let next_steps = human.map(|h| h.next_steps.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            },
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];

    if !output.summary.is_empty() {
        lines.push(String::new());
        for (key, value) in &output.summary {
            if value.is_empty() {
                lines.push(format!("  {key}"));
            } else {
                lines.push(format!("  {key}: {value}"));
            }
        }
    }

    for (title, items) in &output.sections {
        push_section(&mut lines, title, items);
    }
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// `95` → `1h 35m`, `45` → `45m`, `120` → `2h`.
pub fn format_minutes(minutes: u64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Global flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--dir", "--user", "--as-of"];

pub fn infer_command_name_from_args() -> String {
    let mut args = std::env::args().skip(1);
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        positional.push(arg);
        if positional.len() == 2 {
            break;
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next() {
        Some(cmd) => cmd,
        None => return "dayplan".to_string(),
    };

    if matches!(command.as_str(), "task" | "user") {
        if let Some(sub) = positional.next() {
            return format!("{command} {sub}");
        }
    }
    command
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "retryable",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::TaskNotFound(_) => vec!["dayplan task list --all".to_string()],
        Error::InvalidDate(_) => {
            vec!["use YYYY-MM-DD, today, tomorrow, yesterday or +Nd".to_string()]
        }
        Error::InvalidConfig(_) => {
            vec!["fix config.toml in the data directory then retry".to_string()]
        }
        Error::PlanRejected(_) => vec!["dayplan recover".to_string()],
        Error::ProposerUnavailable(_) => vec![
            "check [recovery] command in config.toml, or set proposer = \"builtin\"".to_string(),
        ],
        Error::LockFailed(_) => {
            vec!["retry once the other dayplan process finishes".to_string()]
        }
        _ => Vec::new(),
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_render_in_push_order() {
        let mut out = HumanOutput::new("suggest: 2 planned, 1 overflow");
        out.push_summary("budget", "2h");
        out.push_item("Planned", "a");
        out.push_item("Overflow", "b");
        out.push_item("Planned", "c");
        out.push_next_step("dayplan commit");

        let text = format_human(&out);
        let planned = text.find("Planned:").expect("planned section");
        let overflow = text.find("Overflow:").expect("overflow section");
        assert!(planned < overflow);
        assert!(text.contains("- a\n- c"));
        assert!(text.contains("  budget: 2h"));
        assert!(text.ends_with("Next steps:\n- dayplan commit"));
    }

    #[test]
    fn minutes_format() {
        assert_eq!(format_minutes(0), "0m");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(95), "1h 35m");
    }

    #[test]
    fn error_kinds_follow_exit_codes() {
        assert_eq!(error_kind(&Error::TaskNotFound("x".into())), "user_error");
        assert_eq!(error_kind(&Error::PlanRejected("x".into())), "retryable");
        assert_eq!(
            error_kind(&Error::ProposerUnavailable("x".into())),
            "operation_failed"
        );
    }
}

use atty::Stream;
use color_eyre::Result;
use layerbox_core::{to_json_response, CommandStatus, ExecutionOutcome};
use serde_json::Value;

use crate::style::Style;

pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

/// Prints the outcome and returns the process exit code.
pub fn emit_output(opts: &OutputOptions, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    if opts.json {
        let payload = to_json_response(outcome, code);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    if outcome.status == CommandStatus::Ok {
        if !opts.quiet {
            let style = Style::new(opts.no_color, atty::is(Stream::Stdout));
            println!("{}", style.status(&outcome.status, &outcome.message));
        }
        return Ok(code);
    }

    let style = Style::new(opts.no_color, atty::is(Stream::Stderr));
    let header = format!("{}  {}", error_code(&outcome.details), outcome.message);
    eprintln!("{}", style.error_header(&header));
    eprintln!();
    eprintln!("Why:");
    for reason in collect_why_bullets(&outcome.details, &outcome.message) {
        eprintln!("  • {reason}");
    }
    let fixes = collect_fix_bullets(&outcome.details);
    if !fixes.is_empty() {
        eprintln!();
        eprintln!("Fix:");
        for fix in fixes {
            eprintln!("{}", style.fix_bullet(&format!("  • {fix}")));
        }
    }
    Ok(code)
}

fn error_code(details: &Value) -> String {
    details
        .get("code")
        .and_then(Value::as_str)
        .filter(|code| code.starts_with("LB"))
        .unwrap_or("LB000")
        .to_string()
}

fn collect_why_bullets(details: &Value, fallback: &str) -> Vec<String> {
    let mut bullets = Vec::new();
    if let Some(reason) = details.get("reason").and_then(Value::as_str) {
        push_unique(&mut bullets, reason_display(reason).unwrap_or(reason));
    }
    if let (Some(python), Some(machine)) = (
        details.get("python_version").and_then(Value::as_str),
        details.get("machine").and_then(Value::as_str),
    ) {
        push_unique(&mut bullets, format!("Host runs Python {python} on {machine}"));
    }
    if let Some(error) = details.get("error").and_then(Value::as_str) {
        push_unique(&mut bullets, error);
    }
    if let Some(line) = details
        .get("stderr")
        .and_then(Value::as_str)
        .and_then(|stderr| stderr.lines().rev().find(|line| !line.trim().is_empty()))
    {
        push_unique(&mut bullets, format!("Engine said: {}", line.trim()));
    }
    if let Some(issues) = details.get("issues").and_then(Value::as_array) {
        for issue in issues.iter().filter_map(Value::as_str) {
            push_unique(&mut bullets, issue);
        }
    }
    if bullets.is_empty() {
        bullets.push(fallback.to_string());
    }
    bullets
}

fn collect_fix_bullets(details: &Value) -> Vec<String> {
    let mut fixes = Vec::new();
    if let Some(hint) = details.get("hint").and_then(Value::as_str) {
        push_unique(&mut fixes, hint);
    }
    if fixes.is_empty() {
        fixes.push("Re-run with -v for more detail or --help for usage.".to_string());
    }
    fixes
}

fn push_unique(vec: &mut Vec<String>, text: impl Into<String>) {
    let entry = text.into();
    if entry.trim().is_empty() {
        return;
    }
    if !vec.iter().any(|existing| existing == &entry) {
        vec.push(entry);
    }
}

fn reason_display(reason: &str) -> Option<&'static str> {
    match reason {
        "engine_unavailable" => Some("The container engine could not be reached."),
        "unsupported_runtime" => Some("No sandbox base image exists for the host interpreter."),
        "interpreter_probe_failed" => Some("The host Python interpreter could not be inspected."),
        "build_failed" => Some("The image build failed."),
        "pull_failed" => Some("The image could not be pulled."),
        "session_start_failed" => Some("The container engine could not start the session."),
        "descriptor_io" => Some("The image descriptor could not be read or written."),
        "invalid_input" => Some("The invocation was not valid for this directory."),
        "internal_error" => Some("layerbox hit an unexpected error."),
        _ => None,
    }
}

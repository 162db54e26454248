//! Text and JSON rendering of lint results.

use crate::types::{LintResult, Severity};
use std::fmt::Write;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

fn severity_color(severity: &Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    }
}

/// Render `result` for a terminal. `source` names the linted archive.
pub fn render_text(result: &LintResult, source: &str, errors_only: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{BOLD}{CYAN}HAR Linter{RESET} {DIM}{source}{RESET}");

    let issues: Vec<_> = result
        .issues
        .iter()
        .filter(|i| !errors_only || i.severity == Severity::Error)
        .collect();

    if issues.is_empty() {
        let _ = writeln!(out, "{GREEN}{BOLD}No issues found!{RESET}");
    }
    for issue in issues {
        let color = severity_color(&issue.severity);
        let location = issue
            .path
            .as_ref()
            .map(|p| format!("{DIM}[{RESET}{CYAN}{p}{RESET}{DIM}]{RESET} "))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {color}|{RESET} {location}{BOLD}{color}{}{RESET}: {} {DIM}({}){RESET}",
            issue.severity.label(),
            issue.message,
            issue.code
        );
        if let Some(suggestion) = &issue.suggestion {
            let _ = writeln!(out, "  {color}|{RESET}   {GREEN}-> {suggestion}{RESET}");
        }
    }

    let _ = writeln!(
        out,
        "{DIM}Entries checked:{RESET} {BOLD}{}{RESET}  {RED}Errors:{RESET} {BOLD}{}{RESET}  {YELLOW}Warnings:{RESET} {BOLD}{}{RESET}",
        result.entries_checked, result.errors, result.warnings
    );
    out
}

/// Render `result` as pretty JSON.
pub fn render_json(result: &LintResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

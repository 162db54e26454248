//! HTTP archive (HAR) linting library for harhar.
//!
//! Checks an archive for the problems that would make replaying or
//! transforming it fail, plus optional header requirements. It can be used as
//! a library or through the `harhar-lint` CLI binary.
//!
//! # Example
//!
//! ```no_run
//! use harhar_lint::{lint_file, LintOptions};
//! use std::path::Path;
//!
//! let result = lint_file(Path::new("recording.har"), &LintOptions::default());
//! if result.has_errors() {
//!     eprintln!("Found {} errors", result.errors);
//! }
//! ```

mod report;
mod types;
mod validator;

use serde_json::Value;
use std::path::Path;

pub use report::{render_json, render_text};
pub use types::{LintIssue, LintOptions, LintResult, Severity};

// Re-export validation functions for advanced usage
pub use validator::{
    check_required_headers, validate_archive, validate_entry, validate_request, validate_response,
};

/// Lint a parsed archive document.
pub fn lint_archive(archive: &Value, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    validate_archive(archive, &mut result, options);
    result
}

/// Lint archive text.
pub fn lint_str(text: &str, options: &LintOptions) -> LintResult {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => lint_archive(&value, options),
        Err(e) => {
            let mut result = LintResult::new();
            result.add_issue(
                LintIssue::error("E002", format!("Invalid JSON: {e}"))
                    .with_suggestion("Check for JSON syntax errors"),
            );
            result
        }
    }
}

/// Lint an archive file.
pub fn lint_file(path: &Path, options: &LintOptions) -> LintResult {
    match std::fs::read_to_string(path) {
        Ok(content) => lint_str(&content, options),
        Err(e) => {
            let mut result = LintResult::new();
            result.add_issue(LintIssue::error(
                "E001",
                format!("Failed to read {}: {e}", path.display()),
            ));
            result
        }
    }
}

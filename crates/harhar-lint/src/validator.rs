//! Core validation logic for HTTP archives.

use crate::types::{LintIssue, LintOptions, LintResult};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const HAR_VERSION: &str = "1.2";
const BASE64_ENCODING: &str = "base64";

fn method_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[!#$%&'*+.^_`|~0-9A-Za-z-]+$").unwrap())
}

fn absolute_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://[^/?#\s]+[^\s]*$").unwrap())
}

/// Validate a complete archive document.
pub fn validate_archive(archive: &Value, result: &mut LintResult, options: &LintOptions) {
    let Some(log) = archive.get("log").filter(|v| v.is_object()) else {
        result.add_issue(
            LintIssue::error("E003", "Missing \"log\" object")
                .with_suggestion("Wrap the entries in {\"log\": {\"entries\": [...]}}"),
        );
        return;
    };

    check_version(log, result);
    if log.get("creator").is_none() {
        result.add_issue(LintIssue::error("E005", "Missing creator").at("log.creator"));
    }

    let Some(entries) = log.get("entries").and_then(|v| v.as_array()) else {
        result.add_issue(LintIssue::error("E006", "\"entries\" is not an array").at("log.entries"));
        return;
    };

    for (idx, entry) in entries.iter().enumerate() {
        validate_entry(entry, idx, result, options);
    }
}

fn check_version(log: &Value, result: &mut LintResult) {
    match log.get("version") {
        None => result.add_issue(
            LintIssue::error("E004", "Missing version")
                .at("log.version")
                .with_suggestion(format!("Set \"version\" to \"{HAR_VERSION}\"")),
        ),
        Some(Value::String(version)) if version == HAR_VERSION => {}
        Some(other) => result.add_issue(
            LintIssue::warning("W002", format!("Unexpected HAR version {other}"))
                .at("log.version"),
        ),
    }
}

/// Validate one entry of `log.entries`.
pub fn validate_entry(entry: &Value, idx: usize, result: &mut LintResult, options: &LintOptions) {
    result.entries_checked += 1;
    let path = format!("log.entries[{idx}]");

    match entry.get("request").filter(|v| v.is_object()) {
        Some(request) => validate_request(request, &format!("{path}.request"), result, options),
        None => result.add_issue(LintIssue::error("E007", "Entry has no request").at(&path)),
    }
    match entry.get("response").filter(|v| v.is_object()) {
        Some(response) => {
            validate_response(response, &format!("{path}.response"), result, options)
        }
        None => result.add_issue(LintIssue::error("E008", "Entry has no response").at(&path)),
    }
}

/// Validate a request object.
pub fn validate_request(request: &Value, path: &str, result: &mut LintResult, options: &LintOptions) {
    match request.get("method").and_then(|v| v.as_str()) {
        None => result.add_issue(LintIssue::error("E009", "Request has no method").at(path)),
        Some(method) if !method_token().is_match(method) => result.add_issue(
            LintIssue::warning("W001", format!("Method '{method}' is not an HTTP token"))
                .at(format!("{path}.method")),
        ),
        Some(_) => {}
    }

    match request.get("url").and_then(|v| v.as_str()) {
        None => result.add_issue(LintIssue::error("E010", "Request has no url").at(path)),
        Some(url) if !absolute_url().is_match(url) => result.add_issue(
            LintIssue::error("E011", format!("Invalid url '{url}'"))
                .at(format!("{path}.url"))
                .with_suggestion("Use an absolute URL such as http://host/path"),
        ),
        Some(_) => {}
    }

    if let Some(encoding) = request
        .pointer("/postData/encoding")
        .and_then(|v| v.as_str())
    {
        if encoding != BASE64_ENCODING {
            result.add_issue(
                LintIssue::error("E014", format!("Unsupported postData encoding '{encoding}'"))
                    .at(format!("{path}.postData.encoding"))
                    .with_suggestion("Use \"base64\" or leave the encoding out"),
            );
        }
    }

    check_required_headers(
        request,
        &options.require_request_headers,
        "E015",
        "Request",
        path,
        result,
    );
}

/// Validate a response object.
pub fn validate_response(
    response: &Value,
    path: &str,
    result: &mut LintResult,
    options: &LintOptions,
) {
    match response.get("status") {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => result.add_issue(
                LintIssue::info("I001", "Status 0 marks an exchange that failed in transport")
                    .at(format!("{path}.status")),
            ),
            Some(status) if (0..=999).contains(&status) => {}
            _ => result.add_issue(
                LintIssue::error("E013", format!("Status {n} is outside 0-999"))
                    .at(format!("{path}.status")),
            ),
        },
        _ => result.add_issue(
            LintIssue::error("E012", "Response status is not a number").at(format!("{path}.status")),
        ),
    }

    check_required_headers(
        response,
        &options.require_response_headers,
        "E016",
        "Response",
        path,
        result,
    );
}

/// Report every name of `required` missing from `message.headers`.
pub fn check_required_headers(
    message: &Value,
    required: &[String],
    code: &str,
    kind: &str,
    path: &str,
    result: &mut LintResult,
) {
    if required.is_empty() {
        return;
    }
    let present: Vec<String> = message
        .get("headers")
        .and_then(|v| v.as_array())
        .map(|headers| {
            headers
                .iter()
                .filter_map(|h| h.get("name").and_then(|n| n.as_str()))
                .map(|n| n.to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default();

    for name in required {
        if !present.contains(&name.to_ascii_lowercase()) {
            result.add_issue(
                LintIssue::error(code, format!("{kind} is missing header '{name}'"))
                    .at(format!("{path}.headers")),
            );
        }
    }
}

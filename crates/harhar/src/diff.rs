//! Comparison of two archives.
//!
//! Entries are paired by their `x-request-id` header. Entries without one
//! cannot be paired and are skipped. Each side of a pair is the list of all
//! entries carrying that id, in archive order.

use crate::error::HarError;
use crate::fingerprint::REQUEST_ID_HEADER;
use crate::har::{Archive, Entry};
use crate::name_value::get_value_by_name;
use similar::TextDiff;
use tracing::debug;

const CONTEXT_LINES: usize = 100;

/// One request id whose entries differ between the two archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDiff {
    pub request_id: String,
    /// Unified line diff of the two pretty-printed entry lists.
    pub diff: String,
}

/// Group entries by request id. Groups are in first-seen order.
pub fn index_by_request_id(entries: &[Entry]) -> Vec<(String, Vec<&Entry>)> {
    let mut index: Vec<(String, Vec<&Entry>)> = Vec::new();
    for entry in entries {
        let Some(id) = get_value_by_name(&entry.request.headers, REQUEST_ID_HEADER, false) else {
            continue;
        };
        match index.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, group)) => group.push(entry),
            None => index.push((id, vec![entry])),
        }
    }
    index
}

fn group<'a>(index: &[(String, Vec<&'a Entry>)], id: &str) -> Vec<&'a Entry> {
    index
        .iter()
        .find(|(existing, _)| existing == id)
        .map(|(_, group)| group.clone())
        .unwrap_or_default()
}

fn render(entries: &[&Entry]) -> Result<String, HarError> {
    let mut text = serde_json::to_string_pretty(entries).map_err(|source| HarError::Json {
        path: "<diff>".to_string(),
        source,
    })?;
    text.push('\n');
    Ok(text)
}

/// Diff every request id present in either archive. Ids whose entries
/// render identically are left out.
pub fn diff_archives(first: &Archive, second: &Archive) -> Result<Vec<EntryDiff>, HarError> {
    let first_index = index_by_request_id(first.entries());
    let second_index = index_by_request_id(second.entries());

    let mut ids: Vec<&str> = first_index.iter().map(|(id, _)| id.as_str()).collect();
    for (id, _) in &second_index {
        if !ids.contains(&id.as_str()) {
            ids.push(id);
        }
    }

    let mut diffs = Vec::new();
    for id in ids {
        let left = render(&group(&first_index, id))?;
        let right = render(&group(&second_index, id))?;
        if left == right {
            debug!("Entries for request id {} are identical", id);
            continue;
        }
        let diff = TextDiff::from_lines(&left, &right)
            .unified_diff()
            .context_radius(CONTEXT_LINES)
            .header("first", "second")
            .to_string();
        diffs.push(EntryDiff {
            request_id: id.to_string(),
            diff,
        });
    }
    Ok(diffs)
}

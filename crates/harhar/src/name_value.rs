//! Ordered name/value list helpers.
//!
//! Headers, query parameters and cookies are all kept as ordered lists of
//! [`NameValue`] pairs. Duplicated names are legal and order is significant,
//! so none of these helpers go through a map. Every function takes the input
//! by reference and returns a new list.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single name/value pair (header, query parameter, cookie, form param).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Name filter used by [`match_ignore_names`].
#[derive(Debug, Clone, Copy)]
pub struct NameFilter<'a> {
    /// Keep only these names. Empty means no restriction.
    pub matches: &'a [String],
    /// Drop these names after `matches` was applied.
    pub ignores: &'a [String],
    pub case_sensitive: bool,
}

impl<'a> NameFilter<'a> {
    pub fn new(matches: &'a [String], ignores: &'a [String], case_sensitive: bool) -> Self {
        Self {
            matches,
            ignores,
            case_sensitive,
        }
    }
}

fn names_equal(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

pub fn compare_name(a: &NameValue, b: &NameValue) -> Ordering {
    a.name.cmp(&b.name)
}

/// Stable ascending sort by name. Pairs with equal names keep their order.
pub fn sort_by_name(pairs: &[NameValue]) -> Vec<NameValue> {
    let mut sorted = pairs.to_vec();
    sorted.sort_by(compare_name);
    sorted
}

pub fn map_names<F>(pairs: &[NameValue], f: F) -> Vec<NameValue>
where
    F: Fn(&str) -> String,
{
    pairs
        .iter()
        .map(|pair| NameValue::new(f(&pair.name), pair.value.clone()))
        .collect()
}

pub fn get_values_by_name<'a>(
    pairs: &'a [NameValue],
    name: &str,
    case_sensitive: bool,
) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|pair| names_equal(&pair.name, name, case_sensitive))
        .map(|pair| pair.value.as_str())
        .collect()
}

/// All values for `name` joined with `", "`, or `None` when nothing matched
/// (or every matching value was empty).
pub fn get_value_by_name(pairs: &[NameValue], name: &str, case_sensitive: bool) -> Option<String> {
    let joined = get_values_by_name(pairs, name, case_sensitive).join(", ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Set `name` to `value`.
///
/// The first matching pair keeps its position and receives the new value,
/// later duplicates are dropped. When nothing matches the pair is appended.
pub fn set_value_by_name(
    pairs: &[NameValue],
    name: &str,
    value: &str,
    case_sensitive: bool,
) -> Vec<NameValue> {
    let mut result = Vec::with_capacity(pairs.len() + 1);
    let mut replaced = false;
    for pair in pairs {
        if names_equal(&pair.name, name, case_sensitive) {
            if !replaced {
                result.push(NameValue::new(pair.name.clone(), value));
                replaced = true;
            }
        } else {
            result.push(pair.clone());
        }
    }
    if !replaced {
        result.push(NameValue::new(name, value));
    }
    result
}

/// Restrict to `filter.matches` (if any), then remove `filter.ignores`.
pub fn match_ignore_names(pairs: &[NameValue], filter: &NameFilter<'_>) -> Vec<NameValue> {
    pairs
        .iter()
        .filter(|pair| {
            filter.matches.is_empty()
                || filter
                    .matches
                    .iter()
                    .any(|m| names_equal(m, &pair.name, filter.case_sensitive))
        })
        .filter(|pair| {
            !filter
                .ignores
                .iter()
                .any(|i| names_equal(i, &pair.name, filter.case_sensitive))
        })
        .cloned()
        .collect()
}

/// Group pairs by name. Groups are ordered by first occurrence and keep the
/// value order of the input.
pub fn to_object(pairs: &[NameValue]) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for pair in pairs {
        match grouped.iter_mut().find(|(name, _)| *name == pair.name) {
            Some((_, values)) => values.push(pair.value.clone()),
            None => grouped.push((pair.name.clone(), vec![pair.value.clone()])),
        }
    }
    grouped
}

/// Inverse of [`to_object`]: one pair per value.
pub fn from_object<N, V, I>(grouped: I) -> Vec<NameValue>
where
    I: IntoIterator<Item = (N, Vec<V>)>,
    N: Into<String>,
    V: Into<String>,
{
    grouped
        .into_iter()
        .flat_map(|(name, values)| {
            let name: String = name.into();
            values
                .into_iter()
                .map(move |value| NameValue::new(name.clone(), value))
        })
        .collect()
}

/// Parse a CRLF separated header block (`Name: value` lines).
pub fn parse_headers(raw: &str) -> Vec<NameValue> {
    raw.split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(':') {
            Some((name, value)) => NameValue::new(name.trim(), value.trim_start()),
            None => NameValue::new(line.trim(), ""),
        })
        .collect()
}

pub fn stringify_headers(pairs: &[NameValue]) -> String {
    pairs
        .iter()
        .map(|pair| format!("{}: {}", pair.name, pair.value))
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<NameValue> {
        items.iter().map(|(n, v)| NameValue::new(*n, *v)).collect()
    }

    #[test]
    fn test_sort_by_name_is_stable() {
        let input = pairs(&[("b", "1"), ("a", "2"), ("b", "0"), ("a", "1")]);
        let sorted = sort_by_name(&input);
        assert_eq!(
            sorted,
            pairs(&[("a", "2"), ("a", "1"), ("b", "1"), ("b", "0")])
        );
        // input untouched
        assert_eq!(input[0].name, "b");
    }

    #[test]
    fn test_get_value_by_name_joins_duplicates() {
        let input = pairs(&[("Accept", "a"), ("X", "1"), ("accept", "b")]);
        assert_eq!(
            get_value_by_name(&input, "accept", false),
            Some("a, b".to_string())
        );
        assert_eq!(
            get_value_by_name(&input, "accept", true),
            Some("b".to_string())
        );
        assert_eq!(get_value_by_name(&input, "missing", false), None);
    }

    #[test]
    fn test_get_value_by_name_empty_value_is_absent() {
        let input = pairs(&[("X-Empty", "")]);
        assert_eq!(get_value_by_name(&input, "X-Empty", true), None);
    }

    #[test]
    fn test_set_value_by_name_replaces_first_and_drops_rest() {
        let input = pairs(&[("A", "1"), ("Content-Type", "x"), ("B", "2"), ("content-type", "y")]);
        let result = set_value_by_name(&input, "content-type", "text/plain", false);
        assert_eq!(
            result,
            pairs(&[("A", "1"), ("Content-Type", "text/plain"), ("B", "2")])
        );
    }

    #[test]
    fn test_set_value_by_name_appends_when_missing() {
        let input = pairs(&[("A", "1")]);
        let result = set_value_by_name(&input, "B", "2", true);
        assert_eq!(result, pairs(&[("A", "1"), ("B", "2")]));
    }

    #[test]
    fn test_match_ignore_names() {
        let input = pairs(&[("Host", "h"), ("Accept", "a"), ("Cookie", "c")]);
        let matches = vec!["host".to_string(), "cookie".to_string()];
        let ignores = vec!["COOKIE".to_string()];
        let result = match_ignore_names(&input, &NameFilter::new(&matches, &ignores, false));
        assert_eq!(result, pairs(&[("Host", "h")]));

        // case-sensitive: nothing matches the lowercase names
        let result = match_ignore_names(&input, &NameFilter::new(&matches, &[], true));
        assert!(result.is_empty());
    }

    #[test]
    fn test_match_ignore_names_empty_filter_keeps_all() {
        let input = pairs(&[("a", "1"), ("b", "2")]);
        assert_eq!(match_ignore_names(&input, &NameFilter::new(&[], &[], true)), input);
    }

    #[test]
    fn test_to_object_and_back() {
        let input = pairs(&[("a", "1"), ("b", "2"), ("a", "3")]);
        let grouped = to_object(&input);
        assert_eq!(
            grouped,
            vec![
                ("a".to_string(), vec!["1".to_string(), "3".to_string()]),
                ("b".to_string(), vec!["2".to_string()]),
            ]
        );
        assert_eq!(
            from_object(grouped),
            pairs(&[("a", "1"), ("a", "3"), ("b", "2")])
        );
    }

    #[test]
    fn test_parse_and_stringify_headers() {
        let raw = "Content-Disposition: form-data; name=\"a\"\r\nContent-Type: text/plain";
        let headers = parse_headers(raw);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].name, "Content-Disposition");
        assert_eq!(headers[1].value, "text/plain");
        assert_eq!(stringify_headers(&headers), raw);
    }

    #[test]
    fn test_map_names() {
        let input = pairs(&[("A", "1")]);
        assert_eq!(map_names(&input, |n| n.to_lowercase()), pairs(&[("a", "1")]));
    }
}

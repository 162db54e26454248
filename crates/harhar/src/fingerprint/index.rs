//! Fingerprint lookup table over recorded entries.

use super::{fingerprint, Fingerprint};
use crate::config::MatchPolicy;
use crate::error::HarError;
use crate::har::{Entry, Response};
use std::collections::HashMap;
use tracing::{debug, info};

/// Maps request fingerprints to recorded responses.
///
/// When several entries share a fingerprint the last one in archive order
/// wins.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    responses: HashMap<Fingerprint, Response>,
    collisions: usize,
}

impl FingerprintIndex {
    pub fn build(entries: &[Entry], policy: &MatchPolicy) -> Result<Self, HarError> {
        let mut index = Self::default();
        for entry in entries {
            let key = fingerprint(&entry.request, policy)?;
            if index.responses.insert(key, entry.response.clone()).is_some() {
                index.collisions += 1;
            }
        }
        if index.collisions > 0 {
            debug!(
                "{} recorded entries share a fingerprint with a later entry and are shadowed",
                index.collisions
            );
        }
        info!("Indexed {} recorded responses", index.responses.len());
        Ok(index)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Response> {
        self.responses.get(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Number of entries shadowed by a later entry with the same fingerprint.
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::Request;

    fn entry(url: &str, status: u16) -> Entry {
        Entry::new(
            Request::new("GET", url),
            Response {
                status,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_last_entry_wins() {
        let entries = vec![
            entry("http://h/a", 200),
            entry("http://h/b", 201),
            entry("http://h/a", 202),
        ];
        let policy = MatchPolicy::default();
        let index = FingerprintIndex::build(&entries, &policy).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.collisions(), 1);

        let key = fingerprint(&Request::new("GET", "http://h/a"), &policy).unwrap();
        assert_eq!(index.get(&key).unwrap().status, 202);
    }

    #[test]
    fn test_miss() {
        let policy = MatchPolicy::default();
        let index = FingerprintIndex::build(&[entry("http://h/a", 200)], &policy).unwrap();
        let key = fingerprint(&Request::new("GET", "http://h/other"), &policy).unwrap();
        assert!(index.get(&key).is_none());
    }

    #[test]
    fn test_empty_archive() {
        let index = FingerprintIndex::build(&[], &MatchPolicy::default()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_invalid_recorded_url_fails() {
        let result = FingerprintIndex::build(&[entry("::bad::", 200)], &MatchPolicy::default());
        assert!(result.is_err());
    }
}

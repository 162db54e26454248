//! Replay of recorded responses.
//!
//! A [`Replayer`] indexes an archive by request fingerprint once, at startup.
//! The replay server looks every inbound request up in that index and
//! answers with the recorded response, or with status 599 when nothing
//! matches.
//!
//! # Module Structure
//!
//! - `server` - the [`ExchangeHandler`](crate::lifecycle::ExchangeHandler) and run loop

mod server;

pub use server::{run_replay_server, ReplayHandler};

use crate::config::MatchPolicy;
use crate::error::HarError;
use crate::fingerprint::{fingerprint, FingerprintIndex};
use crate::har::{Archive, Request, Response};

/// Status returned when no recorded response matches.
pub const MISS_STATUS: u16 = 599;

/// Result of looking a request up.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome<'a> {
    Hit(&'a Response),
    Miss,
}

/// Fingerprint index of an archive together with the policy it was built
/// with. Lookups always use the same policy.
#[derive(Debug)]
pub struct Replayer {
    index: FingerprintIndex,
    policy: MatchPolicy,
}

impl Replayer {
    pub fn new(archive: &Archive, policy: MatchPolicy) -> Result<Self, HarError> {
        let index = FingerprintIndex::build(archive.entries(), &policy)?;
        Ok(Self { index, policy })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn lookup(&self, request: &Request) -> Result<ReplayOutcome<'_>, HarError> {
        let key = fingerprint(request, &self.policy)?;
        Ok(match self.index.get(&key) {
            Some(response) => ReplayOutcome::Hit(response),
            None => ReplayOutcome::Miss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::{Entry, NameValue};

    fn archive() -> Archive {
        let request = Request {
            headers: vec![
                NameValue::new("Host", "localhost"),
                NameValue::new("Connection", "close"),
            ],
            ..Request::new("GET", "http://localhost/")
        };
        Archive::new(vec![Entry::new(request, Response::default())])
    }

    #[test]
    fn test_hit_and_miss() {
        let replayer = Replayer::new(&archive(), MatchPolicy::default()).unwrap();
        assert_eq!(replayer.len(), 1);

        let hit = archive().log.entries[0].request.clone();
        assert!(matches!(replayer.lookup(&hit).unwrap(), ReplayOutcome::Hit(r) if r.status == 200));

        let mut miss = hit.clone();
        miss.headers.push(NameValue::new("X-Extra", "1"));
        assert_eq!(replayer.lookup(&miss).unwrap(), ReplayOutcome::Miss);
    }

    #[test]
    fn test_lookup_uses_build_policy() {
        let policy = MatchPolicy {
            ignore_headers: vec!["x-extra".to_string()],
            ..Default::default()
        };
        let replayer = Replayer::new(&archive(), policy).unwrap();
        let mut request = archive().log.entries[0].request.clone();
        request.headers.push(NameValue::new("X-Extra", "1"));
        assert!(matches!(replayer.lookup(&request).unwrap(), ReplayOutcome::Hit(_)));
    }
}

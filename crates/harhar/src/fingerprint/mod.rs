//! Request fingerprinting.
//!
//! A request is reduced to a canonical record according to a
//! [`MatchPolicy`] and the record is hashed with SHA-256. Two requests match
//! during replay when their fingerprints are equal.
//!
//! # Module Structure
//!
//! - `canonical` - policy-driven canonical record and its hashing
//! - `index` - fingerprint -> entry lookup table built from an archive

mod canonical;
mod index;

pub use canonical::{
    canonical_request, CanonicalPostData, CanonicalRecord, CanonicalRequest, REQUEST_ID_HEADER,
};
pub use index::FingerprintIndex;

use crate::config::MatchPolicy;
use crate::error::HarError;
use crate::har::Request;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Hex-encoded SHA-256 digest of a canonical request record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a request under `policy`.
///
/// Fails only when the request URL cannot be parsed.
pub fn fingerprint(request: &Request, policy: &MatchPolicy) -> Result<Fingerprint, HarError> {
    let record = canonical_request(request, policy)?;
    let fingerprint = Fingerprint(record.digest());
    debug!(
        fingerprint = %fingerprint,
        record = ?record,
        "Fingerprinted {} {}",
        request.method,
        request.url
    );
    Ok(fingerprint)
}

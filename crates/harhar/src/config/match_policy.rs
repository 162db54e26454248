//! Options controlling which request fields a fingerprint is sensitive to.

use serde::{Deserialize, Serialize};

/// Request matching policy for replay.
///
/// Every field defaults to off/empty, which makes the fingerprint sensitive
/// to method, host, port, path, every header (name casing and order
/// included), every query parameter (order included) and the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchPolicy {
    /// Pair requests by their `x-request-id` header when present.
    pub match_request_id: bool,
    pub ignore_hostname: bool,
    pub ignore_port: bool,
    /// Only consider these headers (case-insensitive). Empty = all.
    pub match_headers: Vec<String>,
    pub ignore_headers: Vec<String>,
    pub ignore_header_casing: bool,
    pub ignore_header_order: bool,
    /// Only consider these query parameters (case-sensitive). Empty = all.
    pub match_query_params: Vec<String>,
    pub ignore_query_params: Vec<String>,
    pub ignore_query_param_order: bool,
    pub ignore_post_data: bool,
}

impl MatchPolicy {
    /// Combine two policies: flags are OR-ed, name lists concatenated.
    pub fn merge(mut self, other: MatchPolicy) -> Self {
        self.match_request_id |= other.match_request_id;
        self.ignore_hostname |= other.ignore_hostname;
        self.ignore_port |= other.ignore_port;
        self.match_headers.extend(other.match_headers);
        self.ignore_headers.extend(other.ignore_headers);
        self.ignore_header_casing |= other.ignore_header_casing;
        self.ignore_header_order |= other.ignore_header_order;
        self.match_query_params.extend(other.match_query_params);
        self.ignore_query_params.extend(other.ignore_query_params);
        self.ignore_query_param_order |= other.ignore_query_param_order;
        self.ignore_post_data |= other.ignore_post_data;
        self
    }
}

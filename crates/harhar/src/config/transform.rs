//! Options for rewriting archive entries.

use serde::{Deserialize, Serialize};

/// Transform options. All off/empty by default, which leaves an entry as is
/// apart from re-syncing `Content-Type` with the request body MIME type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformOptions {
    /// Header filters, matched case-insensitively (requests and responses).
    pub match_headers: Vec<String>,
    pub ignore_headers: Vec<String>,
    /// Query parameter filters, matched case-sensitively.
    pub match_query_params: Vec<String>,
    pub ignore_query_params: Vec<String>,
    /// Header filters for the parts of a multipart/form-data body.
    pub match_multipart_headers: Vec<String>,
    pub ignore_multipart_headers: Vec<String>,
    /// Lowercase header names and replace non-word characters with `-`.
    pub normalize_header_names: bool,
    pub remove_query_string_from_url: bool,
    pub replace_hostname: Option<String>,
    pub replace_port: Option<u16>,
    /// `http` or `https`.
    pub replace_protocol: Option<String>,
    pub replace_status_text: Option<String>,
    pub replace_multipart_boundary: Option<String>,
    /// Drop `startedDateTime`, zero `time` and reset timings.
    pub scrub_timings: bool,
    /// Reset header/body/content sizes to -1 and drop `compression`.
    pub scrub_sizes: bool,
    pub sort_headers: bool,
    pub sort_query_params: bool,
    /// Sort multipart parts by their serialized text. Reorders parts, so only
    /// use it when part order carries no meaning.
    pub sort_multipart: bool,
}

impl TransformOptions {
    /// Combine two option sets: flags OR-ed, lists concatenated, replacements
    /// from `other` win when set.
    pub fn merge(mut self, other: TransformOptions) -> Self {
        self.match_headers.extend(other.match_headers);
        self.ignore_headers.extend(other.ignore_headers);
        self.match_query_params.extend(other.match_query_params);
        self.ignore_query_params.extend(other.ignore_query_params);
        self.match_multipart_headers
            .extend(other.match_multipart_headers);
        self.ignore_multipart_headers
            .extend(other.ignore_multipart_headers);
        self.normalize_header_names |= other.normalize_header_names;
        self.remove_query_string_from_url |= other.remove_query_string_from_url;
        self.replace_hostname = other.replace_hostname.or(self.replace_hostname);
        self.replace_port = other.replace_port.or(self.replace_port);
        self.replace_protocol = other.replace_protocol.or(self.replace_protocol);
        self.replace_status_text = other.replace_status_text.or(self.replace_status_text);
        self.replace_multipart_boundary = other
            .replace_multipart_boundary
            .or(self.replace_multipart_boundary);
        self.scrub_timings |= other.scrub_timings;
        self.scrub_sizes |= other.scrub_sizes;
        self.sort_headers |= other.sort_headers;
        self.sort_query_params |= other.sort_query_params;
        self.sort_multipart |= other.sort_multipart;
        self
    }

    /// True when multipart parts need to be parsed rather than carried as is.
    pub fn rewrites_multipart_parts(&self) -> bool {
        self.sort_multipart
            || !self.match_multipart_headers.is_empty()
            || !self.ignore_multipart_headers.is_empty()
    }
}

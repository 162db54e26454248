//! Canonical request records and their digest.

use crate::config::MatchPolicy;
use crate::error::HarError;
use crate::har::{NameValue, Request};
use crate::name_value::{get_value_by_name, match_ignore_names, sort_by_name, NameFilter};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What a fingerprint is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalRecord {
    /// `x-request-id` value, used verbatim under `match_request_id`.
    RequestId(String),
    Request(CanonicalRequest),
}

/// Policy-reduced view of a request. `None` marks a field the policy left
/// out, which is distinct from a present but empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRequest {
    pub method: String,
    pub hostname: Option<String>,
    /// Empty when the URL uses the scheme's default port.
    pub port: Option<String>,
    pub pathname: String,
    pub headers: Vec<NameValue>,
    pub query_params: Vec<NameValue>,
    pub post_data: Option<CanonicalPostData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPostData {
    pub mime_type: String,
    pub params: Option<Vec<(String, Option<String>)>>,
    pub text: String,
}

/// Build the canonical record of `request` under `policy`.
pub fn canonical_request(
    request: &Request,
    policy: &MatchPolicy,
) -> Result<CanonicalRecord, HarError> {
    if policy.match_request_id {
        if let Some(id) = get_value_by_name(&request.headers, REQUEST_ID_HEADER, false) {
            return Ok(CanonicalRecord::RequestId(id));
        }
    }

    let url = request.parsed_url()?;

    let mut headers = match_ignore_names(
        &request.headers,
        &NameFilter::new(&policy.match_headers, &policy.ignore_headers, false),
    );
    if policy.ignore_header_casing {
        for header in &mut headers {
            header.name = header.name.to_lowercase();
        }
    }
    if policy.ignore_header_order {
        headers = sort_by_name(&headers);
    }

    let mut query_params = match_ignore_names(
        &request.query_string,
        &NameFilter::new(
            &policy.match_query_params,
            &policy.ignore_query_params,
            true,
        ),
    );
    if policy.ignore_query_param_order {
        query_params = sort_by_name(&query_params);
    }

    let post_data = if policy.ignore_post_data {
        None
    } else {
        request.post_data.as_ref().and_then(|post_data| {
            let params = post_data
                .params
                .as_ref()
                .filter(|params| !params.is_empty())
                .map(|params| {
                    params
                        .iter()
                        .map(|p| (p.name.clone(), p.value.clone()))
                        .collect::<Vec<_>>()
                });
            if params.is_none() && post_data.text.is_empty() {
                return None;
            }
            Some(CanonicalPostData {
                mime_type: post_data.mime_type.clone(),
                params,
                text: post_data.text.clone(),
            })
        })
    };

    Ok(CanonicalRecord::Request(CanonicalRequest {
        method: request.method.clone(),
        hostname: (!policy.ignore_hostname).then(|| url.host_str().unwrap_or("").to_string()),
        port: (!policy.ignore_port).then(|| url.port().map(|p| p.to_string()).unwrap_or_default()),
        pathname: url.path().to_string(),
        headers,
        query_params,
        post_data,
    }))
}

impl CanonicalRecord {
    /// SHA-256 over a tagged, length-prefixed encoding of the record.
    pub fn digest(&self) -> String {
        let mut encoder = DigestEncoder::default();
        match self {
            CanonicalRecord::RequestId(id) => {
                encoder.tag(b'I');
                encoder.str(id);
            }
            CanonicalRecord::Request(record) => {
                encoder.tag(b'R');
                encoder.str(&record.method);
                encoder.opt(record.hostname.as_deref());
                encoder.opt(record.port.as_deref());
                encoder.str(&record.pathname);
                encoder.pairs(&record.headers);
                encoder.pairs(&record.query_params);
                match &record.post_data {
                    None => encoder.tag(0),
                    Some(post_data) => {
                        encoder.tag(1);
                        encoder.str(&post_data.mime_type);
                        match &post_data.params {
                            None => encoder.tag(0),
                            Some(params) => {
                                encoder.tag(1);
                                encoder.len(params.len());
                                for (name, value) in params {
                                    encoder.str(name);
                                    encoder.opt(value.as_deref());
                                }
                            }
                        }
                        encoder.str(&post_data.text);
                    }
                }
            }
        }
        encoder.finish()
    }
}

#[derive(Default)]
struct DigestEncoder {
    hasher: Sha256,
}

impl DigestEncoder {
    fn tag(&mut self, tag: u8) {
        self.hasher.update([tag]);
    }

    fn len(&mut self, len: usize) {
        self.hasher.update((len as u64).to_be_bytes());
    }

    fn str(&mut self, value: &str) {
        self.len(value.len());
        self.hasher.update(value.as_bytes());
    }

    fn opt(&mut self, value: Option<&str>) {
        match value {
            None => self.tag(0),
            Some(value) => {
                self.tag(1);
                self.str(value);
            }
        }
    }

    fn pairs(&mut self, pairs: &[NameValue]) {
        self.len(pairs.len());
        for pair in pairs {
            self.str(&pair.name);
            self.str(&pair.value);
        }
    }

    fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CanonicalRequest {
        CanonicalRequest {
            method: "GET".to_string(),
            hostname: Some("localhost".to_string()),
            port: Some(String::new()),
            pathname: "/".to_string(),
            headers: vec![],
            query_params: vec![],
            post_data: None,
        }
    }

    #[test]
    fn test_omitted_differs_from_empty() {
        let omitted = CanonicalRecord::Request(CanonicalRequest {
            hostname: None,
            ..record()
        });
        let empty = CanonicalRecord::Request(CanonicalRequest {
            hostname: Some(String::new()),
            ..record()
        });
        assert_ne!(omitted.digest(), empty.digest());
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let a = CanonicalRecord::Request(CanonicalRequest {
            headers: vec![NameValue::new("ab", "c")],
            ..record()
        });
        let b = CanonicalRecord::Request(CanonicalRequest {
            headers: vec![NameValue::new("a", "bc")],
            ..record()
        });
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_request_id_differs_from_record() {
        let id = CanonicalRecord::RequestId("GET".to_string());
        assert_ne!(id.digest(), CanonicalRecord::Request(record()).digest());
    }

    #[test]
    fn test_digest_is_lowercase_hex() {
        let digest = CanonicalRecord::RequestId("abc".to_string()).digest();
        assert_eq!(digest.len(), 64);
        assert!(digest
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_default_port_is_empty() {
        let request = Request::new("GET", "http://localhost/");
        let CanonicalRecord::Request(record) =
            canonical_request(&request, &MatchPolicy::default()).unwrap()
        else {
            panic!("expected request record");
        };
        assert_eq!(record.hostname.as_deref(), Some("localhost"));
        assert_eq!(record.port.as_deref(), Some(""));
        assert_eq!(record.pathname, "/");
    }
}

//! Archive entities.
//!
//! Every struct fills every field on construction (`Default` plus the
//! `new` helpers) and on deserialization (`#[serde(default)]`), so a
//! missing field and a defaulted field are indistinguishable. Fields the
//! model does not know about are kept in `extra` and written back out.

use crate::error::HarError;
use crate::name_value::NameValue;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use url::Url;

pub const HAR_VERSION: &str = "1.2";
pub const CREATOR_NAME: &str = "harhar";
pub const DEFAULT_HTTP_VERSION: &str = "HTTP/1.1";
pub const UNKNOWN_MIME_TYPE: &str = "x-unknown";

/// Top-level archive document: `{"log": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub log: Log,
}

impl Archive {
    /// Create a fresh archive around captured entries.
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            log: Log {
                entries,
                ..Default::default()
            },
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.log.entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    pub version: String,
    pub creator: Creator,
    pub entries: Vec<Entry>,
    /// `browser`, `pages`, `comment` and vendor fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            version: HAR_VERSION.to_string(),
            creator: Creator::default(),
            entries: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Creator {
    pub name: String,
    pub version: String,
}

impl Default for Creator {
    fn default() -> Self {
        Self {
            name: CREATOR_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One request/response exchange plus timing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Entry {
    /// Missing when timings were scrubbed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_date_time: Option<String>,
    pub time: f64,
    pub cache: Value,
    pub timings: Timings,
    pub request: Request,
    pub response: Response,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            started_date_time: Some(chrono::Utc::now().to_rfc3339()),
            time: -1.0,
            cache: Value::Object(Map::new()),
            timings: Timings::default(),
            request: Request::default(),
            response: Response::default(),
            extra: Map::new(),
        }
    }
}

impl Entry {
    /// Entry stamped with the current time and unknown timings.
    pub fn new(request: Request, response: Response) -> Self {
        Self {
            request,
            response,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            send: -1.0,
            wait: -1.0,
            receive: -1.0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    #[serde(default)]
    pub value: String,
    /// path, domain, expires, httpOnly, secure, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Cookie lists that are not arrays (some recorders write `{}`) load as empty.
fn lenient_cookies<'de, D>(deserializer: D) -> Result<Vec<Cookie>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => {
            serde_json::from_value(Value::Array(items)).map_err(serde::de::Error::custom)
        }
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    pub url: String,
    pub http_version: String,
    #[serde(deserialize_with = "lenient_cookies")]
    pub cookies: Vec<Cookie>,
    pub headers: Vec<NameValue>,
    pub query_string: Vec<NameValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
    pub headers_size: i64,
    pub body_size: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            url: String::new(),
            http_version: DEFAULT_HTTP_VERSION.to_string(),
            cookies: Vec::new(),
            headers: Vec::new(),
            query_string: Vec::new(),
            post_data: None,
            headers_size: -1,
            body_size: -1,
            extra: Map::new(),
        }
    }
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn parsed_url(&self) -> Result<Url, HarError> {
        Url::parse(&self.url).map_err(|source| HarError::InvalidUrl {
            url: self.url.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostData {
    pub mime_type: String,
    /// Absent for plain text, `"base64"` for binary bodies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<PostParam>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PostData {
    fn default() -> Self {
        Self {
            mime_type: String::new(),
            encoding: None,
            text: String::new(),
            params: None,
            extra: Map::new(),
        }
    }
}

impl PostData {
    pub fn new(mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostParam {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Response {
    /// `0` is reserved for "no response" (transport failure).
    pub status: u16,
    pub status_text: String,
    pub http_version: String,
    #[serde(deserialize_with = "lenient_cookies")]
    pub cookies: Vec<Cookie>,
    pub headers: Vec<NameValue>,
    pub content: Content,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
    /// Diagnostic message carried by sentinel responses.
    #[serde(rename = "_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            http_version: DEFAULT_HTTP_VERSION.to_string(),
            cookies: Vec::new(),
            headers: Vec::new(),
            content: Content::default(),
            redirect_url: String::new(),
            headers_size: -1,
            body_size: -1,
            error: None,
            extra: Map::new(),
        }
    }
}

impl Response {
    pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

    /// Sentinel response recorded when the upstream could not be reached.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            status: Self::TRANSPORT_FAILURE_STATUS,
            status_text: String::new(),
            http_version: String::new(),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status == Self::TRANSPORT_FAILURE_STATUS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Content {
    pub size: i64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Content {
    fn default() -> Self {
        Self {
            size: 0,
            mime_type: UNKNOWN_MIME_TYPE.to_string(),
            text: None,
            encoding: None,
            compression: None,
            extra: Map::new(),
        }
    }
}

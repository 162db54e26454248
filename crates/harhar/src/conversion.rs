//! Conversion between hyper messages and archive records.
//!
//! Inbound requests are buffered and turned into [`Request`] records; archive
//! [`Response`] records are turned back into hyper responses for replay.
//! Upstream responses are buffered once so the same bytes can be relayed to
//! the client and recorded.
//!
//! Recorded header names are title-cased and repeated headers are grouped
//! under their first occurrence: hyper keeps neither the wire casing nor the
//! interleaving of header lines. Archives from HTTP/2 clients carry lowercase
//! names, so matching them against recordings made here needs
//! `ignore_header_casing`.

use crate::error::{HarError, TransportError};
use crate::har::{Content, NameValue, PostData, Request, Response, UNKNOWN_MIME_TYPE};
use crate::name_value::get_value_by_name;
use crate::transform::decode_text;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST,
    LOCATION, TRANSFER_ENCODING,
};
use hyper::http::response::Parts;
use hyper::{Method, StatusCode, Uri, Version};
use std::convert::Infallible;
use std::io::{Read, Write};
use tracing::debug;
use url::Url;

/// Body type of requests sent through the shared client.
pub type OutgoingBody = BoxBody<Bytes, hyper::Error>;

const BASE64_ENCODING: &str = "base64";
const GZIP: &str = "gzip";

/// `content-type` -> `Content-Type`.
///
/// hyper hands out lowercase header names; archives conventionally carry
/// the title-cased form HTTP/1.1 clients put on the wire.
pub fn title_case_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}

fn header_pairs(headers: &HeaderMap) -> Vec<NameValue> {
    headers
        .iter()
        .map(|(name, value)| {
            NameValue::new(
                title_case_header_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()),
            )
        })
        .collect()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn version_string(version: Version) -> String {
    format!("{version:?}")
}

/// Text form of a body: UTF-8 as is, anything else base64 encoded.
fn body_text(body: &[u8]) -> (String, Option<String>) {
    match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (STANDARD.encode(body), Some(BASE64_ENCODING.to_string())),
    }
}

fn gunzip(body: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(body).read_to_end(&mut decoded).ok()?;
    Some(decoded)
}

fn gzip(body: &[u8]) -> Result<Vec<u8>, HarError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).map_err(HarError::Compression)?;
    encoder.finish().map_err(HarError::Compression)
}

fn is_gzip(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case(GZIP))
}

/// Buffer an inbound request and build its archive record.
///
/// The URL is `http://{Host}{path}`; the body becomes `postData` only when
/// it is not empty.
pub async fn read_request(req: hyper::Request<Incoming>) -> Result<Request, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let host = header_str(&parts.headers, &HOST)
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let raw_url = format!("http://{host}{path}");

    let (url, query_string) = match Url::parse(&raw_url) {
        Ok(url) => {
            let query = url
                .query_pairs()
                .map(|(name, value)| NameValue::new(name, value))
                .collect();
            (url.to_string(), query)
        }
        Err(e) => {
            debug!("Keeping unparseable request URL {}: {}", raw_url, e);
            (raw_url, Vec::new())
        }
    };

    let post_data = (!body.is_empty()).then(|| {
        let (text, encoding) = body_text(&body);
        PostData {
            mime_type: header_str(&parts.headers, &CONTENT_TYPE)
                .unwrap_or_default()
                .to_string(),
            encoding,
            text,
            ..Default::default()
        }
    });

    Ok(Request {
        method: parts.method.to_string(),
        url,
        http_version: version_string(parts.version),
        headers: header_pairs(&parts.headers),
        query_string,
        post_data,
        ..Default::default()
    })
}

/// Build a hyper request for the shared client from an archive record.
///
/// The recorded `Host` is sent as is, so the peer sees the client's virtual
/// host rather than the URL authority. `Content-Length` and
/// `Transfer-Encoding` are recomputed by the client from the body.
pub fn outgoing_request(
    request: &Request,
) -> Result<hyper::Request<OutgoingBody>, TransportError> {
    let uri: Uri = request
        .url
        .parse()
        .map_err(|e| TransportError::InvalidRequest(format!("URL '{}': {e}", request.url)))?;
    let method = Method::from_bytes(request.method.as_bytes())
        .map_err(|e| TransportError::InvalidRequest(format!("method '{}': {e}", request.method)))?;

    let mut builder = hyper::Request::builder().method(method).uri(uri);
    for header in &request.headers {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("header '{}': {e}", header.name)))?;
        if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
            continue;
        }
        let value = HeaderValue::from_str(&header.value)
            .map_err(|e| TransportError::InvalidRequest(format!("header '{}': {e}", header.name)))?;
        builder = builder.header(name, value);
    }

    let body = match &request.post_data {
        Some(post_data) => {
            decode_text(post_data).map_err(|e| TransportError::InvalidRequest(e.to_string()))?
        }
        None => Vec::new(),
    };

    builder
        .body(BoxBody::new(
            Full::new(Bytes::from(body)).map_err(|never: Infallible| match never {}),
        ))
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

/// A fully buffered upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub parts: Parts,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub async fn collect(response: hyper::Response<Incoming>) -> Result<Self, TransportError> {
        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Self { parts, body })
    }

    /// Archive record of the response. A gzip encoded body is recorded
    /// decoded, with `compression` holding the bytes saved.
    pub fn to_har(&self) -> Response {
        let headers = &self.parts.headers;
        let status_text = match self.parts.extensions.get::<ReasonPhrase>() {
            Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
            None => self
                .parts
                .status
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
        };

        let gunzipped = if is_gzip(header_str(headers, &CONTENT_ENCODING)) {
            gunzip(&self.body)
        } else {
            None
        };
        let compression = gunzipped
            .as_ref()
            .map(|decoded| decoded.len() as i64 - self.body.len() as i64);
        let decoded = gunzipped.as_deref().unwrap_or(&self.body);
        let (text, encoding) = body_text(decoded);

        Response {
            status: self.parts.status.as_u16(),
            status_text,
            http_version: version_string(self.parts.version),
            headers: header_pairs(headers),
            content: Content {
                size: decoded.len() as i64,
                mime_type: header_str(headers, &CONTENT_TYPE)
                    .unwrap_or(UNKNOWN_MIME_TYPE)
                    .to_string(),
                text: Some(text),
                encoding,
                compression,
                ..Default::default()
            },
            redirect_url: header_str(headers, &LOCATION)
                .unwrap_or_default()
                .to_string(),
            body_size: self.body.len() as i64,
            ..Default::default()
        }
    }

    /// Relay the response to the client unchanged.
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        hyper::Response::from_parts(self.parts, Full::new(self.body))
    }
}

fn content_body(content: &Content) -> Result<Vec<u8>, HarError> {
    let text = content.text.as_deref().unwrap_or_default();
    match content.encoding.as_deref() {
        None => Ok(text.as_bytes().to_vec()),
        Some(BASE64_ENCODING) => Ok(STANDARD.decode(text)?),
        Some(other) => Err(HarError::UnsupportedEncoding(other.to_string())),
    }
}

/// Build the wire response for a recorded archive response.
///
/// The body is decoded from the recorded text, gzip encoded again when the
/// recorded headers say so, and `Content-Length` is recomputed.
/// `Transfer-Encoding` is never replayed.
pub fn response_to_hyper(response: &Response) -> Result<hyper::Response<Full<Bytes>>, HarError> {
    if response.is_transport_failure() {
        return Err(HarError::InvalidResponse(
            "a transport failure has no wire representation".to_string(),
        ));
    }
    let status = StatusCode::from_u16(response.status)
        .map_err(|e| HarError::InvalidResponse(format!("status {}: {e}", response.status)))?;

    let mime_type = response.content.mime_type.as_str();
    let override_content_type = !mime_type.is_empty() && mime_type != UNKNOWN_MIME_TYPE;

    let mut headers = HeaderMap::new();
    for header in &response.headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(header.name.as_bytes()),
            HeaderValue::from_str(&header.value),
        ) else {
            debug!("Skipping recorded header that is not valid HTTP: {}", header.name);
            continue;
        };
        if name == CONTENT_LENGTH
            || name == TRANSFER_ENCODING
            || (override_content_type && name == CONTENT_TYPE)
        {
            continue;
        }
        headers.append(name, value);
    }
    if override_content_type {
        if let Ok(value) = HeaderValue::from_str(mime_type) {
            headers.insert(CONTENT_TYPE, value);
        }
    }

    let mut body = content_body(&response.content)?;
    if is_gzip(get_value_by_name(&response.headers, "Content-Encoding", false).as_deref()) {
        body = gzip(&body)?;
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    let mut reply = hyper::Response::new(Full::new(Bytes::from(body)));
    *reply.status_mut() = status;
    *reply.headers_mut() = headers;
    if !response.status_text.is_empty()
        && status.canonical_reason() != Some(response.status_text.as_str())
    {
        match ReasonPhrase::try_from(response.status_text.clone()) {
            Ok(reason) => {
                reply.extensions_mut().insert(reason);
            }
            Err(_) => debug!("Dropping invalid status text {:?}", response.status_text),
        }
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_body(response: hyper::Response<Full<Bytes>>) -> Bytes {
        tokio_test::block_on(async { response.into_body().collect().await.unwrap().to_bytes() })
    }

    #[test]
    fn test_title_case_header_name() {
        assert_eq!(title_case_header_name("content-type"), "Content-Type");
        assert_eq!(title_case_header_name("x-request-id"), "X-Request-Id");
        assert_eq!(title_case_header_name("host"), "Host");
    }

    #[test]
    fn test_response_to_hyper_recomputes_length() {
        let response = Response {
            status: 201,
            status_text: "Created".to_string(),
            headers: vec![
                NameValue::new("Content-Length", "999"),
                NameValue::new("Transfer-Encoding", "chunked"),
                NameValue::new("X-Custom", "1"),
            ],
            content: Content {
                text: Some("hello".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let reply = response_to_hyper(&response).unwrap();
        assert_eq!(reply.status(), StatusCode::CREATED);
        assert_eq!(reply.headers()[CONTENT_LENGTH], "5");
        assert!(reply.headers().get(TRANSFER_ENCODING).is_none());
        assert_eq!(reply.headers()["x-custom"], "1");
        assert!(reply.headers().get(CONTENT_TYPE).is_none());
        assert!(reply.extensions().get::<ReasonPhrase>().is_none());
        assert_eq!(collect_body(reply), "hello");
    }

    #[test]
    fn test_response_to_hyper_base64_and_mime_type() {
        let response = Response {
            headers: vec![NameValue::new("Content-Type", "text/plain")],
            content: Content {
                mime_type: "application/octet-stream".to_string(),
                text: Some(STANDARD.encode([0u8, 159, 146, 150])),
                encoding: Some("base64".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let reply = response_to_hyper(&response).unwrap();
        assert_eq!(reply.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(reply.headers()[CONTENT_LENGTH], "4");
        assert_eq!(collect_body(reply).as_ref(), &[0u8, 159, 146, 150]);
    }

    #[test]
    fn test_response_to_hyper_custom_reason() {
        let response = Response {
            status: 200,
            status_text: "Fine".to_string(),
            ..Default::default()
        };
        let reply = response_to_hyper(&response).unwrap();
        let reason = reply.extensions().get::<ReasonPhrase>().unwrap();
        assert_eq!(reason.as_bytes(), b"Fine");
    }

    #[test]
    fn test_response_to_hyper_gzip() {
        let response = Response {
            headers: vec![NameValue::new("Content-Encoding", "gzip")],
            content: Content {
                text: Some("compressed".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let reply = response_to_hyper(&response).unwrap();
        let body = collect_body(reply);
        assert_eq!(gunzip(&body).unwrap(), b"compressed");
    }

    #[test]
    fn test_response_to_hyper_rejects_sentinel_and_bad_encoding() {
        assert!(response_to_hyper(&Response::transport_failure("boom")).is_err());
        let response = Response {
            content: Content {
                text: Some("x".to_string()),
                encoding: Some("quoted-printable".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            response_to_hyper(&response),
            Err(HarError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_header_pairs_title_case_and_group_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("x-trace", HeaderValue::from_static("1"));
        headers.append("accept", HeaderValue::from_static("*/*"));
        headers.append("x-trace", HeaderValue::from_static("2"));
        let pairs = header_pairs(&headers);
        assert_eq!(
            pairs,
            vec![
                NameValue::new("X-Trace", "1"),
                NameValue::new("X-Trace", "2"),
                NameValue::new("Accept", "*/*"),
            ]
        );
    }

    #[test]
    fn test_outgoing_request() {
        let request = Request {
            headers: vec![
                NameValue::new("Host", "original"),
                NameValue::new("Content-Length", "3"),
                NameValue::new("X-Test", "yes"),
            ],
            post_data: Some(PostData {
                encoding: Some("base64".to_string()),
                ..PostData::new("application/octet-stream", STANDARD.encode(b"abc"))
            }),
            ..Request::new("PUT", "http://localhost:8081/items?id=1")
        };
        let outgoing = outgoing_request(&request).unwrap();
        assert_eq!(outgoing.method(), Method::PUT);
        assert_eq!(outgoing.uri(), "http://localhost:8081/items?id=1");
        assert_eq!(outgoing.headers()[HOST], "original");
        assert!(outgoing.headers().get(CONTENT_LENGTH).is_none());
        assert_eq!(outgoing.headers()["x-test"], "yes");
        let body = tokio_test::block_on(async {
            outgoing.into_body().collect().await.unwrap().to_bytes()
        });
        assert_eq!(body, "abc");
    }

    #[test]
    fn test_outgoing_request_invalid_method() {
        let request = Request::new("NOT A METHOD", "http://localhost/");
        assert!(matches!(
            outgoing_request(&request),
            Err(TransportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_upstream_response_to_har() {
        let (mut parts, ()) = hyper::Response::builder()
            .status(302)
            .header("content-type", "text/plain")
            .header("location", "/next")
            .body(())
            .unwrap()
            .into_parts();
        parts.version = Version::HTTP_11;
        let upstream = UpstreamResponse {
            parts,
            body: Bytes::from_static(b"moved"),
        };
        let har = upstream.to_har();
        assert_eq!(har.status, 302);
        assert_eq!(har.status_text, "Found");
        assert_eq!(har.http_version, "HTTP/1.1");
        assert_eq!(har.redirect_url, "/next");
        assert_eq!(har.content.mime_type, "text/plain");
        assert_eq!(har.content.text.as_deref(), Some("moved"));
        assert_eq!(har.content.size, 5);
        assert_eq!(har.body_size, 5);
        assert_eq!(har.headers[0], NameValue::new("Content-Type", "text/plain"));
    }

    #[test]
    fn test_upstream_gzip_is_recorded_decoded() {
        let compressed = gzip(b"hello hello hello hello").unwrap();
        let (parts, ()) = hyper::Response::builder()
            .header("content-encoding", "gzip")
            .body(())
            .unwrap()
            .into_parts();
        let upstream = UpstreamResponse {
            parts,
            body: Bytes::from(compressed.clone()),
        };
        let har = upstream.to_har();
        assert_eq!(har.content.text.as_deref(), Some("hello hello hello hello"));
        assert_eq!(har.content.mime_type, UNKNOWN_MIME_TYPE);
        assert_eq!(
            har.content.compression,
            Some(23 - compressed.len() as i64)
        );
        // relayed bytes stay compressed
        let relayed = collect_body(upstream.into_hyper());
        assert_eq!(relayed.as_ref(), compressed.as_slice());
    }

    #[test]
    fn test_binary_body_text() {
        let (text, encoding) = body_text(&[0xff, 0xfe]);
        assert_eq!(encoding.as_deref(), Some("base64"));
        assert_eq!(STANDARD.decode(text).unwrap(), vec![0xff, 0xfe]);
    }
}

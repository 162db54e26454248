//! `multipart/form-data` body rewriting.
//!
//! Bodies are handled as bytes so that binary parts survive a boundary
//! rewrite unchanged. Only the delimiter text and, when filtering or sorting
//! is requested, the part headers are touched.

use crate::config::TransformOptions;
use crate::error::HarError;
use crate::har::PostData;
use crate::name_value::{match_ignore_names, parse_headers, stringify_headers, NameFilter, NameValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const BASE64_ENCODING: &str = "base64";
const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// A parsed `type/subtype; name=value` media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lowercased `type/subtype`.
    pub essence: String,
    /// Parameters in input order, names lowercased, values unquoted.
    pub params: Vec<(String, String)>,
}

impl MediaType {
    pub fn parse(input: &str) -> Option<Self> {
        let mut segments = split_unquoted(input, ';').into_iter();
        let essence = segments.next()?.trim().to_ascii_lowercase();
        if !essence.contains('/') {
            return None;
        }
        let params = segments
            .filter_map(|segment| {
                let (name, value) = segment.split_once('=')?;
                Some((name.trim().to_ascii_lowercase(), unquote(value.trim())))
            })
            .collect();
        Some(Self { essence, params })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_param(&mut self, name: &str, value: &str) {
        match self.params.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(param) => param.1 = value.to_string(),
            None => self.params.push((name.to_ascii_lowercase(), value.to_string())),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for (name, value) in &self.params {
            if !value.is_empty() && value.chars().all(is_token_char) {
                write!(f, "; {name}={value}")?;
            } else {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {name}=\"{escaped}\"")?;
            }
        }
        Ok(())
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == separator && !quoted => {
                segments.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    segments.push(&input[start..]);
    segments
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

/// Body bytes of a post data record. Only absent and `base64` encodings
/// are understood.
pub fn decode_text(post_data: &PostData) -> Result<Vec<u8>, HarError> {
    match post_data.encoding.as_deref() {
        None => Ok(post_data.text.as_bytes().to_vec()),
        Some(BASE64_ENCODING) => Ok(STANDARD.decode(&post_data.text)?),
        Some(other) => Err(HarError::UnsupportedEncoding(other.to_string())),
    }
}

/// Inverse of [`decode_text`] for the same encoding.
pub fn encode_text(body: &[u8], encoding: Option<&str>) -> Result<String, HarError> {
    match encoding {
        None => Ok(String::from_utf8_lossy(body).into_owned()),
        Some(BASE64_ENCODING) => Ok(STANDARD.encode(body)),
        Some(other) => Err(HarError::UnsupportedEncoding(other.to_string())),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn split_bytes<'a>(haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = haystack;
    while let Some(pos) = find(rest, delimiter) {
        parts.push(&rest[..pos]);
        rest = &rest[pos + delimiter.len()..];
    }
    parts.push(rest);
    parts
}

/// One body part between two delimiters.
struct Segment {
    headers: Vec<NameValue>,
    body: Vec<u8>,
}

impl Segment {
    /// `None` when the part has no header block terminator.
    ///
    /// The part starts with the CRLF that ends the delimiter line, so an
    /// empty header block is a blank line right at the start.
    fn parse(part: &[u8]) -> Option<Self> {
        let split = find(part, HEADER_END)?;
        let block = &part[..split];
        let block = block.strip_prefix(CRLF).unwrap_or(block);
        let headers = parse_headers(&String::from_utf8_lossy(block));
        Some(Self {
            headers,
            body: part[split + HEADER_END.len()..].to_vec(),
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = CRLF.to_vec();
        if !self.headers.is_empty() {
            out.extend_from_slice(stringify_headers(&self.headers).as_bytes());
            out.extend_from_slice(CRLF);
        }
        out.extend_from_slice(CRLF);
        out.extend_from_slice(&self.body);
        out
    }
}

fn rewrite_parts(parts: &mut [Vec<u8>], options: &TransformOptions) {
    if parts.len() < 3 {
        return;
    }
    let last = parts.len() - 1;
    let filter = NameFilter::new(
        &options.match_multipart_headers,
        &options.ignore_multipart_headers,
        false,
    );
    let interior = &mut parts[1..last];
    for part in interior.iter_mut() {
        if let Some(mut segment) = Segment::parse(part) {
            segment.headers = match_ignore_names(&segment.headers, &filter);
            *part = segment.to_bytes();
        }
    }
    if options.sort_multipart {
        interior.sort();
    }
}

/// Rewrite a post data record. Anything that is not `multipart/form-data`
/// with a boundary is returned unchanged.
pub fn transform_post_data(
    post_data: &PostData,
    options: &TransformOptions,
) -> Result<PostData, HarError> {
    let Some(mut media_type) = MediaType::parse(&post_data.mime_type) else {
        return Ok(post_data.clone());
    };
    if media_type.essence != MULTIPART_FORM_DATA {
        return Ok(post_data.clone());
    }
    let Some(boundary) = media_type.param("boundary").map(str::to_string) else {
        return Ok(post_data.clone());
    };

    let body = decode_text(post_data)?;
    let replacement = options.replace_multipart_boundary.as_deref();
    if replacement.is_none() && !options.rewrites_multipart_parts() {
        return Ok(post_data.clone());
    }

    let new_boundary = replacement.unwrap_or(&boundary);
    let mime_type = match replacement {
        Some(replacement) => {
            media_type.set_param("boundary", replacement);
            media_type.to_string()
        }
        None => post_data.mime_type.clone(),
    };

    let text = if post_data.text.is_empty() {
        String::new()
    } else {
        let old_delimiter = format!("--{boundary}");
        let new_delimiter = format!("--{new_boundary}");
        let mut parts: Vec<Vec<u8>> = split_bytes(&body, old_delimiter.as_bytes())
            .into_iter()
            .map(<[u8]>::to_vec)
            .collect();
        if options.rewrites_multipart_parts() {
            rewrite_parts(&mut parts, options);
        }
        let joined = parts.join(new_delimiter.as_bytes());
        encode_text(&joined, post_data.encoding.as_deref())?
    };

    Ok(PostData {
        mime_type,
        text,
        ..post_data.clone()
    })
}

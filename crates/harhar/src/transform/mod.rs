//! Archive rewriting.
//!
//! Every function takes its input by reference and builds a new value, so a
//! transform never changes the archive it was given.
//!
//! # Module Structure
//!
//! - `url` - hostname/port/protocol replacement and query removal
//! - `multipart` - `multipart/form-data` boundary and part rewriting

mod multipart;
mod url;

pub use multipart::{decode_text, encode_text, transform_post_data, MediaType, MULTIPART_FORM_DATA};
pub use url::rewrite_url;

use crate::config::TransformOptions;
use crate::error::HarError;
use crate::har::{Archive, Entry, Log, Request, Response, Timings};
use crate::name_value::{
    get_value_by_name, map_names, match_ignore_names, set_value_by_name, sort_by_name, NameFilter,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

const CONTENT_TYPE: &str = "Content-Type";

static NON_WORD_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9A-Za-z_]").expect("static header name pattern"));

/// Lowercase a header name and replace every non-word character with `-`.
pub fn normalize_header_name(name: &str) -> String {
    NON_WORD_CHAR
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}

pub fn transform_request(request: &Request, options: &TransformOptions) -> Result<Request, HarError> {
    let url = rewrite_url(&request.url, options)?;

    let post_data = request
        .post_data
        .as_ref()
        .map(|post_data| transform_post_data(post_data, options))
        .transpose()?;

    let mut headers = request.headers.clone();
    if let Some(post_data) = &post_data {
        let current = get_value_by_name(&headers, CONTENT_TYPE, false);
        if !post_data.mime_type.is_empty() && current.as_deref() != Some(post_data.mime_type.as_str()) {
            headers = set_value_by_name(&headers, CONTENT_TYPE, &post_data.mime_type, false);
        }
    }

    headers = match_ignore_names(
        &headers,
        &NameFilter::new(&options.match_headers, &options.ignore_headers, false),
    );
    if options.sort_headers {
        headers = sort_by_name(&headers);
    }
    if options.normalize_header_names {
        headers = map_names(&headers, normalize_header_name);
    }

    let mut query_string = match_ignore_names(
        &request.query_string,
        &NameFilter::new(
            &options.match_query_params,
            &options.ignore_query_params,
            true,
        ),
    );
    if options.sort_query_params {
        query_string = sort_by_name(&query_string);
    }

    Ok(Request {
        method: request.method.clone(),
        url,
        http_version: request.http_version.clone(),
        cookies: request.cookies.clone(),
        headers,
        query_string,
        post_data,
        headers_size: if options.scrub_sizes { -1 } else { request.headers_size },
        body_size: if options.scrub_sizes { -1 } else { request.body_size },
        extra: request.extra.clone(),
    })
}

pub fn transform_response(response: &Response, options: &TransformOptions) -> Response {
    let headers = match_ignore_names(
        &response.headers,
        &NameFilter::new(&options.match_headers, &options.ignore_headers, false),
    );

    let mut content = response.content.clone();
    if options.scrub_sizes {
        content.size = -1;
        content.compression = None;
    }

    Response {
        status_text: options
            .replace_status_text
            .clone()
            .unwrap_or_else(|| response.status_text.clone()),
        headers,
        content,
        headers_size: if options.scrub_sizes { -1 } else { response.headers_size },
        body_size: if options.scrub_sizes { -1 } else { response.body_size },
        ..response.clone()
    }
}

pub fn transform_entry(entry: &Entry, options: &TransformOptions) -> Result<Entry, HarError> {
    let request = transform_request(&entry.request, options)?;
    let response = transform_response(&entry.response, options);

    let (started_date_time, time, timings) = if options.scrub_timings {
        (None, 0.0, Timings::default())
    } else {
        (entry.started_date_time.clone(), entry.time, entry.timings.clone())
    };

    Ok(Entry {
        started_date_time,
        time,
        cache: entry.cache.clone(),
        timings,
        request,
        response,
        extra: entry.extra.clone(),
    })
}

/// Transform every entry. Log-level fields other than the entries are
/// carried over as is.
pub fn transform_archive(archive: &Archive, options: &TransformOptions) -> Result<Archive, HarError> {
    let entries = archive
        .log
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            debug!("Transforming entry {}: {} {}", i, entry.request.method, entry.request.url);
            transform_entry(entry, options)
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!("Transformed {} entries", entries.len());

    Ok(Archive {
        log: Log {
            version: archive.log.version.clone(),
            creator: archive.log.creator.clone(),
            entries,
            extra: archive.log.extra.clone(),
        },
    })
}

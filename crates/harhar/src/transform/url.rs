//! Request URL rewriting.

use crate::config::TransformOptions;
use crate::error::HarError;
use url::Url;

fn needs_rewrite(options: &TransformOptions) -> bool {
    options.replace_hostname.is_some()
        || options.replace_port.is_some()
        || options.replace_protocol.is_some()
        || options.remove_query_string_from_url
}

/// Apply hostname/port/protocol replacement and query removal to `url`.
///
/// The URL string is returned untouched when no URL option is set, so
/// archives that are only filtered keep their original URL spelling.
pub fn rewrite_url(url: &str, options: &TransformOptions) -> Result<String, HarError> {
    if !needs_rewrite(options) {
        return Ok(url.to_string());
    }

    let mut parsed = Url::parse(url).map_err(|source| HarError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    if let Some(hostname) = &options.replace_hostname {
        parsed
            .set_host(Some(hostname))
            .map_err(|source| HarError::InvalidUrl {
                url: hostname.clone(),
                source,
            })?;
    }
    if let Some(port) = options.replace_port {
        parsed.set_port(Some(port)).map_err(|_| {
            HarError::configuration(format!("Cannot set port {port} on URL '{url}'"))
        })?;
    }
    if let Some(protocol) = &options.replace_protocol {
        let scheme = protocol.trim_end_matches(':');
        parsed.set_scheme(scheme).map_err(|_| {
            HarError::configuration(format!("Cannot switch URL '{url}' to protocol '{scheme}'"))
        })?;
    }
    if options.remove_query_string_from_url {
        parsed.set_query(None);
    }

    Ok(parsed.to_string())
}

//! Request forwarding to the upstream server.

use super::client::{send, HttpClient};
use crate::config::{TransformOptions, UpstreamConfig};
use crate::conversion::UpstreamResponse;
use crate::error::TransportError;
use crate::har::Request;
use crate::transform::rewrite_url;
use tracing::debug;

/// Copy of `request` addressed to the upstream.
pub fn upstream_request(request: &Request, upstream: &UpstreamConfig) -> Result<Request, TransportError> {
    let options = TransformOptions {
        replace_hostname: Some(upstream.host.clone()),
        replace_port: Some(upstream.port),
        replace_protocol: Some(upstream.protocol.as_str().to_string()),
        ..Default::default()
    };
    let url = rewrite_url(&request.url, &options)
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    Ok(Request {
        url,
        ..request.clone()
    })
}

/// Forward `request` to the upstream and buffer its response.
pub async fn forward(
    client: &HttpClient,
    upstream: &UpstreamConfig,
    request: &Request,
) -> Result<UpstreamResponse, TransportError> {
    let outgoing = upstream_request(request, upstream)?;
    debug!("Forwarding {} {} to {}", request.method, request.url, outgoing.url);
    send(client, &outgoing).await
}

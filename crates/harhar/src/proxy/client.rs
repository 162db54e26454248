//! Shared upstream HTTP client.
//!
//! One pooled client is created per command and shared by every forwarded
//! request, so keep-alive connections to the upstream are reused.

use crate::config::ConnectionPoolConfig;
use crate::conversion::{outgoing_request, OutgoingBody, UpstreamResponse};
use crate::error::TransportError;
use crate::har::{Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP/1.1 client that speaks both `http` and `https`.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, OutgoingBody>;

/// Create the shared client with the given keep-alive pool settings.
pub fn create_http_client(pool: &ConnectionPoolConfig) -> HttpClient {
    // Already installed is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
    http_connector.enforce_http(false);

    let tls_builder = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            warn!("Failed to load native root certificates, https upstreams will not verify: {}", e);
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(
                rustls::ClientConfig::builder()
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth(),
            )
        }
    };
    let https_connector = tls_builder
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .http1_title_case_headers(true)
        .build(https_connector);

    info!(
        "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s",
        pool.max_idle_per_host, pool.idle_timeout_secs, pool.keepalive_timeout_secs
    );

    http_client
}

/// Send an archive request and buffer the response.
pub async fn send(client: &HttpClient, request: &Request) -> Result<UpstreamResponse, TransportError> {
    let outgoing = outgoing_request(request)?;
    debug!("Sending {} {}", request.method, request.url);
    let response = client.request(outgoing).await?;
    UpstreamResponse::collect(response).await
}

/// Like [`send`], with transport failures turned into the sentinel response.
pub async fn send_for_record(client: &HttpClient, request: &Request) -> Response {
    match send(client, request).await {
        Ok(response) => response.to_har(),
        Err(e) => {
            warn!("Request {} {} failed: {}", request.method, request.url, e);
            Response::transport_failure(e.to_string())
        }
    }
}

//! Recording forwarding proxy server.

use super::client::{create_http_client, HttpClient};
use super::forwarding::forward;
use crate::config::{ProxyConfig, UpstreamConfig};
use crate::conversion::read_request;
use crate::error::{ConnectionDropped, HarError};
use crate::har::{Archive, Entry, Response as HarResponse};
use crate::lifecycle::{ExchangeHandler, Lifecycle};
use crate::recorder::Recorder;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Forwards each request to the upstream and records the exchange.
///
/// An exchange is recorded once the upstream response is fully buffered,
/// just before it is handed to hyper for relaying. Entry order is therefore
/// upstream completion order; a client that reads its response slowly does
/// not delay its entry.
pub struct ProxyHandler {
    client: HttpClient,
    upstream: UpstreamConfig,
    recorder: Recorder,
}

impl ProxyHandler {
    pub fn new(client: HttpClient, upstream: UpstreamConfig, recorder: Recorder) -> Self {
        Self {
            client,
            upstream,
            recorder,
        }
    }
}

#[async_trait]
impl ExchangeHandler for ProxyHandler {
    async fn handle(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, ConnectionDropped> {
        let request = read_request(req)
            .await
            .map_err(|e| ConnectionDropped(format!("failed to read request: {e}")))?;
        debug!("Incoming request {} {}", request.method, request.url);

        match forward(&self.client, &self.upstream, &request).await {
            Ok(upstream_response) => {
                let recorded = upstream_response.to_har();
                debug!(
                    "Upstream answered {} for {} {}",
                    recorded.status, request.method, request.url
                );
                self.recorder.record(Entry::new(request, recorded));
                Ok(upstream_response.into_hyper())
            }
            Err(e) => {
                warn!(
                    "Upstream {} failed for {} {}: {}",
                    self.upstream.base_uri(),
                    request.method,
                    request.url,
                    e
                );
                let message = e.to_string();
                self.recorder
                    .record(Entry::new(request, HarResponse::transport_failure(message.clone())));
                Err(ConnectionDropped(message))
            }
        }
    }
}

/// Proxy to `config.upstream` until `cancel` fires and return the recorded
/// exchanges.
pub async fn run_proxy_server(
    lifecycle: Lifecycle,
    config: &ProxyConfig,
    cancel: CancellationToken,
) -> Result<Archive, HarError> {
    config.validate()?;
    let recorder = Recorder::new();
    let client = create_http_client(&config.connection_pool);
    info!(
        "Proxying {} to {}",
        lifecycle.local_addr(),
        config.upstream.base_uri()
    );
    let handler = Arc::new(ProxyHandler::new(
        client,
        config.upstream.clone(),
        recorder.clone(),
    ));
    lifecycle.serve(handler, cancel).await;
    info!("Recorded {} exchanges", recorder.len());
    Ok(recorder.into_archive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionPoolConfig, ListenConfig};
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// Upstream that answers `<body>-response`, after a delay on `/slow`.
    /// `/host` answers with the Host header it received.
    struct EchoUpstream;

    #[async_trait]
    impl ExchangeHandler for EchoUpstream {
        async fn handle(
            &self,
            req: Request<Incoming>,
        ) -> Result<Response<Full<Bytes>>, ConnectionDropped> {
            if req.uri().path() == "/slow" {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            if req.uri().path() == "/host" {
                let host = req
                    .headers()
                    .get(hyper::header::HOST)
                    .map(|v| v.as_bytes().to_vec())
                    .unwrap_or_default();
                return Ok(Response::new(Full::new(Bytes::from(host))));
            }
            let body = req
                .into_body()
                .collect()
                .await
                .map_err(|e| ConnectionDropped(e.to_string()))?
                .to_bytes();
            let mut reply = body.to_vec();
            reply.extend_from_slice(b"-response");
            Ok(Response::builder()
                .header("content-type", "text/plain")
                .body(Full::new(Bytes::from(reply)))
                .unwrap())
        }
    }

    fn loopback() -> ListenConfig {
        ListenConfig::new(Some("127.0.0.1".to_string()), 0)
    }

    async fn start_upstream() -> (SocketAddr, CancellationToken) {
        let lifecycle = Lifecycle::bind(&loopback()).await.unwrap();
        let addr = lifecycle.local_addr();
        let cancel = CancellationToken::new();
        tokio::spawn(lifecycle.serve(Arc::new(EchoUpstream), cancel.clone()));
        (addr, cancel)
    }

    async fn start_proxy(
        upstream_port: u16,
    ) -> (
        SocketAddr,
        CancellationToken,
        tokio::task::JoinHandle<Result<Archive, HarError>>,
    ) {
        let lifecycle = Lifecycle::bind(&loopback()).await.unwrap();
        let addr = lifecycle.local_addr();
        let config = ProxyConfig {
            listen: loopback(),
            upstream: UpstreamConfig::new("127.0.0.1", upstream_port),
            connection_pool: ConnectionPoolConfig::default(),
        };
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { run_proxy_server(lifecycle, &config, token).await });
        (addr, cancel, task)
    }

    #[tokio::test]
    async fn test_proxy_relays_and_records() {
        let (upstream_addr, upstream_cancel) = start_upstream().await;
        let (proxy_addr, cancel, task) = start_proxy(upstream_addr.port()).await;

        let response = reqwest::Client::new()
            .post(format!("http://{proxy_addr}/echo"))
            .header("content-type", "text/plain")
            .body("hello")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "hello-response");

        cancel.cancel();
        let archive = task.await.unwrap().unwrap();
        upstream_cancel.cancel();

        assert_eq!(archive.entries().len(), 1);
        let entry = &archive.entries()[0];
        assert_eq!(entry.request.method, "POST");
        assert_eq!(entry.request.url, format!("http://{proxy_addr}/echo"));
        let post_data = entry.request.post_data.as_ref().unwrap();
        assert_eq!(post_data.text, "hello");
        assert_eq!(post_data.mime_type, "text/plain");
        assert_eq!(entry.response.status, 200);
        assert_eq!(entry.response.content.text.as_deref(), Some("hello-response"));
        assert_eq!(entry.response.content.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_client_host_reaches_upstream() {
        let (upstream_addr, upstream_cancel) = start_upstream().await;
        let (proxy_addr, cancel, task) = start_proxy(upstream_addr.port()).await;

        let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
        stream
            .write_all(b"GET /host HTTP/1.1\r\nHost: myvhost.example\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
            .await
            .unwrap()
            .unwrap();
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("myvhost.example"));

        cancel.cancel();
        let archive = task.await.unwrap().unwrap();
        upstream_cancel.cancel();

        let entry = &archive.entries()[0];
        assert_eq!(entry.request.url, "http://myvhost.example/host");
        assert_eq!(entry.response.content.text.as_deref(), Some("myvhost.example"));
    }

    #[tokio::test]
    async fn test_transport_failure_records_sentinel_and_closes() {
        let dead_port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let (proxy_addr, cancel, task) = start_proxy(dead_port).await;

        let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
        stream
            .write_all(b"GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
            .await
            .unwrap();
        assert!(response.is_empty());

        cancel.cancel();
        let archive = task.await.unwrap().unwrap();
        assert_eq!(archive.entries().len(), 1);
        let entry = &archive.entries()[0];
        assert_eq!(entry.request.url, "http://localhost/missing");
        assert_eq!(entry.response.status, 0);
        assert!(entry.response.error.is_some());
    }

    #[tokio::test]
    async fn test_entries_in_completion_order() {
        let (upstream_addr, upstream_cancel) = start_upstream().await;
        let (proxy_addr, cancel, task) = start_proxy(upstream_addr.port()).await;

        let client = reqwest::Client::new();
        let slow = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .get(format!("http://{proxy_addr}/slow"))
                    .send()
                    .await
                    .unwrap()
                    .text()
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let fast = client
            .get(format!("http://{proxy_addr}/fast"))
            .send()
            .await
            .unwrap();
        assert_eq!(fast.status(), 200);
        slow.await.unwrap();

        cancel.cancel();
        let archive = task.await.unwrap().unwrap();
        upstream_cancel.cancel();

        let paths: Vec<_> = archive
            .entries()
            .iter()
            .map(|e| e.request.url.rsplit('/').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(paths, vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_invalid_upstream_config() {
        let lifecycle = Lifecycle::bind(&loopback()).await.unwrap();
        let config = ProxyConfig {
            listen: loopback(),
            upstream: UpstreamConfig::new("", 80),
            connection_pool: ConnectionPoolConfig::default(),
        };
        let result = run_proxy_server(lifecycle, &config, CancellationToken::new()).await;
        assert!(matches!(result, Err(HarError::Configuration(_))));
    }
}

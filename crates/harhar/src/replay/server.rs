//! Replay server.

use super::{ReplayOutcome, Replayer, MISS_STATUS};
use crate::conversion::{read_request, response_to_hyper};
use crate::error::ConnectionDropped;
use crate::har::{Archive, Entry};
use crate::lifecycle::{ExchangeHandler, Lifecycle};
use crate::recorder::Recorder;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ReplayHandler {
    replayer: Replayer,
    recorder: Recorder,
}

impl ReplayHandler {
    pub fn new(replayer: Replayer, recorder: Recorder) -> Self {
        Self { replayer, recorder }
    }
}

fn miss_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    if let Ok(status) = StatusCode::from_u16(MISS_STATUS) {
        *response.status_mut() = status;
    }
    response
}

#[async_trait]
impl ExchangeHandler for ReplayHandler {
    async fn handle(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, ConnectionDropped> {
        let request = read_request(req)
            .await
            .map_err(|e| ConnectionDropped(format!("failed to read request: {e}")))?;
        debug!("Received request {} {}", request.method, request.url);

        let recorded = match self.replayer.lookup(&request) {
            Ok(ReplayOutcome::Hit(recorded)) => recorded,
            Ok(ReplayOutcome::Miss) => {
                warn!("Could not replay request {} {}", request.method, request.url);
                return Ok(miss_response());
            }
            Err(e) => {
                warn!("Could not fingerprint request {} {}: {}", request.method, request.url, e);
                return Ok(miss_response());
            }
        };

        info!(
            "Replaying {} for {} {}",
            recorded.status, request.method, request.url
        );
        self.recorder
            .record(Entry::new(request, recorded.clone()));

        // A recorded transport failure is replayed as a dropped connection.
        response_to_hyper(recorded).map_err(|e| {
            warn!("Closing connection, recorded response cannot be sent: {}", e);
            ConnectionDropped(e.to_string())
        })
    }
}

/// Serve `replayer` until `cancel` fires and return the replayed exchanges.
pub async fn run_replay_server(
    lifecycle: Lifecycle,
    replayer: Replayer,
    cancel: CancellationToken,
) -> Archive {
    let recorder = Recorder::new();
    info!(
        "Replaying {} recorded responses on {}",
        replayer.len(),
        lifecycle.local_addr()
    );
    let handler = Arc::new(ReplayHandler::new(replayer, recorder.clone()));
    lifecycle.serve(handler, cancel).await;
    recorder.into_archive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ListenConfig, MatchPolicy};
    use crate::har::{Content, NameValue, Request as HarRequest, Response as HarResponse};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn recorded_archive() -> Archive {
        let request = HarRequest {
            headers: vec![
                NameValue::new("Host", "localhost"),
                NameValue::new("Connection", "close"),
            ],
            ..HarRequest::new("GET", "http://localhost/")
        };
        let response = HarResponse {
            headers: vec![NameValue::new("X-Recorded", "yes")],
            content: Content {
                mime_type: "text/plain".to_string(),
                text: Some("recorded body".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let failing = HarRequest {
            headers: vec![
                NameValue::new("Host", "localhost"),
                NameValue::new("Connection", "close"),
            ],
            ..HarRequest::new("GET", "http://localhost/broken")
        };
        Archive::new(vec![
            Entry::new(request, response),
            Entry::new(failing, HarResponse::transport_failure("refused")),
        ])
    }

    async fn start(
        policy: MatchPolicy,
    ) -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<Archive>) {
        let replayer = Replayer::new(&recorded_archive(), policy).unwrap();
        let lifecycle = Lifecycle::bind(&ListenConfig::new(Some("127.0.0.1".to_string()), 0))
            .await
            .unwrap();
        let addr = lifecycle.local_addr();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_replay_server(lifecycle, replayer, cancel.clone()));
        (addr, cancel, task)
    }

    async fn send(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        let _ = stream.read_to_string(&mut response).await;
        response
    }

    #[tokio::test]
    async fn test_replays_matching_request() {
        let (addr, cancel, task) = start(MatchPolicy::default()).await;

        let response = send(addr, "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains("X-Recorded: yes"));
        assert!(response.contains("Content-Type: text/plain"));
        assert!(response.contains("Content-Length: 13"));
        assert!(response.ends_with("recorded body"));

        cancel.cancel();
        let archive = task.await.unwrap();
        assert_eq!(archive.entries().len(), 1);
        let entry = &archive.entries()[0];
        assert_eq!(entry.request.url, "http://localhost/");
        assert_eq!(
            entry.request.headers,
            vec![
                NameValue::new("Host", "localhost"),
                NameValue::new("Connection", "close"),
            ]
        );
        assert_eq!(entry.response.content.text.as_deref(), Some("recorded body"));
    }

    #[tokio::test]
    async fn test_miss_returns_599_and_records_nothing() {
        let (addr, cancel, task) = start(MatchPolicy::default()).await;

        let response = send(
            addr,
            "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nX-Extra: 1\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 599"), "{response}");

        cancel.cancel();
        assert!(task.await.unwrap().entries().is_empty());
    }

    #[tokio::test]
    async fn test_policy_turns_miss_into_hit() {
        let policy = MatchPolicy {
            ignore_headers: vec!["x-extra".to_string()],
            ..Default::default()
        };
        let (addr, cancel, task) = start(policy).await;

        let response = send(
            addr,
            "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nX-Extra: 1\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");

        cancel.cancel();
        assert_eq!(task.await.unwrap().entries().len(), 1);
    }

    #[tokio::test]
    async fn test_recorded_transport_failure_drops_connection() {
        let (addr, cancel, task) = start(MatchPolicy::default()).await;

        let response = send(
            addr,
            "GET /broken HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.is_empty());

        cancel.cancel();
        let archive = task.await.unwrap();
        assert_eq!(archive.entries().len(), 1);
        assert!(archive.entries()[0].response.is_transport_failure());
    }
}

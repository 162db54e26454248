//! Listener and connection lifecycle shared by the proxy and replay servers.
//!
//! [`Lifecycle::bind`] opens the listener, [`Lifecycle::serve`] runs the
//! accept loop until the [`CancellationToken`] fires. Every accepted
//! connection runs in its own task registered with a [`ConnectionTracker`].
//! On cancellation the listener is dropped and every open connection is
//! destroyed, including keep-alive connections that sit idle, so `serve`
//! returns promptly. Requests that were in flight on a destroyed connection
//! are abandoned.
//!
//! # Module Structure
//!
//! - `network` - socket setup
//! - `tracker` - registry of open connection tasks

mod network;
mod tracker;

pub use network::create_listener;
pub use tracker::ConnectionTracker;

use crate::config::ListenConfig;
use crate::error::{ConnectionDropped, HarError};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Per-request behavior of a server.
#[async_trait]
pub trait ExchangeHandler: Send + Sync + 'static {
    /// Handle one request. Returning `Err` closes the client connection
    /// without a response.
    async fn handle(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, ConnectionDropped>;
}

/// A bound listener ready to serve.
pub struct Lifecycle {
    listener: TcpListener,
    local_addr: SocketAddr,
    tracker: ConnectionTracker,
}

impl Lifecycle {
    pub async fn bind(config: &ListenConfig) -> Result<Self, HarError> {
        let addr = config.socket_addr()?;
        let listener = create_listener(addr).map_err(|source| HarError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| HarError::Bind { addr, source })?;
        info!("Listening on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Actual bound address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept and serve connections until `cancel` fires, then destroy the
    /// open connections and return.
    pub async fn serve<H: ExchangeHandler>(self, handler: Arc<H>, cancel: CancellationToken) {
        let Lifecycle {
            listener,
            local_addr,
            tracker,
        } = self;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stopping listener on {}", local_addr);
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let handler = Arc::clone(&handler);
                            let id = tracker.spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let handler = Arc::clone(&handler);
                                    async move { handler.handle(req).await }
                                });
                                if let Err(e) = http1::Builder::new()
                                    .title_case_headers(true)
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!("Connection from {} ended: {}", peer, e);
                                }
                            });
                            debug!("Accepted connection {} from {}", id, peer);
                        }
                        Err(e) => {
                            error!("Accept error on {}: {}", local_addr, e);
                        }
                    }
                }
            }
        }

        drop(listener);
        let destroyed = tracker.destroy_all().await;
        info!(
            "Server on {} stopped, destroyed {} open connections",
            local_addr, destroyed
        );
    }
}

//! Recording forwarding proxy.
//!
//! Every inbound request is sent to a fixed upstream through one shared,
//! pooled client. The upstream response is relayed to the client unchanged
//! and the exchange is recorded. When the upstream cannot be reached the
//! exchange is recorded with the transport failure sentinel and the client
//! connection is closed without a reply.
//!
//! # Module Structure
//!
//! - `client` - shared HTTP client creation and request sending
//! - `forwarding` - upstream addressing and forwarding
//! - `server` - the [`ExchangeHandler`](crate::lifecycle::ExchangeHandler) and run loop

mod client;
mod forwarding;
mod server;

pub use client::{create_http_client, send, send_for_record, HttpClient};
pub use forwarding::{forward, upstream_request};
pub use server::{run_proxy_server, ProxyHandler};

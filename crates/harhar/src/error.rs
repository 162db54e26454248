//! Error types shared by the archive, transform and server modules.

use std::net::SocketAddr;

/// Errors raised by archive handling and command setup.
///
/// These are fatal for the command that hit them. Transport failures while
/// talking to an upstream use [`TransportError`] instead and are recovered
/// into a sentinel response.
#[derive(Debug, thiserror::Error)]
pub enum HarError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse archive '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Failed to compress response body: {0}")]
    Compression(#[source] std::io::Error),

    #[error("Cannot build response: {0}")]
    InvalidResponse(String),
}

impl HarError {
    pub fn configuration(message: impl Into<String>) -> Self {
        HarError::Configuration(message.into())
    }
}

/// Failure while exchanging a request with an upstream server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("Failed to read upstream body: {0}")]
    Body(#[from] hyper::Error),

    #[error("Cannot build upstream request: {0}")]
    InvalidRequest(String),
}

/// Returned by a request handler to close the client connection without
/// writing a response.
#[derive(Debug, thiserror::Error)]
#[error("Connection dropped: {0}")]
pub struct ConnectionDropped(pub String);

pub type Result<T, E = HarError> = std::result::Result<T, E>;

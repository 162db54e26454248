//! Listener configuration.

use crate::error::HarError;
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen_host")]
    pub host: String,
    /// `0` asks the OS for an ephemeral port.
    #[serde(default)]
    pub port: u16,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_listen_host(),
            port: 0,
        }
    }
}

impl ListenConfig {
    pub fn new(host: Option<String>, port: u16) -> Self {
        Self {
            host: host.unwrap_or_else(default_listen_host),
            port,
        }
    }

    /// Resolve host and port to the first matching socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, HarError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| {
                HarError::configuration(format!(
                    "Cannot resolve listen address {}:{}: {e}",
                    self.host, self.port
                ))
            })?
            .next()
            .ok_or_else(|| {
                HarError::configuration(format!(
                    "No address found for {}:{}",
                    self.host, self.port
                ))
            })
    }
}

//! Configuration types for the harhar commands.

mod listen;
mod match_policy;
mod protocol;
mod transform;
mod upstream;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::HarError;

pub use listen::ListenConfig;
pub use match_policy::MatchPolicy;
pub use protocol::Protocol;
pub use transform::TransformOptions;
pub use upstream::{ConnectionPoolConfig, UpstreamConfig};

/// Load an option struct from a YAML (or JSON) file.
pub fn load_options<T, P>(path: P) -> Result<T, HarError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| HarError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|e| {
        HarError::configuration(format!("Invalid options file '{}': {e}", path.display()))
    })
}

/// Settings of the recording forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub listen: ListenConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), HarError> {
        if self.upstream.host.is_empty() {
            return Err(HarError::configuration("Upstream host must not be empty"));
        }
        if self.upstream.port == 0 {
            return Err(HarError::configuration("Upstream port must not be 0"));
        }
        Ok(())
    }
}

//! URL scheme of an upstream target.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    /// Outbound only; listeners are always plain HTTP.
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// Parse a scheme, tolerating the trailing `:` of URL protocol strings.
    pub fn from_scheme(scheme: &str) -> Result<Self, String> {
        match scheme.trim_end_matches(':').to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err(format!("Unsupported protocol scheme: {scheme}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scheme() {
        assert_eq!(Protocol::from_scheme("http"), Ok(Protocol::Http));
        assert_eq!(Protocol::from_scheme("HTTPS:"), Ok(Protocol::Https));
        assert!(Protocol::from_scheme("ftp").is_err());
    }
}

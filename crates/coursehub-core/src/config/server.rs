//! HTTP server configuration.

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
///
/// TLS termination is expected to happen in front of the process; the
/// server itself speaks plain HTTP on `host:port`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally visible base URL, used for the OAuth2 redirect URI.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory served under `/static` (also holds the index page).
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Production flag; enables the `Secure` attribute on session cookies.
    #[serde(default)]
    pub prod: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

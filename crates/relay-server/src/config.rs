//! Server configuration.

use relay_settings::{DEFAULT_MAX_MESSAGE_SIZE, ServerSettings};
use serde::{Deserialize, Serialize};

/// Listener configuration for [`RelayServer`](crate::server::RelayServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max inbound WebSocket message size in bytes. Larger frames end the
    /// sender's connection.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_message_size: settings.max_message_size,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

//! Client configuration.
//! Parsed from a toml file or built from defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ensemble members as `host:port`.
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,
    /// Session timeout negotiated with the server.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: i32,
    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Heartbeat interval. When unset, a third of the session timeout.
    #[serde(default)]
    pub ping_interval_ms: Option<u64>,
    /// Accept a read-only session when the ensemble has lost quorum.
    #[serde(default)]
    pub read_only: bool,
}

fn default_servers() -> Vec<String> {
    vec![format!("127.0.0.1:{}", zkwire_proto::DEFAULT_PORT)]
}

fn default_session_timeout_ms() -> i32 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            session_timeout_ms: default_session_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            ping_interval_ms: None,
            read_only: false,
        }
    }
}

impl ClientConfig {
    /// Load config from file, or create default if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ClientConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Heartbeat interval: explicit, or a third of the session timeout so
    /// two pings can go missing before the session lapses.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(
            self.ping_interval_ms
                .unwrap_or(self.session_timeout_ms.max(0) as u64 / 3),
        )
    }
}

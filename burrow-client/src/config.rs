use anyhow::Result;
use serde_derive::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Client side settings of a connection. Every field has a default, so a config file needs to
/// contain only the values it changes.
///
/// ```toml
/// heartbeat = 30
/// rpc_timeout = 5000
/// consumer_tag_prefix = "billing"
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Highest channel number the client wants to use, the server may lower it.
    pub channel_max: u16,
    /// Largest frame size in bytes the client accepts, the server may lower it.
    pub frame_max: u32,
    /// Heartbeat interval in seconds, `0` accepts what the server proposes.
    pub heartbeat: u16,
    /// Deadline of synchronous commands in milliseconds, `None` waits until the reply or the close
    /// of the channel.
    pub rpc_timeout: Option<u64>,
    /// How long closing waits for the server to confirm the close, in milliseconds.
    pub close_timeout: u64,
    /// Publish waits for the server to confirm every message.
    pub publisher_confirms: bool,
    /// Prefix of the generated consumer tags.
    pub consumer_tag_prefix: String,
    /// Product name sent to the server in the client properties.
    pub product: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel_max: 2047,
            frame_max: 131_072,
            heartbeat: 60,
            rpc_timeout: None,
            close_timeout: 5_000,
            publisher_confirms: true,
            consumer_tag_prefix: "burrow".to_string(),
            product: "burrow".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        Self::from_toml_str(&content)
    }

    pub(crate) fn rpc_timeout(&self) -> Option<Duration> {
        self.rpc_timeout.map(Duration::from_millis)
    }

    pub(crate) fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout)
    }
}

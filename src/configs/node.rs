use serde::{Deserialize, Serialize};

/// Connection to the Lavalink-compatible audio node.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeConfig {
  #[serde(default = "default_address")]
  pub address: String,
  #[serde(default)]
  pub secure: bool,
  #[serde(default = "default_password")]
  pub password: String,
  /// Bot user id, sent as `User-Id` when opening the event socket.
  #[serde(default)]
  pub user_id: u64,
  #[serde(default = "default_client_name")]
  pub client_name: String,
  #[serde(default = "default_request_timeout_ms")]
  pub request_timeout_ms: u64,
  /// Prefix applied to free-text queries.
  #[serde(default = "default_search_prefix")]
  pub search_prefix: String,
  /// Seconds the node keeps our players alive while the socket is down.
  /// Zero disables resuming.
  #[serde(default = "default_resume_timeout_secs")]
  pub resume_timeout_secs: u64,
  #[serde(default = "default_reconnect_base_ms")]
  pub reconnect_base_ms: u64,
  #[serde(default = "default_reconnect_attempts")]
  pub reconnect_attempts: u32,
}

impl NodeConfig {
  pub fn rest_url(&self) -> String {
    let scheme = if self.secure { "https" } else { "http" };
    format!("{}://{}", scheme, self.address)
  }

  pub fn websocket_url(&self) -> String {
    let scheme = if self.secure { "wss" } else { "ws" };
    format!("{}://{}/v4/websocket", scheme, self.address)
  }
}

impl Default for NodeConfig {
  fn default() -> Self {
    Self {
      address: default_address(),
      secure: false,
      password: default_password(),
      user_id: 0,
      client_name: default_client_name(),
      request_timeout_ms: default_request_timeout_ms(),
      search_prefix: default_search_prefix(),
      resume_timeout_secs: default_resume_timeout_secs(),
      reconnect_base_ms: default_reconnect_base_ms(),
      reconnect_attempts: default_reconnect_attempts(),
    }
  }
}

fn default_address() -> String {
  "127.0.0.1:2333".to_string()
}

fn default_password() -> String {
  "youshallnotpass".to_string()
}

fn default_client_name() -> String {
  concat!("guildbeat/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout_ms() -> u64 {
  10_000
}

fn default_search_prefix() -> String {
  "ytsearch".to_string()
}

fn default_resume_timeout_secs() -> u64 {
  60
}

fn default_reconnect_base_ms() -> u64 {
  1_000
}

fn default_reconnect_attempts() -> u32 {
  5
}

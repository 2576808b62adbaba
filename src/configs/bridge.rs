use serde::{Deserialize, Serialize};

/// Internal HTTP API of the bot's gateway process, which owns the voice
/// signalling and message posting on the chat platform.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BridgeConfig {
  #[serde(default = "default_url")]
  pub url: String,
  #[serde(default)]
  pub secret: String,
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
}

impl Default for BridgeConfig {
  fn default() -> Self {
    Self {
      url: default_url(),
      secret: String::new(),
      timeout_ms: default_timeout_ms(),
    }
  }
}

fn default_url() -> String {
  "http://127.0.0.1:3030".to_string()
}

fn default_timeout_ms() -> u64 {
  8_000
}

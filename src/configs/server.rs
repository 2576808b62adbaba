use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
  /// Shared secret expected in the `Authorization` header.
  pub password: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: "0.0.0.0".to_string(),
      port: 2444,
      password: "youshallnotpass".to_string(),
    }
  }
}

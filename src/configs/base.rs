use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub node: NodeConfig,
  #[serde(default)]
  pub playback: PlaybackConfig,
  #[serde(default)]
  pub bridge: BridgeConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
  #[serde(default)]
  pub tenants: Vec<TenantConfig>,
}

impl Config {
  pub fn load() -> AnyResult<Self> {
    let config_path = if std::path::Path::new("config.toml").exists() {
      "config.toml"
    } else if std::path::Path::new("config.default.toml").exists() {
      "config.default.toml"
    } else {
      return Err("config.toml or config.default.toml not found".into());
    };

    crate::log_println!("Loading configuration from: {}", config_path);

    let config_str = std::fs::read_to_string(config_path)?;
    if config_str.is_empty() {
      return Err(format!("{} is empty", config_path).into());
    }

    Self::parse(&config_str)
  }

  pub fn parse(raw: &str) -> AnyResult<Self> {
    let config: Config = toml::from_str(raw)?;
    if config.playback.default_volume > 100 {
      return Err("playback.default_volume must be between 0 and 100".into());
    }
    Ok(config)
  }
}

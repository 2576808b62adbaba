use serde::{Deserialize, Serialize};

use crate::common::types::{ChannelId, GuildId};

/// Static per-community music settings, served by the built-in settings
/// store when no external store is wired in.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TenantConfig {
  pub guild_id: GuildId,
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  pub default_volume: Option<u8>,
  /// 24/7 mode.
  #[serde(default)]
  pub persistent: bool,
  pub persistent_channel_id: Option<ChannelId>,
  pub fallback_query: Option<String>,
  pub request_channel_id: Option<ChannelId>,
}

fn default_enabled() -> bool {
  true
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlaybackConfig {
  /// Volume for new sessions when the tenant has none configured.
  #[serde(default = "default_volume")]
  pub default_volume: u8,
  #[serde(default = "default_resolve_timeout_ms")]
  pub resolve_timeout_ms: u64,
  /// Upper bound for voice joins and node player commands.
  #[serde(default = "default_command_timeout_ms")]
  pub command_timeout_ms: u64,
  /// Fixed wait before the first reconnect of a persistent session.
  #[serde(default = "default_reconnect_delay_ms")]
  pub reconnect_delay_ms: u64,
  #[serde(default = "default_max_reconnect_attempts")]
  pub max_reconnect_attempts: u32,
  /// Stuck/errored tracks in a row before the queue is dropped.
  #[serde(default = "default_max_consecutive_faults")]
  pub max_consecutive_faults: u32,
  #[serde(default = "default_progress_bar_width")]
  pub progress_bar_width: usize,
  #[serde(default = "default_true")]
  pub announce_now_playing: bool,
  #[serde(default = "default_true")]
  pub announce_faults: bool,
}

impl PlaybackConfig {
  pub fn resolve_timeout(&self) -> Duration {
    Duration::from_millis(self.resolve_timeout_ms)
  }

  pub fn command_timeout(&self) -> Duration {
    Duration::from_millis(self.command_timeout_ms)
  }

  pub fn reconnect_delay(&self) -> Duration {
    Duration::from_millis(self.reconnect_delay_ms)
  }
}

impl Default for PlaybackConfig {
  fn default() -> Self {
    Self {
      default_volume: default_volume(),
      resolve_timeout_ms: default_resolve_timeout_ms(),
      command_timeout_ms: default_command_timeout_ms(),
      reconnect_delay_ms: default_reconnect_delay_ms(),
      max_reconnect_attempts: default_max_reconnect_attempts(),
      max_consecutive_faults: default_max_consecutive_faults(),
      progress_bar_width: default_progress_bar_width(),
      announce_now_playing: true,
      announce_faults: true,
    }
  }
}

fn default_volume() -> u8 {
  100
}

fn default_resolve_timeout_ms() -> u64 {
  15_000
}

fn default_command_timeout_ms() -> u64 {
  10_000
}

fn default_reconnect_delay_ms() -> u64 {
  5_000
}

fn default_max_reconnect_attempts() -> u32 {
  3
}

fn default_max_consecutive_faults() -> u32 {
  5
}

fn default_progress_bar_width() -> usize {
  20
}

fn default_true() -> bool {
  true
}

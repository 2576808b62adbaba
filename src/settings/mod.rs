//! Read-only tenant music configuration.
//!
//! The engine never writes settings; the dashboard that edits them lives
//! elsewhere. [`StaticSettingsStore`] serves the `[[tenants]]` tables of the
//! config file.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    common::types::{AnyResult, ChannelId, GuildId},
    configs::TenantConfig,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TenantMusicSettings {
    pub enabled: bool,
    pub default_volume: Option<u8>,
    /// 24/7 mode: stay connected when the queue runs dry and rejoin after
    /// connection loss.
    pub persistent: bool,
    pub persistent_channel_id: Option<ChannelId>,
    pub fallback_query: Option<String>,
    pub request_channel_id: Option<ChannelId>,
}

impl Default for TenantMusicSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_volume: None,
            persistent: false,
            persistent_channel_id: None,
            fallback_query: None,
            request_channel_id: None,
        }
    }
}

impl TenantMusicSettings {
    pub fn fallback_query(&self) -> Option<&str> {
        self.fallback_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

impl From<&TenantConfig> for TenantMusicSettings {
    fn from(tenant: &TenantConfig) -> Self {
        Self {
            enabled: tenant.enabled,
            default_volume: tenant.default_volume.map(|v| v.min(100)),
            persistent: tenant.persistent,
            persistent_channel_id: tenant.persistent_channel_id,
            fallback_query: tenant.fallback_query.clone(),
            request_channel_id: tenant.request_channel_id,
        }
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Settings for the guild, defaults when nothing is stored.
    async fn music_settings(&self, guild_id: &GuildId) -> AnyResult<TenantMusicSettings>;
}

#[derive(Default)]
pub struct StaticSettingsStore {
    tenants: HashMap<GuildId, TenantMusicSettings>,
}

impl StaticSettingsStore {
    pub fn new(tenants: &[TenantConfig]) -> Self {
        Self {
            tenants: tenants
                .iter()
                .map(|t| (t.guild_id.clone(), TenantMusicSettings::from(t)))
                .collect(),
        }
    }
}

#[async_trait]
impl SettingsStore for StaticSettingsStore {
    async fn music_settings(&self, guild_id: &GuildId) -> AnyResult<TenantMusicSettings> {
        Ok(self.tenants.get(guild_id).cloned().unwrap_or_default())
    }
}

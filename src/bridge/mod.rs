//! Seam to the chat platform: voice channel membership, channel listing and
//! short announcements. The platform gateway itself lives in another
//! process; [`HttpBridge`] talks to it over its internal HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    common::types::{AnyResult, ChannelId, GuildId},
    protocol::VoiceState,
};

pub mod http;

pub use http::HttpBridge;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceChannel {
    pub id: ChannelId,
    pub name: String,
}

#[async_trait]
pub trait PlatformBridge: Send + Sync {
    /// Join (or move to) `channel_id` and return the voice credentials the
    /// audio node needs.
    async fn join(&self, guild_id: &GuildId, channel_id: ChannelId) -> AnyResult<VoiceState>;

    async fn leave(&self, guild_id: &GuildId) -> AnyResult<()>;

    /// `None` when the platform does not know the guild.
    async fn voice_channels(&self, guild_id: &GuildId) -> AnyResult<Option<Vec<VoiceChannel>>>;

    /// Post a short plain-text notice to a text channel.
    async fn announce(&self, channel_id: ChannelId, message: &str) -> AnyResult<()>;
}

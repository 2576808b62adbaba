//! Client side of the Lavalink-compatible audio node: REST commands and the
//! event WebSocket.

use async_trait::async_trait;

use crate::{
    common::types::{AnyResult, GuildId},
    protocol::{LoadResult, PlayerUpdate},
};

pub mod client;
pub mod events;
pub mod socket;

pub use client::NodeClient;
pub use events::EventBus;

/// What the engine needs from an audio node.
#[async_trait]
pub trait AudioNode: Send + Sync {
    /// Resolve an identifier (URL or prefixed search) into tracks.
    async fn load_tracks(&self, identifier: &str) -> AnyResult<LoadResult>;

    /// Apply a partial player update for the guild.
    async fn update_player(&self, guild_id: &GuildId, update: &PlayerUpdate) -> AnyResult<()>;

    /// Drop the guild's player, stopping playback and leaving voice on the
    /// node side.
    async fn destroy_player(&self, guild_id: &GuildId) -> AnyResult<()>;

    /// Per-guild event routing.
    fn events(&self) -> &EventBus;

    /// Last reported playback position in milliseconds.
    fn position(&self, guild_id: &GuildId) -> Option<u64>;
}

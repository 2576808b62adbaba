use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::common::types::ChannelId;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connection at all.
    Idle,
    /// Voice join and node binding in flight.
    Connecting,
    /// Bound on the node, nothing playing.
    Active,
    Playing,
    Paused,
    /// The voice connection dropped. Terminal for this connection.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One live binding between a session and its node player.
///
/// Ids are never reused, so an event stamped with an old id can always be
/// told apart from the current connection. Dropping the connection stops its
/// event pump.
#[derive(Debug)]
pub struct PlayerConnection {
    id: u64,
    state: ConnectionState,
    voice_channel_id: ChannelId,
    pump: CancellationToken,
}

impl PlayerConnection {
    pub fn new(voice_channel_id: ChannelId) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            state: ConnectionState::Connecting,
            voice_channel_id,
            pump: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn voice_channel_id(&self) -> ChannelId {
        self.voice_channel_id
    }

    /// Token the event pump watches.
    pub fn pump_token(&self) -> CancellationToken {
        self.pump.clone()
    }

    pub fn mark_active(&mut self) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Active;
        }
    }

    /// Back to `Active` after the queue ran dry. Ignored until the node has
    /// confirmed the binding.
    pub fn mark_idle(&mut self) {
        if self.is_bound() {
            self.state = ConnectionState::Active;
        }
    }

    /// `Playing` when `true`, `Paused` otherwise. Ignored until the node has
    /// confirmed the binding.
    pub fn set_playing(&mut self, playing: bool) {
        if matches!(
            self.state,
            ConnectionState::Active | ConnectionState::Playing | ConnectionState::Paused
        ) {
            self.state = if playing {
                ConnectionState::Playing
            } else {
                ConnectionState::Paused
            };
        }
    }

    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn is_bound(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Active | ConnectionState::Playing | ConnectionState::Paused
        )
    }
}

impl Drop for PlayerConnection {
    fn drop(&mut self) {
        self.pump.cancel();
    }
}

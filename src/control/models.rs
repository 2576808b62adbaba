use serde::{Deserialize, Serialize};

use crate::{
    common::types::{ChannelId, UserId},
    protocol::Track,
    session::{ConnectionState, LoopMode},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    #[serde(default)]
    pub query: String,
    pub voice_channel_id: Option<ChannelId>,
    pub requested_by: Option<UserId>,
    pub text_channel_id: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub title: String,
    pub author: String,
    pub uri: Option<String>,
    /// Milliseconds, 0 for streams.
    pub duration: u64,
    pub is_stream: bool,
    pub artwork_url: Option<String>,
    pub requested_by: Option<UserId>,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            title: track.info.title.clone(),
            author: track.info.author.clone(),
            uri: track.info.uri.clone(),
            duration: track.duration_ms(),
            is_stream: track.info.is_stream,
            artwork_url: track.info.artwork_url.clone(),
            requested_by: track.requested_by,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTrack {
    pub index: usize,
    pub title: String,
    pub author: String,
    pub uri: Option<String>,
    pub duration: u64,
    pub requested_by: Option<UserId>,
}

impl QueuedTrack {
    pub fn new(index: usize, track: &Track) -> Self {
        Self {
            index,
            title: track.info.title.clone(),
            author: track.info.author.clone(),
            uri: track.info.uri.clone(),
            duration: track.duration_ms(),
            requested_by: track.requested_by,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayOutcome {
    /// First resolved track.
    pub track: TrackSummary,
    pub queue_size: usize,
    /// Whether this request started playback rather than only queueing.
    pub started: bool,
    pub added: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub playing: bool,
    pub track: Option<TrackSummary>,
    pub queue_size: usize,
    pub volume: u8,
    pub paused: bool,
    pub voice_channel_id: Option<ChannelId>,
    pub position: u64,
    pub duration: u64,
    pub loop_mode: LoopMode,
    pub state: ConnectionState,
    pub progress: Option<String>,
}

impl StatusSnapshot {
    pub fn idle(volume: u8) -> Self {
        Self {
            playing: false,
            track: None,
            queue_size: 0,
            volume,
            paused: false,
            voice_channel_id: None,
            position: 0,
            duration: 0,
            loop_mode: LoopMode::Off,
            state: ConnectionState::Idle,
            progress: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub current: Option<TrackSummary>,
    pub tracks: Vec<QueuedTrack>,
}

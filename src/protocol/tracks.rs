use serde::{Deserialize, Serialize};

use crate::common::types::UserId;

/// Key under which the engine tags every play command's `userData`. The
/// node echoes user data back in track events, which lets event handlers
/// tell which play command an event belongs to.
pub const PLAY_SEQ_KEY: &str = "playSeq";

/// A playable track as handed out by the audio node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Opaque payload passed back to the node to start playback.
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    #[serde(default = "default_json_object")]
    pub user_data: serde_json::Value,
    /// Who asked for it. `None` for tracks injected by the engine (fallback
    /// playlists). Never sent to the node.
    #[serde(skip)]
    pub requested_by: Option<UserId>,
}

fn default_json_object() -> serde_json::Value {
    serde_json::json!({})
}

impl Track {
    pub fn new(encoded: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            encoded: encoded.into(),
            info,
            plugin_info: default_json_object(),
            user_data: default_json_object(),
            requested_by: None,
        }
    }

    pub fn with_requester(mut self, requester: Option<UserId>) -> Self {
        self.requested_by = requester;
        self
    }

    /// Sequence number of the play command this copy of the track came from,
    /// if the node echoed it back.
    pub fn play_seq(&self) -> Option<u64> {
        self.user_data.get(PLAY_SEQ_KEY).and_then(|v| v.as_u64())
    }

    /// Duration in milliseconds, 0 for live streams.
    pub fn duration_ms(&self) -> u64 {
        if self.info.is_stream { 0 } else { self.info.length }
    }
}

/// Metadata for an audio track.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    /// Duration in milliseconds. 0 for live streams.
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    #[serde(default)]
    pub source_name: String,
}

/// Exception severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Common,
    Suspicious,
    Fault,
}

/// Result of a track load operation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
pub enum LoadResult {
    Track(Track),
    Playlist(PlaylistData),
    /// Ranked candidates, best first.
    Search(Vec<Track>),
    Empty {},
    Error(LoadError),
}

impl LoadResult {
    /// Wraps a transport level failure so callers only ever deal with one
    /// result shape.
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Error(LoadError {
            message: Some(message.clone()),
            severity: Severity::Fault,
            cause: message,
            cause_stack_trace: None,
        })
    }

    /// The tracks a play request should enqueue: every playlist entry, the
    /// single track, or the top search hit.
    pub fn into_tracks(self) -> Vec<Track> {
        match self {
            Self::Track(track) => vec![track],
            Self::Playlist(playlist) => playlist.tracks,
            Self::Search(mut hits) => {
                if hits.is_empty() {
                    Vec::new()
                } else {
                    vec![hits.swap_remove(0)]
                }
            }
            Self::Empty {} | Self::Error(_) => Vec::new(),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Error(err) => Some(err.message.clone().unwrap_or_else(|| err.cause.clone())),
            _ => None,
        }
    }
}

/// Playlist data returned from a load operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    /// Index of the selected track, or -1 if none.
    #[serde(default = "default_selected_track")]
    pub selected_track: i32,
}

fn default_selected_track() -> i32 {
    -1
}

/// Error from a failed track load.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadError {
    pub message: Option<String>,
    pub severity: Severity,
    #[serde(default)]
    pub cause: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause_stack_trace: Option<String>,
}

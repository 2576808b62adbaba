use serde::{Deserialize, Serialize};

use crate::protocol::tracks::PLAY_SEQ_KEY;

/// Voice server credentials the node needs to join a voice channel on our
/// behalf. Produced by the platform bridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackEncoded {
    Clear,       // JSON: null
    Set(String), // JSON: string
}

/// Track field in a player update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateTrack {
    pub encoded: TrackEncoded,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<serde_json::Value>,
}

/// Body for `PATCH /v4/sessions/{sessionId}/players/{guildId}`. Absent
/// fields are left untouched by the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<PlayerUpdateTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceState>,
}

impl PlayerUpdate {
    /// Start `encoded`, tagging it with the play sequence number so its
    /// events can be matched back to this command.
    pub fn play(encoded: &str, play_seq: u64, volume: u8) -> Self {
        let mut user_data = serde_json::Map::new();
        user_data.insert(PLAY_SEQ_KEY.to_string(), play_seq.into());
        Self {
            track: Some(PlayerUpdateTrack {
                encoded: TrackEncoded::Set(encoded.to_string()),
                user_data: Some(serde_json::Value::Object(user_data)),
            }),
            volume: Some(volume),
            paused: Some(false),
            voice: None,
        }
    }

    pub fn stop_track() -> Self {
        Self {
            track: Some(PlayerUpdateTrack {
                encoded: TrackEncoded::Clear,
                user_data: None,
            }),
            ..Default::default()
        }
    }

    pub fn paused(paused: bool) -> Self {
        Self {
            paused: Some(paused),
            ..Default::default()
        }
    }

    pub fn volume(volume: u8) -> Self {
        Self {
            volume: Some(volume),
            ..Default::default()
        }
    }

    pub fn voice(voice: VoiceState) -> Self {
        Self {
            voice: Some(voice),
            ..Default::default()
        }
    }

    /// The play sequence number carried by a play update.
    pub fn play_seq(&self) -> Option<u64> {
        self.track
            .as_ref()?
            .user_data
            .as_ref()?
            .get(PLAY_SEQ_KEY)?
            .as_u64()
    }
}

/// Body for `PATCH /v4/sessions/{sessionId}`.
#[derive(Debug, Serialize)]
pub struct SessionUpdate {
    pub resuming: bool,
    pub timeout: u64,
}

use std::{collections::VecDeque, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::connection::{ConnectionState, PlayerConnection};
use crate::{
    common::{
        MusicError,
        types::{ChannelId, GuildId, UserId},
    },
    protocol::Track,
    settings::TenantMusicSettings,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl FromStr for LoopMode {
    type Err = MusicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "track" | "song" => Ok(Self::Track),
            "queue" | "all" => Ok(Self::Queue),
            other => Err(MusicError::Validation(format!(
                "Unknown loop mode `{}` (expected off, track or queue)",
                other
            ))),
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Track => "track",
            Self::Queue => "queue",
        })
    }
}

/// Where announcements go and who gets credited for engine-injected tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetadata {
    pub text_channel: Option<ChannelId>,
    pub requester: Option<UserId>,
}

/// Queue and playback flags of one community.
///
/// Every method is a plain in-memory transition; callers hold the
/// community's lock while invoking them and do the node I/O afterwards.
#[derive(Debug)]
pub struct PlaybackSession {
    pub guild_id: GuildId,
    pending: VecDeque<Track>,
    current: Option<Track>,
    volume: u8,
    paused: bool,
    pub loop_mode: LoopMode,
    pub metadata: SessionMetadata,
    /// Tenant settings as of the last play request.
    pub tenant: TenantMusicSettings,
    pub connection: Option<PlayerConnection>,
    play_seq: u64,
    consecutive_faults: u32,
}

impl PlaybackSession {
    pub fn new(guild_id: GuildId, volume: u8) -> Self {
        Self {
            guild_id,
            pending: VecDeque::new(),
            current: None,
            volume: volume.min(100),
            paused: false,
            loop_mode: LoopMode::Off,
            metadata: SessionMetadata::default(),
            tenant: TenantMusicSettings::default(),
            connection: None,
            play_seq: 0,
            consecutive_faults: 0,
        }
    }

    pub fn enqueue(&mut self, track: Track) {
        self.pending.push_back(track);
    }

    pub fn enqueue_many(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.pending.extend(tracks);
    }

    /// Moves to the next track, honouring the loop mode, and returns the new
    /// current track.
    pub fn advance(&mut self) -> Option<Track> {
        if self.loop_mode == LoopMode::Track && self.current.is_some() {
            self.paused = false;
            return self.current.clone();
        }
        self.skip()
    }

    /// [`advance`](Self::advance) without the single-track loop, so the
    /// current track is never handed out again. A queue loop still requeues
    /// it.
    pub fn skip(&mut self) -> Option<Track> {
        if self.loop_mode == LoopMode::Queue {
            if let Some(finished) = self.current.take() {
                self.pending.push_back(finished);
            }
        }
        self.current = self.pending.pop_front();
        self.paused = false;
        self.current.clone()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
        self.paused = false;
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Track, MusicError> {
        let len = self.pending.len();
        self.pending.remove(index).ok_or_else(|| {
            MusicError::OutOfRange(format!(
                "Index {} is out of range, the queue has {} track(s)",
                index, len
            ))
        })
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> impl ExactSizeIterator<Item = &Track> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Empties the pending queue, leaving the current track alone.
    pub fn drain_pending(&mut self) -> Vec<Track> {
        self.pending.drain(..).collect()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Takes a wide integer so out-of-range input is reported instead of
    /// truncated.
    pub fn set_volume(&mut self, value: i64) -> Result<u8, MusicError> {
        let volume = validate_volume(value)?;
        self.volume = volume;
        Ok(volume)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<(), MusicError> {
        if self.current.is_none() {
            return Err(MusicError::NothingPlaying);
        }
        self.paused = paused;
        if let Some(conn) = self.connection.as_mut() {
            conn.set_playing(!paused);
        }
        Ok(())
    }

    pub fn play_seq(&self) -> u64 {
        self.play_seq
    }

    /// Allocates the sequence number for a new play command. Events tagged
    /// with an older number no longer describe the current track.
    pub fn next_play_seq(&mut self) -> u64 {
        self.play_seq += 1;
        self.play_seq
    }

    /// Whether an event about `track` describes the track last commanded.
    pub fn is_current(&self, track: &Track) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        match track.play_seq() {
            Some(seq) => seq == self.play_seq,
            // Nodes that drop user data: fall back to the payload.
            None => track.encoded == current.encoded,
        }
    }

    pub fn record_fault(&mut self) -> u32 {
        self.consecutive_faults += 1;
        self.consecutive_faults
    }

    pub fn reset_faults(&mut self) {
        self.consecutive_faults = 0;
    }

    pub fn connection_id(&self) -> Option<u64> {
        self.connection.as_ref().map(PlayerConnection::id)
    }

    pub fn state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map(PlayerConnection::state)
            .unwrap_or(ConnectionState::Idle)
    }
}

pub fn validate_volume(value: i64) -> Result<u8, MusicError> {
    if (0..=100).contains(&value) {
        Ok(value as u8)
    } else {
        Err(MusicError::OutOfRange(format!(
            "Volume must be between 0 and 100, got {}",
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TrackInfo;

    fn track(title: &str) -> Track {
        Track::new(
            format!("enc-{title}"),
            TrackInfo {
                title: title.to_string(),
                length: 180_000,
                ..Default::default()
            },
        )
    }

    fn session(titles: &[&str]) -> PlaybackSession {
        let mut session = PlaybackSession::new(GuildId::from("1"), 100);
        session.enqueue_many(titles.iter().map(|t| track(t)));
        session
    }

    fn titles(session: &PlaybackSession) -> Vec<String> {
        session.pending().map(|t| t.info.title.clone()).collect()
    }

    #[test]
    fn test_advance_pops_in_fifo_order() {
        let mut session = session(&["a", "b"]);
        assert_eq!(session.advance().unwrap().info.title, "a");
        assert_eq!(session.advance().unwrap().info.title, "b");
        assert_eq!(session.pending_len(), 0);
    }

    #[test]
    fn test_track_loop_replays_forever() {
        let mut session = session(&["a", "b"]);
        session.advance();
        session.loop_mode = LoopMode::Track;
        for _ in 0..5 {
            assert_eq!(session.advance().unwrap().info.title, "a");
        }
        assert_eq!(titles(&session), vec!["b"]);
    }

    #[test]
    fn test_queue_loop_requeues_once() {
        let mut session = session(&["a", "b", "c"]);
        session.advance();
        session.loop_mode = LoopMode::Queue;

        assert_eq!(session.advance().unwrap().info.title, "b");
        assert_eq!(titles(&session), vec!["c", "a"]);
        let a_count = session.pending().filter(|t| t.info.title == "a").count();
        assert_eq!(a_count, 1);
    }

    #[test]
    fn test_queue_loop_single_track_cycles() {
        let mut session = session(&["a"]);
        session.loop_mode = LoopMode::Queue;
        session.advance();
        assert_eq!(session.advance().unwrap().info.title, "a");
        assert_eq!(session.pending_len(), 0);
    }

    #[test]
    fn test_advance_on_empty_queue_clears_current() {
        let mut session = session(&["x"]);
        session.advance();
        assert!(session.advance().is_none());
        assert!(session.current().is_none());
    }

    #[test]
    fn test_skip_ignores_track_loop() {
        let mut session = session(&["a", "b"]);
        session.advance();
        session.loop_mode = LoopMode::Track;
        assert_eq!(session.skip().unwrap().info.title, "b");
    }

    #[test]
    fn test_advance_clears_pause() {
        let mut session = session(&["a", "b"]);
        session.advance();
        session.set_paused(true).unwrap();
        session.advance();
        assert!(!session.is_paused());
    }

    #[test]
    fn test_pause_requires_current_track() {
        let mut session = session(&["a"]);
        assert_eq!(session.set_paused(true), Err(MusicError::NothingPlaying));
        assert!(!session.is_paused());
    }

    #[test]
    fn test_clear() {
        let mut session = session(&["a", "b"]);
        session.advance();
        session.set_paused(true).unwrap();
        session.clear();
        assert!(session.current().is_none());
        assert_eq!(session.pending_len(), 0);
        assert!(!session.is_paused());
    }

    #[test]
    fn test_remove_at() {
        let mut session = session(&["a", "b", "c"]);
        assert_eq!(session.remove_at(1).unwrap().info.title, "b");
        assert_eq!(titles(&session), vec!["a", "c"]);
    }

    #[test]
    fn test_remove_at_out_of_range_does_not_mutate() {
        let mut session = session(&["a", "b"]);
        let err = session.remove_at(2).unwrap_err();
        assert!(matches!(err, MusicError::OutOfRange(_)));
        assert_eq!(titles(&session), vec!["a", "b"]);
    }

    #[test]
    fn test_volume_outside_range_is_rejected() {
        let mut session = session(&[]);
        session.set_volume(40).unwrap();
        for bad in [-1, 101, 1000, i64::MIN] {
            assert!(matches!(
                session.set_volume(bad),
                Err(MusicError::OutOfRange(_))
            ));
            assert_eq!(session.volume(), 40);
        }
        assert_eq!(session.set_volume(0), Ok(0));
        assert_eq!(session.set_volume(100), Ok(100));
    }

    #[test]
    fn test_is_current_prefers_play_seq() {
        let mut session = session(&["a"]);
        session.advance();
        let seq = session.next_play_seq();

        let mut echoed = track("a");
        echoed.user_data = serde_json::json!({ "playSeq": seq });
        assert!(session.is_current(&echoed));

        echoed.user_data = serde_json::json!({ "playSeq": seq - 1 });
        assert!(!session.is_current(&echoed));

        // No user data: compare payloads.
        assert!(session.is_current(&track("a")));
        assert!(!session.is_current(&track("b")));
    }

    #[test]
    fn test_loop_mode_parse() {
        assert_eq!("Queue".parse::<LoopMode>().unwrap(), LoopMode::Queue);
        assert_eq!("off".parse::<LoopMode>().unwrap(), LoopMode::Off);
        assert!("shuffle".parse::<LoopMode>().is_err());
        assert_eq!(LoopMode::Track.to_string(), "track");
    }
}

//! Caller-facing operations. Every method is keyed by community and safe to
//! call concurrently for different communities.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    bridge::VoiceChannel,
    common::{
        MusicError, with_timeout,
        types::{ChannelId, GuildId},
    },
    player::{Followup, PlaybackEngine, QueueEnd},
    protocol::{PlayerUpdate, Track},
    session::{LoopMode, PlaybackSession, progress_indicator, validate_volume},
};

pub mod models;

pub use models::*;

/// How often `play` retries when the slot it found was retired under it.
const MAX_SLOT_RETRIES: usize = 3;

enum StartAction {
    Connect { conn: u64, channel: ChannelId },
    Followups(Vec<Followup>),
}

pub struct ControlSurface {
    engine: Arc<PlaybackEngine>,
}

impl ControlSurface {
    pub fn new(engine: Arc<PlaybackEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    /// Resolves `request.query` and plays or queues the result.
    ///
    /// Creating the session and assigning its first track happen under one
    /// lock acquisition, so of two concurrent first plays exactly one starts
    /// playback and the other queues.
    pub async fn play(&self, guild_id: &GuildId, request: PlayRequest) -> Result<PlayOutcome, MusicError> {
        let engine = &self.engine;
        let query = request.query.trim();
        if query.is_empty() {
            return Err(MusicError::Validation("query must not be empty".into()));
        }
        let channel = request
            .voice_channel_id
            .ok_or_else(|| MusicError::Validation("voiceChannelId is required".into()))?;

        let settings = engine
            .settings
            .music_settings(guild_id)
            .await
            .map_err(|e| MusicError::Connectivity(format!("settings unavailable: {}", e)))?;
        if !settings.enabled {
            return Err(MusicError::Disabled);
        }
        if engine.scheduler.cancel(guild_id) {
            info!("[{}] pending reconnect superseded by play", guild_id);
        }

        let gate = engine.gate(guild_id);
        let epoch = gate.stop_epoch();

        // -- 1. Resolve without holding anything -------------------------------
        let result = engine.catalog.resolve(query).await;
        if let Some(message) = result.error_message() {
            return Err(MusicError::Resolution {
                query: query.to_string(),
                message,
            });
        }
        let mut tracks: Vec<Track> = result
            .into_tracks()
            .into_iter()
            .map(|t| t.with_requester(request.requested_by))
            .collect();
        let Some(first) = tracks.first().map(TrackSummary::from) else {
            return Err(MusicError::NoResults(query.to_string()));
        };
        let added = tracks.len();
        let volume = settings.default_volume.unwrap_or(engine.config.default_volume);

        // -- 2. Find or create the session, queue, maybe start ----------------
        let mut attempts = 0;
        let (slot, started, queue_size, action) = loop {
            attempts += 1;
            if attempts > MAX_SLOT_RETRIES {
                return Err(MusicError::Cancelled);
            }
            let (slot, _) = engine
                .registry
                .get_or_create(guild_id, || PlaybackSession::new(guild_id.clone(), volume));
            let mut session = slot.lock().await;
            if slot.is_retired() {
                continue;
            }
            if gate.stop_epoch() != epoch {
                if session.connection.is_none() && session.current().is_none() {
                    engine.retire(&slot, &mut session);
                }
                return Err(MusicError::Cancelled);
            }

            session.tenant = settings.clone();
            if let Some(text_channel) = request.text_channel_id.or(settings.request_channel_id) {
                session.metadata.text_channel = Some(text_channel);
            }
            if request.requested_by.is_some() {
                session.metadata.requester = request.requested_by;
            }

            let started = session.current().is_none();
            session.enqueue_many(std::mem::take(&mut tracks));
            let current = if started { session.advance() } else { None };

            let action = if session.connection.is_none() {
                StartAction::Connect {
                    conn: engine.open_connection(&slot, &mut session, channel),
                    channel,
                }
            } else {
                let play = current.and_then(|track| engine.next_play(&slot, &mut session, track));
                StartAction::Followups(play.into_iter().collect())
            };
            let queue_size = session.pending_len();
            drop(session);
            break (slot, started, queue_size, action);
        };

        if started {
            info!("[{}] starting `{}`", guild_id, first.title);
        } else {
            info!("[{}] queued {} track(s) starting with `{}`", guild_id, added, first.title);
        }

        // -- 3. I/O, re-validated on return ------------------------------------
        let followups = match action {
            StartAction::Connect { conn, channel } => engine.connect(&slot, conn, channel).await?,
            StartAction::Followups(followups) => followups,
        };
        engine.run_followups(&slot, followups).await?;

        if slot.is_retired() && gate.stop_epoch() != epoch {
            return Err(MusicError::Cancelled);
        }

        Ok(PlayOutcome {
            track: first,
            queue_size,
            started,
            added,
        })
    }

    pub async fn pause(&self, guild_id: &GuildId) -> Result<bool, MusicError> {
        self.set_paused(guild_id, Some(true)).await
    }

    pub async fn resume(&self, guild_id: &GuildId) -> Result<bool, MusicError> {
        self.set_paused(guild_id, Some(false)).await
    }

    /// Returns the new pause state.
    pub async fn toggle_pause(&self, guild_id: &GuildId) -> Result<bool, MusicError> {
        self.set_paused(guild_id, None).await
    }

    async fn set_paused(&self, guild_id: &GuildId, desired: Option<bool>) -> Result<bool, MusicError> {
        let slot = self.engine.live_slot(guild_id).ok_or(MusicError::NothingPlaying)?;
        let _commands = slot.lock_commands().await;
        let (paused, previous, applied) = {
            let mut session = slot.lock().await;
            if slot.is_retired() {
                return Err(MusicError::NothingPlaying);
            }
            let previous = session.is_paused();
            let paused = desired.unwrap_or(!previous);
            session.set_paused(paused)?;
            (paused, previous, bound_target(&session))
        };

        if let Some(target) = applied {
            let sent = self
                .engine
                .node_command("pause command", guild_id, PlayerUpdate::paused(paused))
                .await;
            if let Err(e) = sent {
                let mut session = slot.lock().await;
                if !slot.is_retired() && bound_target(&session) == Some(target) {
                    if let Err(restore) = session.set_paused(previous) {
                        debug!("[{}] pause state not restored: {}", guild_id, restore);
                    }
                }
                return Err(e);
            }
        }
        info!("[{}] {}", guild_id, if paused { "paused" } else { "resumed" });
        Ok(paused)
    }

    /// Ends the current track now. Binds to the track that was current when
    /// the call arrived: if that track already ended on its own, the skip is
    /// a no-op instead of skipping its successor too.
    pub async fn skip(&self, guild_id: &GuildId) -> Result<(), MusicError> {
        let engine = &self.engine;
        let slot = engine.live_slot(guild_id).ok_or(MusicError::NothingPlaying)?;
        let seen = slot.observed_seq();

        let followups = {
            let mut session = slot.lock().await;
            if slot.is_retired() {
                return Err(MusicError::NothingPlaying);
            }
            let Some(title) = session.current().map(|t| t.info.title.clone()) else {
                return Err(MusicError::NothingPlaying);
            };
            if session.play_seq() != seen {
                debug!("[{}] `{}` already replaced, skip ignored", guild_id, title);
                return Ok(());
            }

            info!("[{}] skipping `{}`", guild_id, title);
            match session.skip() {
                Some(next) => engine.next_play(&slot, &mut session, next).into_iter().collect(),
                None => engine.on_queue_empty(&slot, &mut session, QueueEnd::Skipped),
            }
        };

        engine.run_followups(&slot, followups).await
    }

    /// Clears the queue and leaves voice. Also cancels any in-flight play and
    /// any pending reconnect. Never fails.
    pub async fn stop(&self, guild_id: &GuildId) -> Result<(), MusicError> {
        let engine = &self.engine;
        engine.gate(guild_id).bump_stop_epoch();
        if engine.scheduler.cancel(guild_id) {
            info!("[{}] pending reconnect cancelled", guild_id);
        }

        let Some(slot) = engine.registry.get(guild_id) else {
            return Ok(());
        };
        {
            let mut session = slot.lock().await;
            if slot.is_retired() {
                return Ok(());
            }
            session.clear();
            engine.retire(&slot, &mut session);
        }
        info!("[{}] stopped", guild_id);
        engine.release_voice(&slot).await;
        Ok(())
    }

    pub async fn set_volume(&self, guild_id: &GuildId, value: i64) -> Result<u8, MusicError> {
        let volume = validate_volume(value)?;
        let slot = self.engine.live_slot(guild_id).ok_or(MusicError::NoSession)?;
        let _commands = slot.lock_commands().await;
        let (previous, applied) = {
            let mut session = slot.lock().await;
            if slot.is_retired() {
                return Err(MusicError::NoSession);
            }
            let previous = session.volume();
            session.set_volume(value)?;
            (previous, bound_target(&session))
        };

        if let Some(target) = applied {
            let sent = self
                .engine
                .node_command("volume command", guild_id, PlayerUpdate::volume(volume))
                .await;
            if let Err(e) = sent {
                let mut session = slot.lock().await;
                if !slot.is_retired() && bound_target(&session) == Some(target) {
                    session.set_volume(i64::from(previous))?;
                }
                return Err(e);
            }
        }
        debug!("[{}] volume set to {}", guild_id, volume);
        Ok(volume)
    }

    /// Removes the pending track at `index` (0-based, current track excluded).
    pub async fn remove_track(&self, guild_id: &GuildId, index: i64) -> Result<TrackSummary, MusicError> {
        let out_of_range = || MusicError::OutOfRange(format!("Index {} is out of range", index));
        let index = usize::try_from(index).map_err(|_| out_of_range())?;
        let slot = self.engine.live_slot(guild_id).ok_or_else(out_of_range)?;

        let mut session = slot.lock().await;
        if slot.is_retired() {
            return Err(out_of_range());
        }
        let removed = session.remove_at(index)?;
        info!("[{}] removed `{}` from the queue", guild_id, removed.info.title);
        Ok(TrackSummary::from(&removed))
    }

    pub async fn set_loop(&self, guild_id: &GuildId, mode: LoopMode) -> Result<LoopMode, MusicError> {
        let slot = self.engine.live_slot(guild_id).ok_or(MusicError::NoSession)?;
        let mut session = slot.lock().await;
        if slot.is_retired() {
            return Err(MusicError::NoSession);
        }
        session.loop_mode = mode;
        debug!("[{}] loop mode {}", guild_id, mode);
        Ok(mode)
    }

    pub async fn status(&self, guild_id: &GuildId) -> StatusSnapshot {
        let engine = &self.engine;
        let idle = || StatusSnapshot::idle(engine.config.default_volume);
        let Some(slot) = engine.live_slot(guild_id) else {
            return idle();
        };
        let session = slot.lock().await;
        if slot.is_retired() {
            return idle();
        }

        let track = session.current();
        let duration = track.map(Track::duration_ms).unwrap_or(0);
        let position = match track {
            Some(track) if !track.info.is_stream => {
                engine.node.position(guild_id).unwrap_or(0).min(duration)
            }
            _ => 0,
        };

        StatusSnapshot {
            playing: track.is_some() && !session.is_paused(),
            track: track.map(TrackSummary::from),
            queue_size: session.pending_len(),
            volume: session.volume(),
            paused: session.is_paused(),
            voice_channel_id: session.connection.as_ref().map(|c| c.voice_channel_id()),
            position,
            duration,
            loop_mode: session.loop_mode,
            state: session.state(),
            progress: track.map(|_| {
                progress_indicator(position, duration, engine.config.progress_bar_width)
            }),
        }
    }

    pub async fn queue(&self, guild_id: &GuildId) -> QueueSnapshot {
        let Some(slot) = self.engine.live_slot(guild_id) else {
            return QueueSnapshot::default();
        };
        let session = slot.lock().await;
        if slot.is_retired() {
            return QueueSnapshot::default();
        }
        QueueSnapshot {
            current: session.current().map(TrackSummary::from),
            tracks: session
                .pending()
                .enumerate()
                .map(|(index, track)| QueuedTrack::new(index, track))
                .collect(),
        }
    }

    pub async fn voice_channels(&self, guild_id: &GuildId) -> Result<Vec<VoiceChannel>, MusicError> {
        let channels = with_timeout(
            "voice channel listing",
            self.engine.config.command_timeout(),
            self.engine.bridge.voice_channels(guild_id),
        )
        .await?
        .map_err(|e| MusicError::Connectivity(format!("platform bridge failed: {}", e)))?;
        channels.ok_or_else(|| MusicError::NotFound(format!("Unknown server {}", guild_id)))
    }

    pub async fn stop_all(&self) {
        self.engine.stop_all().await;
    }
}

/// `(connection id, play sequence)` a player command is addressed to, if the
/// node has confirmed the binding. A local change is only rolled back while
/// this is unchanged: a newer play command already carries the session's
/// pause and volume state to the node.
fn bound_target(session: &PlaybackSession) -> Option<(u64, u64)> {
    session
        .connection
        .as_ref()
        .filter(|c| c.is_bound())
        .map(|c| (c.id(), session.play_seq()))
}

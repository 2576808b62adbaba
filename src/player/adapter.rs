use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Followup, PlaybackEngine, QueueEnd};
use crate::{
    common::{
        MusicError, with_timeout,
        types::{ChannelId, GuildId},
    },
    protocol::{NodeEvent, PlayerUpdate, Track},
    session::{PlaybackSession, PlayerConnection, SessionSlot},
};

impl PlaybackEngine {
    /// Creates the session's connection and starts listening for its node
    /// events. Runs under the session lock, so the subscription exists
    /// before any voice join or play command is sent.
    pub(crate) fn open_connection(
        self: &Arc<Self>,
        slot: &SessionSlot,
        session: &mut PlaybackSession,
        voice_channel_id: ChannelId,
    ) -> u64 {
        let conn = PlayerConnection::new(voice_channel_id);
        let id = conn.id();
        let events = self.node.events().subscribe(&slot.guild_id, id);
        let token = conn.pump_token();
        if let Some(previous) = session.connection.replace(conn) {
            debug!(
                "[{}] connection {} superseded by {}",
                slot.guild_id,
                previous.id(),
                id
            );
        }

        tokio::spawn(self.clone().pump(slot.guild_id.clone(), id, events, token));
        id
    }

    /// Joins voice and binds the node player (`Connecting -> Active`), then
    /// returns the command that starts the current track, if any.
    ///
    /// On failure the session is torn down and the error returned.
    pub(crate) async fn connect(
        self: &Arc<Self>,
        slot: &Arc<SessionSlot>,
        conn: u64,
        voice_channel_id: ChannelId,
    ) -> Result<Vec<Followup>, MusicError> {
        let guild_id = &slot.guild_id;
        let timeout = self.config.command_timeout();

        let bound = async {
            let _commands = slot.lock_commands().await;
            let gate = self.gate(guild_id);
            let _voice = gate.voice.lock().await;

            let volume = {
                let session = slot.lock().await;
                if self.is_stale(slot, &session, conn) {
                    return Err(MusicError::Cancelled);
                }
                session.volume()
            };

            debug!("[{}] joining voice channel {}", guild_id, voice_channel_id);
            let voice = with_timeout("voice join", timeout, self.bridge.join(guild_id, voice_channel_id))
                .await?
                .map_err(|e| MusicError::Connectivity(format!("voice join failed: {}", e)))?;

            let mut update = PlayerUpdate::voice(voice);
            update.volume = Some(volume);
            self.node_command("voice binding", guild_id, update).await
        }
        .await;

        let mut session = slot.lock().await;
        let stale = self.is_stale(slot, &session, conn);
        match bound {
            Ok(()) if !stale => {
                if let Some(connection) = session.connection.as_mut() {
                    connection.mark_active();
                }
                info!("[{}] connected to voice channel {}", guild_id, voice_channel_id);

                let mut followups = Vec::new();
                if let Some(track) = session.current().cloned() {
                    followups.extend(self.next_play(slot, &mut session, track));
                } else if session.pending_len() == 0 {
                    if let Some(query) = session.tenant.fallback_query() {
                        followups.push(Followup::Fallback {
                            conn,
                            query: query.to_string(),
                        });
                    }
                }
                Ok(followups)
            }
            Ok(()) | Err(MusicError::Cancelled) => {
                // Stopped while joining. Do not stay behind in the channel.
                drop(session);
                debug!("[{}] connection {} cancelled while binding", guild_id, conn);
                self.release_voice(slot).await;
                Err(MusicError::Cancelled)
            }
            Err(e) => {
                if !stale {
                    error!("[{}] failed to connect: {}", guild_id, e);
                    session.clear();
                    self.retire(slot, &mut session);
                }
                drop(session);
                self.release_voice(slot).await;
                Err(e)
            }
        }
    }

    /// Sends the play command for `seq` unless a newer command superseded it.
    pub(crate) async fn start_track(
        &self,
        slot: &Arc<SessionSlot>,
        conn: u64,
        seq: u64,
        track: &Track,
        volume: u8,
        paused: bool,
    ) -> Result<(), MusicError> {
        let _commands = slot.lock_commands().await;
        {
            let session = slot.lock().await;
            if self.is_stale(slot, &session, conn) || session.play_seq() != seq {
                debug!(
                    "[{}] play of `{}` (seq {}) superseded",
                    slot.guild_id, track.info.title, seq
                );
                return Ok(());
            }
        }

        let mut update = PlayerUpdate::play(&track.encoded, seq, volume);
        update.paused = Some(paused);
        self.node_command("play command", &slot.guild_id, update).await?;

        let mut session = slot.lock().await;
        if !self.is_stale(slot, &session, conn) && session.play_seq() == seq {
            if let Some(connection) = session.connection.as_mut() {
                connection.set_playing(!paused);
            }
            info!("[{}] playing `{}`", slot.guild_id, track.info.title);
        }
        Ok(())
    }

    /// Feeds one connection's node events into the session, one at a time.
    async fn pump(
        self: Arc<Self>,
        guild_id: GuildId,
        conn: u64,
        events: flume::Receiver<NodeEvent>,
        cancel: CancellationToken,
    ) {
        debug!("[{}] event pump {} started", guild_id, conn);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv_async() => match event {
                    Ok(event) => self.handle_event(&guild_id, conn, event).await,
                    Err(_) => break,
                },
            }
        }
        self.node.events().unsubscribe(&guild_id, conn);
        debug!("[{}] event pump {} stopped", guild_id, conn);
    }

    /// Applies one node event of connection `conn`. Events of any other
    /// connection, or about a track that is no longer the one last
    /// commanded, are discarded.
    pub async fn handle_event(self: &Arc<Self>, guild_id: &GuildId, conn: u64, event: NodeEvent) {
        let Some(slot) = self.registry.get(guild_id) else {
            debug!("[{}] {} event without a session", guild_id, event.kind());
            return;
        };

        let followups = {
            let mut session = slot.lock().await;
            if self.is_stale(&slot, &session, conn) {
                debug!(
                    "[{}] discarding {} event of superseded connection {}",
                    guild_id,
                    event.kind(),
                    conn
                );
                return;
            }
            self.apply_event(&slot, &mut session, event)
        };

        if let Err(e) = self.run_followups(&slot, followups).await {
            warn!("[{}] recovering from node event failed: {}", guild_id, e);
        }
    }

    fn apply_event(
        &self,
        slot: &Arc<SessionSlot>,
        session: &mut PlaybackSession,
        event: NodeEvent,
    ) -> Vec<Followup> {
        let guild_id = &slot.guild_id;
        if let Some(track) = event.track() {
            if !session.is_current(track) {
                debug!(
                    "[{}] discarding stale {} event for `{}`",
                    guild_id,
                    event.kind(),
                    track.info.title
                );
                return Vec::new();
            }
        }

        match event {
            NodeEvent::TrackStart { track, .. } => {
                session.reset_faults();
                let playing = !session.is_paused();
                if let Some(connection) = session.connection.as_mut() {
                    connection.set_playing(playing);
                }
                match session.metadata.text_channel {
                    Some(channel) if self.config.announce_now_playing => vec![Followup::Announce {
                        channel,
                        message: format!(
                            "🎶 Now playing **{}** by {}",
                            track.info.title, track.info.author
                        ),
                    }],
                    _ => Vec::new(),
                }
            }
            NodeEvent::TrackEnd { track, reason, .. } => {
                if !reason.may_start_next() {
                    debug!(
                        "[{}] `{}` ended ({:?}), not advancing",
                        guild_id, track.info.title, reason
                    );
                    return Vec::new();
                }
                match session.advance() {
                    Some(next) => self.next_play(slot, session, next).into_iter().collect(),
                    None => self.on_queue_empty(slot, session, QueueEnd::Finished),
                }
            }
            NodeEvent::TrackException {
                track, exception, ..
            } => self.on_fault(slot, session, &track, exception.describe()),
            NodeEvent::TrackStuck {
                track,
                threshold_ms,
                ..
            } => self.on_fault(
                slot,
                session,
                &track,
                &format!("playback stalled for {}ms", threshold_ms),
            ),
            NodeEvent::WebSocketClosed {
                code,
                reason,
                by_remote,
                ..
            } => {
                warn!(
                    "[{}] voice connection closed: {} {} (by remote: {})",
                    guild_id, code, reason, by_remote
                );
                if let Some(connection) = session.connection.as_mut() {
                    connection.mark_closed();
                }
                self.on_connection_lost(slot, session)
            }
        }
    }

    /// A stuck or failing track is skipped, never retried. Too many faults in
    /// a row drop the whole queue.
    pub(crate) fn on_fault(
        &self,
        slot: &Arc<SessionSlot>,
        session: &mut PlaybackSession,
        track: &Track,
        reason: &str,
    ) -> Vec<Followup> {
        if !session.is_current(track) {
            return Vec::new();
        }
        let guild_id = &slot.guild_id;
        let faults = session.record_fault();
        warn!(
            "[{}] playback fault on `{}`: {} ({} in a row)",
            guild_id, track.info.title, reason, faults
        );

        let mut followups = Vec::new();
        if self.config.announce_faults {
            if let Some(channel) = session.metadata.text_channel {
                followups.push(Followup::Announce {
                    channel,
                    message: format!("⚠️ Skipping **{}**: {}", track.info.title, reason),
                });
            }
        }

        if faults > self.config.max_consecutive_faults {
            error!(
                "[{}] {} playback faults in a row, dropping {} queued track(s)",
                guild_id,
                faults,
                session.pending_len()
            );
            session.clear();
            followups.extend(self.on_queue_empty(slot, session, QueueEnd::FaultLimit));
            return followups;
        }

        match session.skip() {
            Some(next) => followups.extend(self.next_play(slot, session, next)),
            None => followups.extend(self.on_queue_empty(slot, session, QueueEnd::Skipped)),
        }
        followups
    }

    /// Resolves the tenant's fallback query and starts it if the session is
    /// still idle on the same connection.
    pub(crate) async fn start_fallback(
        &self,
        slot: &Arc<SessionSlot>,
        conn: u64,
        query: &str,
    ) -> Vec<Followup> {
        let guild_id = &slot.guild_id;
        let result = self.catalog.resolve(query).await;
        if let Some(message) = result.error_message() {
            warn!("[{}] fallback `{}` failed to load: {}", guild_id, query, message);
            return Vec::new();
        }
        let tracks = result.into_tracks();
        if tracks.is_empty() {
            warn!("[{}] fallback `{}` returned nothing", guild_id, query);
            return Vec::new();
        }

        let mut session = slot.lock().await;
        if self.is_stale(slot, &session, conn)
            || session.current().is_some()
            || session.pending_len() > 0
        {
            debug!("[{}] fallback no longer needed", guild_id);
            return Vec::new();
        }

        info!(
            "[{}] queue empty, continuing with {} fallback track(s)",
            guild_id,
            tracks.len()
        );
        let requester = session.metadata.requester;
        session.enqueue_many(tracks.into_iter().map(|t| t.with_requester(requester)));
        match session.advance() {
            Some(next) => self.next_play(slot, &mut session, next).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

//! What happens when a queue runs dry or a voice connection drops.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Followup, PlaybackEngine};
use crate::{
    common::{
        Backoff, MusicError,
        types::{ChannelId, GuildId},
    },
    protocol::Track,
    session::{LoopMode, PlaybackSession, SessionMetadata, SessionSlot},
};

/// Why the queue ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEnd {
    /// The last track finished on its own.
    Finished,
    /// The current track was skipped or faulted; the node may still hold it.
    Skipped,
    /// Too many faults in a row. The fallback is not tried either.
    FaultLimit,
}

/// Everything needed to bring a persistent session back after its voice
/// connection dropped.
#[derive(Debug, Clone)]
pub struct ResumePlan {
    pub guild_id: GuildId,
    pub voice_channel_id: ChannelId,
    /// The pending queue at the time of the drop. The interrupted track is
    /// not replayed.
    pub tracks: Vec<Track>,
    pub volume: u8,
    pub loop_mode: LoopMode,
    pub metadata: SessionMetadata,
}

impl PlaybackEngine {
    pub(crate) fn on_queue_empty(
        &self,
        slot: &Arc<SessionSlot>,
        session: &mut PlaybackSession,
        end: QueueEnd,
    ) -> Vec<Followup> {
        let guild_id = &slot.guild_id;
        if !session.tenant.persistent {
            info!("[{}] queue finished, ending session", guild_id);
            session.clear();
            self.retire(slot, session);
            return vec![Followup::Teardown];
        }

        let Some(connection) = session.connection.as_mut() else {
            return Vec::new();
        };
        connection.mark_idle();
        let conn = connection.id();

        let mut followups = Vec::new();
        if end != QueueEnd::Finished {
            followups.push(Followup::StopTrack { conn });
        }
        match session.tenant.fallback_query() {
            Some(query) if end != QueueEnd::FaultLimit => followups.push(Followup::Fallback {
                conn,
                query: query.to_string(),
            }),
            _ => debug!("[{}] queue empty, idling in voice", guild_id),
        }
        followups
    }

    pub(crate) fn on_connection_lost(
        &self,
        slot: &Arc<SessionSlot>,
        session: &mut PlaybackSession,
    ) -> Vec<Followup> {
        let guild_id = &slot.guild_id;
        let channel = session
            .tenant
            .persistent_channel_id
            .or_else(|| session.connection.as_ref().map(|c| c.voice_channel_id()));

        let plan = match channel {
            Some(voice_channel_id) if session.tenant.persistent => Some(ResumePlan {
                guild_id: guild_id.clone(),
                voice_channel_id,
                tracks: session.drain_pending(),
                volume: session.volume(),
                loop_mode: session.loop_mode,
                metadata: session.metadata.clone(),
            }),
            _ => None,
        };

        session.clear();
        self.retire(slot, session);

        match plan {
            Some(plan) => {
                info!(
                    "[{}] persistent session lost its connection, {} track(s) kept for resume",
                    guild_id,
                    plan.tracks.len()
                );
                vec![Followup::Teardown, Followup::Reconnect(plan)]
            }
            None => {
                info!("[{}] connection lost, ending session", guild_id);
                vec![Followup::Teardown]
            }
        }
    }

    /// Rejoins after the configured delay. A stop or a new play for the
    /// community cancels the pending attempt through the scheduler.
    pub(crate) fn schedule_reconnect(self: &Arc<Self>, plan: ResumePlan) {
        let delay = self.config.reconnect_delay();
        info!("[{}] reconnecting in {:?}", plan.guild_id, delay);

        let engine = self.clone();
        self.scheduler
            .schedule(plan.guild_id.clone(), delay, move |token| {
                engine.reconnect(plan, token)
            });
    }

    async fn reconnect(self: Arc<Self>, plan: ResumePlan, token: CancellationToken) {
        let guild_id = &plan.guild_id;
        let mut backoff = Backoff::new(
            self.config.reconnect_delay(),
            self.config.max_reconnect_attempts.max(1),
        );

        loop {
            if token.is_cancelled() {
                return;
            }
            match self.try_resume(&plan, &token).await {
                Ok(true) => {
                    info!("[{}] persistent session restored", guild_id);
                    return;
                }
                Ok(false) => {
                    debug!("[{}] reconnect no longer needed", guild_id);
                    return;
                }
                Err(e) => {
                    let delay = backoff.next();
                    if backoff.is_exhausted() {
                        error!(
                            "[{}] giving up after {} reconnect attempt(s): {}",
                            guild_id,
                            backoff.attempt(),
                            e
                        );
                        return;
                    }
                    warn!(
                        "[{}] reconnect attempt {} failed: {}, retrying in {:?}",
                        guild_id,
                        backoff.attempt(),
                        e,
                        delay
                    );
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One reconnect attempt. `Ok(false)` means someone else owns the
    /// community now (explicit play, stop, settings change) and nothing more
    /// should be tried.
    async fn try_resume(
        self: &Arc<Self>,
        plan: &ResumePlan,
        token: &CancellationToken,
    ) -> Result<bool, MusicError> {
        let guild_id = &plan.guild_id;
        let settings = self
            .settings
            .music_settings(guild_id)
            .await
            .map_err(|e| MusicError::Connectivity(format!("settings unavailable: {}", e)))?;
        if !settings.enabled || !settings.persistent {
            info!("[{}] persistent mode was switched off, not reconnecting", guild_id);
            return Ok(false);
        }

        let (slot, created) = self.registry.get_or_create(guild_id, || {
            PlaybackSession::new(guild_id.clone(), plan.volume)
        });
        if !created {
            return Ok(false);
        }

        let (conn, channel) = {
            let mut session = slot.lock().await;
            if slot.is_retired() || session.connection.is_some() {
                return Ok(false);
            }
            if token.is_cancelled() {
                self.retire(&slot, &mut session);
                return Ok(false);
            }

            let channel = settings.persistent_channel_id.unwrap_or(plan.voice_channel_id);
            session.tenant = settings;
            session.loop_mode = plan.loop_mode;
            session.metadata = plan.metadata.clone();
            session.enqueue_many(plan.tracks.iter().cloned());
            session.advance();
            (self.open_connection(&slot, &mut session, channel), channel)
        };

        let followups = self.connect(&slot, conn, channel).await?;
        if let Err(e) = self.run_followups(&slot, followups).await {
            warn!("[{}] resumed, but playback did not start: {}", guild_id, e);
        }
        Ok(true)
    }
}

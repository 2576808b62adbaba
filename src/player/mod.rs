//! The playback engine: one actor per community, driven by control commands
//! and node events.
//!
//! Every stimulus follows the same shape. Take the community's session lock,
//! apply the in-memory transition, collect the resulting [`Followup`]s,
//! release the lock, then run the followups (node commands, voice changes,
//! announcements). Followups re-validate the session before acting because
//! anything may have happened while the lock was free.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    bridge::PlatformBridge,
    catalog::TrackCatalog,
    common::{
        MusicError, with_timeout,
        types::{ChannelId, GuildId},
    },
    configs::PlaybackConfig,
    node::AudioNode,
    protocol::{PlayerUpdate, Track},
    session::{PlaybackSession, SessionRegistry, SessionSlot, Scheduler},
    settings::SettingsStore,
};

pub mod adapter;
pub mod supervisor;

pub use supervisor::{QueueEnd, ResumePlan};

/// I/O owed after a locked transition.
#[derive(Debug)]
pub(crate) enum Followup {
    Play {
        conn: u64,
        seq: u64,
        track: Track,
        volume: u8,
        paused: bool,
    },
    /// Halt whatever the node still has loaded, if the session is still idle.
    StopTrack { conn: u64 },
    /// Resolve the tenant's fallback query and play it, if still idle.
    Fallback { conn: u64, query: String },
    Announce { channel: ChannelId, message: String },
    /// Destroy the node player and leave voice. The slot is already retired.
    Teardown,
    Reconnect(ResumePlan),
}

/// Per-community state that outlives sessions.
#[derive(Default)]
pub(crate) struct GuildGate {
    /// Held across voice joins, voice binding and teardown so a dying
    /// session cannot leave the channel a newer one just joined.
    voice: Mutex<()>,
    stops: AtomicU64,
}

impl GuildGate {
    pub(crate) fn stop_epoch(&self) -> u64 {
        self.stops.load(Ordering::Acquire)
    }

    pub(crate) fn bump_stop_epoch(&self) {
        self.stops.fetch_add(1, Ordering::AcqRel);
    }
}

pub struct PlaybackEngine {
    pub(crate) config: PlaybackConfig,
    pub(crate) registry: SessionRegistry,
    pub(crate) scheduler: Scheduler,
    pub(crate) catalog: TrackCatalog,
    pub(crate) node: Arc<dyn AudioNode>,
    pub(crate) bridge: Arc<dyn PlatformBridge>,
    pub(crate) settings: Arc<dyn SettingsStore>,
    gates: DashMap<GuildId, Arc<GuildGate>>,
}

impl PlaybackEngine {
    pub fn new(
        config: PlaybackConfig,
        catalog: TrackCatalog,
        node: Arc<dyn AudioNode>,
        bridge: Arc<dyn PlatformBridge>,
        settings: Arc<dyn SettingsStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            scheduler: Scheduler::new(),
            catalog,
            node,
            bridge,
            settings,
            gates: DashMap::new(),
        })
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub(crate) fn gate(&self, guild_id: &GuildId) -> Arc<GuildGate> {
        self.gates.entry(guild_id.clone()).or_default().value().clone()
    }

    /// The registered, non-retired slot of the community.
    pub(crate) fn live_slot(&self, guild_id: &GuildId) -> Option<Arc<SessionSlot>> {
        self.registry.get(guild_id).filter(|slot| !slot.is_retired())
    }

    /// Allocates a play sequence for `track` (already the session's current
    /// track). `None` while the connection is still binding; the binding
    /// step starts the current track itself.
    pub(crate) fn next_play(
        &self,
        slot: &SessionSlot,
        session: &mut PlaybackSession,
        track: Track,
    ) -> Option<Followup> {
        let conn = session.connection.as_ref().filter(|c| c.is_bound())?.id();
        let seq = session.next_play_seq();
        slot.publish_seq(seq);
        Some(Followup::Play {
            conn,
            seq,
            track,
            volume: session.volume(),
            paused: session.is_paused(),
        })
    }

    /// Detaches the connection and drops the slot from the registry. Call
    /// with the slot's session lock held; follow up with
    /// [`Followup::Teardown`] for the I/O side.
    pub(crate) fn retire(&self, slot: &Arc<SessionSlot>, session: &mut PlaybackSession) {
        if let Some(conn) = session.connection.take() {
            self.node.events().unsubscribe(&slot.guild_id, conn.id());
        }
        self.registry.remove(slot);
        debug!("[{}] session retired", slot.guild_id);
    }

    /// Runs followups in order. Returns the first play command failure, which
    /// has already been handled as a playback fault.
    pub(crate) async fn run_followups(
        self: &Arc<Self>,
        slot: &Arc<SessionSlot>,
        followups: Vec<Followup>,
    ) -> Result<(), MusicError> {
        let mut queue: VecDeque<Followup> = followups.into();
        let mut first_error = None;

        while let Some(followup) = queue.pop_front() {
            match followup {
                Followup::Play {
                    conn,
                    seq,
                    track,
                    volume,
                    paused,
                } => {
                    if let Err(e) = self.start_track(slot, conn, seq, &track, volume, paused).await {
                        warn!(
                            "[{}] play command for `{}` failed: {}",
                            slot.guild_id, track.info.title, e
                        );
                        let recovery = {
                            let mut session = slot.lock().await;
                            if self.is_stale(slot, &session, conn) || session.play_seq() != seq {
                                Vec::new()
                            } else {
                                self.on_fault(slot, &mut session, &track, &e.to_string())
                            }
                        };
                        queue.extend(recovery);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
                Followup::StopTrack { conn } => self.stop_idle_track(slot, conn).await,
                Followup::Fallback { conn, query } => {
                    queue.extend(self.start_fallback(slot, conn, &query).await);
                }
                Followup::Announce { channel, message } => self.announce(channel, &message).await,
                Followup::Teardown => self.release_voice(slot).await,
                Followup::Reconnect(plan) => self.schedule_reconnect(plan),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) fn is_stale(&self, slot: &SessionSlot, session: &PlaybackSession, conn: u64) -> bool {
        slot.is_retired() || session.connection_id() != Some(conn)
    }

    async fn stop_idle_track(&self, slot: &Arc<SessionSlot>, conn: u64) {
        let _commands = slot.lock_commands().await;
        {
            let session = slot.lock().await;
            if self.is_stale(slot, &session, conn) || session.current().is_some() {
                return;
            }
        }
        if let Err(e) = self
            .node_command("stop command", &slot.guild_id, PlayerUpdate::stop_track())
            .await
        {
            warn!("[{}] failed to stop the idle player: {}", slot.guild_id, e);
        }
    }

    /// Destroys the node player and leaves voice for a retired slot, unless a
    /// newer session of the same community owns them by now.
    pub(crate) async fn release_voice(&self, slot: &Arc<SessionSlot>) {
        let guild_id = &slot.guild_id;
        let _commands = slot.lock_commands().await;
        let gate = self.gate(guild_id);
        let _voice = gate.voice.lock().await;

        if let Some(current) = self.live_slot(guild_id) {
            if !Arc::ptr_eq(&current, slot) {
                debug!("[{}] voice belongs to a newer session, keeping it", guild_id);
                return;
            }
        }

        let timeout = self.config.command_timeout();
        match with_timeout("player destroy", timeout, self.node.destroy_player(guild_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[{}] failed to destroy node player: {}", guild_id, e),
            Err(e) => warn!("[{}] {}", guild_id, e),
        }
        match with_timeout("voice leave", timeout, self.bridge.leave(guild_id)).await {
            Ok(Ok(())) => info!("[{}] left voice", guild_id),
            Ok(Err(e)) => warn!("[{}] failed to leave voice: {}", guild_id, e),
            Err(e) => warn!("[{}] {}", guild_id, e),
        }
    }

    pub(crate) async fn announce(&self, channel: ChannelId, message: &str) {
        match with_timeout(
            "announcement",
            self.config.command_timeout(),
            self.bridge.announce(channel, message),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Announcement to {} failed: {}", channel, e),
            Err(e) => debug!("Announcement to {} failed: {}", channel, e),
        }
    }

    /// A bounded node player update.
    pub(crate) async fn node_command(
        &self,
        what: &'static str,
        guild_id: &GuildId,
        update: PlayerUpdate,
    ) -> Result<(), MusicError> {
        with_timeout(
            what,
            self.config.command_timeout(),
            self.node.update_player(guild_id, &update),
        )
        .await?
        .map_err(|e| MusicError::Connectivity(format!("audio node rejected the {}: {}", what, e)))
    }

    /// Stops every session. Used on shutdown.
    pub async fn stop_all(self: &Arc<Self>) {
        self.scheduler.cancel_all();
        for guild_id in self.registry.guilds() {
            if let Some(slot) = self.registry.get(&guild_id) {
                {
                    let mut session = slot.lock().await;
                    if slot.is_retired() {
                        continue;
                    }
                    session.clear();
                    self.retire(&slot, &mut session);
                }
                self.release_voice(&slot).await;
            }
        }
    }
}

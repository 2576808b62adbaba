//! Shared fixtures for the integration tests: an in-memory audio node and
//! platform bridge wired into a real engine.

#![allow(dead_code)]

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use guildbeat::{
    bridge::{PlatformBridge, VoiceChannel},
    catalog::TrackCatalog,
    common::types::{AnyResult, ChannelId, GuildId, UserId},
    configs::{Config, PlaybackConfig, TenantConfig},
    control::{ControlSurface, PlayRequest},
    node::{AudioNode, EventBus},
    player::PlaybackEngine,
    protocol::{
        LoadResult, NodeEvent, PlayerUpdate, PlaylistData, PlaylistInfo, Track, TrackEndReason,
        TrackInfo, VoiceState,
    },
    server::AppState,
    settings::StaticSettingsStore,
    transport::router,
};

pub const VOICE: ChannelId = ChannelId(500);
pub const TEXT: ChannelId = ChannelId(600);

pub fn track(title: &str) -> Track {
    Track::new(
        format!("enc-{}", title),
        TrackInfo {
            identifier: title.replace(' ', "-"),
            is_seekable: true,
            author: "Tester".to_string(),
            length: 180_000,
            title: title.to_string(),
            uri: Some(format!("https://example.com/{}", title.replace(' ', "-"))),
            source_name: "fake".to_string(),
            ..Default::default()
        },
    )
}

fn playlist(name: &str, size: usize) -> LoadResult {
    LoadResult::Playlist(PlaylistData {
        info: PlaylistInfo {
            name: name.to_string(),
            selected_track: -1,
        },
        plugin_info: json!({}),
        tracks: (1..=size).map(|i| track(&format!("{} {}", name, i))).collect(),
    })
}

/// Audio node stand-in.
///
/// Searches resolve to a single track named after the query, except for a
/// few reserved queries: `nothing` (no results), `broken` (load error),
/// `radio` (2 track playlist) and `mix` (5 track playlist).
#[derive(Default)]
pub struct FakeNode {
    events: EventBus,
    updates: Mutex<Vec<(GuildId, PlayerUpdate)>>,
    destroyed: Mutex<Vec<GuildId>>,
    fail_plays: AtomicBool,
    fail_controls: AtomicBool,
}

impl FakeNode {
    pub fn fail_plays(&self, fail: bool) {
        self.fail_plays.store(fail, Ordering::SeqCst);
    }

    /// Fails pause, volume and stop updates. Plays and voice bindings still
    /// go through.
    pub fn fail_controls(&self, fail: bool) {
        self.fail_controls.store(fail, Ordering::SeqCst);
    }

    /// `(encoded, playSeq)` of every play command sent for the guild.
    pub fn plays(&self, guild_id: &GuildId) -> Vec<(String, u64)> {
        self.updates
            .lock()
            .iter()
            .filter(|(g, _)| g == guild_id)
            .filter_map(|(_, update)| {
                let seq = update.play_seq()?;
                match &update.track.as_ref()?.encoded {
                    guildbeat::protocol::TrackEncoded::Set(encoded) => Some((encoded.clone(), seq)),
                    guildbeat::protocol::TrackEncoded::Clear => None,
                }
            })
            .collect()
    }

    pub fn last_play(&self, guild_id: &GuildId) -> Option<(String, u64)> {
        self.plays(guild_id).pop()
    }

    pub fn updates(&self, guild_id: &GuildId) -> Vec<PlayerUpdate> {
        self.updates
            .lock()
            .iter()
            .filter(|(g, _)| g == guild_id)
            .map(|(_, update)| update.clone())
            .collect()
    }

    pub fn voice_bindings(&self, guild_id: &GuildId) -> usize {
        self.updates(guild_id).iter().filter(|u| u.voice.is_some()).count()
    }

    pub fn destroyed(&self, guild_id: &GuildId) -> usize {
        self.destroyed.lock().iter().filter(|g| *g == guild_id).count()
    }

    /// The last commanded track as the node would echo it in events.
    fn echoed(&self, guild_id: &GuildId) -> Track {
        let (encoded, seq) = self
            .last_play(guild_id)
            .unwrap_or_else(|| panic!("no play command sent for guild {}", guild_id));
        let title = encoded.trim_start_matches("enc-").to_string();
        let mut echoed = track(&title);
        echoed.user_data = json!({ "playSeq": seq });
        echoed
    }

    pub fn emit(&self, event: NodeEvent) -> bool {
        self.events.publish(event)
    }

    pub fn start(&self, guild_id: &GuildId) -> bool {
        self.emit(NodeEvent::TrackStart {
            guild_id: guild_id.clone(),
            track: self.echoed(guild_id),
        })
    }

    /// End of the last commanded track, built now and delivered later.
    pub fn end_event(&self, guild_id: &GuildId, reason: TrackEndReason) -> NodeEvent {
        NodeEvent::TrackEnd {
            guild_id: guild_id.clone(),
            track: self.echoed(guild_id),
            reason,
        }
    }

    pub fn finish(&self, guild_id: &GuildId) -> bool {
        self.emit(self.end_event(guild_id, TrackEndReason::Finished))
    }

    pub fn replaced(&self, guild_id: &GuildId) -> bool {
        self.emit(self.end_event(guild_id, TrackEndReason::Replaced))
    }

    pub fn stuck(&self, guild_id: &GuildId) -> bool {
        self.emit(NodeEvent::TrackStuck {
            guild_id: guild_id.clone(),
            track: self.echoed(guild_id),
            threshold_ms: 10_000,
        })
    }

    pub fn closed(&self, guild_id: &GuildId) -> bool {
        self.emit(NodeEvent::WebSocketClosed {
            guild_id: guild_id.clone(),
            code: 4006,
            reason: "Session is no longer valid".to_string(),
            by_remote: true,
        })
    }
}

#[async_trait]
impl AudioNode for FakeNode {
    async fn load_tracks(&self, identifier: &str) -> AnyResult<LoadResult> {
        let query = identifier.strip_prefix("ytsearch:").unwrap_or(identifier);
        Ok(match query {
            "nothing" => LoadResult::Empty {},
            "broken" => return Err("node unreachable".into()),
            "radio" => playlist("radio", 2),
            "mix" => playlist("mix", 5),
            other => LoadResult::Search(vec![track(other), track(&format!("{} (live)", other))]),
        })
    }

    async fn update_player(&self, guild_id: &GuildId, update: &PlayerUpdate) -> AnyResult<()> {
        if update.play_seq().is_some() && self.fail_plays.load(Ordering::SeqCst) {
            return Err("track could not be loaded".into());
        }
        let control = update.play_seq().is_none() && update.voice.is_none();
        if control && self.fail_controls.load(Ordering::SeqCst) {
            return Err("node unreachable".into());
        }
        self.updates.lock().push((guild_id.clone(), update.clone()));
        Ok(())
    }

    async fn destroy_player(&self, guild_id: &GuildId) -> AnyResult<()> {
        self.destroyed.lock().push(guild_id.clone());
        Ok(())
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn position(&self, _guild_id: &GuildId) -> Option<u64> {
        Some(65_000)
    }
}

/// Platform bridge stand-in. Only guild `known` has listable voice channels.
#[derive(Default)]
pub struct FakeBridge {
    joins: Mutex<Vec<(GuildId, ChannelId)>>,
    join_attempts: Mutex<Vec<GuildId>>,
    leaves: Mutex<Vec<GuildId>>,
    announcements: Mutex<Vec<(ChannelId, String)>>,
    fail_joins: AtomicBool,
}

impl FakeBridge {
    pub fn fail_joins(&self, fail: bool) {
        self.fail_joins.store(fail, Ordering::SeqCst);
    }

    pub fn joins(&self, guild_id: &GuildId) -> Vec<ChannelId> {
        self.joins
            .lock()
            .iter()
            .filter(|(g, _)| g == guild_id)
            .map(|(_, c)| *c)
            .collect()
    }

    /// Joins tried, including failed ones.
    pub fn join_attempts(&self, guild_id: &GuildId) -> usize {
        self.join_attempts.lock().iter().filter(|g| *g == guild_id).count()
    }

    pub fn leaves(&self, guild_id: &GuildId) -> usize {
        self.leaves.lock().iter().filter(|g| *g == guild_id).count()
    }

    pub fn announcements(&self) -> Vec<(ChannelId, String)> {
        self.announcements.lock().clone()
    }
}

#[async_trait]
impl PlatformBridge for FakeBridge {
    async fn join(&self, guild_id: &GuildId, channel_id: ChannelId) -> AnyResult<VoiceState> {
        self.join_attempts.lock().push(guild_id.clone());
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err("missing permissions".into());
        }
        self.joins.lock().push((guild_id.clone(), channel_id));
        Ok(VoiceState {
            token: "voice-token".to_string(),
            endpoint: "voice.example.com".to_string(),
            session_id: format!("voice-session-{}", guild_id),
            channel_id: Some(channel_id.to_string()),
        })
    }

    async fn leave(&self, guild_id: &GuildId) -> AnyResult<()> {
        self.leaves.lock().push(guild_id.clone());
        Ok(())
    }

    async fn voice_channels(&self, guild_id: &GuildId) -> AnyResult<Option<Vec<VoiceChannel>>> {
        if guild_id.0 != "known" {
            return Ok(None);
        }
        Ok(Some(vec![
            VoiceChannel {
                id: VOICE,
                name: "Lounge".to_string(),
            },
            VoiceChannel {
                id: ChannelId(501),
                name: "Stage".to_string(),
            },
        ]))
    }

    async fn announce(&self, channel_id: ChannelId, message: &str) -> AnyResult<()> {
        self.announcements.lock().push((channel_id, message.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub config: Config,
    pub node: Arc<FakeNode>,
    pub bridge: Arc<FakeBridge>,
    pub control: Arc<ControlSurface>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tenants(Vec::new())
    }

    pub fn with_tenants(tenants: Vec<TenantConfig>) -> Self {
        Self::with_reconnect_delay(tenants, 20)
    }

    pub fn with_reconnect_delay(tenants: Vec<TenantConfig>, delay_ms: u64) -> Self {
        Self::with_playback(tenants, |playback| playback.reconnect_delay_ms = delay_ms)
    }

    pub fn with_playback(tenants: Vec<TenantConfig>, tune: impl FnOnce(&mut PlaybackConfig)) -> Self {
        let mut config = Config::default();
        config.playback.resolve_timeout_ms = 1_000;
        config.playback.command_timeout_ms = 1_000;
        config.playback.reconnect_delay_ms = 20;
        config.playback.max_consecutive_faults = 2;
        tune(&mut config.playback);
        config.tenants = tenants;

        let node = Arc::new(FakeNode::default());
        let bridge = Arc::new(FakeBridge::default());
        let catalog = TrackCatalog::new(
            node.clone(),
            config.node.search_prefix.clone(),
            config.playback.resolve_timeout(),
        );
        let engine = PlaybackEngine::new(
            config.playback.clone(),
            catalog,
            node.clone(),
            bridge.clone(),
            Arc::new(StaticSettingsStore::new(&config.tenants)),
        );
        let control = Arc::new(ControlSurface::new(engine));

        Self {
            config,
            node,
            bridge,
            control,
        }
    }

    pub fn router(&self) -> axum::Router {
        router(AppState::new(self.config.clone(), self.control.clone()))
    }

    pub async fn current_title(&self, guild_id: &GuildId) -> Option<String> {
        self.control.status(guild_id).await.track.map(|t| t.title)
    }

    /// Waits until `title` is the current track and its play command has
    /// reached the node.
    pub async fn wait_for_current(&self, guild_id: &GuildId, title: &str) -> bool {
        let encoded = format!("enc-{}", title);
        for _ in 0..200 {
            let commanded = self
                .node
                .last_play(guild_id)
                .is_some_and(|(last, _)| last == encoded);
            if commanded && self.current_title(guild_id).await.as_deref() == Some(title) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub fn persistent_tenant(guild: &str, fallback: Option<&str>) -> TenantConfig {
    TenantConfig {
        guild_id: GuildId::from(guild),
        enabled: true,
        default_volume: None,
        persistent: true,
        persistent_channel_id: None,
        fallback_query: fallback.map(str::to_string),
        request_channel_id: None,
    }
}

pub fn play_request(query: &str) -> PlayRequest {
    PlayRequest {
        query: query.to_string(),
        voice_channel_id: Some(VOICE),
        requested_by: Some(UserId(42)),
        text_channel_id: Some(TEXT),
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Gives in-flight event handling a moment to settle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub async fn with_deadline<T>(fut: impl Future<Output = T>) -> T {
    match tokio::time::timeout(Duration::from_secs(5), fut).await {
        Ok(value) => value,
        Err(_) => panic!("operation did not finish within 5s"),
    }
}

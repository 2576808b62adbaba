use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;

use super::{AudioNode, EventBus};
use crate::{
    common::{
        HttpClient,
        types::{AnyResult, GuildId, SessionId},
    },
    configs::NodeConfig,
    protocol::{LoadResult, PlayerState, PlayerUpdate, SessionUpdate},
};

/// REST half of the node connection plus the state the socket feeds it.
pub struct NodeClient {
    pub(super) config: NodeConfig,
    http: reqwest::Client,
    session_id: RwLock<Option<SessionId>>,
    events: EventBus,
    positions: DashMap<GuildId, PlayerState>,
}

impl NodeClient {
    pub fn new(config: NodeConfig) -> AnyResult<Self> {
        let http = HttpClient::new(Duration::from_millis(config.request_timeout_ms))?;
        Ok(Self {
            config,
            http,
            session_id: RwLock::new(None),
            events: EventBus::new(),
            positions: DashMap::new(),
        })
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id.read().clone()
    }

    /// Stores the session id from a `ready` op and returns the previous one.
    pub(super) fn set_session_id(&self, session_id: SessionId) -> Option<SessionId> {
        self.session_id.write().replace(session_id)
    }

    pub(super) fn record_state(&self, guild_id: GuildId, state: PlayerState) {
        self.positions.insert(guild_id, state);
    }

    pub(super) fn forget_states(&self) {
        self.positions.clear();
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.config.rest_url(), path))
            .header("Authorization", &self.config.password)
    }

    fn player_path(&self, guild_id: &GuildId) -> AnyResult<String> {
        let session_id = self
            .session_id()
            .ok_or("node session is not ready yet")?;
        Ok(format!("/v4/sessions/{}/players/{}", session_id, guild_id))
    }

    pub async fn update_session(&self, update: &SessionUpdate) -> AnyResult<()> {
        let session_id = self
            .session_id()
            .ok_or("node session is not ready yet")?;
        let response = self
            .request(Method::PATCH, &format!("/v4/sessions/{}", session_id))
            .json(update)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> AnyResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("node answered {}: {}", status, body).into())
}

#[async_trait]
impl AudioNode for NodeClient {
    async fn load_tracks(&self, identifier: &str) -> AnyResult<LoadResult> {
        let path = format!(
            "/v4/loadtracks?identifier={}",
            urlencoding::encode(identifier)
        );
        let response = self.request(Method::GET, &path).send().await?;
        let result = check_status(response).await?.json::<LoadResult>().await?;
        Ok(result)
    }

    async fn update_player(&self, guild_id: &GuildId, update: &PlayerUpdate) -> AnyResult<()> {
        let path = format!("{}?noReplace=false", self.player_path(guild_id)?);
        debug!("[{}] PATCH {}", guild_id, path);
        let response = self
            .request(Method::PATCH, &path)
            .json(update)
            .send()
            .await?;
        check_status(response).await?;
        // The cached position belongs to the track that was just replaced.
        if update.play_seq().is_some() {
            self.positions.remove(guild_id);
        }
        Ok(())
    }

    async fn destroy_player(&self, guild_id: &GuildId) -> AnyResult<()> {
        self.positions.remove(guild_id);
        let path = self.player_path(guild_id)?;
        let response = self.request(Method::DELETE, &path).send().await?;
        // Already gone on the node side is fine.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn position(&self, guild_id: &GuildId) -> Option<u64> {
        self.positions.get(guild_id).map(|state| state.position)
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{PlatformBridge, VoiceChannel};
use crate::{
    common::{
        HttpClient,
        types::{AnyResult, ChannelId, GuildId},
    },
    configs::BridgeConfig,
    protocol::VoiceState,
};

#[derive(Deserialize)]
struct ChannelList {
    channels: Vec<VoiceChannel>,
}

pub struct HttpBridge {
    base_url: String,
    secret: String,
    http: reqwest::Client,
}

impl HttpBridge {
    pub fn new(config: &BridgeConfig) -> AnyResult<Self> {
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            secret: config.secret.clone(),
            http: HttpClient::new(Duration::from_millis(config.timeout_ms))?,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", &self.secret)
    }
}

#[async_trait]
impl PlatformBridge for HttpBridge {
    async fn join(&self, guild_id: &GuildId, channel_id: ChannelId) -> AnyResult<VoiceState> {
        let response = self
            .request(Method::POST, &format!("/guilds/{}/voice", guild_id))
            .json(&serde_json::json!({ "channelId": channel_id }))
            .send()
            .await?
            .error_for_status()?;
        let mut voice: VoiceState = response.json().await?;
        if voice.channel_id.is_none() {
            voice.channel_id = Some(channel_id.to_string());
        }
        Ok(voice)
    }

    async fn leave(&self, guild_id: &GuildId) -> AnyResult<()> {
        self.request(Method::DELETE, &format!("/guilds/{}/voice", guild_id))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn voice_channels(&self, guild_id: &GuildId) -> AnyResult<Option<Vec<VoiceChannel>>> {
        let response = self
            .request(Method::GET, &format!("/guilds/{}/voice-channels", guild_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let list: ChannelList = response.error_for_status()?.json().await?;
        Ok(Some(list.channels))
    }

    async fn announce(&self, channel_id: ChannelId, message: &str) -> AnyResult<()> {
        self.request(Method::POST, &format!("/channels/{}/messages", channel_id))
            .json(&serde_json::json!({ "content": message }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    http::HeaderValue,
    protocol::Message,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{AudioNode, NodeClient};
use crate::{
    common::{
        Backoff,
        types::{AnyResult, GuildId},
    },
    protocol::{IncomingMessage, SessionUpdate},
};

/// Close code used for the synthetic connection-closed events sent when the
/// node forgot our session.
const SESSION_LOST_CODE: u16 = 4006;

enum SocketOutcome {
    /// Socket dropped, connect again.
    Reconnect,
    /// Cancelled from outside.
    Shutdown,
}

/// Keeps the node's event socket open until `cancel` fires.
pub async fn run(client: Arc<NodeClient>, cancel: CancellationToken) {
    let mut backoff = Backoff::new(
        Duration::from_millis(client.config.reconnect_base_ms),
        client.config.reconnect_attempts,
    );

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match connect(&client, &cancel, &mut backoff).await {
            Ok(SocketOutcome::Shutdown) => {
                debug!("Node socket shutting down cleanly");
                return;
            }
            Ok(SocketOutcome::Reconnect) => {
                warn!("Node socket closed, reconnecting");
            }
            Err(e) => {
                warn!("Node socket error: {}", e);
            }
        }

        if backoff.is_exhausted() {
            // The node is not optional; keep trying at the longest delay.
            error!(
                "Node unreachable after {} attempts, still retrying",
                backoff.attempt()
            );
            backoff.reset();
        }
        let delay = backoff.next();
        debug!("Reconnecting to node in {:?}", delay);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn connect(
    client: &NodeClient,
    cancel: &CancellationToken,
    backoff: &mut Backoff,
) -> AnyResult<SocketOutcome> {
    let config = &client.config;
    let mut request = config.websocket_url().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("Authorization", HeaderValue::from_str(&config.password)?);
    headers.insert("User-Id", HeaderValue::from_str(&config.user_id.to_string())?);
    headers.insert("Client-Name", HeaderValue::from_str(&config.client_name)?);
    if let Some(session_id) = client.session_id() {
        headers.insert("Session-Id", HeaderValue::from_str(&session_id)?);
    }

    let (mut stream, _) = tokio_tungstenite::connect_async(request).await?;
    info!("Connected to node at {}", config.address);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(SocketOutcome::Shutdown),
            msg = stream.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("Node socket read error: {}", e);
                        return Ok(SocketOutcome::Reconnect);
                    }
                    None => return Ok(SocketOutcome::Reconnect),
                };

                match msg {
                    Message::Text(text) => {
                        if handle_text(client, text.as_str()).await {
                            backoff.reset();
                        }
                    }
                    Message::Close(frame) => {
                        info!("Node closed the socket: {:?}", frame);
                        return Ok(SocketOutcome::Reconnect);
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Returns true once the node has (re)acknowledged our session.
async fn handle_text(client: &NodeClient, text: &str) -> bool {
    let message = match serde_json::from_str::<IncomingMessage>(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("Ignoring node message ({}): {}", e, text);
            return false;
        }
    };

    match message {
        IncomingMessage::Ready {
            resumed,
            session_id,
        } => {
            info!("Node session ready: {} (resumed: {})", session_id, resumed);
            let previous = client.set_session_id(session_id);
            if !resumed && previous.is_some() {
                // Every player we had lived in the old session.
                client.forget_states();
                let notified = client
                    .events()
                    .close_all(SESSION_LOST_CODE, "node session lost");
                warn!("Node did not resume, {} connection(s) closed", notified);
            }

            if client.config.resume_timeout_secs > 0 {
                let update = SessionUpdate {
                    resuming: true,
                    timeout: client.config.resume_timeout_secs,
                };
                if let Err(e) = client.update_session(&update).await {
                    warn!("Failed to enable session resuming: {}", e);
                }
            }
            true
        }
        IncomingMessage::PlayerUpdate { guild_id, state } => {
            client.record_state(guild_id, state);
            false
        }
        IncomingMessage::Stats {} => false,
        IncomingMessage::Event(event) => {
            let guild_id: &GuildId = event.guild_id();
            debug!("[{}] node event: {}", guild_id, event.kind());
            client.events().publish(event);
            false
        }
    }
}

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::{common::types::GuildId, protocol::NodeEvent};

struct Route {
    owner: u64,
    tx: flume::Sender<NodeEvent>,
}

/// Routes node events to the one live connection of each guild.
///
/// A guild has at most one route. Subscribing again replaces the route and
/// drops the previous sender, so the superseded receiver drains whatever it
/// already holds and then disconnects.
#[derive(Default)]
pub struct EventBus {
    routes: DashMap<GuildId, Route>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `owner` (a connection id) as the receiver of the guild's
    /// events.
    pub fn subscribe(&self, guild_id: &GuildId, owner: u64) -> flume::Receiver<NodeEvent> {
        let (tx, rx) = flume::unbounded();
        if let Some(previous) = self.routes.insert(guild_id.clone(), Route { owner, tx }) {
            debug!(
                "[{}] event route of connection {} replaced by {}",
                guild_id, previous.owner, owner
            );
        }
        rx
    }

    /// Removes the route only if `owner` still holds it.
    pub fn unsubscribe(&self, guild_id: &GuildId, owner: u64) {
        self.routes.remove_if(guild_id, |_, route| route.owner == owner);
    }

    /// Returns false if nobody listens for this guild.
    pub fn publish(&self, event: NodeEvent) -> bool {
        let delivered = self
            .routes
            .get(event.guild_id())
            .map(|route| route.tx.send(event.clone()).is_ok())
            .unwrap_or(false);
        if !delivered {
            trace!(
                "[{}] dropped {} event without a live route",
                event.guild_id(),
                event.kind()
            );
        }
        delivered
    }

    /// Tells every live connection that its node side is gone.
    pub fn close_all(&self, code: u16, reason: &str) -> usize {
        let mut notified = 0;
        for route in self.routes.iter() {
            let event = NodeEvent::WebSocketClosed {
                guild_id: route.key().clone(),
                code,
                reason: reason.to_string(),
                by_remote: true,
            };
            if route.tx.send(event).is_ok() {
                notified += 1;
            }
        }
        notified
    }

    pub fn routes(&self) -> usize {
        self.routes.len()
    }
}

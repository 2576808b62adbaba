use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::types::GuildId;

/// Handle to a delayed action.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    id: u64,
    token: CancellationToken,
}

impl ScheduledTask {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// At most one pending delayed action per community.
///
/// Cancelling stops an action that has not started yet. A running action
/// receives the token and must check it before committing anything.
#[derive(Default)]
pub struct Scheduler {
    tasks: Arc<DashMap<GuildId, ScheduledTask>>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `action` after `delay`, replacing (and cancelling) the
    /// community's previous task.
    pub fn schedule<F, Fut>(&self, guild_id: GuildId, delay: Duration, action: F) -> ScheduledTask
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = ScheduledTask {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            token: CancellationToken::new(),
        };
        if let Some(previous) = self.tasks.insert(guild_id.clone(), task.clone()) {
            debug!("[{}] scheduled task {} replaced", guild_id, previous.id);
            previous.cancel();
        }

        let tasks = self.tasks.clone();
        let handle = task.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = handle.token.cancelled() => {
                    debug!("[{}] scheduled task {} cancelled", guild_id, handle.id);
                }
                _ = tokio::time::sleep(delay) => {
                    action(handle.token.clone()).await;
                }
            }
            tasks.remove_if(&guild_id, |_, registered| registered.id == handle.id);
        });

        task
    }

    /// Returns true if a pending task was cancelled.
    pub fn cancel(&self, guild_id: &GuildId) -> bool {
        match self.tasks.remove(guild_id) {
            Some((_, task)) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, guild_id: &GuildId) -> bool {
        self.tasks.contains_key(guild_id)
    }

    pub fn cancel_all(&self) {
        self.tasks.retain(|_, task| {
            task.cancel();
            false
        });
    }
}

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{Mutex, MutexGuard};

use super::queue::PlaybackSession;
use crate::common::types::GuildId;

/// Registry entry of one community.
///
/// `session` is the actor lock: every command and node event takes it for
/// its in-memory transition only. `commands` orders the node commands that
/// follow those transitions. Take `commands` before `session`, never the
/// other way round.
pub struct SessionSlot {
    pub guild_id: GuildId,
    session: Mutex<PlaybackSession>,
    commands: Mutex<()>,
    retired: AtomicBool,
    /// Copy of the session's play sequence, readable without the lock.
    seq: AtomicU64,
}

impl SessionSlot {
    fn new(session: PlaybackSession) -> Self {
        Self {
            guild_id: session.guild_id.clone(),
            seq: AtomicU64::new(session.play_seq()),
            session: Mutex::new(session),
            commands: Mutex::new(()),
            retired: AtomicBool::new(false),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, PlaybackSession> {
        self.session.lock().await
    }

    pub async fn lock_commands(&self) -> MutexGuard<'_, ()> {
        self.commands.lock().await
    }

    /// Set under the session lock by teardown. Whoever takes the lock
    /// afterwards must treat the session as gone.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub fn observed_seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    /// Called with the session lock held after allocating a play sequence.
    pub fn publish_seq(&self, seq: u64) {
        self.seq.store(seq, Ordering::Release);
    }
}

/// All live sessions, keyed by community.
///
/// Lookups and inserts of different communities never block each other; a
/// shard lock is only held for the map operation itself, never across an
/// await.
#[derive(Default)]
pub struct SessionRegistry {
    slots: DashMap<GuildId, Arc<SessionSlot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<Arc<SessionSlot>> {
        self.slots.get(guild_id).map(|slot| slot.value().clone())
    }

    /// Returns the community's slot, creating it with `init` if there is
    /// none. The flag tells whether this call created it.
    pub fn get_or_create(
        &self,
        guild_id: &GuildId,
        init: impl FnOnce() -> PlaybackSession,
    ) -> (Arc<SessionSlot>, bool) {
        match self.slots.entry(guild_id.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let slot = Arc::new(SessionSlot::new(init()));
                entry.insert(slot.clone());
                (slot, true)
            }
        }
    }

    /// Retires `slot` and drops it from the map if it is still the
    /// registered one. Call with the slot's session lock held.
    pub fn remove(&self, slot: &Arc<SessionSlot>) -> bool {
        slot.retire();
        self.slots
            .remove_if(&slot.guild_id, |_, registered| Arc::ptr_eq(registered, slot))
            .is_some()
    }

    pub fn contains(&self, guild_id: &GuildId) -> bool {
        self.slots.contains_key(guild_id)
    }

    pub fn guilds(&self) -> Vec<GuildId> {
        self.slots.iter().map(|slot| slot.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

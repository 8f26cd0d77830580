//! Registry of known players and their poll tasks.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::task::JoinHandle;

use crate::player::{Player, record::PlayerIdentity};

/// Repository key: (controller, device identifier).
pub type PlayerKey = (String, String);

struct PlayerHandle {
    player: Arc<Player>,
    task: Option<JoinHandle<()>>,
}

/// At most one player per (controller, device identifier).
#[derive(Default)]
pub struct PlayerRepository {
    players: DashMap<PlayerKey, PlayerHandle>,
}

impl PlayerRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Player registered under `identity`.
    pub fn get(&self, identity: &PlayerIdentity) -> Option<Arc<Player>> {
        self.players
            .get(&identity.key())
            .map(|handle| Arc::clone(&handle.player))
    }

    /// Whether a player is registered under `identity`.
    pub fn contains(&self, identity: &PlayerIdentity) -> bool {
        self.players.contains_key(&identity.key())
    }

    /// Player whose device identifier is `device_id`, whatever its controller.
    pub fn find_device(&self, device_id: &str) -> Option<Arc<Player>> {
        self.players
            .iter()
            .find(|entry| entry.key().1 == device_id)
            .map(|entry| Arc::clone(&entry.value().player))
    }

    /// Return the registered player, or build and start one with `create`.
    ///
    /// The boolean is `true` when the player was created by this call.
    pub fn get_or_insert_with<F>(&self, identity: &PlayerIdentity, create: F) -> (Arc<Player>, bool)
    where
        F: FnOnce() -> (Arc<Player>, Option<JoinHandle<()>>),
    {
        match self.players.entry(identity.key()) {
            Entry::Occupied(entry) => (Arc::clone(&entry.get().player), false),
            Entry::Vacant(entry) => {
                let (player, task) = create();
                entry.insert(PlayerHandle {
                    player: Arc::clone(&player),
                    task,
                });
                (player, true)
            }
        }
    }

    /// Remove the player, retire it and stop its task.
    pub fn remove(&self, identity: &PlayerIdentity) -> Option<Arc<Player>> {
        let (_, handle) = self.players.remove(&identity.key())?;
        handle.player.retire();
        if let Some(task) = handle.task {
            task.abort();
        }
        Some(handle.player)
    }

    /// Every registered player.
    pub fn all(&self) -> Vec<Arc<Player>> {
        self.players
            .iter()
            .map(|entry| Arc::clone(&entry.value().player))
            .collect()
    }

    /// Retire every player and stop their tasks.
    pub fn retire_all(&self) {
        for mut entry in self.players.iter_mut() {
            entry.player.retire();
            if let Some(task) = entry.task.take() {
                task.abort();
            }
        }
    }

    /// Number of registered players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no player is registered.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

//! In-memory adapters for the repository and player directory ports.
//!
//! Handy for tests, demos, and single-process deployments that don't need
//! lobbies to survive a restart. Lobbies are stored encoded, the same way
//! a real backend would see them, so a type that can't round-trip through
//! the codec fails here too.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lobbyforge_model::{Codec, JsonCodec, LobbyId, PlayerId, SteamId};

use crate::{DirectoryError, Lobby, PlayerDirectory, Repository, RepositoryError, SaveOutcome};

/// Repository that keeps encoded lobbies in a map.
#[derive(Debug)]
pub struct MemoryRepository {
    records: Mutex<HashMap<LobbyId, Vec<u8>>>,
    next_id: AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored lobbies, ended ones included.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> MutexGuard<'_, HashMap<LobbyId, Vec<u8>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MemoryRepository {
    async fn allocate_id(&self) -> Result<LobbyId, RepositoryError> {
        Ok(LobbyId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn save(&self, lobby: &Lobby) -> Result<SaveOutcome, RepositoryError> {
        let bytes = JsonCodec.encode(lobby)?;
        let outcome = match self.records().insert(lobby.id(), bytes) {
            Some(_) => SaveOutcome::Updated,
            None => SaveOutcome::Created,
        };
        Ok(outcome)
    }

    async fn find_by_id(&self, id: LobbyId) -> Result<Lobby, RepositoryError> {
        let bytes = self
            .records()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))?;
        Ok(JsonCodec.decode(&bytes)?)
    }

    async fn delete(&self, id: LobbyId) -> Result<(), RepositoryError> {
        self.records()
            .remove(&id)
            .map(drop)
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn list_active(&self) -> Result<Vec<Lobby>, RepositoryError> {
        let records: Vec<Vec<u8>> = self.records().values().cloned().collect();
        let mut active = Vec::with_capacity(records.len());
        for bytes in records {
            let lobby: Lobby = JsonCodec.decode(&bytes)?;
            if !lobby.state().is_ended() {
                active.push(lobby);
            }
        }
        active.sort_by_key(Lobby::id);
        Ok(active)
    }
}

/// Directory backed by a map filled in with [`register`](Self::register).
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    players: Mutex<HashMap<PlayerId, SteamId>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the external identity of `player`, replacing any previous one.
    pub fn register(&self, player: PlayerId, steam_id: SteamId) {
        self.players().insert(player, steam_id);
    }

    pub fn len(&self) -> usize {
        self.players().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn players(&self) -> MutexGuard<'_, HashMap<PlayerId, SteamId>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlayerDirectory for MemoryDirectory {
    async fn steam_id(&self, player: PlayerId) -> Result<SteamId, DirectoryError> {
        self.players()
            .get(&player)
            .cloned()
            .ok_or(DirectoryError::UnknownPlayer(player))
    }
}

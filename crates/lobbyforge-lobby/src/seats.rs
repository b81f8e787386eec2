//! Cross-lobby seat index.
//!
//! Maps each seated player to the live lobby they sit in. Each lobby
//! actor serializes its own roster, but two actors can run at the same
//! time; this index is where they agree that a player can't hold seats
//! in two lobbies at once. Claiming is a single check-and-insert under
//! one lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lobbyforge_model::{LobbyId, PlayerId};

#[derive(Debug, Default)]
pub struct SeatIndex {
    seats: Mutex<HashMap<PlayerId, LobbyId>>,
}

/// Outcome of a successful [`SeatIndex::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The player had no seat anywhere; they now hold one in this lobby.
    New,
    /// The player already held a seat in this lobby.
    Existing,
}

impl SeatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `player` sits in `lobby_id`.
    ///
    /// # Errors
    /// Returns the other lobby if the player already sits elsewhere.
    pub fn claim(&self, player: PlayerId, lobby_id: LobbyId) -> Result<Claim, LobbyId> {
        let mut seats = self.lock();
        match seats.get(&player) {
            Some(current) if *current == lobby_id => Ok(Claim::Existing),
            Some(other) => Err(*other),
            None => {
                seats.insert(player, lobby_id);
                Ok(Claim::New)
            }
        }
    }

    /// Drops the player's seat if it belongs to `lobby_id`.
    pub fn release(&self, player: PlayerId, lobby_id: LobbyId) {
        let mut seats = self.lock();
        if seats.get(&player) == Some(&lobby_id) {
            seats.remove(&player);
        }
    }

    /// Drops every seat held in `lobby_id`.
    pub fn release_lobby(&self, lobby_id: LobbyId) {
        self.lock().retain(|_, lobby| *lobby != lobby_id);
    }

    /// The lobby `player` currently sits in, if any.
    pub fn lobby_of(&self, player: PlayerId) -> Option<LobbyId> {
        self.lock().get(&player).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PlayerId, LobbyId>> {
        self.seats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

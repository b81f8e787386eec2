//! Per-lobby ban list.
//!
//! Bans are preventive: a banned player can't take a slot anymore, but a
//! ban never evicts someone who is already seated. Callers that want to
//! kick a player release them explicitly.

use std::collections::BTreeSet;

use lobbyforge_model::PlayerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BanList {
    players: BTreeSet<PlayerId>,
}

impl BanList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bans `player`. Returns `true` if they weren't banned before.
    pub fn ban(&mut self, player: PlayerId) -> bool {
        self.players.insert(player)
    }

    /// Lifts a ban. Returns `true` if the player was banned.
    pub fn unban(&mut self, player: PlayerId) -> bool {
        self.players.remove(&player)
    }

    pub fn is_banned(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

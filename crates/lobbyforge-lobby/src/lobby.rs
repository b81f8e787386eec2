//! The lobby aggregate: one match session and everything persisted with it.
//!
//! `Lobby` is plain data plus the rules that guard it. It never talks to
//! storage or servers; the lobby actor applies these methods to its copy
//! and persists the result. Fields are private so the id can't change
//! after creation and slots only move through the checked methods.

use std::collections::BTreeSet;

use lobbyforge_model::{
    League, LobbyId, LobbyType, PlayerId, ServerInfo, Whitelist,
};
use serde::{Deserialize, Serialize};

use crate::slots::{Assignment, SlotConflict};
use crate::{BanList, LobbyError, LobbyState, SlotTable};

/// Parameters for creating a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLobby {
    pub map_name: String,
    pub lobby_type: LobbyType,
    /// `None` picks the manager's configured default league.
    pub league: Option<League>,
    pub server_info: Option<ServerInfo>,
    pub whitelist: Whitelist,
    /// `None` for lobbies created by the system rather than a player.
    pub created_by: Option<PlayerId>,
}

impl NewLobby {
    pub fn new(map_name: impl Into<String>, lobby_type: LobbyType) -> Self {
        Self {
            map_name: map_name.into(),
            lobby_type,
            league: None,
            server_info: None,
            whitelist: Whitelist::default(),
            created_by: None,
        }
    }

    pub fn server_info(mut self, info: ServerInfo) -> Self {
        self.server_info = Some(info);
        self
    }

    pub fn league(mut self, league: League) -> Self {
        self.league = Some(league);
        self
    }

    pub fn whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn created_by(mut self, player: PlayerId) -> Self {
        self.created_by = Some(player);
        self
    }
}

/// A lobby and its roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    id: LobbyId,
    map_name: String,
    lobby_type: LobbyType,
    league: League,
    state: LobbyState,
    whitelist: Whitelist,
    created_by: Option<PlayerId>,
    server_info: Option<ServerInfo>,
    slots: SlotTable,
    bans: BanList,
    spectators: BTreeSet<PlayerId>,
}

impl Lobby {
    /// Builds a fresh `Initializing` lobby with no occupied slots.
    pub fn new(id: LobbyId, params: NewLobby, default_league: League) -> Self {
        Self {
            id,
            map_name: params.map_name,
            lobby_type: params.lobby_type,
            league: params.league.unwrap_or(default_league),
            state: LobbyState::Initializing,
            whitelist: params.whitelist,
            created_by: params.created_by,
            server_info: params.server_info,
            slots: SlotTable::new(params.lobby_type.capacity()),
            bans: BanList::new(),
            spectators: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    pub fn lobby_type(&self) -> LobbyType {
        self.lobby_type
    }

    pub fn league(&self) -> League {
        self.league
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn whitelist(&self) -> Whitelist {
        self.whitelist
    }

    pub fn created_by(&self) -> Option<PlayerId> {
        self.created_by
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn bans(&self) -> &BanList {
        &self.bans
    }

    pub fn spectators(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.spectators.iter().copied()
    }

    pub fn is_spectating(&self, player: PlayerId) -> bool {
        self.spectators.contains(&player)
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn occupancy(&self) -> usize {
        self.slots.occupancy()
    }

    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    pub fn all_ready(&self) -> bool {
        self.slots.all_ready()
    }

    // -- Roster rules -----------------------------------------------------

    /// Checks the rules that come before the cross-lobby seat check:
    /// roster open, not banned, slot in range.
    pub fn check_admission(&self, player: PlayerId, slot: usize) -> Result<(), LobbyError> {
        self.ensure_roster_open()?;
        if self.bans.is_banned(player) {
            return Err(LobbyError::Banned(player, self.id));
        }
        if slot >= self.slots.capacity() {
            return Err(LobbyError::InvalidSlot {
                slot,
                capacity: self.slots.capacity(),
            });
        }
        Ok(())
    }

    /// Checks every per-lobby rule for seating `player` in `slot`.
    ///
    /// The cross-lobby rule (player seated elsewhere) is the caller's job
    /// and sits between [`check_admission`](Self::check_admission) and the
    /// occupancy check.
    pub fn check_assign(&self, player: PlayerId, slot: usize) -> Result<(), LobbyError> {
        self.check_admission(player, slot)?;
        self.slots.check(player, slot).map_err(slot_error)
    }

    /// Seats `player` in `slot` and drops them from the spectators.
    pub fn assign(&mut self, player: PlayerId, slot: usize) -> Result<Assignment, LobbyError> {
        self.check_assign(player, slot)?;
        let assignment = self.slots.assign(player, slot).map_err(slot_error)?;
        self.spectators.remove(&player);
        Ok(assignment)
    }

    /// Frees the player's slot. Not being seated is not an error.
    pub fn release(&mut self, player: PlayerId) -> Result<Option<usize>, LobbyError> {
        self.ensure_open()?;
        Ok(self.slots.release(player))
    }

    /// Bans a player. A seated player keeps their seat.
    pub fn ban(&mut self, player: PlayerId) -> Result<bool, LobbyError> {
        self.ensure_open()?;
        Ok(self.bans.ban(player))
    }

    pub fn unban(&mut self, player: PlayerId) -> Result<bool, LobbyError> {
        self.ensure_open()?;
        Ok(self.bans.unban(player))
    }

    pub fn is_banned(&self, player: PlayerId) -> bool {
        self.bans.is_banned(player)
    }

    /// Moves a player to the spectators, giving up their slot if they had
    /// one. Returns the slot they left.
    pub fn spectate(&mut self, player: PlayerId) -> Result<Option<usize>, LobbyError> {
        self.ensure_open()?;
        let left = self.slots.release(player);
        self.spectators.insert(player);
        Ok(left)
    }

    pub fn remove_spectator(&mut self, player: PlayerId) -> Result<bool, LobbyError> {
        self.ensure_open()?;
        Ok(self.spectators.remove(&player))
    }

    pub fn set_ready(&mut self, player: PlayerId, ready: bool) -> Result<(), LobbyError> {
        self.ensure_roster_open()?;
        if self.slots.set_ready(player, ready) {
            Ok(())
        } else {
            Err(LobbyError::NotSeated(player, self.id))
        }
    }

    pub fn is_ready(&self, player: PlayerId) -> Result<bool, LobbyError> {
        self.slots
            .is_ready(player)
            .ok_or(LobbyError::NotSeated(player, self.id))
    }

    // -- Lifecycle --------------------------------------------------------

    /// Moves to `target` if the edge is legal.
    ///
    /// Ending a lobby clears its slots; the cleared players are returned
    /// so the caller can release their seat claims.
    pub fn transition(&mut self, target: LobbyState) -> Result<Vec<PlayerId>, LobbyError> {
        if !self.state.can_transition_to(target) {
            return Err(LobbyError::InvalidTransition {
                lobby_id: self.id,
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        if target.is_ended() {
            return Ok(self.slots.clear());
        }
        Ok(Vec::new())
    }

    fn ensure_open(&self) -> Result<(), LobbyError> {
        if self.state.is_ended() {
            return Err(LobbyError::LobbyClosed(self.id));
        }
        Ok(())
    }

    fn ensure_roster_open(&self) -> Result<(), LobbyError> {
        self.ensure_open()?;
        if !self.state.roster_open() {
            return Err(LobbyError::RosterFrozen(self.id));
        }
        Ok(())
    }
}

fn slot_error(conflict: SlotConflict) -> LobbyError {
    match conflict {
        SlotConflict::OutOfRange { slot, capacity } => {
            LobbyError::InvalidSlot { slot, capacity }
        }
        SlotConflict::Occupied { slot, occupant } => {
            LobbyError::SlotOccupied { slot, occupant }
        }
    }
}

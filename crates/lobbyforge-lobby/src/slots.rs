//! The slot table: which player sits in which numbered seat.
//!
//! A lobby has `capacity` seats, indexed `0..capacity`. Seats are created
//! lazily: the table only stores occupied slots, so an empty lobby is an
//! empty map. Every move goes through [`SlotTable::release`] first, which
//! keeps "one slot per player" true without a separate uniqueness check.

use std::collections::BTreeMap;

use lobbyforge_model::PlayerId;
use serde::{Deserialize, Serialize};

/// One occupied seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub occupant: PlayerId,
    pub ready: bool,
}

/// Result of a successful [`SlotTable::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// The player was already in that exact slot; nothing changed.
    Unchanged,
    /// The player took the slot. `previous` is the slot they left, if
    /// they were switching seats.
    Seated { previous: Option<usize> },
}

/// Why a slot couldn't be assigned. The lobby turns these into
/// [`LobbyError`](crate::LobbyError)s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotConflict {
    OutOfRange { slot: usize, capacity: usize },
    Occupied { slot: usize, occupant: PlayerId },
}

/// Occupied seats of a single lobby, keyed by slot index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTable {
    capacity: usize,
    slots: BTreeMap<usize, Slot>,
}

impl SlotTable {
    /// Creates an empty table with `capacity` seats.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks whether `player` could take `slot` right now.
    ///
    /// Doesn't modify anything. [`assign`](Self::assign) runs the same
    /// checks; this exists so callers can validate before side effects
    /// elsewhere (claiming a seat index entry, for instance).
    pub fn check(&self, player: PlayerId, slot: usize) -> Result<(), SlotConflict> {
        if slot >= self.capacity {
            return Err(SlotConflict::OutOfRange {
                slot,
                capacity: self.capacity,
            });
        }
        match self.slots.get(&slot) {
            Some(s) if s.occupant != player => Err(SlotConflict::Occupied {
                slot,
                occupant: s.occupant,
            }),
            _ => Ok(()),
        }
    }

    /// Seats `player` in `slot`, moving them out of any previous slot.
    ///
    /// The new seat always starts unready. Assigning a player to the slot
    /// they already hold is a no-op that keeps their ready flag.
    pub fn assign(
        &mut self,
        player: PlayerId,
        slot: usize,
    ) -> Result<Assignment, SlotConflict> {
        self.check(player, slot)?;
        if self.slot_of(player) == Some(slot) {
            return Ok(Assignment::Unchanged);
        }

        let previous = self.release(player);
        self.slots.insert(
            slot,
            Slot {
                occupant: player,
                ready: false,
            },
        );
        Ok(Assignment::Seated { previous })
    }

    /// Frees the player's slot. Returns the freed index, or `None` if the
    /// player wasn't seated.
    pub fn release(&mut self, player: PlayerId) -> Option<usize> {
        let slot = self.slot_of(player)?;
        self.slots.remove(&slot);
        Some(slot)
    }

    /// The slot `player` occupies, if any.
    pub fn slot_of(&self, player: PlayerId) -> Option<usize> {
        self.slots
            .iter()
            .find(|(_, s)| s.occupant == player)
            .map(|(index, _)| *index)
    }

    /// The player sitting in `slot`, if any.
    pub fn occupant(&self, slot: usize) -> Option<PlayerId> {
        self.slots.get(&slot).map(|s| s.occupant)
    }

    /// Number of occupied slots.
    pub fn occupancy(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() == self.capacity
    }

    /// Occupants in slot order.
    pub fn occupants(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.slots.values().map(|s| s.occupant)
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Slot)> + '_ {
        self.slots.iter().map(|(index, slot)| (*index, slot))
    }

    /// Empties every slot. Returns the players that were seated.
    pub fn clear(&mut self) -> Vec<PlayerId> {
        let players = self.occupants().collect();
        self.slots.clear();
        players
    }

    pub(crate) fn slot_mut(&mut self, player: PlayerId) -> Option<&mut Slot> {
        self.slots.values_mut().find(|s| s.occupant == player)
    }
}

//! Readiness tracking on top of the slot table.
//!
//! Ready flags live on the slots themselves, so releasing or moving a
//! player drops their flag for free. A lobby counts as ready only when
//! it is full AND every seat is ready; a half-empty lobby of ready
//! players must never look startable.

use lobbyforge_model::PlayerId;

use crate::SlotTable;

impl SlotTable {
    /// Sets the ready flag of the player's slot.
    ///
    /// Returns `false` (and changes nothing) if the player isn't seated.
    pub fn set_ready(&mut self, player: PlayerId, ready: bool) -> bool {
        match self.slot_mut(player) {
            Some(slot) => {
                slot.ready = ready;
                true
            }
            None => false,
        }
    }

    /// The player's ready flag, or `None` if they aren't seated.
    pub fn is_ready(&self, player: PlayerId) -> Option<bool> {
        self.iter()
            .find(|(_, s)| s.occupant == player)
            .map(|(_, s)| s.ready)
    }

    /// Number of seats flagged ready.
    pub fn ready_count(&self) -> usize {
        self.iter().filter(|(_, s)| s.ready).count()
    }

    /// `true` iff the table is full and every occupied seat is ready.
    pub fn all_ready(&self) -> bool {
        self.is_full() && self.iter().all(|(_, s)| s.ready)
    }
}

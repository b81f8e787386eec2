//! Error types for the lobby layer.

use lobbyforge_model::{LobbyId, ModelError, PlayerId};

use crate::LobbyState;

/// Broad category of a [`LobbyError`], used by callers to decide how to
/// react (show a validation message, let the user pick again, page an
/// operator...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is wrong. Never worth retrying as-is.
    Validation,
    /// Expected contention with another player or request.
    Conflict,
    /// An operation precondition isn't met yet.
    State,
    /// Storage, server control plane, or player directory failed.
    Infrastructure,
}

/// Errors that can occur during lobby operations.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The slot index is outside `[0, capacity)`.
    #[error("slot {slot} does not exist (capacity {capacity})")]
    InvalidSlot { slot: usize, capacity: usize },

    /// The lobby has ended; nothing about it can change anymore.
    #[error("lobby {0} is closed")]
    LobbyClosed(LobbyId),

    /// Setup was requested for a lobby created without server info.
    #[error("lobby {0} has no server attached")]
    NoServerInfo(LobbyId),

    /// The requested lifecycle edge is not legal from the current state.
    #[error("lobby {lobby_id} cannot go from {from} to {to}")]
    InvalidTransition {
        lobby_id: LobbyId,
        from: LobbyState,
        to: LobbyState,
    },

    /// Another player already sits in the slot.
    #[error("slot {slot} is taken by player {occupant}")]
    SlotOccupied { slot: usize, occupant: PlayerId },

    /// The player holds a seat in another lobby that hasn't ended.
    #[error("player {0} is already in lobby {1}")]
    AlreadyElsewhere(PlayerId, LobbyId),

    /// The player is banned from this lobby.
    #[error("player {0} is banned from lobby {1}")]
    Banned(PlayerId, LobbyId),

    /// A provisioning attempt for this lobby is already running.
    #[error("setup of lobby {0} is already in progress")]
    SetupInProgress(LobbyId),

    /// The player doesn't occupy a slot in the lobby.
    #[error("player {0} is not in lobby {1}")]
    NotSeated(PlayerId, LobbyId),

    /// The match can't start: the lobby isn't full or someone isn't ready.
    #[error("lobby {0} is not ready to start")]
    NotReady(LobbyId),

    /// The match is running; seats and readiness can no longer change.
    #[error("lobby {0} is in progress, its roster is frozen")]
    RosterFrozen(LobbyId),

    /// No lobby with this id exists.
    #[error("lobby {0} not found")]
    NotFound(LobbyId),

    /// The lobby's actor is gone or its command channel is closed.
    #[error("lobby {0} is unavailable")]
    Unavailable(LobbyId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl LobbyError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSlot { .. }
            | Self::LobbyClosed(_)
            | Self::NoServerInfo(_)
            | Self::InvalidTransition { .. } => ErrorKind::Validation,
            Self::SlotOccupied { .. }
            | Self::AlreadyElsewhere(..)
            | Self::Banned(..)
            | Self::SetupInProgress(_) => ErrorKind::Conflict,
            Self::NotSeated(..)
            | Self::NotReady(_)
            | Self::RosterFrozen(_)
            | Self::NotFound(_) => ErrorKind::State,
            Self::Unavailable(_)
            | Self::Repository(_)
            | Self::Server(_)
            | Self::Directory(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Errors reported by a [`Repository`](crate::Repository).
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// No lobby is stored under this id.
    #[error("lobby {0} is not in the repository")]
    NotFound(LobbyId),

    /// A stored record couldn't be encoded or decoded.
    #[error("lobby record is unreadable: {0}")]
    Codec(#[from] ModelError),

    /// The storage backend failed.
    #[error("repository backend failed: {0}")]
    Backend(String),
}

/// Errors reported by a [`ServerControl`](crate::ServerControl).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The lobby's server info was rejected (bad host, unreachable rcon).
    #[error("invalid server info: {0}")]
    InvalidInfo(String),

    /// Provisioning or configuring the server failed.
    #[error("server setup failed: {0}")]
    Setup(String),

    /// A control call (end, allow-list push) failed.
    #[error("server control failed: {0}")]
    Control(String),
}

/// Errors reported by a [`PlayerDirectory`](crate::PlayerDirectory).
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("player {0} is not registered")]
    UnknownPlayer(PlayerId),

    #[error("player directory unavailable: {0}")]
    Unavailable(String),
}

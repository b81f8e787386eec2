//! Lobby configuration and state machine.

use std::time::Duration;

use lobbyforge_model::{Codec, JsonCodec, League, ModelError};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Settings shared by every lobby a manager runs.
///
/// Every field has a default, so a partial JSON document such as
/// `{"setup_timeout_secs": 120}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// League assigned to lobbies created without an explicit one.
    pub default_league: League,

    /// Bounded command channel size of each lobby actor.
    pub channel_size: usize,

    /// Random bytes in a generated server password (hex encoded, so the
    /// password is twice this long).
    pub password_bytes: usize,

    /// Seconds after which an unfinished provisioning attempt is treated
    /// as abandoned and may be replaced. `None` keeps attempts in flight
    /// until they return.
    pub setup_timeout_secs: Option<u64>,
}

impl LobbyConfig {
    /// Parses a configuration from JSON, filling missing fields with
    /// defaults.
    pub fn from_json(data: &[u8]) -> Result<Self, ModelError> {
        JsonCodec.decode(data)
    }

    /// The staleness timeout as a `Duration`, if configured.
    pub fn setup_timeout(&self) -> Option<Duration> {
        self.setup_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            default_league: League::default(),
            channel_size: 64,
            password_bytes: 6,
            setup_timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// LobbyState
// ---------------------------------------------------------------------------

/// The lifecycle state of a lobby.
///
/// ```text
/// Initializing → Waiting → InProgress → Ended
///      │            │                    ↑
///      │            └────────────────────┤ (close / delete)
///      └─────────────────────────────────┘ (provisioning failed)
/// ```
///
/// - **Initializing**: persisted, server not provisioned yet. Players may
///   already take slots.
/// - **Waiting**: server provisioned, waiting for a full and ready roster.
/// - **InProgress**: the match is running. The roster is frozen.
/// - **Ended**: terminal. Slots are cleared and no mutation is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LobbyState {
    Initializing,
    Waiting,
    InProgress,
    Ended,
}

impl LobbyState {
    /// Returns `true` once the lobby has ended.
    pub fn is_ended(self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Returns `true` if players may take slots or change readiness.
    pub fn roster_open(self) -> bool {
        matches!(self, Self::Initializing | Self::Waiting)
    }

    /// Returns `true` if transitioning to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Initializing, Self::Waiting)
                | (Self::Waiting, Self::InProgress)
                | (Self::Initializing, Self::Ended)
                | (Self::Waiting, Self::Ended)
                | (Self::InProgress, Self::Ended)
        )
    }

    /// Status text shown to players.
    pub fn label(self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Waiting => "Waiting For Players",
            Self::InProgress => "Lobby in Progress",
            Self::Ended => "Lobby Ended",
        }
    }
}

impl std::fmt::Display for LobbyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing"),
            Self::Waiting => write!(f, "Waiting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

//! Core model types shared by every Lobbyforge layer.
//!
//! Identities are newtype wrappers so a `LobbyId` can never be passed
//! where a `PlayerId` is expected. Lobby type and league are closed
//! enums: an out-of-range value simply can't be constructed, and each
//! variant carries its own player count and display name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ModelError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a registered player.
///
/// `#[serde(transparent)]` stores a `PlayerId(42)` as plain `42`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique, persistent identifier for a lobby.
///
/// Allocated once by the repository when the lobby is created and never
/// changed afterwards. Lobby ids are also used to name per-lobby
/// resources on the game server side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

/// A player's external (Steam) identifier.
///
/// This is what a provisioned game server understands; the allow-list
/// pushed to the server is a list of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SteamId(String);

impl SteamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the whitelist (whitelist.tf id) a server should load.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Whitelist(pub u32);

// ---------------------------------------------------------------------------
// LobbyType
// ---------------------------------------------------------------------------

/// The format of a lobby. Each format fixes how many players a team has.
///
/// A lobby always hosts two teams, so its capacity is twice the team
/// size: 12 seats for Sixes, 18 for Highlander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LobbyType {
    /// 6v6.
    Sixes,
    /// 9v9, one player per class.
    Highlander,
}

impl LobbyType {
    /// Every lobby type, in declaration order.
    pub const ALL: [LobbyType; 2] = [LobbyType::Sixes, LobbyType::Highlander];

    /// Players required on one team.
    pub fn required_players(self) -> usize {
        match self {
            Self::Sixes => 6,
            Self::Highlander => 9,
        }
    }

    /// Total number of slots in a lobby of this type (two teams).
    pub fn capacity(self) -> usize {
        2 * self.required_players()
    }

    /// Human-readable format name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sixes => "Sixes",
            Self::Highlander => "Highlander",
        }
    }
}

impl fmt::Display for LobbyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LobbyType {
    type Err = ModelError;

    /// Accepts the format name in any case ("sixes", "Highlander").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::InvalidValue {
                kind: "lobby type",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// League
// ---------------------------------------------------------------------------

/// The competitive league whose rules a provisioned server runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Ugc,
    #[default]
    Etf2l,
}

impl League {
    /// Every known league.
    pub const ALL: [League; 2] = [League::Ugc, League::Etf2l];

    /// The league's short tag, as used in server config names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ugc => "ugc",
            Self::Etf2l => "etf2l",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for League {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::InvalidValue {
                kind: "league",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// ServerInfo
// ---------------------------------------------------------------------------

/// Connection details for the game server a lobby will be provisioned on.
///
/// Supplied at lobby creation. `Debug` redacts the rcon password so the
/// struct can be logged safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// `host:port` of the game server.
    pub host: String,
    /// Remote console password used by the control plane.
    pub rcon_password: String,
}

impl ServerInfo {
    pub fn new(host: impl Into<String>, rcon_password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            rcon_password: rcon_password.into(),
        }
    }
}

impl fmt::Debug for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerInfo")
            .field("host", &self.host)
            .field("rcon_password", &"<redacted>")
            .finish()
    }
}

//! Lobby lifecycle management for Lobbyforge.
//!
//! A lobby is a fixed set of numbered slots that players fill before a
//! competitive match starts on a dedicated game server. Each loaded lobby
//! runs as an isolated Tokio task (actor model) that owns its roster, so
//! concurrent requests for the same lobby are applied one at a time.
//!
//! # Key types
//!
//! - [`LobbyManager`]: creates, loads, provisions, and closes lobbies,
//!   and routes roster operations to them
//! - [`LobbyHandle`]: send commands to a running lobby actor
//! - [`Lobby`]: the aggregate (slots, bans, spectators, lifecycle state)
//! - [`LobbyState`]: lifecycle state machine
//! - [`ProvisioningGuard`]: at most one server setup per lobby at a time
//! - [`Repository`], [`ServerControl`], [`PlayerDirectory`]: the
//!   collaborators the application plugs in
//! - [`LobbyConfig`]: manager settings

mod actor;
mod bans;
mod config;
mod error;
mod guard;
mod lobby;
mod manager;
mod memory;
mod ports;
mod readiness;
mod seats;
mod slots;

pub use actor::LobbyHandle;
pub use bans::BanList;
pub use config::{LobbyConfig, LobbyState};
pub use error::{DirectoryError, ErrorKind, LobbyError, RepositoryError, ServerError};
pub use guard::{ProvisioningGuard, SetupPermit};
pub use lobby::{Lobby, NewLobby};
pub use manager::{LobbyManager, RecoveryReport};
pub use memory::{MemoryDirectory, MemoryRepository};
pub use ports::{PlayerDirectory, Repository, SaveOutcome, ServerControl, ServerSpec};
pub use seats::{Claim, SeatIndex};
pub use slots::{Assignment, Slot, SlotConflict, SlotTable};

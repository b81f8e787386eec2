//! # Lobbyforge
//!
//! Competitive match lobbies with guarded game-server provisioning.
//!
//! A lobby is a fixed set of slots (12 for Sixes, 18 for Highlander) that
//! players fill before a match. Lobbyforge keeps the roster consistent
//! under concurrent requests, provisions one dedicated game server per
//! lobby (never two at once), keeps the server's allow-list in sync with
//! the roster, and releases the server when the lobby closes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lobbyforge::prelude::*;
//!
//! // Implement ServerControl for your game-server fleet, then:
//! // let service = Lobbyforge::builder()
//! //     .default_league(League::Etf2l)
//! //     .build(MemoryRepository::new(), my_control, MemoryDirectory::new());
//! // service.recover().await?;
//! //
//! // let lobby = service.lobbies().create(
//! //     NewLobby::new("cp_process_final", LobbyType::Sixes)
//! //         .server_info(ServerInfo::new("10.0.0.5:27015", "rcon")),
//! // ).await?;
//! // service.lobbies().request_setup(lobby).await?;
//! ```

mod error;
mod service;
mod telemetry;

pub use error::LobbyforgeError;
pub use service::{LobbyService, Lobbyforge, LobbyforgeBuilder};
pub use telemetry::{DEFAULT_FILTER, init_tracing};

pub use lobbyforge_lobby as lobby;
pub use lobbyforge_model as model;

/// Everything needed to build a service and drive its lobbies.
pub mod prelude {
    pub use crate::{LobbyService, Lobbyforge, LobbyforgeBuilder, LobbyforgeError, init_tracing};
    pub use lobbyforge_lobby::{
        DirectoryError, ErrorKind, Lobby, LobbyConfig, LobbyError, LobbyHandle, LobbyManager,
        LobbyState, MemoryDirectory, MemoryRepository, NewLobby, PlayerDirectory, RecoveryReport,
        Repository, RepositoryError, SaveOutcome, ServerControl, ServerError, ServerSpec,
    };
    pub use lobbyforge_model::{
        League, LobbyId, LobbyType, PlayerId, ServerInfo, SteamId, Whitelist,
    };
}

//! Collaborator ports: storage, the game-server control plane, and the
//! player directory.
//!
//! Lobbyforge doesn't store lobbies or launch servers itself. It defines
//! what it needs from those systems as traits, and the application plugs
//! in real implementations (a SQL repository, an rcon-driven control
//! plane) while tests plug in mocks.
//!
//! Methods return `impl Future + Send` so lobby actors, which run on the
//! Tokio thread pool, can await them.

use std::fmt::Debug;
use std::future::Future;

use lobbyforge_model::{
    League, LobbyId, LobbyType, PlayerId, ServerInfo, SteamId, Whitelist,
};

use crate::{DirectoryError, Lobby, RepositoryError, ServerError};

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Whether [`Repository::save`] inserted or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Persistent storage for lobby aggregates.
pub trait Repository: Send + Sync + 'static {
    /// Reserves a fresh, never reused lobby id.
    fn allocate_id(&self) -> impl Future<Output = Result<LobbyId, RepositoryError>> + Send;

    /// Inserts the lobby if its id isn't stored yet, updates it otherwise.
    fn save(
        &self,
        lobby: &Lobby,
    ) -> impl Future<Output = Result<SaveOutcome, RepositoryError>> + Send;

    /// Loads a lobby.
    ///
    /// # Errors
    /// [`RepositoryError::NotFound`] if no lobby has this id. Other
    /// variants mean the backend itself failed.
    fn find_by_id(
        &self,
        id: LobbyId,
    ) -> impl Future<Output = Result<Lobby, RepositoryError>> + Send;

    /// Removes a lobby. [`RepositoryError::NotFound`] if it wasn't stored.
    fn delete(&self, id: LobbyId) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Every stored lobby that hasn't ended. Used to reconcile after a
    /// restart.
    fn list_active(&self) -> impl Future<Output = Result<Vec<Lobby>, RepositoryError>> + Send;
}

// ---------------------------------------------------------------------------
// ServerControl
// ---------------------------------------------------------------------------

/// Everything the control plane needs to bring up a server for a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub lobby_id: LobbyId,
    pub league: League,
    pub map_name: String,
    pub lobby_type: LobbyType,
    pub whitelist: Whitelist,
    pub info: ServerInfo,
    /// Freshly generated password players use to join.
    pub password: String,
}

/// The game-server control plane.
///
/// Provisioning is two steps. [`attach`](Self::attach) validates the
/// server info and creates a handle bound to the lobby; nothing is
/// running yet. [`setup`](Self::setup) does the expensive work (upload
/// configs, change map, set passwords). A handle that exists must
/// eventually be [`end`](Self::end)ed, even if setup failed halfway.
pub trait ServerControl: Send + Sync + 'static {
    /// Opaque reference to one provisioned (or provisioning) server.
    type Handle: Clone + Debug + Send + Sync + 'static;

    fn attach(
        &self,
        spec: ServerSpec,
    ) -> impl Future<Output = Result<Self::Handle, ServerError>> + Send;

    fn setup(
        &self,
        handle: &Self::Handle,
    ) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Releases the server. Must be safe to call more than once.
    fn end(&self, handle: &Self::Handle) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Replaces the set of players allowed to connect.
    fn set_allowed_players(
        &self,
        handle: &Self::Handle,
        players: &[SteamId],
    ) -> impl Future<Output = Result<(), ServerError>> + Send;
}

// ---------------------------------------------------------------------------
// PlayerDirectory
// ---------------------------------------------------------------------------

/// Read-only lookup from internal player ids to external identities.
pub trait PlayerDirectory: Send + Sync + 'static {
    fn steam_id(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<SteamId, DirectoryError>> + Send;
}

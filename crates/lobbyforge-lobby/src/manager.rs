//! Lobby manager: creates, loads, provisions, and routes to lobbies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lobbyforge_model::{LobbyId, PlayerId};
use rand::Rng;

use crate::actor::spawn_lobby;
use crate::{
    Lobby, LobbyConfig, LobbyError, LobbyHandle, LobbyState, NewLobby, PlayerDirectory,
    ProvisioningGuard, Repository, RepositoryError, SeatIndex, ServerControl, ServerSpec,
};

/// State shared by the manager and every lobby actor.
pub(crate) struct Shared<R, S: ServerControl, D> {
    pub(crate) repo: R,
    pub(crate) control: S,
    pub(crate) directory: D,
    pub(crate) seats: SeatIndex,
    pub(crate) guard: ProvisioningGuard,
    pub(crate) config: LobbyConfig,
    servers: Mutex<HashMap<LobbyId, S::Handle>>,
}

impl<R, S: ServerControl, D> Shared<R, S, D> {
    pub(crate) fn server_handle(&self, lobby_id: LobbyId) -> Option<S::Handle> {
        self.servers().get(&lobby_id).cloned()
    }

    pub(crate) fn take_server(&self, lobby_id: LobbyId) -> Option<S::Handle> {
        self.servers().remove(&lobby_id)
    }

    pub(crate) fn put_server(&self, lobby_id: LobbyId, handle: S::Handle) {
        self.servers().insert(lobby_id, handle);
    }

    /// What the control plane needs to attach `lobby`'s server, with a
    /// fresh password. `None` without server info.
    pub(crate) fn server_spec(&self, lobby: &Lobby) -> Option<ServerSpec> {
        let info = lobby.server_info()?.clone();
        Some(ServerSpec {
            lobby_id: lobby.id(),
            league: lobby.league(),
            map_name: lobby.map_name().to_owned(),
            lobby_type: lobby.lobby_type(),
            whitelist: lobby.whitelist(),
            info,
            password: generate_password(self.config.password_bytes),
        })
    }

    fn servers(&self) -> MutexGuard<'_, HashMap<LobbyId, S::Handle>> {
        self.servers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Why a provisioning attempt runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provision {
    /// An explicit setup request; the lobby must still be `Initializing`.
    Setup,
    /// Reattaching a server to a lobby loaded from storage.
    Recover,
}

/// Result of [`LobbyManager::recover_all`].
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Lobbies that have a server attached again (or didn't need one).
    pub recovered: Vec<LobbyId>,
    /// Lobbies whose recovery failed. They have been closed.
    pub failed: Vec<(LobbyId, LobbyError)>,
}

/// Owns every loaded lobby and the collaborators they share.
///
/// Each loaded lobby is an actor (see [`LobbyHandle`]); the manager keeps
/// one handle per lobby and loads lobbies from the repository on first
/// use. All methods take `&self`, so the manager can sit in an `Arc` and
/// be called from many tasks at once.
pub struct LobbyManager<R, S: ServerControl, D> {
    shared: Arc<Shared<R, S, D>>,
    lobbies: Mutex<HashMap<LobbyId, LobbyHandle>>,
}

impl<R, S, D> LobbyManager<R, S, D>
where
    R: Repository,
    S: ServerControl,
    D: PlayerDirectory,
{
    pub fn new(repo: R, control: S, directory: D, config: LobbyConfig) -> Self {
        let guard = ProvisioningGuard::with_timeout(config.setup_timeout());
        Self::with_guard(repo, control, directory, config, guard)
    }

    /// Like [`new`](Self::new) with an explicit provisioning guard, e.g.
    /// one shared with another component.
    pub fn with_guard(
        repo: R,
        control: S,
        directory: D,
        config: LobbyConfig,
        guard: ProvisioningGuard,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                repo,
                control,
                directory,
                seats: SeatIndex::new(),
                guard,
                config,
                servers: Mutex::new(HashMap::new()),
            }),
            lobbies: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.shared.config
    }

    pub fn guard(&self) -> &ProvisioningGuard {
        &self.shared.guard
    }

    pub fn repository(&self) -> &R {
        &self.shared.repo
    }

    pub fn server_control(&self) -> &S {
        &self.shared.control
    }

    pub fn directory(&self) -> &D {
        &self.shared.directory
    }

    /// Returns `true` if a server handle is attached to the lobby.
    pub fn has_server(&self, lobby_id: LobbyId) -> bool {
        self.shared.server_handle(lobby_id).is_some()
    }

    /// The lobby `player` currently sits in, if any.
    pub fn lobby_of(&self, player: PlayerId) -> Option<LobbyId> {
        self.shared.seats.lobby_of(player)
    }

    /// Number of lobbies loaded in memory.
    pub fn lobby_count(&self) -> usize {
        self.lobbies().len()
    }

    pub fn lobby_ids(&self) -> Vec<LobbyId> {
        self.lobbies().keys().copied().collect()
    }

    // -- Lifecycle --------------------------------------------------------

    /// Creates a lobby in `Initializing` and persists it.
    ///
    /// The lobby has no server yet; call
    /// [`request_setup`](Self::request_setup) to provision one.
    pub async fn create(&self, params: NewLobby) -> Result<LobbyId, LobbyError> {
        let lobby_id = self.shared.repo.allocate_id().await?;
        let lobby = Lobby::new(lobby_id, params, self.shared.config.default_league);
        self.shared.repo.save(&lobby).await?;

        tracing::info!(
            %lobby_id,
            lobby_type = %lobby.lobby_type(),
            map = lobby.map_name(),
            league = %lobby.league(),
            "lobby created"
        );
        self.register(lobby, false);
        Ok(lobby_id)
    }

    /// Provisions the lobby's game server and opens it for players.
    ///
    /// Only one setup per lobby can run at a time: a concurrent second
    /// request fails right away with [`LobbyError::SetupInProgress`]. If
    /// setup fails the lobby is closed and the error returned. A lobby
    /// without server info fails with [`LobbyError::NoServerInfo`] and
    /// stays `Initializing`.
    pub async fn request_setup(&self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        let handle = self.cached_or_load(lobby_id).await?;
        self.provision(&handle, Provision::Setup).await
    }

    /// Makes sure a live lobby has a server attached, provisioning one if
    /// it lost it (for example after a restart).
    ///
    /// Ended lobbies and lobbies that already have a server are left
    /// alone.
    pub async fn attach_or_recover(&self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        match self.cached(lobby_id) {
            Some(handle) => self.recover(&handle).await,
            None => self.open(lobby_id).await.map(drop),
        }
    }

    /// Returns the lobby's handle, loading it from storage first if
    /// needed. A freshly loaded lobby goes through
    /// [`attach_or_recover`](Self::attach_or_recover).
    pub async fn open(&self, lobby_id: LobbyId) -> Result<LobbyHandle, LobbyError> {
        if let Some(handle) = self.cached(lobby_id) {
            return Ok(handle);
        }
        let (handle, loaded) = self.load(lobby_id).await?;
        if loaded {
            self.recover(&handle).await?;
        }
        Ok(handle)
    }

    /// Loads every active lobby from storage and recovers each one.
    ///
    /// One lobby failing doesn't stop the others; failures are listed in
    /// the report.
    pub async fn recover_all(&self) -> Result<RecoveryReport, LobbyError> {
        let lobbies = self.shared.repo.list_active().await?;
        let mut report = RecoveryReport::default();

        for lobby in lobbies {
            let lobby_id = lobby.id();
            let handle = self.register(lobby, true);
            match self.recover(&handle).await {
                Ok(()) => report.recovered.push(lobby_id),
                Err(err) => {
                    tracing::warn!(%lobby_id, error = %err, "lobby recovery failed");
                    report.failed.push((lobby_id, err));
                }
            }
        }

        tracing::info!(
            recovered = report.recovered.len(),
            failed = report.failed.len(),
            "recovery finished"
        );
        Ok(report)
    }

    /// Starts the match. Every slot must be filled and ready.
    pub async fn begin_match(&self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        self.open(lobby_id).await?.begin_match().await
    }

    /// Ends the lobby: releases its server, frees every seat, and marks
    /// it `Ended`. Closing an ended lobby does nothing.
    ///
    /// If the server can't be released the lobby stays open and the
    /// error is returned, so the close can be retried.
    pub async fn close(&self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        let handle = self.cached_or_load(lobby_id).await?;
        handle.close(false).await.map(drop)
    }

    /// Closes the lobby, removes it from storage, and stops its actor.
    pub async fn delete(&self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        let handle = self.cached_or_load(lobby_id).await?;
        handle.close(false).await?;
        self.shared.repo.delete(lobby_id).await?;

        let removed = self.lobbies().remove(&lobby_id);
        if let Some(handle) = removed {
            let _ = handle.shutdown().await;
        }
        tracing::info!(%lobby_id, "lobby deleted");
        Ok(())
    }

    // -- Roster -----------------------------------------------------------

    /// Seats `player` in `slot`. The player leaves any other slot they held
    /// in this lobby and stops spectating it.
    pub async fn assign_player(
        &self,
        lobby_id: LobbyId,
        player: PlayerId,
        slot: usize,
    ) -> Result<(), LobbyError> {
        self.open(lobby_id).await?.assign(player, slot).await
    }

    pub async fn release_player(
        &self,
        lobby_id: LobbyId,
        player: PlayerId,
    ) -> Result<Option<usize>, LobbyError> {
        self.open(lobby_id).await?.release(player).await
    }

    pub async fn ban_player(&self, lobby_id: LobbyId, player: PlayerId) -> Result<bool, LobbyError> {
        self.open(lobby_id).await?.ban(player).await
    }

    pub async fn unban_player(
        &self,
        lobby_id: LobbyId,
        player: PlayerId,
    ) -> Result<bool, LobbyError> {
        self.open(lobby_id).await?.unban(player).await
    }

    pub async fn is_banned(&self, lobby_id: LobbyId, player: PlayerId) -> Result<bool, LobbyError> {
        self.open(lobby_id).await?.is_banned(player).await
    }

    /// Moves `player` to the spectators, freeing their slot if they had one.
    pub async fn spectate(
        &self,
        lobby_id: LobbyId,
        player: PlayerId,
    ) -> Result<Option<usize>, LobbyError> {
        self.open(lobby_id).await?.spectate(player).await
    }

    pub async fn remove_spectator(
        &self,
        lobby_id: LobbyId,
        player: PlayerId,
    ) -> Result<bool, LobbyError> {
        self.open(lobby_id).await?.remove_spectator(player).await
    }

    pub async fn set_ready(
        &self,
        lobby_id: LobbyId,
        player: PlayerId,
        ready: bool,
    ) -> Result<(), LobbyError> {
        self.open(lobby_id).await?.set_ready(player, ready).await
    }

    pub async fn is_ready(&self, lobby_id: LobbyId, player: PlayerId) -> Result<bool, LobbyError> {
        self.open(lobby_id).await?.is_ready(player).await
    }

    pub async fn all_ready(&self, lobby_id: LobbyId) -> Result<bool, LobbyError> {
        self.open(lobby_id).await?.all_ready().await
    }

    pub async fn occupancy(&self, lobby_id: LobbyId) -> Result<usize, LobbyError> {
        self.open(lobby_id).await?.occupancy().await
    }

    pub async fn is_full(&self, lobby_id: LobbyId) -> Result<bool, LobbyError> {
        self.open(lobby_id).await?.is_full().await
    }

    pub async fn snapshot(&self, lobby_id: LobbyId) -> Result<Lobby, LobbyError> {
        self.open(lobby_id).await?.snapshot().await
    }

    // -- Internals --------------------------------------------------------

    async fn recover(&self, handle: &LobbyHandle) -> Result<(), LobbyError> {
        let lobby = handle.snapshot().await?;
        let lobby_id = lobby.id();

        if lobby.state().is_ended() || self.has_server(lobby_id) {
            return Ok(());
        }
        if lobby.server_info().is_none() {
            tracing::debug!(%lobby_id, "no server info, nothing to recover");
            return Ok(());
        }

        tracing::info!(%lobby_id, state = %lobby.state(), "reattaching server");
        self.provision(handle, Provision::Recover).await
    }

    /// Runs one guarded provisioning attempt. If the server can't be set
    /// up the lobby is closed and the original error returned.
    async fn provision(&self, handle: &LobbyHandle, mode: Provision) -> Result<(), LobbyError> {
        let lobby_id = handle.lobby_id();
        // Held until the lobby has taken the result, so a second request
        // can't start while the state still reads `Initializing`.
        let _permit = self.shared.guard.try_begin(lobby_id)?;

        // Read under the permit: an attempt that finished between the
        // caller's check and `try_begin` has already moved the lobby on.
        let lobby = handle.snapshot().await?;
        match (mode, lobby.state()) {
            (Provision::Recover, LobbyState::Ended) => return Ok(()),
            (Provision::Setup, LobbyState::Ended) => {
                return Err(LobbyError::LobbyClosed(lobby_id));
            }
            (Provision::Setup, LobbyState::Initializing) => {}
            (Provision::Setup, from) => {
                return Err(LobbyError::InvalidTransition {
                    lobby_id,
                    from,
                    to: LobbyState::Waiting,
                });
            }
            (Provision::Recover, _) if self.has_server(lobby_id) => return Ok(()),
            (Provision::Recover, _) => {}
        }
        if lobby.server_info().is_none() {
            return match mode {
                Provision::Setup => Err(LobbyError::NoServerInfo(lobby_id)),
                Provision::Recover => Ok(()),
            };
        }

        if let Err(err) = self.setup_server(&lobby).await {
            tracing::warn!(%lobby_id, error = %err, "provisioning failed, closing lobby");
            if let Err(close_err) = handle.close(true).await {
                tracing::error!(%lobby_id, error = %close_err, "rollback close failed");
            }
            return Err(err);
        }

        let state = handle.provisioned().await?;
        tracing::info!(%lobby_id, %state, "server ready");
        Ok(())
    }

    async fn setup_server(&self, lobby: &Lobby) -> Result<(), LobbyError> {
        let lobby_id = lobby.id();
        let server = match self.shared.server_handle(lobby_id) {
            Some(server) => server,
            None => {
                let spec = self
                    .shared
                    .server_spec(lobby)
                    .ok_or(LobbyError::NoServerInfo(lobby_id))?;
                let server = self.shared.control.attach(spec).await?;
                self.shared.put_server(lobby_id, server.clone());
                tracing::debug!(%lobby_id, ?server, "server attached");
                server
            }
        };

        self.shared.control.setup(&server).await?;
        Ok(())
    }

    /// Returns the cached handle or loads the lobby without recovering it.
    async fn cached_or_load(&self, lobby_id: LobbyId) -> Result<LobbyHandle, LobbyError> {
        match self.cached(lobby_id) {
            Some(handle) => Ok(handle),
            None => self.load(lobby_id).await.map(|(handle, _)| handle),
        }
    }

    /// Loads a lobby from storage and spawns its actor. The flag is `true`
    /// if this call spawned it, `false` if another caller got there first.
    async fn load(&self, lobby_id: LobbyId) -> Result<(LobbyHandle, bool), LobbyError> {
        let lobby = self
            .shared
            .repo
            .find_by_id(lobby_id)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound(id) => LobbyError::NotFound(id),
                other => other.into(),
            })?;

        if let Some(handle) = self.cached(lobby_id) {
            return Ok((handle, false));
        }
        tracing::debug!(%lobby_id, state = %lobby.state(), "lobby loaded");
        Ok((self.register(lobby, true), true))
    }

    /// Spawns the actor for `lobby` unless one is already running, and
    /// records its seats in the seat index. `restored` marks a lobby read
    /// back from storage, whose server may predate this process.
    fn register(&self, lobby: Lobby, restored: bool) -> LobbyHandle {
        let lobby_id = lobby.id();
        let mut lobbies = self.lobbies();
        if let Some(existing) = lobbies.get(&lobby_id) {
            return existing.clone();
        }

        if !lobby.state().is_ended() {
            for player in lobby.slots().occupants() {
                if let Err(other) = self.shared.seats.claim(player, lobby_id) {
                    tracing::warn!(
                        %lobby_id,
                        %player,
                        other_lobby = %other,
                        "stored seat conflicts with another lobby"
                    );
                }
            }
        }

        let handle = spawn_lobby(
            lobby,
            Arc::clone(&self.shared),
            self.shared.config.channel_size,
            restored,
        );
        lobbies.insert(lobby_id, handle.clone());
        handle
    }

    fn cached(&self, lobby_id: LobbyId) -> Option<LobbyHandle> {
        self.lobbies().get(&lobby_id).cloned()
    }

    fn lobbies(&self) -> MutexGuard<'_, HashMap<LobbyId, LobbyHandle>> {
        self.lobbies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Random hex password, two characters per byte.
fn generate_password(bytes: usize) -> String {
    let mut rng = rand::rng();
    (0..bytes.max(1))
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect()
}

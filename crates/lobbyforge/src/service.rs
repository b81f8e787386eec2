//! `Lobbyforge` builder and the `LobbyService` it builds.
//!
//! This is the entry point for running Lobbyforge inside an application.
//! It ties the layers together: configuration → lobby manager → the
//! storage, server control and directory adapters the application plugs
//! in.

use std::sync::Arc;
use std::time::Duration;

use lobbyforge_lobby::{
    LobbyConfig, LobbyManager, PlayerDirectory, ProvisioningGuard, RecoveryReport, Repository,
    ServerControl,
};
use lobbyforge_model::League;

use crate::LobbyforgeError;

/// Builder for configuring a Lobbyforge service.
///
/// # Example
///
/// ```rust,ignore
/// use lobbyforge::prelude::*;
///
/// let service = Lobbyforge::builder()
///     .default_league(League::Ugc)
///     .setup_timeout(Duration::from_secs(120))
///     .build(MemoryRepository::new(), my_control, MemoryDirectory::new());
/// service.recover().await?;
/// ```
#[derive(Debug, Default)]
pub struct LobbyforgeBuilder {
    config: LobbyConfig,
    guard: Option<ProvisioningGuard>,
}

impl LobbyforgeBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: LobbyConfig) -> Self {
        self.config = config;
        self
    }

    /// Reads the configuration from JSON. Missing fields keep their
    /// defaults.
    pub fn config_json(mut self, data: &[u8]) -> Result<Self, LobbyforgeError> {
        self.config = LobbyConfig::from_json(data)?;
        Ok(self)
    }

    /// League given to lobbies created without one.
    pub fn default_league(mut self, league: League) -> Self {
        self.config.default_league = league;
        self
    }

    /// Command queue size of each lobby actor.
    pub fn channel_size(mut self, size: usize) -> Self {
        self.config.channel_size = size;
        self
    }

    /// Random bytes in each generated server password.
    pub fn password_bytes(mut self, bytes: usize) -> Self {
        self.config.password_bytes = bytes;
        self
    }

    /// Treat provisioning attempts older than `timeout` as abandoned.
    pub fn setup_timeout(mut self, timeout: Duration) -> Self {
        self.config.setup_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Uses `guard` instead of a fresh provisioning guard.
    pub fn guard(mut self, guard: ProvisioningGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Builds the service around the given adapters.
    pub fn build<R, S, D>(self, repo: R, control: S, directory: D) -> LobbyService<R, S, D>
    where
        R: Repository,
        S: ServerControl,
        D: PlayerDirectory,
    {
        let guard = self
            .guard
            .unwrap_or_else(|| ProvisioningGuard::with_timeout(self.config.setup_timeout()));
        tracing::debug!(config = ?self.config, "building lobbyforge service");

        let manager = LobbyManager::with_guard(repo, control, directory, self.config, guard);
        LobbyService {
            manager: Arc::new(manager),
        }
    }
}

/// Entry point: `Lobbyforge::builder()`.
#[derive(Debug, Clone, Copy)]
pub struct Lobbyforge;

impl Lobbyforge {
    /// Creates a new builder.
    pub fn builder() -> LobbyforgeBuilder {
        LobbyforgeBuilder::new()
    }
}

/// A configured Lobbyforge service.
///
/// Cheap to clone; clones share the same lobbies. Use
/// [`lobbies()`](Self::lobbies) for lobby operations.
pub struct LobbyService<R, S: ServerControl, D> {
    manager: Arc<LobbyManager<R, S, D>>,
}

impl<R, S: ServerControl, D> Clone for LobbyService<R, S, D> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<R, S, D> LobbyService<R, S, D>
where
    R: Repository,
    S: ServerControl,
    D: PlayerDirectory,
{
    /// The lobby manager.
    pub fn lobbies(&self) -> &LobbyManager<R, S, D> {
        &self.manager
    }

    /// Shared handle to the lobby manager, for moving into tasks.
    pub fn manager(&self) -> Arc<LobbyManager<R, S, D>> {
        Arc::clone(&self.manager)
    }

    /// Loads every active lobby from storage and reattaches its server.
    ///
    /// Call once at startup. Lobbies that fail to recover are closed and
    /// listed in the report; only a storage failure is an error.
    pub async fn recover(&self) -> Result<RecoveryReport, LobbyforgeError> {
        tracing::info!("lobbyforge recovering stored lobbies");
        let report = self.manager.recover_all().await?;
        for (lobby_id, err) in &report.failed {
            tracing::warn!(%lobby_id, error = %err, "lobby closed during recovery");
        }
        Ok(report)
    }
}

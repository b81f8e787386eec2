//! Lobby actor: an isolated Tokio task that owns one lobby aggregate.
//!
//! Each loaded lobby runs in its own task and is reached through an mpsc
//! channel. Commands are handled one at a time, so "read the slot, check
//! the ban list, write the slot, persist, push the allow-list" can never
//! interleave with another change to the same lobby.
//!
//! Every mutation is applied to a copy of the aggregate. The copy only
//! replaces the live lobby once the repository accepted it, so a storage
//! failure leaves the actor exactly as it was.

use std::sync::Arc;

use lobbyforge_model::{LobbyId, PlayerId};
use tokio::sync::{mpsc, oneshot};

use crate::manager::Shared;
use crate::seats::Claim;
use crate::slots::Assignment;
use crate::{Lobby, LobbyError, LobbyState, PlayerDirectory, Repository, ServerControl};

type Reply<T> = oneshot::Sender<Result<T, LobbyError>>;

/// Commands sent to a lobby actor through its channel.
///
/// Most variants carry a `reply` channel: the caller sends the command
/// and waits for the result on that channel.
pub(crate) enum LobbyCommand {
    Assign {
        player: PlayerId,
        slot: usize,
        reply: Reply<()>,
    },
    Release {
        player: PlayerId,
        reply: Reply<Option<usize>>,
    },
    Ban {
        player: PlayerId,
        reply: Reply<bool>,
    },
    Unban {
        player: PlayerId,
        reply: Reply<bool>,
    },
    Spectate {
        player: PlayerId,
        reply: Reply<Option<usize>>,
    },
    RemoveSpectator {
        player: PlayerId,
        reply: Reply<bool>,
    },
    SetReady {
        player: PlayerId,
        ready: bool,
        reply: Reply<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Lobby>,
    },
    /// The server finished provisioning.
    Provisioned {
        reply: Reply<LobbyState>,
    },
    BeginMatch {
        reply: Reply<()>,
    },
    /// End the lobby. `rollback` ends it even if the server can't be
    /// released.
    Close {
        rollback: bool,
        reply: Reply<bool>,
    },
    Shutdown,
}

/// Handle to a running lobby actor.
///
/// Cheap to clone: it's an `mpsc::Sender` wrapper. The manager keeps one
/// per loaded lobby.
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    lobby_id: LobbyId,
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }

    /// Seats `player` in `slot`.
    pub async fn assign(&self, player: PlayerId, slot: usize) -> Result<(), LobbyError> {
        self.request(|reply| LobbyCommand::Assign {
            player,
            slot,
            reply,
        })
        .await?
    }

    /// Frees the player's slot, returning it. Not being seated is fine.
    pub async fn release(&self, player: PlayerId) -> Result<Option<usize>, LobbyError> {
        self.request(|reply| LobbyCommand::Release { player, reply })
            .await?
    }

    pub async fn ban(&self, player: PlayerId) -> Result<bool, LobbyError> {
        self.request(|reply| LobbyCommand::Ban { player, reply }).await?
    }

    pub async fn unban(&self, player: PlayerId) -> Result<bool, LobbyError> {
        self.request(|reply| LobbyCommand::Unban { player, reply })
            .await?
    }

    pub async fn spectate(&self, player: PlayerId) -> Result<Option<usize>, LobbyError> {
        self.request(|reply| LobbyCommand::Spectate { player, reply })
            .await?
    }

    pub async fn remove_spectator(&self, player: PlayerId) -> Result<bool, LobbyError> {
        self.request(|reply| LobbyCommand::RemoveSpectator { player, reply })
            .await?
    }

    pub async fn set_ready(&self, player: PlayerId, ready: bool) -> Result<(), LobbyError> {
        self.request(|reply| LobbyCommand::SetReady {
            player,
            ready,
            reply,
        })
        .await?
    }

    /// A copy of the lobby as it is right now.
    pub async fn snapshot(&self) -> Result<Lobby, LobbyError> {
        self.request(|reply| LobbyCommand::Snapshot { reply }).await
    }

    pub async fn is_ready(&self, player: PlayerId) -> Result<bool, LobbyError> {
        self.snapshot().await?.is_ready(player)
    }

    pub async fn is_banned(&self, player: PlayerId) -> Result<bool, LobbyError> {
        Ok(self.snapshot().await?.is_banned(player))
    }

    pub async fn all_ready(&self) -> Result<bool, LobbyError> {
        Ok(self.snapshot().await?.all_ready())
    }

    pub async fn occupancy(&self) -> Result<usize, LobbyError> {
        Ok(self.snapshot().await?.occupancy())
    }

    pub async fn is_full(&self) -> Result<bool, LobbyError> {
        Ok(self.snapshot().await?.is_full())
    }

    /// Starts the match: `Waiting → InProgress`, only when everyone is
    /// seated and ready.
    pub async fn begin_match(&self) -> Result<(), LobbyError> {
        self.request(|reply| LobbyCommand::BeginMatch { reply })
            .await?
    }

    pub(crate) async fn provisioned(&self) -> Result<LobbyState, LobbyError> {
        self.request(|reply| LobbyCommand::Provisioned { reply })
            .await?
    }

    pub(crate) async fn close(&self, rollback: bool) -> Result<bool, LobbyError> {
        self.request(|reply| LobbyCommand::Close { rollback, reply })
            .await?
    }

    /// Tells the actor to stop. Queued commands ahead of it still run.
    pub(crate) async fn shutdown(&self) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyCommand::Shutdown)
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> LobbyCommand,
    ) -> Result<T, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }
}

/// The actor state. Lives inside its Tokio task.
struct LobbyActor<R, S: ServerControl, D> {
    lobby_id: LobbyId,
    lobby: Lobby,
    /// Loaded from storage rather than created by this process.
    restored: bool,
    shared: Arc<Shared<R, S, D>>,
    receiver: mpsc::Receiver<LobbyCommand>,
}

impl<R, S, D> LobbyActor<R, S, D>
where
    R: Repository,
    S: ServerControl,
    D: PlayerDirectory,
{
    /// Processes commands until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::debug!(lobby_id = %self.lobby_id, "lobby actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                LobbyCommand::Assign {
                    player,
                    slot,
                    reply,
                } => {
                    let _ = reply.send(self.handle_assign(player, slot).await);
                }
                LobbyCommand::Release { player, reply } => {
                    let _ = reply.send(self.handle_release(player).await);
                }
                LobbyCommand::Ban { player, reply } => {
                    let result = self.update(|lobby| lobby.ban(player)).await;
                    if matches!(result, Ok(true)) {
                        tracing::info!(lobby_id = %self.lobby_id, %player, "player banned");
                    }
                    let _ = reply.send(result);
                }
                LobbyCommand::Unban { player, reply } => {
                    let _ = reply.send(self.update(|lobby| lobby.unban(player)).await);
                }
                LobbyCommand::Spectate { player, reply } => {
                    let _ = reply.send(self.handle_spectate(player).await);
                }
                LobbyCommand::RemoveSpectator { player, reply } => {
                    let result = self.update(|lobby| lobby.remove_spectator(player)).await;
                    let _ = reply.send(result);
                }
                LobbyCommand::SetReady {
                    player,
                    ready,
                    reply,
                } => {
                    let result = self.handle_set_ready(player, ready).await;
                    let _ = reply.send(result);
                }
                LobbyCommand::Snapshot { reply } => {
                    let _ = reply.send(self.lobby.clone());
                }
                LobbyCommand::Provisioned { reply } => {
                    let _ = reply.send(self.handle_provisioned().await);
                }
                LobbyCommand::BeginMatch { reply } => {
                    let _ = reply.send(self.handle_begin_match().await);
                }
                LobbyCommand::Close { rollback, reply } => {
                    let _ = reply.send(self.handle_close(rollback).await);
                }
                LobbyCommand::Shutdown => break,
            }
        }

        tracing::debug!(lobby_id = %self.lobby_id, "lobby actor stopped");
    }

    async fn handle_assign(&mut self, player: PlayerId, slot: usize) -> Result<(), LobbyError> {
        self.lobby.check_admission(player, slot)?;

        let claim = self
            .shared
            .seats
            .claim(player, self.lobby_id)
            .map_err(|other| LobbyError::AlreadyElsewhere(player, other))?;

        // Occupancy is checked here, after the seat claim.
        let mut next = self.lobby.clone();
        let result = match next.assign(player, slot) {
            Ok(Assignment::Unchanged) => Ok(None),
            Ok(Assignment::Seated { previous }) => {
                self.commit(next).await.map(|()| Some(previous))
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(Some(previous)) => {
                tracing::debug!(
                    lobby_id = %self.lobby_id,
                    %player,
                    slot,
                    ?previous,
                    occupancy = self.lobby.occupancy(),
                    "player seated"
                );
            }
            Ok(None) => {}
            Err(err) => {
                if claim == Claim::New {
                    self.shared.seats.release(player, self.lobby_id);
                }
                return Err(err);
            }
        }
        self.sync_allow_list().await
    }

    async fn handle_release(&mut self, player: PlayerId) -> Result<Option<usize>, LobbyError> {
        let mut next = self.lobby.clone();
        let freed = next.release(player)?;
        if freed.is_some() {
            self.commit(next).await?;
            self.shared.seats.release(player, self.lobby_id);
            tracing::debug!(lobby_id = %self.lobby_id, %player, ?freed, "player released");
        }
        // Pushed even when nothing changed, so a stale server-side list
        // gets corrected.
        self.sync_allow_list().await?;
        Ok(freed)
    }

    async fn handle_spectate(&mut self, player: PlayerId) -> Result<Option<usize>, LobbyError> {
        let mut next = self.lobby.clone();
        let left = next.spectate(player)?;
        self.commit(next).await?;
        if left.is_some() {
            self.shared.seats.release(player, self.lobby_id);
        }
        self.sync_allow_list().await?;
        Ok(left)
    }

    async fn handle_set_ready(&mut self, player: PlayerId, ready: bool) -> Result<(), LobbyError> {
        self.update(|lobby| lobby.set_ready(player, ready)).await?;
        tracing::debug!(
            lobby_id = %self.lobby_id,
            %player,
            ready,
            ready_count = self.lobby.slots().ready_count(),
            "readiness changed"
        );
        Ok(())
    }

    async fn handle_provisioned(&mut self) -> Result<LobbyState, LobbyError> {
        if self.lobby.state().is_ended() {
            // Closed while setup was running; the new server has no lobby.
            if let Some(handle) = self.shared.take_server(self.lobby_id) {
                if let Err(err) = self.shared.control.end(&handle).await {
                    tracing::warn!(
                        lobby_id = %self.lobby_id,
                        error = %err,
                        "failed to release server of closed lobby"
                    );
                }
            }
            return Err(LobbyError::LobbyClosed(self.lobby_id));
        }

        if self.lobby.state() == LobbyState::Initializing {
            self.update(|lobby| lobby.transition(LobbyState::Waiting))
                .await?;
            tracing::info!(lobby_id = %self.lobby_id, "lobby waiting for players");
        }
        self.sync_allow_list().await?;
        Ok(self.lobby.state())
    }

    async fn handle_begin_match(&mut self) -> Result<(), LobbyError> {
        if self.lobby.state().is_ended() {
            return Err(LobbyError::LobbyClosed(self.lobby_id));
        }
        if !self.lobby.all_ready() {
            return Err(LobbyError::NotReady(self.lobby_id));
        }
        self.update(|lobby| lobby.transition(LobbyState::InProgress))
            .await?;
        tracing::info!(lobby_id = %self.lobby_id, "match started");
        Ok(())
    }

    async fn handle_close(&mut self, rollback: bool) -> Result<bool, LobbyError> {
        if self.lobby.state().is_ended() {
            return Ok(false);
        }

        let server = match self.shared.take_server(self.lobby_id) {
            Some(handle) => Some(handle),
            None if self.restored && !rollback => self.reattach().await?,
            None => None,
        };
        if let Some(handle) = server {
            if let Err(err) = self.shared.control.end(&handle).await {
                if !rollback {
                    self.shared.put_server(self.lobby_id, handle);
                    return Err(err.into());
                }
                tracing::error!(
                    lobby_id = %self.lobby_id,
                    error = %err,
                    "failed to release server during rollback"
                );
            }
        }
        self.shared.guard.end(self.lobby_id);

        let mut next = self.lobby.clone();
        let cleared = next.transition(LobbyState::Ended)?;
        if let Err(err) = self.shared.repo.save(&next).await {
            if !rollback {
                return Err(err.into());
            }
            // The server is already released, so the lobby can't stay open.
            self.lobby = next;
            self.shared.seats.release_lobby(self.lobby_id);
            tracing::error!(
                lobby_id = %self.lobby_id,
                error = %err,
                "ended lobby in memory only, save failed"
            );
            return Err(err.into());
        }
        self.lobby = next;
        self.shared.seats.release_lobby(self.lobby_id);

        tracing::info!(
            lobby_id = %self.lobby_id,
            released_seats = cleared.len(),
            "lobby ended"
        );
        Ok(true)
    }

    /// A lobby loaded from storage may still own a server from before the
    /// restart. Attach to it again (without setting it up) so it can be
    /// released.
    async fn reattach(&self) -> Result<Option<S::Handle>, LobbyError> {
        let Some(spec) = self.shared.server_spec(&self.lobby) else {
            return Ok(None);
        };
        let handle = self.shared.control.attach(spec).await?;
        tracing::debug!(lobby_id = %self.lobby_id, "reattached server to release it");
        Ok(Some(handle))
    }

    /// Applies `change` to a copy and commits it.
    async fn update<T>(
        &mut self,
        change: impl FnOnce(&mut Lobby) -> Result<T, LobbyError>,
    ) -> Result<T, LobbyError> {
        let mut next = self.lobby.clone();
        let value = change(&mut next)?;
        if next != self.lobby {
            self.commit(next).await?;
        }
        Ok(value)
    }

    /// Persists `next` and makes it the live lobby.
    async fn commit(&mut self, next: Lobby) -> Result<(), LobbyError> {
        self.shared.repo.save(&next).await?;
        self.lobby = next;
        Ok(())
    }

    /// Pushes the current occupants to the game server, if one is attached.
    async fn sync_allow_list(&self) -> Result<(), LobbyError> {
        let Some(handle) = self.shared.server_handle(self.lobby_id) else {
            return Ok(());
        };

        let players: Vec<PlayerId> = self.lobby.slots().occupants().collect();
        let mut steam_ids = Vec::with_capacity(players.len());
        for player in players {
            steam_ids.push(self.shared.directory.steam_id(player).await?);
        }

        self.shared
            .control
            .set_allowed_players(&handle, &steam_ids)
            .await?;
        tracing::trace!(
            lobby_id = %self.lobby_id,
            allowed = steam_ids.len(),
            "allow-list pushed"
        );
        Ok(())
    }
}

/// Spawns a lobby actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it's full.
pub(crate) fn spawn_lobby<R, S, D>(
    lobby: Lobby,
    shared: Arc<Shared<R, S, D>>,
    channel_size: usize,
    restored: bool,
) -> LobbyHandle
where
    R: Repository,
    S: ServerControl,
    D: PlayerDirectory,
{
    let (tx, rx) = mpsc::channel(channel_size.max(1));
    let lobby_id = lobby.id();

    let actor = LobbyActor {
        lobby_id,
        lobby,
        restored,
        shared,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    LobbyHandle {
        lobby_id,
        sender: tx,
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use lobbyforge::prelude::*;

// ---------------------------------------------------------------------------
// A pretend server fleet
// ---------------------------------------------------------------------------

/// Hands out ports on one box and logs what a real control plane would do
/// over rcon.
#[derive(Debug, Default)]
struct LocalFleet {
    next_port: AtomicU32,
}

#[derive(Debug, Clone)]
struct LocalServer {
    lobby_id: LobbyId,
    port: u32,
    map: String,
}

impl ServerControl for LocalFleet {
    type Handle = LocalServer;

    async fn attach(&self, spec: ServerSpec) -> Result<LocalServer, ServerError> {
        if spec.info.host.is_empty() {
            return Err(ServerError::InvalidInfo("empty host".into()));
        }
        let port = 27015 + self.next_port.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            lobby_id = %spec.lobby_id,
            port,
            league = %spec.league,
            format = %spec.lobby_type,
            "reserved server"
        );
        Ok(LocalServer {
            lobby_id: spec.lobby_id,
            port,
            map: spec.map_name,
        })
    }

    async fn setup(&self, server: &LocalServer) -> Result<(), ServerError> {
        // Uploading configs and changing level takes a moment.
        tokio::time::sleep(Duration::from_millis(200)).await;
        tracing::info!(lobby_id = %server.lobby_id, port = server.port, map = %server.map, "changelevel done");
        Ok(())
    }

    async fn end(&self, server: &LocalServer) -> Result<(), ServerError> {
        tracing::info!(lobby_id = %server.lobby_id, port = server.port, "server released");
        Ok(())
    }

    async fn set_allowed_players(
        &self,
        server: &LocalServer,
        players: &[SteamId],
    ) -> Result<(), ServerError> {
        tracing::debug!(port = server.port, allowed = players.len(), "allow-list updated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let directory = MemoryDirectory::new();
    for i in 1..=13 {
        directory.register(PlayerId(i), SteamId::new(format!("[U:1:{}]", 1000 + i)));
    }

    let service = Lobbyforge::builder()
        .default_league(League::Etf2l)
        .setup_timeout(Duration::from_secs(120))
        .build(MemoryRepository::new(), LocalFleet::default(), directory);
    service.recover().await?;

    let lobbies = service.manager();
    let scrim = lobbies
        .create(
            NewLobby::new("cp_process_final", LobbyType::Sixes)
                .server_info(ServerInfo::new("203.0.113.7", "rcon-pass"))
                .whitelist(Whitelist(8)),
        )
        .await?;

    // Two admins hit "start" at once; only one provisions.
    let (first, second) = tokio::join!(lobbies.request_setup(scrim), lobbies.request_setup(scrim));
    match (&first, &second) {
        (Ok(()), Err(err)) | (Err(err), Ok(())) => {
            tracing::info!(error = %err, "second setup request turned away");
        }
        _ => tracing::warn!(?first, ?second, "unexpected setup outcome"),
    }

    // Twelve players pick slots concurrently.
    let mut joins = Vec::new();
    for slot in 0..12 {
        let lobbies = Arc::clone(&lobbies);
        joins.push(tokio::spawn(async move {
            let player = PlayerId(slot as u64 + 1);
            lobbies.assign_player(scrim, player, slot).await?;
            lobbies.set_ready(scrim, player, true).await
        }));
    }
    for join in joins {
        join.await??;
    }

    let late = lobbies.assign_player(scrim, PlayerId(13), 12).await;
    if let Err(err) = late {
        tracing::info!(error = %err, "thirteenth player rejected");
    }

    lobbies.begin_match(scrim).await?;
    let lobby = lobbies.snapshot(scrim).await?;
    tracing::info!(
        lobby_id = %scrim,
        state = %lobby.state(),
        occupancy = lobby.occupancy(),
        "match running"
    );

    lobbies.ban_player(scrim, PlayerId(4)).await?;
    lobbies.close(scrim).await?;
    lobbies.delete(scrim).await?;
    tracing::info!(remaining = lobbies.lobby_count(), "scrim finished");
    Ok(())
}

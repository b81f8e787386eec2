//! Integration tests for the lobby system using a mock server control plane.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lobbyforge_lobby::{
    Lobby, LobbyConfig, LobbyError, LobbyManager, LobbyState, MemoryDirectory, MemoryRepository,
    NewLobby, Repository, RepositoryError, SaveOutcome, ServerControl, ServerError, ServerSpec,
};
use lobbyforge_model::{LobbyId, LobbyType, PlayerId, ServerInfo, SteamId};
use tokio::sync::Notify;

// =========================================================================
// Mock server control plane: counts calls, can fail setup, can be gated.
// =========================================================================

#[derive(Debug, Clone)]
struct MockServer {
    lobby_id: LobbyId,
}

#[derive(Debug, Default)]
struct ControlState {
    attaches: AtomicUsize,
    setups: AtomicUsize,
    ends: AtomicUsize,
    fail_setup: AtomicBool,
    fail_end: AtomicBool,
    pushes: Mutex<Vec<Vec<SteamId>>>,
    specs: Mutex<Vec<ServerSpec>>,
    ended: Mutex<Vec<LobbyId>>,
    gate: Option<Arc<Notify>>,
}

#[derive(Debug, Clone, Default)]
struct MockControl {
    state: Arc<ControlState>,
}

impl MockControl {
    /// Setup blocks until `gate` is notified.
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            state: Arc::new(ControlState {
                gate: Some(gate),
                ..ControlState::default()
            }),
        }
    }

    fn attaches(&self) -> usize {
        self.state.attaches.load(Ordering::SeqCst)
    }

    fn setups(&self) -> usize {
        self.state.setups.load(Ordering::SeqCst)
    }

    fn ends(&self) -> usize {
        self.state.ends.load(Ordering::SeqCst)
    }

    fn fail_setup(&self, fail: bool) {
        self.state.fail_setup.store(fail, Ordering::SeqCst);
    }

    fn fail_end(&self, fail: bool) {
        self.state.fail_end.store(fail, Ordering::SeqCst);
    }

    fn last_push(&self) -> Option<Vec<SteamId>> {
        self.state.pushes.lock().unwrap().last().cloned()
    }

    fn push_count(&self) -> usize {
        self.state.pushes.lock().unwrap().len()
    }

    fn last_spec(&self) -> Option<ServerSpec> {
        self.state.specs.lock().unwrap().last().cloned()
    }

    /// Lobbies whose server was released, in order.
    fn ended_lobbies(&self) -> Vec<LobbyId> {
        self.state.ended.lock().unwrap().clone()
    }
}

impl ServerControl for MockControl {
    type Handle = MockServer;

    async fn attach(&self, spec: ServerSpec) -> Result<MockServer, ServerError> {
        self.state.attaches.fetch_add(1, Ordering::SeqCst);
        let server = MockServer {
            lobby_id: spec.lobby_id,
        };
        self.state.specs.lock().unwrap().push(spec);
        Ok(server)
    }

    async fn setup(&self, _handle: &MockServer) -> Result<(), ServerError> {
        self.state.setups.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.state.gate {
            gate.notified().await;
        }
        if self.state.fail_setup.load(Ordering::SeqCst) {
            return Err(ServerError::Setup("map change timed out".into()));
        }
        Ok(())
    }

    async fn end(&self, handle: &MockServer) -> Result<(), ServerError> {
        if self.state.fail_end.load(Ordering::SeqCst) {
            return Err(ServerError::Control("rcon refused".into()));
        }
        self.state.ends.fetch_add(1, Ordering::SeqCst);
        self.state.ended.lock().unwrap().push(handle.lobby_id);
        Ok(())
    }

    async fn set_allowed_players(
        &self,
        _handle: &MockServer,
        players: &[SteamId],
    ) -> Result<(), ServerError> {
        self.state.pushes.lock().unwrap().push(players.to_vec());
        Ok(())
    }
}

/// Repository shared between two managers, to simulate a restart.
#[derive(Debug, Clone, Default)]
struct SharedRepo(Arc<MemoryRepository>);

impl Repository for SharedRepo {
    async fn allocate_id(&self) -> Result<LobbyId, RepositoryError> {
        self.0.allocate_id().await
    }

    async fn save(&self, lobby: &Lobby) -> Result<SaveOutcome, RepositoryError> {
        self.0.save(lobby).await
    }

    async fn find_by_id(&self, id: LobbyId) -> Result<Lobby, RepositoryError> {
        self.0.find_by_id(id).await
    }

    async fn delete(&self, id: LobbyId) -> Result<(), RepositoryError> {
        self.0.delete(id).await
    }

    async fn list_active(&self) -> Result<Vec<Lobby>, RepositoryError> {
        self.0.list_active().await
    }
}

/// Repository whose saves can be switched to fail after creation.
#[derive(Debug, Clone, Default)]
struct FlakyRepo {
    inner: SharedRepo,
    fail_saves: Arc<AtomicBool>,
}

impl FlakyRepo {
    fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl Repository for FlakyRepo {
    async fn allocate_id(&self) -> Result<LobbyId, RepositoryError> {
        self.inner.allocate_id().await
    }

    async fn save(&self, lobby: &Lobby) -> Result<SaveOutcome, RepositoryError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("disk full".into()));
        }
        self.inner.save(lobby).await
    }

    async fn find_by_id(&self, id: LobbyId) -> Result<Lobby, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn delete(&self, id: LobbyId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }

    async fn list_active(&self) -> Result<Vec<Lobby>, RepositoryError> {
        self.inner.list_active().await
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn steam(id: u64) -> SteamId {
    SteamId::new(format!("7656119800{id:07}"))
}

fn sixes() -> NewLobby {
    NewLobby::new("cp_process_final", LobbyType::Sixes)
        .server_info(ServerInfo::new("10.0.0.5:27015", "rcon-secret"))
}

fn directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    for i in 1..=40 {
        directory.register(pid(i), steam(i));
    }
    directory
}

fn manager_with<R: Repository>(
    repo: R,
    control: MockControl,
) -> LobbyManager<R, MockControl, MemoryDirectory> {
    LobbyManager::new(repo, control, directory(), LobbyConfig::default())
}

fn manager(control: MockControl) -> LobbyManager<MemoryRepository, MockControl, MemoryDirectory> {
    manager_with(MemoryRepository::new(), control)
}

/// Creates a Sixes lobby and provisions it.
async fn ready_lobby<R: Repository>(mgr: &LobbyManager<R, MockControl, MemoryDirectory>) -> LobbyId {
    let id = mgr.create(sixes()).await.unwrap();
    mgr.request_setup(id).await.unwrap();
    id
}

async fn state_of<R: Repository>(
    mgr: &LobbyManager<R, MockControl, MemoryDirectory>,
    id: LobbyId,
) -> LobbyState {
    mgr.snapshot(id).await.unwrap().state()
}

// =========================================================================
// Creation and provisioning
// =========================================================================

#[tokio::test]
async fn test_create_returns_unique_ids_in_initializing() {
    let mgr = manager(MockControl::default());

    let a = mgr.create(sixes()).await.unwrap();
    let b = mgr.create(sixes()).await.unwrap();

    assert_ne!(a, b);
    assert_eq!(mgr.lobby_count(), 2);
    assert_eq!(state_of(&mgr, a).await, LobbyState::Initializing);
    assert_eq!(mgr.repository().len(), 2);
}

#[tokio::test]
async fn test_request_setup_success_moves_to_waiting() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = mgr.create(sixes()).await.unwrap();

    mgr.request_setup(id).await.unwrap();

    assert_eq!(state_of(&mgr, id).await, LobbyState::Waiting);
    assert_eq!(control.attaches(), 1);
    assert_eq!(control.setups(), 1);
    assert!(mgr.has_server(id));
    assert!(!mgr.guard().is_in_flight(id));

    let stored = mgr.repository().find_by_id(id).await.unwrap();
    assert_eq!(stored.state(), LobbyState::Waiting);
}

#[tokio::test]
async fn test_request_setup_passes_lobby_details_to_server() {
    let control = MockControl::default();
    let mgr = manager(control.clone());

    let id = ready_lobby(&mgr).await;

    let spec = control.last_spec().unwrap();
    assert_eq!(spec.lobby_id, id);
    assert_eq!(spec.map_name, "cp_process_final");
    assert_eq!(spec.lobby_type, LobbyType::Sixes);
    assert_eq!(spec.league, mgr.config().default_league);
    assert_eq!(spec.password.len(), mgr.config().password_bytes * 2);
}

#[tokio::test]
async fn test_request_setup_twice_is_invalid_transition() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = ready_lobby(&mgr).await;

    let result = mgr.request_setup(id).await;

    assert!(matches!(
        result,
        Err(LobbyError::InvalidTransition {
            from: LobbyState::Waiting,
            to: LobbyState::Waiting,
            ..
        })
    ));
    assert_eq!(control.attaches(), 1);
}

#[tokio::test]
async fn test_request_setup_concurrent_second_fails_fast() {
    let gate = Arc::new(Notify::new());
    let control = MockControl::gated(Arc::clone(&gate));
    let mgr = Arc::new(manager(control.clone()));
    let id = mgr.create(sixes()).await.unwrap();

    let first = tokio::spawn({
        let mgr = Arc::clone(&mgr);
        async move { mgr.request_setup(id).await }
    });
    while control.setups() == 0 {
        tokio::task::yield_now().await;
    }

    let second = mgr.request_setup(id).await;
    assert!(matches!(second, Err(LobbyError::SetupInProgress(l)) if l == id));

    gate.notify_one();
    first.await.unwrap().unwrap();

    assert_eq!(control.attaches(), 1);
    assert_eq!(control.setups(), 1);
    assert_eq!(state_of(&mgr, id).await, LobbyState::Waiting);
}

#[tokio::test]
async fn test_request_setup_failure_ends_lobby_and_clears_guard() {
    let control = MockControl::default();
    control.fail_setup(true);
    let mgr = manager(control.clone());
    let id = mgr.create(sixes()).await.unwrap();

    let result = mgr.request_setup(id).await;

    assert!(matches!(result, Err(LobbyError::Server(ServerError::Setup(_)))));
    assert_eq!(state_of(&mgr, id).await, LobbyState::Ended);
    assert!(!mgr.guard().is_in_flight(id));
    assert!(!mgr.has_server(id));
    // The half-provisioned server was released.
    assert_eq!(control.ends(), 1);
}

#[tokio::test]
async fn test_request_setup_without_server_info_fails_and_stays_initializing() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = mgr
        .create(NewLobby::new("koth_product", LobbyType::Highlander))
        .await
        .unwrap();

    let result = mgr.request_setup(id).await;

    assert!(matches!(result, Err(LobbyError::NoServerInfo(l)) if l == id));
    assert_eq!(state_of(&mgr, id).await, LobbyState::Initializing);
    assert_eq!(control.attaches(), 0);
    assert_eq!(control.ends(), 0);
    assert!(mgr.guard().is_empty());
    // Still open for players.
    mgr.assign_player(id, pid(1), 0).await.unwrap();
}

#[tokio::test]
async fn test_request_setup_failure_with_failing_save_still_ends_lobby() {
    let repo = FlakyRepo::default();
    let control = MockControl::default();
    control.fail_setup(true);
    let mgr = manager_with(repo.clone(), control.clone());
    let id = mgr.create(sixes()).await.unwrap();
    mgr.assign_player(id, pid(1), 0).await.unwrap();
    repo.fail_saves(true);

    let result = mgr.request_setup(id).await;

    assert!(matches!(result, Err(LobbyError::Server(ServerError::Setup(_)))));
    assert_eq!(state_of(&mgr, id).await, LobbyState::Ended);
    assert_eq!(mgr.lobby_of(pid(1)), None);
    assert_eq!(control.ends(), 1);
    assert!(!mgr.guard().is_in_flight(id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_setup_racing_requests_provision_once() {
    let control = MockControl::default();
    let mgr = Arc::new(manager(control.clone()));

    for _ in 0..20 {
        let id = mgr.create(sixes()).await.unwrap();
        let before = control.setups();

        let mut attempts = Vec::new();
        for _ in 0..8 {
            let mgr = Arc::clone(&mgr);
            attempts.push(tokio::spawn(async move { mgr.request_setup(id).await }));
        }
        let mut succeeded = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(LobbyError::SetupInProgress(_) | LobbyError::InvalidTransition { .. }) => {}
                Err(other) => panic!("unexpected setup error: {other}"),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(control.setups() - before, 1);
        assert_eq!(state_of(&mgr, id).await, LobbyState::Waiting);
    }
}

#[tokio::test]
async fn test_request_setup_on_ended_lobby_is_closed() {
    let mgr = manager(MockControl::default());
    let id = mgr.create(sixes()).await.unwrap();
    mgr.close(id).await.unwrap();

    let result = mgr.request_setup(id).await;

    assert!(matches!(result, Err(LobbyError::LobbyClosed(_))));
}

#[tokio::test]
async fn test_request_setup_unknown_lobby_is_not_found() {
    let mgr = manager(MockControl::default());
    let result = mgr.request_setup(LobbyId(404)).await;
    assert!(matches!(result, Err(LobbyError::NotFound(l)) if l == LobbyId(404)));
}

// =========================================================================
// Roster
// =========================================================================

#[tokio::test]
async fn test_sixes_full_lifecycle() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;

    for slot in 0..12 {
        mgr.assign_player(id, pid(slot as u64 + 1), slot).await.unwrap();
    }
    assert!(mgr.is_full(id).await.unwrap());
    assert_eq!(mgr.occupancy(id).await.unwrap(), 12);

    for p in 1..=12 {
        mgr.set_ready(id, pid(p), true).await.unwrap();
    }
    assert!(mgr.all_ready(id).await.unwrap());

    mgr.set_ready(id, pid(7), false).await.unwrap();
    assert!(!mgr.all_ready(id).await.unwrap());
    assert!(!mgr.is_ready(id, pid(7)).await.unwrap());
}

#[tokio::test]
async fn test_assign_player_slot_past_capacity_is_invalid_slot() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    for slot in 0..12 {
        mgr.assign_player(id, pid(slot as u64 + 1), slot).await.unwrap();
    }

    let result = mgr.assign_player(id, pid(13), 12).await;

    assert!(matches!(
        result,
        Err(LobbyError::InvalidSlot {
            slot: 12,
            capacity: 12
        })
    ));
    assert_eq!(mgr.occupancy(id).await.unwrap(), 12);
    assert_eq!(mgr.lobby_of(pid(13)), None);
}

#[tokio::test]
async fn test_assign_player_banned_fails_even_on_empty_slot() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    mgr.ban_player(id, pid(3)).await.unwrap();

    let result = mgr.assign_player(id, pid(3), 0).await;

    assert!(matches!(result, Err(LobbyError::Banned(p, l)) if p == pid(3) && l == id));
    assert!(mgr.is_banned(id, pid(3)).await.unwrap());
    assert_eq!(mgr.occupancy(id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_assign_player_occupied_slot_is_rejected() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    mgr.assign_player(id, pid(1), 4).await.unwrap();

    let result = mgr.assign_player(id, pid(2), 4).await;

    assert!(matches!(
        result,
        Err(LobbyError::SlotOccupied { slot: 4, occupant }) if occupant == pid(1)
    ));
}

#[tokio::test]
async fn test_assign_player_moves_within_lobby() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    mgr.assign_player(id, pid(1), 0).await.unwrap();

    mgr.assign_player(id, pid(1), 5).await.unwrap();

    let lobby = mgr.snapshot(id).await.unwrap();
    assert_eq!(lobby.slots().slot_of(pid(1)), Some(5));
    assert_eq!(lobby.slots().occupant(0), None);
    assert_eq!(lobby.occupancy(), 1);
}

#[tokio::test]
async fn test_assign_player_seated_elsewhere_is_rejected() {
    let mgr = manager(MockControl::default());
    let first = ready_lobby(&mgr).await;
    let second = ready_lobby(&mgr).await;
    mgr.assign_player(first, pid(1), 0).await.unwrap();

    let result = mgr.assign_player(second, pid(1), 0).await;

    assert!(matches!(
        result,
        Err(LobbyError::AlreadyElsewhere(p, l)) if p == pid(1) && l == first
    ));
    assert_eq!(mgr.lobby_of(pid(1)), Some(first));
}

#[tokio::test]
async fn test_assign_player_elsewhere_wins_over_occupied_slot() {
    let mgr = manager(MockControl::default());
    let first = ready_lobby(&mgr).await;
    let second = ready_lobby(&mgr).await;
    mgr.assign_player(first, pid(1), 0).await.unwrap();
    mgr.assign_player(second, pid(2), 0).await.unwrap();

    let result = mgr.assign_player(second, pid(1), 0).await;

    assert!(matches!(
        result,
        Err(LobbyError::AlreadyElsewhere(p, l)) if p == pid(1) && l == first
    ));
    assert_eq!(mgr.lobby_of(pid(2)), Some(second));
}

#[tokio::test]
async fn test_assign_player_after_other_lobby_closed_succeeds() {
    let mgr = manager(MockControl::default());
    let first = ready_lobby(&mgr).await;
    let second = ready_lobby(&mgr).await;
    mgr.assign_player(first, pid(1), 0).await.unwrap();

    mgr.close(first).await.unwrap();
    mgr.assign_player(second, pid(1), 0).await.unwrap();

    assert_eq!(mgr.lobby_of(pid(1)), Some(second));
}

#[tokio::test]
async fn test_release_player_frees_seat_and_is_idempotent() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    mgr.assign_player(id, pid(1), 2).await.unwrap();

    assert_eq!(mgr.release_player(id, pid(1)).await.unwrap(), Some(2));
    assert_eq!(mgr.release_player(id, pid(1)).await.unwrap(), None);

    assert_eq!(mgr.occupancy(id).await.unwrap(), 0);
    assert_eq!(mgr.lobby_of(pid(1)), None);
}

#[tokio::test]
async fn test_spectate_releases_slot() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    mgr.assign_player(id, pid(1), 3).await.unwrap();

    let left = mgr.spectate(id, pid(1)).await.unwrap();

    assert_eq!(left, Some(3));
    let lobby = mgr.snapshot(id).await.unwrap();
    assert!(lobby.is_spectating(pid(1)));
    assert_eq!(lobby.occupancy(), 0);
    assert_eq!(mgr.lobby_of(pid(1)), None);

    assert!(mgr.remove_spectator(id, pid(1)).await.unwrap());
    assert!(!mgr.snapshot(id).await.unwrap().is_spectating(pid(1)));
}

#[tokio::test]
async fn test_set_ready_unseated_player_is_not_seated() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;

    let result = mgr.set_ready(id, pid(9), true).await;

    assert!(matches!(result, Err(LobbyError::NotSeated(p, _)) if p == pid(9)));
}

#[tokio::test]
async fn test_unban_allows_assignment_again() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    mgr.ban_player(id, pid(3)).await.unwrap();

    assert!(mgr.unban_player(id, pid(3)).await.unwrap());
    mgr.assign_player(id, pid(3), 0).await.unwrap();
}

// =========================================================================
// Allow-list
// =========================================================================

#[tokio::test]
async fn test_allow_list_tracks_occupants() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = ready_lobby(&mgr).await;
    assert_eq!(control.last_push(), Some(Vec::new()));

    mgr.assign_player(id, pid(1), 0).await.unwrap();
    mgr.assign_player(id, pid(2), 1).await.unwrap();
    assert_eq!(control.last_push(), Some(vec![steam(1), steam(2)]));

    mgr.release_player(id, pid(1)).await.unwrap();
    assert_eq!(control.last_push(), Some(vec![steam(2)]));
}

#[tokio::test]
async fn test_allow_list_pushed_on_same_slot_reassign() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = ready_lobby(&mgr).await;
    mgr.assign_player(id, pid(1), 3).await.unwrap();
    let pushes = control.push_count();

    mgr.assign_player(id, pid(1), 3).await.unwrap();

    assert_eq!(control.push_count(), pushes + 1);
    assert_eq!(control.last_push(), Some(vec![steam(1)]));
}

#[tokio::test]
async fn test_allow_list_not_pushed_without_server() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = mgr.create(sixes()).await.unwrap();

    mgr.assign_player(id, pid(1), 0).await.unwrap();

    assert_eq!(control.push_count(), 0);
    assert_eq!(mgr.occupancy(id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_assign_player_unknown_to_directory_keeps_seat_but_errors() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;

    let result = mgr.assign_player(id, pid(999), 0).await;

    assert!(matches!(result, Err(LobbyError::Directory(_))));
    assert_eq!(mgr.occupancy(id).await.unwrap(), 1);
}

// =========================================================================
// Match start
// =========================================================================

#[tokio::test]
async fn test_begin_match_requires_everyone_ready() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    mgr.assign_player(id, pid(1), 0).await.unwrap();

    let result = mgr.begin_match(id).await;

    assert!(matches!(result, Err(LobbyError::NotReady(l)) if l == id));
    assert_eq!(state_of(&mgr, id).await, LobbyState::Waiting);
}

#[tokio::test]
async fn test_begin_match_freezes_roster() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    for slot in 0..12 {
        let player = pid(slot as u64 + 1);
        mgr.assign_player(id, player, slot).await.unwrap();
        mgr.set_ready(id, player, true).await.unwrap();
    }

    mgr.begin_match(id).await.unwrap();

    assert_eq!(state_of(&mgr, id).await, LobbyState::InProgress);
    assert!(matches!(
        mgr.set_ready(id, pid(1), false).await,
        Err(LobbyError::RosterFrozen(_))
    ));
    // Leaving mid-match is still possible.
    assert_eq!(mgr.release_player(id, pid(1)).await.unwrap(), Some(0));
    assert!(matches!(
        mgr.assign_player(id, pid(20), 0).await,
        Err(LobbyError::RosterFrozen(_))
    ));
}

// =========================================================================
// Close and delete
// =========================================================================

#[tokio::test]
async fn test_close_twice_ends_server_once() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = ready_lobby(&mgr).await;
    mgr.assign_player(id, pid(1), 0).await.unwrap();

    mgr.close(id).await.unwrap();
    let first = mgr.snapshot(id).await.unwrap();
    mgr.close(id).await.unwrap();
    let second = mgr.snapshot(id).await.unwrap();

    assert_eq!(control.ends(), 1);
    assert_eq!(first, second);
    assert_eq!(second.state(), LobbyState::Ended);
    assert_eq!(second.occupancy(), 0);
    assert_eq!(mgr.lobby_of(pid(1)), None);
}

#[tokio::test]
async fn test_close_rejects_later_roster_changes() {
    let mgr = manager(MockControl::default());
    let id = ready_lobby(&mgr).await;
    mgr.close(id).await.unwrap();

    assert!(matches!(
        mgr.assign_player(id, pid(1), 0).await,
        Err(LobbyError::LobbyClosed(_))
    ));
    assert!(matches!(
        mgr.ban_player(id, pid(1)).await,
        Err(LobbyError::LobbyClosed(_))
    ));
}

#[tokio::test]
async fn test_close_server_release_failure_keeps_lobby_open() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = ready_lobby(&mgr).await;
    control.fail_end(true);

    let result = mgr.close(id).await;

    assert!(matches!(result, Err(LobbyError::Server(ServerError::Control(_)))));
    assert_eq!(state_of(&mgr, id).await, LobbyState::Waiting);
    assert!(mgr.has_server(id));

    control.fail_end(false);
    mgr.close(id).await.unwrap();
    assert_eq!(control.ends(), 1);
    assert_eq!(state_of(&mgr, id).await, LobbyState::Ended);
}

#[tokio::test]
async fn test_ban_close_delete_ends_server_once() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = ready_lobby(&mgr).await;
    mgr.assign_player(id, pid(1), 0).await.unwrap();

    mgr.ban_player(id, pid(1)).await.unwrap();
    mgr.close(id).await.unwrap();
    mgr.delete(id).await.unwrap();

    assert_eq!(control.ended_lobbies(), vec![id]);
    assert!(mgr.repository().is_empty());
    assert_eq!(mgr.lobby_count(), 0);
    assert!(matches!(
        mgr.snapshot(id).await,
        Err(LobbyError::NotFound(l)) if l == id
    ));
}

#[tokio::test]
async fn test_delete_unknown_lobby_is_not_found() {
    let mgr = manager(MockControl::default());
    assert!(matches!(
        mgr.delete(LobbyId(77)).await,
        Err(LobbyError::NotFound(_))
    ));
}

// =========================================================================
// Recovery
// =========================================================================

#[tokio::test]
async fn test_recover_all_reattaches_servers_after_restart() {
    let repo = SharedRepo::default();
    let before = MockControl::default();
    let first = manager_with(repo.clone(), before.clone());
    let id = ready_lobby(&first).await;
    first.assign_player(id, pid(1), 0).await.unwrap();
    let ended = ready_lobby(&first).await;
    first.close(ended).await.unwrap();

    let after = MockControl::default();
    let second = manager_with(repo, after.clone());
    let report = second.recover_all().await.unwrap();

    assert_eq!(report.recovered, vec![id]);
    assert!(report.failed.is_empty());
    assert_eq!(after.attaches(), 1);
    assert!(second.has_server(id));
    assert_eq!(state_of(&second, id).await, LobbyState::Waiting);
    assert_eq!(second.lobby_of(pid(1)), Some(id));
    assert_eq!(after.last_push(), Some(vec![steam(1)]));
}

#[tokio::test]
async fn test_recover_all_failure_is_reported_and_lobby_closed() {
    let repo = SharedRepo::default();
    let first = manager_with(repo.clone(), MockControl::default());
    let id = ready_lobby(&first).await;

    let failing = MockControl::default();
    failing.fail_setup(true);
    let second = manager_with(repo, failing);
    let report = second.recover_all().await.unwrap();

    assert!(report.recovered.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, id);
    assert_eq!(state_of(&second, id).await, LobbyState::Ended);
}

#[tokio::test]
async fn test_open_loads_and_recovers_stored_lobby() {
    let repo = SharedRepo::default();
    let first = manager_with(repo.clone(), MockControl::default());
    let id = ready_lobby(&first).await;

    let after = MockControl::default();
    let second = manager_with(repo, after.clone());
    assert_eq!(second.lobby_count(), 0);

    let handle = second.open(id).await.unwrap();

    assert_eq!(handle.lobby_id(), id);
    assert_eq!(after.attaches(), 1);
    // Already loaded: no second provisioning.
    second.attach_or_recover(id).await.unwrap();
    assert_eq!(after.attaches(), 1);
}

#[tokio::test]
async fn test_attach_or_recover_on_ended_lobby_is_noop() {
    let control = MockControl::default();
    let mgr = manager(control.clone());
    let id = ready_lobby(&mgr).await;
    mgr.close(id).await.unwrap();

    mgr.attach_or_recover(id).await.unwrap();

    assert_eq!(control.attaches(), 1);
    assert!(!mgr.has_server(id));
}

#[tokio::test]
async fn test_request_setup_after_restart_provisions_stored_lobby() {
    let repo = SharedRepo::default();
    let first = manager_with(repo.clone(), MockControl::default());
    let id = first.create(sixes()).await.unwrap();

    let after = MockControl::default();
    let second = manager_with(repo, after.clone());
    second.request_setup(id).await.unwrap();

    assert_eq!(after.attaches(), 1);
    assert_eq!(after.setups(), 1);
    assert_eq!(state_of(&second, id).await, LobbyState::Waiting);
    assert!(second.has_server(id));
}

#[tokio::test]
async fn test_delete_after_restart_releases_server() {
    let repo = SharedRepo::default();
    let before = MockControl::default();
    let first = manager_with(repo.clone(), before.clone());
    let id = ready_lobby(&first).await;

    let after = MockControl::default();
    let second = manager_with(repo, after.clone());
    second.delete(id).await.unwrap();

    assert_eq!(before.ends(), 0);
    assert_eq!(after.attaches(), 1);
    assert_eq!(after.setups(), 0);
    assert_eq!(after.ended_lobbies(), vec![id]);
    assert!(second.repository().0.is_empty());
}

#[tokio::test]
async fn test_close_after_restart_releases_server_once() {
    let repo = SharedRepo::default();
    let first = manager_with(repo.clone(), MockControl::default());
    let id = ready_lobby(&first).await;
    first.assign_player(id, pid(1), 0).await.unwrap();

    let after = MockControl::default();
    let second = manager_with(repo, after.clone());
    second.close(id).await.unwrap();
    second.close(id).await.unwrap();

    assert_eq!(after.ends(), 1);
    assert!(!second.has_server(id));
    assert_eq!(state_of(&second, id).await, LobbyState::Ended);
    assert_eq!(second.lobby_of(pid(1)), None);
}

#[tokio::test]
async fn test_delete_after_restart_without_server_info_attaches_nothing() {
    let repo = SharedRepo::default();
    let first = manager_with(repo.clone(), MockControl::default());
    let id = first
        .create(NewLobby::new("koth_product", LobbyType::Highlander))
        .await
        .unwrap();

    let after = MockControl::default();
    let second = manager_with(repo, after.clone());
    second.delete(id).await.unwrap();

    assert_eq!(after.attaches(), 0);
    assert_eq!(after.ends(), 0);
}

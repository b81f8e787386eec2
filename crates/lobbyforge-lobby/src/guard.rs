//! The provisioning guard: at most one server setup per lobby at a time.
//!
//! Two requests (a create racing a reload, a double click on "start")
//! can ask to provision the same lobby concurrently. The guard turns the
//! "is anyone already doing this?" check and the "I'm doing it now" mark
//! into a single step under one lock, so exactly one caller wins and the
//! others are rejected immediately instead of queueing.
//!
//! # Permits
//!
//! [`ProvisioningGuard::try_begin`] hands out a [`SetupPermit`]. Dropping
//! the permit ends the attempt, whether setup succeeded, failed, panicked,
//! or the future was cancelled. A permit only removes the entry it
//! created: if the entry was ended explicitly and a newer attempt began,
//! the old permit leaves the new entry alone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lobbyforge_model::LobbyId;

use crate::LobbyError;

#[derive(Debug, Clone, Copy)]
struct Entry {
    started_at: Instant,
    ticket: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<LobbyId, Entry>,
    next_ticket: u64,
}

/// Registry of provisioning attempts currently in flight.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningGuard {
    inner: Arc<Mutex<Inner>>,
    stale_after: Option<Duration>,
}

impl ProvisioningGuard {
    /// A guard whose entries never go stale.
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard that treats attempts older than `stale_after` as abandoned.
    pub fn with_timeout(stale_after: Option<Duration>) -> Self {
        Self {
            inner: Arc::default(),
            stale_after,
        }
    }

    /// Marks a setup of `lobby_id` as started.
    ///
    /// # Errors
    /// [`LobbyError::SetupInProgress`] if a live attempt already exists.
    pub fn try_begin(&self, lobby_id: LobbyId) -> Result<SetupPermit, LobbyError> {
        let mut inner = self.lock();
        let now = Instant::now();

        if let Some(existing) = inner.entries.get(&lobby_id) {
            let age = now.saturating_duration_since(existing.started_at);
            match self.stale_after {
                Some(limit) if age >= limit => {
                    tracing::warn!(
                        %lobby_id,
                        age_secs = age.as_secs(),
                        "replacing stale provisioning attempt"
                    );
                }
                _ => return Err(LobbyError::SetupInProgress(lobby_id)),
            }
        }

        inner.next_ticket += 1;
        let ticket = inner.next_ticket;
        inner.entries.insert(
            lobby_id,
            Entry {
                started_at: now,
                ticket,
            },
        );
        tracing::debug!(%lobby_id, ticket, "provisioning attempt started");

        Ok(SetupPermit {
            guard: self.clone(),
            lobby_id,
            ticket,
        })
    }

    /// Ends any attempt for `lobby_id`. Idempotent.
    pub fn end(&self, lobby_id: LobbyId) {
        self.lock().entries.remove(&lobby_id);
    }

    /// Returns `true` if an attempt for `lobby_id` is in flight.
    pub fn is_in_flight(&self, lobby_id: LobbyId) -> bool {
        self.lock().entries.contains_key(&lobby_id)
    }

    /// When the in-flight attempt for `lobby_id` started, if any.
    pub fn started_at(&self, lobby_id: LobbyId) -> Option<Instant> {
        self.lock().entries.get(&lobby_id).map(|e| e.started_at)
    }

    /// Number of attempts in flight.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every attempt.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn finish(&self, lobby_id: LobbyId, ticket: u64) {
        let mut inner = self.lock();
        if inner.entries.get(&lobby_id).is_some_and(|e| e.ticket == ticket) {
            inner.entries.remove(&lobby_id);
            tracing::debug!(%lobby_id, ticket, "provisioning attempt ended");
        }
    }

    // A panic while holding the lock can't leave the map half-updated:
    // every critical section is a single insert or remove.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the holder owns the provisioning attempt of one lobby.
///
/// The attempt ends when the permit is dropped.
#[derive(Debug)]
#[must_use = "dropping the permit ends the provisioning attempt"]
pub struct SetupPermit {
    guard: ProvisioningGuard,
    lobby_id: LobbyId,
    ticket: u64,
}

impl SetupPermit {
    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }
}

impl Drop for SetupPermit {
    fn drop(&mut self) {
        self.guard.finish(self.lobby_id, self.ticket);
    }
}

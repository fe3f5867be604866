//! SessionGate: enforces at most one active session.
//!
//! Glide drives a single pointer, so two phones steering it at once would
//! fight each other.  The gate holds one slot.  The listener calls
//! [`SessionGate::try_acquire`] after authenticating a handshake; a second
//! phone arriving while the slot is taken gets [`SessionBusy`] and is told so
//! with a `connect_error{reason:"busy"}` event.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//! inbound connection ──► handshake authenticated ──► lease acquired (active)
//!                                                           │
//!                                      disconnect / close / host shutdown
//!                                                           │
//!                                                  lease dropped (slot free)
//! ```
//!
//! The slot is released when the [`SessionLease`] is dropped, so every exit
//! path of the session task frees it, including panics and aborts.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

/// A second session was attempted while one is active.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("session {active} is already active")]
pub struct SessionBusy {
    pub active: Uuid,
}

/// Snapshot of an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub peer: SocketAddr,
    pub authenticated: bool,
    pub started_at: Instant,
}

struct Slot {
    session: Session,
    close: Arc<Notify>,
}

/// Single-slot registry of the active session.
#[derive(Clone, Default)]
pub struct SessionGate {
    slot: Arc<Mutex<Option<Slot>>>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for an authenticated peer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionBusy`] if another session holds the slot.
    pub fn try_acquire(&self, peer: SocketAddr) -> Result<SessionLease, SessionBusy> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return Err(SessionBusy {
                active: existing.session.id,
            });
        }

        let session = Session {
            id: Uuid::new_v4(),
            peer,
            authenticated: true,
            started_at: Instant::now(),
        };
        let close = Arc::new(Notify::new());
        *slot = Some(Slot {
            session: session.clone(),
            close: Arc::clone(&close),
        });
        info!("session {}: active for {peer}", session.id);

        Ok(SessionLease {
            session,
            close,
            gate: self.clone(),
        })
    }

    /// Returns the active session, if any.
    pub fn active(&self) -> Option<Session> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|slot| slot.session.clone())
    }

    /// Asks the active session to close.  Returns `false` when none is active.
    pub fn close_active(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(slot) => {
                debug!("session {}: close requested", slot.session.id);
                // notify_one stores a permit, so the request is not lost if the
                // session task is not waiting yet.
                slot.close.notify_one();
                true
            }
            None => false,
        }
    }

    fn release(&self, id: Uuid) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|s| s.session.id == id) {
            *slot = None;
        }
    }
}

/// Ownership of the single session slot.  Dropping it frees the slot.
pub struct SessionLease {
    session: Session,
    close: Arc<Notify>,
    gate: SessionGate,
}

impl SessionLease {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn id(&self) -> Uuid {
        self.session.id
    }

    /// Resolves when [`SessionGate::close_active`] targets this session.
    pub async fn close_requested(&self) {
        self.close.notified().await;
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.gate.release(self.session.id);
        info!(
            "session {}: ended after {:.1}s",
            self.session.id,
            self.session.started_at.elapsed().as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 50], port))
    }

    #[test]
    fn test_first_acquire_succeeds() {
        // Arrange
        let gate = SessionGate::new();

        // Act
        let lease = gate.try_acquire(peer(50000)).unwrap();

        // Assert
        let active = gate.active().unwrap();
        assert_eq!(active.id, lease.id());
        assert!(active.authenticated);
        assert_eq!(active.peer, peer(50000));
    }

    #[test]
    fn test_second_acquire_is_busy() {
        let gate = SessionGate::new();
        let lease = gate.try_acquire(peer(50000)).unwrap();

        let second = gate.try_acquire(peer(50001));

        assert_eq!(second.err(), Some(SessionBusy { active: lease.id() }));
    }

    #[test]
    fn test_dropping_lease_frees_slot() {
        let gate = SessionGate::new();
        let lease = gate.try_acquire(peer(50000)).unwrap();
        drop(lease);

        assert!(gate.active().is_none());
        assert!(gate.try_acquire(peer(50001)).is_ok());
    }

    #[test]
    fn test_close_active_without_session_returns_false() {
        assert!(!SessionGate::new().close_active());
    }

    #[tokio::test]
    async fn test_close_request_reaches_lease_even_if_sent_first() {
        // Arrange
        let gate = SessionGate::new();
        let lease = gate.try_acquire(peer(50000)).unwrap();

        // Act – request before anyone waits
        assert!(gate.close_active());

        // Assert
        tokio::time::timeout(Duration::from_secs(1), lease.close_requested())
            .await
            .expect("close request must be delivered");
    }
}

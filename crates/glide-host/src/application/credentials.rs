//! CredentialManager: owns the active six-digit credential.
//!
//! The host creates one manager at startup.  It is shared (via `Arc`) with the
//! listener, which verifies every handshake against it, and with the pairing
//! display, which shows the current value.
//!
//! # Rotation and in-flight handshakes (for beginners)
//!
//! Verifying a credential and admitting the session are two separate steps:
//! the credential is checked when the WebSocket upgrade request arrives, and
//! the session is admitted a few round-trips later.  If the operator rotates
//! the credential in between, the old value must stop working.
//!
//! Every rotation bumps an *epoch* counter.  [`CredentialManager::verify`]
//! returns an [`AuthTicket`] stamped with the epoch it verified against, and
//! the listener calls [`CredentialManager::is_current`] just before admitting
//! the session.  A stale ticket means the handshake is rejected.
//!
//! Sessions that were already admitted are not affected by rotation.

use std::sync::{PoisonError, RwLock};

use glide_core::Credential;
use rand::rngs::OsRng;
use rand::Rng;
use thiserror::Error;
use tracing::info;

/// Lowest generated code.  Codes never start with `0`, so the value reads the
/// same whether it is typed into a text or a numeric field.
const CODE_MIN: u32 = 100_000;
/// Highest generated code (inclusive).
const CODE_MAX: u32 = 999_999;

/// Handshake authentication failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The handshake carried no credential at all.
    #[error("no credential presented")]
    Missing,

    /// The presented credential differs from the active one.
    #[error("credential mismatch")]
    Mismatch,

    /// The credential was rotated after verification but before the session
    /// was admitted.
    #[error("credential rotated during handshake")]
    Rotated,
}

/// Proof that a handshake presented the credential of a given epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthTicket {
    epoch: u64,
}

impl AuthTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

struct State {
    credential: Credential,
    epoch: u64,
}

/// Holds the active credential for the lifetime of the host process.
pub struct CredentialManager {
    state: RwLock<State>,
}

impl CredentialManager {
    /// Creates a manager holding a freshly generated credential.
    pub fn new() -> Self {
        Self::with_credential(Self::generate())
    }

    /// Creates a manager holding a specific credential.
    ///
    /// Used by tests and by `--pin` on the command line.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            state: RwLock::new(State {
                credential,
                epoch: 0,
            }),
        }
    }

    /// Draws a new credential from the operating system's random source.
    pub fn generate() -> Credential {
        let code = OsRng.gen_range(CODE_MIN..=CODE_MAX);
        // The range above always fits in six digits.
        Credential::from_code(code).unwrap_or_else(|_| unreachable!("code {code} out of range"))
    }

    /// Returns a copy of the active credential.
    pub fn current(&self) -> Credential {
        self.read(|state| state.credential.clone())
    }

    /// Returns the current rotation epoch.
    pub fn epoch(&self) -> u64 {
        self.read(|state| state.epoch)
    }

    /// Replaces the active credential with a fresh one and returns it.
    ///
    /// Handshakes holding a ticket from before this call will fail
    /// [`is_current`](Self::is_current).
    pub fn rotate(&self) -> Credential {
        let credential = Self::generate();
        let epoch = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.credential = credential.clone();
            state.epoch += 1;
            state.epoch
        };
        info!("credential rotated (epoch {epoch})");
        credential
    }

    /// Checks a credential presented during a handshake.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Missing`] when `presented` is `None` and
    /// [`AuthError::Mismatch`] when it differs from the active credential.
    pub fn verify(&self, presented: Option<&str>) -> Result<AuthTicket, AuthError> {
        let presented = presented.ok_or(AuthError::Missing)?;
        self.read(|state| {
            if state.credential.matches(presented) {
                Ok(AuthTicket { epoch: state.epoch })
            } else {
                Err(AuthError::Mismatch)
            }
        })
    }

    /// Returns `Ok` if no rotation happened since `ticket` was issued.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rotated`] for a stale ticket.
    pub fn is_current(&self, ticket: AuthTicket) -> Result<(), AuthError> {
        if self.epoch() == ticket.epoch {
            Ok(())
        } else {
            Err(AuthError::Rotated)
        }
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(pin: &str) -> CredentialManager {
        CredentialManager::with_credential(Credential::parse(pin).unwrap())
    }

    #[test]
    fn test_generate_returns_six_digits_without_leading_zero() {
        for _ in 0..1_000 {
            let credential = CredentialManager::generate();
            let digits = credential.as_str();
            assert_eq!(digits.len(), 6, "credential must be exactly 6 digits");
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(digits.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_generate_is_not_constant() {
        let first = CredentialManager::generate();
        let differs = (0..50).any(|_| CredentialManager::generate() != first);
        assert!(differs, "50 draws all equal to the first one");
    }

    #[test]
    fn test_verify_accepts_exact_match() {
        // Arrange
        let mgr = manager("482913");

        // Act
        let ticket = mgr.verify(Some("482913"));

        // Assert
        assert!(ticket.is_ok());
    }

    #[test]
    fn test_verify_rejects_one_digit_off() {
        let mgr = manager("482913");
        assert_eq!(mgr.verify(Some("482914")), Err(AuthError::Mismatch));
        assert_eq!(mgr.verify(Some("382913")), Err(AuthError::Mismatch));
    }

    #[test]
    fn test_verify_rejects_missing_and_padded() {
        let mgr = manager("482913");
        assert_eq!(mgr.verify(None), Err(AuthError::Missing));
        assert_eq!(mgr.verify(Some(" 482913")), Err(AuthError::Mismatch));
        assert_eq!(mgr.verify(Some("")), Err(AuthError::Mismatch));
    }

    #[test]
    fn test_rotate_invalidates_old_value_and_bumps_epoch() {
        // Arrange
        let mgr = manager("482913");
        let old = mgr.current();

        // Act
        let new = loop {
            // A fresh draw may collide with the old value; retry until it differs.
            let candidate = mgr.rotate();
            if candidate != old {
                break candidate;
            }
        };

        // Assert
        assert_eq!(mgr.current(), new);
        assert!(mgr.epoch() >= 1);
        assert_eq!(mgr.verify(Some(old.as_str())), Err(AuthError::Mismatch));
        assert!(mgr.verify(Some(new.as_str())).is_ok());
    }

    #[test]
    fn test_ticket_issued_before_rotation_is_stale() {
        // Arrange
        let mgr = manager("482913");
        let ticket = mgr.verify(Some("482913")).unwrap();
        assert!(mgr.is_current(ticket).is_ok());

        // Act
        mgr.rotate();

        // Assert
        assert_eq!(mgr.is_current(ticket), Err(AuthError::Rotated));
    }
}

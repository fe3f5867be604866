//! CommandDispatcher: applies semantic commands to the input-injection surface.
//!
//! This use case sits at the application layer and delegates to an
//! [`InjectionSurface`] trait object for OS-level pointer and key injection.
//! OS backends live outside this crate; the infrastructure layer ships a
//! recording surface for headless runs and tests.
//!
//! # Serialization (for beginners)
//!
//! A `MoveDelta` is a read-modify-write on shared OS state: read the pointer
//! position, add the delta, write it back.  Two of them interleaving would
//! lose one delta.  So every command runs under a single global mutex, one
//! fully applied before the next starts.
//!
//! OS injection calls block, so each command is sent to Tokio's blocking
//! pool with `spawn_blocking`.  The mutex is taken *inside* the blocking
//! closure, not around the `.await`.  If the awaiting task is aborted (the
//! session closed mid-command) the blocking call still runs to completion
//! while holding the lock, and the next command waits for it.  A delta is
//! therefore applied whole or not at all.
//!
//! # Sub-pixel motion
//!
//! The OS pointer lives on whole pixels but deltas are fractional.  The part
//! a move could not apply is kept under the same lock and added to the next
//! delta, so ten moves of 1.4 px travel 14 px, not 10.  The remainder is
//! cleared when a new session starts draining.
//!
//! # Failure policy
//!
//! Injection failures are logged and counted; the dispatcher moves on to the
//! next command.  A stuck click is not worth dropping the session for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use glide_core::SemanticCommand;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Error type for input injection operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InjectionError {
    /// The OS rejected or failed the injection call.
    #[error("platform error: {0}")]
    Platform(String),

    /// The injection surface is not available (no display, no permission).
    #[error("injection surface unavailable")]
    Unavailable,

    /// The blocking injection task panicked or was cancelled by the runtime.
    #[error("injection task failed: {0}")]
    TaskFailed(String),
}

/// Media keys the surface must be able to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    VolumeUp,
    VolumeDown,
}

/// Platform-agnostic input injection trait.
///
/// Implementations are synchronous and may block; the dispatcher calls them
/// from the blocking pool and never concurrently.
#[cfg_attr(test, mockall::automock)]
pub trait InjectionSurface: Send + Sync {
    /// Returns the current pointer position in screen pixels.
    fn pointer_position(&self) -> Result<(i32, i32), InjectionError>;

    /// Moves the pointer to an absolute position in screen pixels.
    fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), InjectionError>;

    /// Presses and releases the left button.
    fn click_left(&self) -> Result<(), InjectionError>;

    /// Presses and releases the right button.
    fn click_right(&self) -> Result<(), InjectionError>;

    /// Presses and releases a media key.
    fn press_media_key(&self, key: MediaKey) -> Result<(), InjectionError>;
}

/// Motion not yet applied because the pointer moves in whole pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Remainder {
    x: f64,
    y: f64,
}

/// Applies one command synchronously.  Callers must hold the injection lock,
/// which also guards `remainder`.
fn apply(
    surface: &dyn InjectionSurface,
    command: SemanticCommand,
    remainder: &mut Remainder,
) -> Result<(), InjectionError> {
    match command {
        SemanticCommand::MoveDelta { dx, dy } => {
            let (x, y) = surface.pointer_position()?;
            let wanted_x = dx + remainder.x;
            let wanted_y = dy + remainder.y;
            let step_x = wanted_x.round();
            let step_y = wanted_y.round();
            surface.set_pointer_position(x + step_x as i32, y + step_y as i32)?;
            *remainder = Remainder {
                x: wanted_x - step_x,
                y: wanted_y - step_y,
            };
            Ok(())
        }
        SemanticCommand::ClickLeft => surface.click_left(),
        SemanticCommand::ClickRight => surface.click_right(),
        SemanticCommand::VolumeUp => surface.press_media_key(MediaKey::VolumeUp),
        SemanticCommand::VolumeDown => surface.press_media_key(MediaKey::VolumeDown),
    }
}

/// Counters kept across the dispatcher's lifetime.
#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of the dispatcher counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub applied: u64,
    pub failed: u64,
}

/// The Command Dispatcher use case.
///
/// Cheap to clone; clones share the surface, the injection lock and the
/// counters.
#[derive(Clone)]
pub struct CommandDispatcher {
    surface: Arc<dyn InjectionSurface>,
    lock: Arc<Mutex<Remainder>>,
    counters: Arc<Counters>,
}

impl CommandDispatcher {
    /// Creates a new dispatcher over the given surface.
    pub fn new(surface: Arc<dyn InjectionSurface>) -> Self {
        Self {
            surface,
            lock: Arc::new(Mutex::new(Remainder::default())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Applies one command and waits until it has been fully applied.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if the surface fails or the blocking task
    /// cannot complete.
    pub async fn dispatch(&self, command: SemanticCommand) -> Result<(), InjectionError> {
        let surface = Arc::clone(&self.surface);
        let lock = Arc::clone(&self.lock);

        let result = tokio::task::spawn_blocking(move || {
            let mut remainder = lock.lock().unwrap_or_else(PoisonError::into_inner);
            apply(surface.as_ref(), command, &mut remainder)
        })
        .await
        .map_err(|e| InjectionError::TaskFailed(e.to_string()))
        .and_then(|r| r);

        match &result {
            Ok(()) => {
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Drains commands for one session until the channel closes.
    ///
    /// Commands are applied in arrival order.  Failures are logged and the
    /// loop continues.
    pub async fn run_session(&self, session_id: Uuid, mut commands: mpsc::Receiver<SemanticCommand>) {
        self.clear_remainder();
        while let Some(command) = commands.recv().await {
            if command.is_motion() {
                trace!("session {session_id}: {command:?}");
            } else {
                debug!("session {session_id}: {}", command.name());
            }

            if let Err(e) = self.dispatch(command).await {
                warn!("session {session_id}: {} failed: {e}", command.name());
            }
        }
        let stats = self.stats();
        debug!(
            "session {session_id}: command stream closed ({} applied, {} failed so far)",
            stats.applied, stats.failed
        );
    }

    /// Drops sub-pixel motion left over from an earlier session.
    fn clear_remainder(&self) {
        *self.lock.lock().unwrap_or_else(PoisonError::into_inner) = Remainder::default();
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::{predicate::eq, Sequence};
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::infrastructure::injection::recording::RecordingSurface;

    fn dispatcher(mock: MockInjectionSurface) -> CommandDispatcher {
        CommandDispatcher::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn test_move_delta_reads_then_writes_offset_position() {
        // Arrange
        let mut mock = MockInjectionSurface::new();
        let mut seq = Sequence::new();
        mock.expect_pointer_position()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok((500, 300)));
        mock.expect_set_pointer_position()
            .with(eq(510), eq(296))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        // Act
        let result = dispatcher(mock)
            .dispatch(SemanticCommand::MoveDelta { dx: 10.0, dy: -4.0 })
            .await;

        // Assert
        assert_ok!(result);
    }

    #[tokio::test]
    async fn test_fractional_delta_is_rounded() {
        let mut mock = MockInjectionSurface::new();
        mock.expect_pointer_position().returning(|| Ok((100, 100)));
        mock.expect_set_pointer_position()
            .with(eq(103), eq(98))
            .times(1)
            .returning(|_, _| Ok(()));

        let result = dispatcher(mock)
            .dispatch(SemanticCommand::MoveDelta { dx: 2.6, dy: -1.6 })
            .await;

        assert_ok!(result);
    }

    #[tokio::test]
    async fn test_sub_pixel_motion_carries_into_next_delta() {
        // Arrange
        let surface = Arc::new(RecordingSurface::new(1920, 1080));
        surface.place_pointer(500, 500);
        let dispatcher = CommandDispatcher::new(surface.clone());

        // Act
        for _ in 0..10 {
            assert_ok!(dispatcher.dispatch(SemanticCommand::MoveDelta { dx: 1.4, dy: -0.3 }).await);
        }

        // Assert
        assert_eq!(surface.position(), (514, 497));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_remainder_unchanged() {
        // Arrange: 0.6 rounds to 1 and leaves -0.4; the failed write must not
        // consume it, so the retry after it still lands one pixel over.
        let mut mock = MockInjectionSurface::new();
        mock.expect_pointer_position().returning(|| Ok((100, 100)));
        let mut seq = Sequence::new();
        mock.expect_set_pointer_position()
            .with(eq(101), eq(100))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(InjectionError::Platform("busy".into())));
        mock.expect_set_pointer_position()
            .with(eq(101), eq(100))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        let dispatcher = dispatcher(mock);

        // Act
        let first = dispatcher.dispatch(SemanticCommand::MoveDelta { dx: 0.6, dy: 0.0 }).await;
        let second = dispatcher.dispatch(SemanticCommand::MoveDelta { dx: 0.6, dy: 0.0 }).await;

        // Assert
        assert_err!(first);
        assert_ok!(second);
    }

    #[tokio::test]
    async fn test_new_session_starts_without_leftover_motion() {
        let surface = Arc::new(RecordingSurface::new(1920, 1080));
        surface.place_pointer(500, 500);
        let dispatcher = CommandDispatcher::new(surface.clone());
        // Leaves +0.4 behind.
        assert_ok!(dispatcher.dispatch(SemanticCommand::MoveDelta { dx: 1.4, dy: 0.0 }).await);

        let (tx, rx) = mpsc::channel(8);
        tx.send(SemanticCommand::MoveDelta { dx: 1.4, dy: 0.0 }).await.unwrap();
        drop(tx);
        dispatcher.run_session(Uuid::new_v4(), rx).await;

        // 501 + round(1.4), not 501 + round(1.8)
        assert_eq!(surface.position(), (502, 500));
    }

    #[tokio::test]
    async fn test_clicks_and_volume_map_to_primitives() {
        // Arrange
        let mut mock = MockInjectionSurface::new();
        mock.expect_click_left().times(1).returning(|| Ok(()));
        mock.expect_click_right().times(1).returning(|| Ok(()));
        mock.expect_press_media_key()
            .with(eq(MediaKey::VolumeUp))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_press_media_key()
            .with(eq(MediaKey::VolumeDown))
            .times(1)
            .returning(|_| Ok(()));
        let dispatcher = dispatcher(mock);

        // Act / Assert
        for command in [
            SemanticCommand::ClickLeft,
            SemanticCommand::ClickRight,
            SemanticCommand::VolumeUp,
            SemanticCommand::VolumeDown,
        ] {
            assert_ok!(dispatcher.dispatch(command).await);
        }
        assert_eq!(dispatcher.stats(), DispatchStats { applied: 4, failed: 0 });
    }

    #[tokio::test]
    async fn test_duplicate_click_left_clicks_twice() {
        let mut mock = MockInjectionSurface::new();
        mock.expect_click_left().times(2).returning(|| Ok(()));
        let dispatcher = dispatcher(mock);

        assert_ok!(dispatcher.dispatch(SemanticCommand::ClickLeft).await);
        assert_ok!(dispatcher.dispatch(SemanticCommand::ClickLeft).await);
    }

    #[tokio::test]
    async fn test_failed_read_skips_write() {
        let mut mock = MockInjectionSurface::new();
        mock.expect_pointer_position()
            .returning(|| Err(InjectionError::Unavailable));
        mock.expect_set_pointer_position().never();

        let result = dispatcher(mock)
            .dispatch(SemanticCommand::MoveDelta { dx: 1.0, dy: 1.0 })
            .await;

        assert_eq!(assert_err!(result), InjectionError::Unavailable);
    }

    #[tokio::test]
    async fn test_run_session_continues_after_failure() {
        // Arrange – first click fails, the volume key after it must still be applied
        let mut mock = MockInjectionSurface::new();
        mock.expect_click_left()
            .times(1)
            .returning(|| Err(InjectionError::Platform("denied".into())));
        mock.expect_press_media_key()
            .with(eq(MediaKey::VolumeUp))
            .times(1)
            .returning(|_| Ok(()));
        let dispatcher = dispatcher(mock);
        let (tx, rx) = mpsc::channel(8);

        // Act
        tx.send(SemanticCommand::ClickLeft).await.unwrap();
        tx.send(SemanticCommand::VolumeUp).await.unwrap();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), dispatcher.run_session(Uuid::new_v4(), rx))
            .await
            .expect("run_session must end when the channel closes");

        // Assert
        assert_eq!(dispatcher.stats(), DispatchStats { applied: 1, failed: 1 });
    }
}

//! Recording injection surface.
//!
//! # Why a recording surface?
//!
//! Real injection backends make OS calls that:
//!
//! - Require a physical desktop session to run.
//! - Actually move the cursor or press keys on the machine running them.
//! - Cannot be observed directly from Rust test code.
//!
//! `RecordingSurface` keeps a virtual pointer inside a virtual screen and
//! pushes every injected action into a `Mutex<Vec<...>>`, so tests (and a
//! headless host run) can see exactly what was applied and in what order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` to make every method return
//! [`InjectionError::Platform`].  This exercises the dispatcher's
//! log-and-continue path without a broken OS.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::application::dispatch_commands::{InjectionError, InjectionSurface, MediaKey};

/// One action applied to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injected {
    PointerMoved { x: i32, y: i32 },
    ClickLeft,
    ClickRight,
    MediaKey(MediaKey),
}

/// A virtual screen with a pointer that records every injected action.
pub struct RecordingSurface {
    width: i32,
    height: i32,
    position: Mutex<(i32, i32)>,
    log: Mutex<Vec<Injected>>,
    /// When `true`, every method immediately returns an error.
    pub should_fail: bool,
}

impl RecordingSurface {
    /// Creates a `width` × `height` virtual screen with the pointer centred.
    pub fn new(width: u32, height: u32) -> Self {
        let width = i32::try_from(width).unwrap_or(i32::MAX).max(1);
        let height = i32::try_from(height).unwrap_or(i32::MAX).max(1);
        Self {
            width,
            height,
            position: Mutex::new((width / 2, height / 2)),
            log: Mutex::new(Vec::new()),
            should_fail: false,
        }
    }

    /// A 1920 × 1080 screen.
    pub fn full_hd() -> Self {
        Self::new(1920, 1080)
    }

    /// Places the pointer without recording an action.
    pub fn place_pointer(&self, x: i32, y: i32) {
        *lock(&self.position) = (x, y);
    }

    /// Current virtual pointer position.
    pub fn position(&self) -> (i32, i32) {
        *lock(&self.position)
    }

    /// Copy of every recorded action, oldest first.
    pub fn injected(&self) -> Vec<Injected> {
        lock(&self.log).clone()
    }

    /// Number of recorded clicks (left, right).
    pub fn click_counts(&self) -> (usize, usize) {
        let log = lock(&self.log);
        let left = log.iter().filter(|a| **a == Injected::ClickLeft).count();
        let right = log.iter().filter(|a| **a == Injected::ClickRight).count();
        (left, right)
    }

    fn check(&self) -> Result<(), InjectionError> {
        if self.should_fail {
            Err(InjectionError::Platform("recording surface set to fail".into()))
        } else {
            Ok(())
        }
    }

    fn record(&self, action: Injected) {
        debug!("injected {action:?}");
        lock(&self.log).push(action);
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::full_hd()
    }
}

impl InjectionSurface for RecordingSurface {
    fn pointer_position(&self) -> Result<(i32, i32), InjectionError> {
        self.check()?;
        Ok(self.position())
    }

    /// Clamps to the virtual screen, like an OS cursor at the screen edge.
    fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        self.check()?;
        let clamped = (x.clamp(0, self.width - 1), y.clamp(0, self.height - 1));
        *lock(&self.position) = clamped;
        self.record(Injected::PointerMoved {
            x: clamped.0,
            y: clamped.1,
        });
        Ok(())
    }

    fn click_left(&self) -> Result<(), InjectionError> {
        self.check()?;
        self.record(Injected::ClickLeft);
        Ok(())
    }

    fn click_right(&self) -> Result<(), InjectionError> {
        self.check()?;
        self.record(Injected::ClickRight);
        Ok(())
    }

    fn press_media_key(&self, key: MediaKey) -> Result<(), InjectionError> {
        self.check()?;
        self.record(Injected::MediaKey(key));
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

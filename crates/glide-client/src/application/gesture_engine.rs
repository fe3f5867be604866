//! GestureEngine: turns raw multi-touch pointer streams into semantic commands.
//!
//! The engine is a small synchronous state machine.  The UI (or the headless
//! script driver) feeds it [`PointerEvent`]s in delivery order and sends
//! whatever [`SemanticCommand`] comes back to the host.
//!
//! # Rules (for beginners)
//!
//! A *gesture* starts when the first finger touches the surface and ends when
//! the last finger lifts.  The first finger of a gesture is the *primary*
//! contact.
//!
//! - **Move**: while the primary contact is the only finger down, every move
//!   produces `MoveDelta{(current - last) * sensitivity}` if the scaled
//!   distance exceeds `min_movement`.  Any finger moving that far marks the
//!   gesture as "moved".
//! - **Tap**: when the last finger lifts, a gesture that never moved, was
//!   shorter than `tap_threshold`, and had at most one finger down at any
//!   time is a left click.  The same with two fingers at its peak is a right
//!   click.  Anything else produces nothing.
//!
//! The peak finger count matters, not the count at release: two fingers
//! lifting one after the other is still a two-finger tap.
//!
//! ```text
//!  down(1)      down(2)   up(1)  up(2)
//!    │────────────│─────────│──────│        peak = 2, < 200 ms, no motion
//!                                   └──▶ ClickRight
//! ```

use std::collections::HashMap;
use std::time::Duration;

use glide_core::{Contact, ContactId, SemanticCommand};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Tunable thresholds for gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Multiplier from surface pixels to host pixels.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Longest gesture, in milliseconds, that still counts as a tap.
    #[serde(default = "default_tap_threshold_ms")]
    pub tap_threshold_ms: u64,
    /// Smallest scaled movement that counts as motion.
    #[serde(default = "default_min_movement")]
    pub min_movement: f64,
}

fn default_sensitivity() -> f64 {
    2.0
}
fn default_tap_threshold_ms() -> u64 {
    200
}
fn default_min_movement() -> f64 {
    1.0
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            tap_threshold_ms: default_tap_threshold_ms(),
            min_movement: default_min_movement(),
        }
    }
}

impl GestureConfig {
    pub fn tap_threshold(&self) -> Duration {
        Duration::from_millis(self.tap_threshold_ms)
    }
}

// ── Input events ──────────────────────────────────────────────────────────────

/// One raw event from the touch surface.
///
/// `at` is a monotonic timestamp from the event source; only differences
/// between timestamps matter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { id: ContactId, x: f64, y: f64, at: Duration },
    Move { id: ContactId, x: f64, y: f64, at: Duration },
    Up { id: ContactId, x: f64, y: f64, at: Duration },
    /// The platform took the contact away (e.g. a system gesture).
    Cancel { id: ContactId, at: Duration },
}

impl PointerEvent {
    pub fn id(&self) -> ContactId {
        match *self {
            PointerEvent::Down { id, .. }
            | PointerEvent::Move { id, .. }
            | PointerEvent::Up { id, .. }
            | PointerEvent::Cancel { id, .. } => id,
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// State of the gesture in progress.
///
/// Reset whenever a contact lands on an empty surface.
#[derive(Debug, Clone, Copy)]
struct Gesture {
    primary: ContactId,
    started_at: Duration,
    last_position: (f64, f64),
    has_moved: bool,
    peak_contacts: usize,
    cancelled: bool,
}

/// The gesture recognition state machine.
#[derive(Debug)]
pub struct GestureEngine {
    config: GestureConfig,
    contacts: HashMap<ContactId, Contact>,
    gesture: Option<Gesture>,
}

impl GestureEngine {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            contacts: HashMap::new(),
            gesture: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Number of contacts currently down.
    pub fn live_contacts(&self) -> usize {
        self.contacts.len()
    }

    /// Highest number of simultaneous contacts in the current gesture.
    pub fn peak_contacts(&self) -> usize {
        self.gesture.map_or(0, |g| g.peak_contacts)
    }

    /// Processes one pointer event and returns the command it produces, if any.
    pub fn handle(&mut self, event: PointerEvent) -> Option<SemanticCommand> {
        match event {
            PointerEvent::Down { id, x, y, at } => {
                self.contact_down(id, x, y, at);
                None
            }
            PointerEvent::Move { id, x, y, .. } => self.contact_moved(id, x, y),
            PointerEvent::Up { id, at, .. } => self.contact_released(id, at, false),
            PointerEvent::Cancel { id, at } => self.contact_released(id, at, true),
        }
    }

    fn contact_down(&mut self, id: ContactId, x: f64, y: f64, at: Duration) {
        let contact = Contact::new(id, x, y, at);

        if self.contacts.insert(id, contact).is_some() {
            // The surface never told us this contact lifted.
            warn!("contact {} went down twice; replacing it", id.0);
            if let Some(gesture) = self.gesture.as_mut().filter(|g| g.primary == id) {
                gesture.last_position = (x, y);
            }
            return;
        }

        match self.gesture.as_mut() {
            Some(gesture) if self.contacts.len() > 1 => {
                gesture.peak_contacts = gesture.peak_contacts.max(self.contacts.len());
            }
            _ => {
                debug!("gesture started by contact {}", id.0);
                self.gesture = Some(Gesture {
                    primary: id,
                    started_at: at,
                    last_position: (x, y),
                    has_moved: false,
                    peak_contacts: 1,
                    cancelled: false,
                });
            }
        }
    }

    fn contact_moved(&mut self, id: ContactId, x: f64, y: f64) -> Option<SemanticCommand> {
        let single = self.contacts.len() == 1;
        let sensitivity = self.config.sensitivity;
        let min_movement = self.config.min_movement;

        let contact = self.contacts.get_mut(&id)?;
        let gesture = self.gesture.as_mut()?;

        if id != gesture.primary {
            if contact.distance_to(x, y) * sensitivity > min_movement {
                gesture.has_moved = true;
            }
            contact.x = x;
            contact.y = y;
            return None;
        }

        let (last_x, last_y) = gesture.last_position;
        let dx = (x - last_x) * sensitivity;
        let dy = (y - last_y) * sensitivity;
        gesture.last_position = (x, y);
        contact.x = x;
        contact.y = y;

        if dx.hypot(dy) <= min_movement {
            return None;
        }
        gesture.has_moved = true;

        single.then_some(SemanticCommand::MoveDelta { dx, dy })
    }

    fn contact_released(
        &mut self,
        id: ContactId,
        at: Duration,
        cancelled: bool,
    ) -> Option<SemanticCommand> {
        if self.contacts.remove(&id).is_none() {
            debug!("release for unknown contact {} ignored", id.0);
            return None;
        }

        if cancelled {
            if let Some(gesture) = self.gesture.as_mut() {
                gesture.cancelled = true;
            }
        }

        if !self.contacts.is_empty() {
            return None;
        }

        let gesture = self.gesture.take()?;
        self.classify(gesture, at)
    }

    /// Decides what a finished gesture was.
    fn classify(&self, gesture: Gesture, ended_at: Duration) -> Option<SemanticCommand> {
        let duration = ended_at.saturating_sub(gesture.started_at);
        if gesture.cancelled || gesture.has_moved || duration >= self.config.tap_threshold() {
            return None;
        }

        match gesture.peak_contacts {
            1 => Some(SemanticCommand::ClickLeft),
            2 => Some(SemanticCommand::ClickRight),
            _ => None,
        }
    }
}

impl Default for GestureEngine {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn down(id: u32, x: f64, y: f64, at: u64) -> PointerEvent {
        PointerEvent::Down { id: ContactId(id), x, y, at: ms(at) }
    }

    fn mv(id: u32, x: f64, y: f64, at: u64) -> PointerEvent {
        PointerEvent::Move { id: ContactId(id), x, y, at: ms(at) }
    }

    fn up(id: u32, x: f64, y: f64, at: u64) -> PointerEvent {
        PointerEvent::Up { id: ContactId(id), x, y, at: ms(at) }
    }

    fn run(engine: &mut GestureEngine, events: &[PointerEvent]) -> Vec<SemanticCommand> {
        events.iter().filter_map(|e| engine.handle(*e)).collect()
    }

    // ── Taps ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_quick_single_tap_is_left_click() {
        // Arrange
        let mut engine = GestureEngine::default();

        // Act
        let commands = run(&mut engine, &[down(1, 50.0, 50.0, 0), up(1, 50.0, 50.0, 90)]);

        // Assert
        assert_eq!(commands, vec![SemanticCommand::ClickLeft]);
        assert_eq!(engine.live_contacts(), 0);
    }

    #[test]
    fn test_two_finger_tap_is_right_click() {
        // Arrange
        let mut engine = GestureEngine::default();

        // Act
        let commands = run(
            &mut engine,
            &[
                down(1, 10.0, 10.0, 0),
                down(2, 80.0, 10.0, 30),
                up(1, 10.0, 10.0, 120),
                up(2, 80.0, 10.0, 150),
            ],
        );

        // Assert: exactly one click, nothing on the first lift
        assert_eq!(commands, vec![SemanticCommand::ClickRight]);
    }

    #[test]
    fn test_two_finger_tap_released_in_reverse_order_is_right_click() {
        let mut engine = GestureEngine::default();

        let commands = run(
            &mut engine,
            &[
                down(1, 10.0, 10.0, 0),
                down(2, 80.0, 10.0, 20),
                up(2, 80.0, 10.0, 100),
                up(1, 10.0, 10.0, 130),
            ],
        );

        assert_eq!(commands, vec![SemanticCommand::ClickRight]);
    }

    #[test]
    fn test_slow_tap_produces_nothing() {
        let mut engine = GestureEngine::default();
        let commands = run(&mut engine, &[down(1, 5.0, 5.0, 0), up(1, 5.0, 5.0, 200)]);
        assert!(commands.is_empty());
    }

    #[test]
    fn test_three_finger_tap_produces_nothing() {
        let mut engine = GestureEngine::default();

        let commands = run(
            &mut engine,
            &[
                down(1, 10.0, 10.0, 0),
                down(2, 20.0, 10.0, 10),
                down(3, 30.0, 10.0, 20),
                up(1, 10.0, 10.0, 60),
                up(2, 20.0, 10.0, 70),
                up(3, 30.0, 10.0, 80),
            ],
        );

        assert!(commands.is_empty());
        assert_eq!(engine.peak_contacts(), 0, "gesture state is cleared");
    }

    #[test]
    fn test_tap_duration_counts_from_first_contact() {
        // Second finger lands late but the gesture started at t=0.
        let mut engine = GestureEngine::default();

        let commands = run(
            &mut engine,
            &[
                down(1, 10.0, 10.0, 0),
                down(2, 80.0, 10.0, 150),
                up(2, 80.0, 10.0, 180),
                up(1, 10.0, 10.0, 210),
            ],
        );

        assert!(commands.is_empty());
    }

    // ── Movement ──────────────────────────────────────────────────────────────

    #[test]
    fn test_single_contact_moves_emit_scaled_deltas() {
        // Arrange
        let mut engine = GestureEngine::default();
        engine.handle(down(1, 100.0, 100.0, 0));

        // Act
        let first = engine.handle(mv(1, 105.0, 98.0, 16));
        let second = engine.handle(mv(1, 106.5, 98.5, 32));

        // Assert
        assert_eq!(first, Some(SemanticCommand::MoveDelta { dx: 10.0, dy: -4.0 }));
        assert_eq!(second, Some(SemanticCommand::MoveDelta { dx: 3.0, dy: 1.0 }));
    }

    #[test]
    fn test_moved_single_contact_never_clicks() {
        let mut engine = GestureEngine::default();

        let commands = run(
            &mut engine,
            &[down(1, 0.0, 0.0, 0), mv(1, 3.0, 0.0, 20), up(1, 3.0, 0.0, 60)],
        );

        assert_eq!(commands, vec![SemanticCommand::MoveDelta { dx: 6.0, dy: 0.0 }]);
    }

    #[test]
    fn test_jitter_below_threshold_is_dropped_and_still_taps() {
        let mut engine = GestureEngine::default();

        // 0.3 px * 2.0 = 0.6 scaled px, under the 1.0 threshold
        let commands = run(
            &mut engine,
            &[down(1, 0.0, 0.0, 0), mv(1, 0.3, 0.0, 20), up(1, 0.3, 0.0, 60)],
        );

        assert_eq!(commands, vec![SemanticCommand::ClickLeft]);
    }

    #[test]
    fn test_last_position_updates_even_when_below_threshold() {
        let mut engine = GestureEngine::default();
        engine.handle(down(1, 0.0, 0.0, 0));

        assert_eq!(engine.handle(mv(1, 0.5, 0.0, 10)), None);
        // Delta is measured from 0.5, not from 0.0.
        assert_eq!(
            engine.handle(mv(1, 1.5, 0.0, 20)),
            Some(SemanticCommand::MoveDelta { dx: 2.0, dy: 0.0 })
        );
    }

    #[test]
    fn test_second_contact_suppresses_pointer_motion() {
        let mut engine = GestureEngine::default();

        let commands = run(
            &mut engine,
            &[
                down(1, 0.0, 0.0, 0),
                down(2, 50.0, 0.0, 10),
                mv(1, 10.0, 0.0, 20),
                mv(2, 60.0, 0.0, 20),
            ],
        );

        assert!(commands.is_empty());
    }

    #[test]
    fn test_two_finger_swipe_is_not_right_click() {
        let mut engine = GestureEngine::default();

        let commands = run(
            &mut engine,
            &[
                down(1, 0.0, 0.0, 0),
                down(2, 50.0, 0.0, 10),
                mv(2, 50.0, 20.0, 40),
                up(1, 0.0, 0.0, 80),
                up(2, 50.0, 20.0, 90),
            ],
        );

        assert!(commands.is_empty());
    }

    #[test]
    fn test_primary_keeps_tracking_while_second_contact_is_down() {
        // Arrange: primary moves while a second finger rests, then that finger lifts
        let mut engine = GestureEngine::default();
        run(
            &mut engine,
            &[down(1, 0.0, 0.0, 0), down(2, 50.0, 0.0, 10), mv(1, 10.0, 0.0, 20), up(2, 50.0, 0.0, 30)],
        );

        // Act
        let next = engine.handle(mv(1, 11.0, 0.0, 40));

        // Assert: no jump from the old position
        assert_eq!(next, Some(SemanticCommand::MoveDelta { dx: 2.0, dy: 0.0 }));
    }

    #[test]
    fn test_non_primary_contact_never_moves_pointer() {
        let mut engine = GestureEngine::default();
        run(
            &mut engine,
            &[down(1, 0.0, 0.0, 0), down(2, 50.0, 0.0, 10), up(1, 0.0, 0.0, 20)],
        );

        assert_eq!(engine.handle(mv(2, 80.0, 0.0, 30)), None);
        assert_eq!(engine.live_contacts(), 1);
    }

    // ── Edge cases ────────────────────────────────────────────────────────────

    #[test]
    fn test_up_for_unknown_contact_is_ignored() {
        let mut engine = GestureEngine::default();
        assert_eq!(engine.handle(up(7, 0.0, 0.0, 10)), None);
        assert_eq!(engine.handle(mv(7, 5.0, 0.0, 10)), None);
    }

    #[test]
    fn test_duplicate_down_replaces_contact() {
        let mut engine = GestureEngine::default();

        let commands = run(
            &mut engine,
            &[down(1, 0.0, 0.0, 0), down(1, 40.0, 40.0, 10), mv(1, 41.0, 40.0, 20)],
        );

        assert_eq!(engine.live_contacts(), 1);
        assert_eq!(commands, vec![SemanticCommand::MoveDelta { dx: 2.0, dy: 0.0 }]);
    }

    #[test]
    fn test_cancelled_contact_is_released_without_click() {
        let mut engine = GestureEngine::default();

        let commands = run(
            &mut engine,
            &[down(1, 0.0, 0.0, 0), PointerEvent::Cancel { id: ContactId(1), at: ms(40) }],
        );

        assert!(commands.is_empty());
        assert_eq!(engine.live_contacts(), 0);
    }

    #[test]
    fn test_new_gesture_resets_moved_flag() {
        let mut engine = GestureEngine::default();
        run(
            &mut engine,
            &[down(1, 0.0, 0.0, 0), mv(1, 30.0, 0.0, 10), up(1, 30.0, 0.0, 20)],
        );

        let commands = run(&mut engine, &[down(2, 5.0, 5.0, 500), up(2, 5.0, 5.0, 550)]);

        assert_eq!(commands, vec![SemanticCommand::ClickLeft]);
    }

    #[test]
    fn test_custom_sensitivity_scales_deltas() {
        let mut engine = GestureEngine::new(GestureConfig {
            sensitivity: 1.0,
            ..GestureConfig::default()
        });
        engine.handle(down(1, 0.0, 0.0, 0));

        assert_eq!(
            engine.handle(mv(1, 4.0, 3.0, 10)),
            Some(SemanticCommand::MoveDelta { dx: 4.0, dy: 3.0 })
        );
    }

    #[test]
    fn test_config_defaults_match_touchpad_feel() {
        let config = GestureConfig::default();
        assert_eq!(config.sensitivity, 2.0);
        assert_eq!(config.tap_threshold(), ms(200));
        assert_eq!(config.min_movement, 1.0);
    }
}

//! A finger (or stylus) currently touching the client surface.

use std::time::Duration;

/// Identifier assigned by the touch surface.
///
/// Unique among live contacts; the platform may reuse it once the contact
/// has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub u32);

/// A live contact tracked by the gesture engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: ContactId,
    /// Last known surface X coordinate, in surface pixels.
    pub x: f64,
    /// Last known surface Y coordinate, in surface pixels.
    pub y: f64,
    /// Timestamp of the down event, relative to the event source's clock.
    pub start_time: Duration,
}

impl Contact {
    pub fn new(id: ContactId, x: f64, y: f64, start_time: Duration) -> Self {
        Self { id, x, y, start_time }
    }

    /// Euclidean distance from this contact's position to `(x, y)`.
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (x - self.x).hypot(y - self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_is_euclidean() {
        let contact = Contact::new(ContactId(1), 0.0, 0.0, Duration::ZERO);
        assert!((contact.distance_to(3.0, 4.0) - 5.0).abs() < f64::EPSILON);
    }
}

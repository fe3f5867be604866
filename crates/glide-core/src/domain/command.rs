//! Semantic input commands.
//!
//! A [`SemanticCommand`] is the device-independent intent produced on the
//! phone (by the gesture engine or a hardware key) and applied on the host by
//! the command dispatcher.  Commands are never stored.
//!
//! Delivery tolerates duplicates and drops: a duplicated click clicks twice,
//! a duplicated `MoveDelta` moves twice as far, and a dropped one is simply
//! lost motion.  No command carries an absolute position.

use serde::{Deserialize, Serialize};

/// One unit of remote input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SemanticCommand {
    /// Relative pointer motion in host pixels (already scaled by sensitivity).
    MoveDelta { dx: f64, dy: f64 },
    /// Single left-button click.
    ClickLeft,
    /// Single right-button click.
    ClickRight,
    /// One volume-up media key press.
    VolumeUp,
    /// One volume-down media key press.
    VolumeDown,
}

impl SemanticCommand {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            SemanticCommand::MoveDelta { .. } => "move",
            SemanticCommand::ClickLeft => "click-left",
            SemanticCommand::ClickRight => "click-right",
            SemanticCommand::VolumeUp => "volume-up",
            SemanticCommand::VolumeDown => "volume-down",
        }
    }

    /// Returns `true` for pointer motion, which is far more frequent than
    /// every other command and is therefore logged at `trace` level.
    pub fn is_motion(&self) -> bool {
        matches!(self, SemanticCommand::MoveDelta { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_distinct() {
        let all = [
            SemanticCommand::MoveDelta { dx: 1.0, dy: 1.0 },
            SemanticCommand::ClickLeft,
            SemanticCommand::ClickRight,
            SemanticCommand::VolumeUp,
            SemanticCommand::VolumeDown,
        ];
        let mut names: Vec<&str> = all.iter().map(SemanticCommand::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_only_move_delta_is_motion() {
        assert!(SemanticCommand::MoveDelta { dx: 0.0, dy: 2.0 }.is_motion());
        assert!(!SemanticCommand::ClickLeft.is_motion());
        assert!(!SemanticCommand::VolumeDown.is_motion());
    }
}

//! Hardware volume keys.
//!
//! Volume key presses bypass the gesture engine entirely: each press maps to
//! exactly one command.

use std::fmt;
use std::str::FromStr;

use glide_core::SemanticCommand;
use thiserror::Error;

/// A physical key on the client device that Glide forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareKey {
    VolumeUp,
    VolumeDown,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown hardware key '{0}' (expected volume-up or volume-down)")]
pub struct UnknownKey(pub String);

impl HardwareKey {
    /// The command a press of this key sends.
    pub fn command(self) -> SemanticCommand {
        match self {
            HardwareKey::VolumeUp => SemanticCommand::VolumeUp,
            HardwareKey::VolumeDown => SemanticCommand::VolumeDown,
        }
    }
}

impl FromStr for HardwareKey {
    type Err = UnknownKey;

    /// Accepts `volume-up`/`volume-down` and the DOM key names
    /// `VolumeUp`/`VolumeDown`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "volumeup" | "audiovolumeup" => Ok(HardwareKey::VolumeUp),
            "volumedown" | "audiovolumedown" => Ok(HardwareKey::VolumeDown),
            _ => Err(UnknownKey(s.to_string())),
        }
    }
}

impl fmt::Display for HardwareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HardwareKey::VolumeUp => "volume-up",
            HardwareKey::VolumeDown => "volume-down",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_map_one_to_one() {
        assert_eq!(HardwareKey::VolumeUp.command(), SemanticCommand::VolumeUp);
        assert_eq!(HardwareKey::VolumeDown.command(), SemanticCommand::VolumeDown);
    }

    #[test]
    fn test_parse_accepts_script_and_dom_names() {
        assert_eq!("volume-up".parse(), Ok(HardwareKey::VolumeUp));
        assert_eq!("VolumeDown".parse(), Ok(HardwareKey::VolumeDown));
        assert_eq!("AudioVolumeUp".parse(), Ok(HardwareKey::VolumeUp));
    }

    #[test]
    fn test_parse_rejects_other_keys() {
        assert_eq!(
            "mute".parse::<HardwareKey>(),
            Err(UnknownKey("mute".to_string()))
        );
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for key in [HardwareKey::VolumeUp, HardwareKey::VolumeDown] {
            assert_eq!(key.to_string().parse(), Ok(key));
        }
    }
}

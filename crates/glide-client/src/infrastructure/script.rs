//! Line-based pointer script for the headless client.
//!
//! Each line is one step; times are milliseconds on any monotonic clock:
//!
//! ```text
//! # id  x     y     t
//! down  1   100   100    0
//! move  1   105    98   16
//! up    1   105    98   90
//! cancel 2 120
//! key volume-up
//! ```
//!
//! Blank lines and `#` comments are skipped.

use std::time::Duration;

use glide_core::ContactId;
use thiserror::Error;

use crate::application::gesture_engine::PointerEvent;
use crate::application::hardware_keys::{HardwareKey, UnknownKey};

/// One parsed script line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptStep {
    Pointer(PointerEvent),
    Key(HardwareKey),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("'{step}' takes {expected} argument(s), got {got}")]
    Arity {
        step: String,
        expected: usize,
        got: usize,
    },

    #[error("'{0}' is not a valid number")]
    Number(String),

    #[error(transparent)]
    Key(#[from] UnknownKey),
}

/// Parses one line; `Ok(None)` for blanks and comments.
///
/// # Errors
///
/// Returns [`ScriptError`] for unknown steps, wrong argument counts,
/// non-numeric or non-finite values, and unknown keys.
pub fn parse_line(line: &str) -> Result<Option<ScriptStep>, ScriptError> {
    let line = line.split('#').next().unwrap_or_default().trim();
    let mut words = line.split_whitespace();
    let Some(step) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ScriptError::Arity {
                step: step.to_string(),
                expected,
                got: args.len(),
            })
        }
    };

    let kind = step.to_ascii_lowercase();
    let parsed = match kind.as_str() {
        "down" | "move" | "up" => {
            arity(4)?;
            let id = contact_id(args[0])?;
            let x = number(args[1])?;
            let y = number(args[2])?;
            let at = millis(args[3])?;
            ScriptStep::Pointer(match kind.as_str() {
                "down" => PointerEvent::Down { id, x, y, at },
                "move" => PointerEvent::Move { id, x, y, at },
                _ => PointerEvent::Up { id, x, y, at },
            })
        }
        "cancel" => {
            arity(2)?;
            ScriptStep::Pointer(PointerEvent::Cancel {
                id: contact_id(args[0])?,
                at: millis(args[1])?,
            })
        }
        "key" => {
            arity(1)?;
            ScriptStep::Key(args[0].parse()?)
        }
        _ => return Err(ScriptError::UnknownStep(step.to_string())),
    };
    Ok(Some(parsed))
}

fn contact_id(word: &str) -> Result<ContactId, ScriptError> {
    word.parse()
        .map(ContactId)
        .map_err(|_| ScriptError::Number(word.to_string()))
}

fn number(word: &str) -> Result<f64, ScriptError> {
    word.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ScriptError::Number(word.to_string()))
}

fn millis(word: &str) -> Result<Duration, ScriptError> {
    let ms = number(word)?;
    if ms < 0.0 {
        return Err(ScriptError::Number(word.to_string()));
    }
    // Whole microseconds keep integer inputs exact.
    Ok(Duration::from_micros((ms * 1000.0).round() as u64))
}

//! JSON codec for Glide wire frames.
//!
//! Wire format (one WebSocket text frame per event):
//! ```text
//! {"event":"<name>","data":<payload object>}
//! ```
//! Events without fields are written with `"data":{}`; on decode the `data`
//! field may be `{}`, `null`, or absent.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::protocol::messages::{
    event_names, ClientEvent, ConnectAccepted, ConnectRejected, Disconnected, Frame, HostEvent,
    MouseDelta,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The text is not a JSON object with a string `event` field.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The `event` field names an event this side does not accept.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The `data` field does not match the event's payload shape.
    #[error("invalid payload for '{event}': {reason}")]
    InvalidPayload { event: String, reason: String },

    /// A motion delta is NaN or infinite.
    #[error("non-finite motion delta")]
    NonFiniteDelta,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a phone→host event into frame text.
///
/// # Errors
///
/// Returns [`ProtocolError::NonFiniteDelta`] for a `mouseDelta` carrying NaN
/// or infinity, which JSON cannot represent.
///
/// # Examples
///
/// ```rust
/// use glide_core::protocol::{decode_client_event, encode_client_event, ClientEvent};
///
/// let text = encode_client_event(&ClientEvent::LeftClick).unwrap();
/// assert_eq!(text, r#"{"event":"leftClick","data":{}}"#);
/// assert_eq!(decode_client_event(&text).unwrap(), ClientEvent::LeftClick);
/// ```
pub fn encode_client_event(event: &ClientEvent) -> Result<String, ProtocolError> {
    let data = match event {
        ClientEvent::MouseDelta(delta) => {
            check_finite(delta)?;
            to_data(event.event_name(), delta)?
        }
        ClientEvent::LeftClick
        | ClientEvent::RightClick
        | ClientEvent::VolumeUp
        | ClientEvent::VolumeDown => empty_data(),
    };
    frame_text(event.event_name(), data)
}

/// Decodes one phone→host frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the text is not a frame, names an unknown
/// event, or carries a payload of the wrong shape.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    let frame = parse_frame(text)?;
    match frame.event.as_str() {
        event_names::MOUSE_DELTA => {
            let delta: MouseDelta = from_data(&frame)?;
            check_finite(&delta)?;
            Ok(ClientEvent::MouseDelta(delta))
        }
        event_names::LEFT_CLICK => Ok(ClientEvent::LeftClick),
        event_names::RIGHT_CLICK => Ok(ClientEvent::RightClick),
        event_names::VOLUME_UP => Ok(ClientEvent::VolumeUp),
        event_names::VOLUME_DOWN => Ok(ClientEvent::VolumeDown),
        other => Err(ProtocolError::UnknownEvent(other.to_string())),
    }
}

/// Encodes a host→phone lifecycle event into frame text.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidPayload`] only if serialization fails,
/// which does not happen for the payload types defined in this crate.
pub fn encode_host_event(event: &HostEvent) -> Result<String, ProtocolError> {
    let name = event.event_name();
    let data = match event {
        HostEvent::Connect(payload) => to_data(name, payload)?,
        HostEvent::ConnectError(payload) => to_data(name, payload)?,
        HostEvent::Disconnect(payload) => to_data(name, payload)?,
    };
    frame_text(name, data)
}

/// Decodes one host→phone frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the text is not a frame, names an unknown
/// event, or carries a payload of the wrong shape.
pub fn decode_host_event(text: &str) -> Result<HostEvent, ProtocolError> {
    let frame = parse_frame(text)?;
    match frame.event.as_str() {
        event_names::CONNECT => Ok(HostEvent::Connect(from_data::<ConnectAccepted>(&frame)?)),
        event_names::CONNECT_ERROR => {
            Ok(HostEvent::ConnectError(from_data::<ConnectRejected>(&frame)?))
        }
        event_names::DISCONNECT => Ok(HostEvent::Disconnect(from_data::<Disconnected>(&frame)?)),
        other => Err(ProtocolError::UnknownEvent(other.to_string())),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_frame(text: &str) -> Result<Frame, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
}

fn frame_text(event: &str, data: serde_json::Value) -> Result<String, ProtocolError> {
    let frame = Frame {
        event: event.to_string(),
        data,
    };
    serde_json::to_string(&frame).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

fn empty_data() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn to_data<T: Serialize>(event: &str, payload: &T) -> Result<serde_json::Value, ProtocolError> {
    serde_json::to_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

fn from_data<T: DeserializeOwned>(frame: &Frame) -> Result<T, ProtocolError> {
    T::deserialize(&frame.data).map_err(|e| ProtocolError::InvalidPayload {
        event: frame.event.clone(),
        reason: e.to_string(),
    })
}

fn check_finite(delta: &MouseDelta) -> Result<(), ProtocolError> {
    if delta.x.is_finite() && delta.y.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFiniteDelta)
    }
}

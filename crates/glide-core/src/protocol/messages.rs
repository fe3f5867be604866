//! All Glide wire event types.
//!
//! Every WebSocket text frame carries one JSON object of the form
//!
//! ```json
//! {"event":"mouseDelta","data":{"x":20.0,"y":-8.0}}
//! ```
//!
//! `event` names the event; `data` is the event payload (an empty object, or
//! absent, for events without fields).
//!
//! # Why separate client→host and host→client event types?
//!
//! The two directions carry different information:
//!
//! - The phone *sends* input (`mouseDelta`, `leftClick`, ...).
//! - The host *sends* session lifecycle notifications (`connect`,
//!   `connect_error`, `disconnect`).
//!
//! Two distinct enums make it a compile-time error to send a lifecycle event
//! from the phone, or an input event from the host.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::command::SemanticCommand;

// ── Protocol constants ────────────────────────────────────────────────────────

/// TCP port the host listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 3000;

/// Upgrade-request header carrying the credential during the handshake.
pub const CREDENTIAL_HEADER: &str = "x-glide-credential";

/// Event names as they appear in the `event` field.
pub mod event_names {
    pub const MOUSE_DELTA: &str = "mouseDelta";
    pub const LEFT_CLICK: &str = "leftClick";
    pub const RIGHT_CLICK: &str = "rightClick";
    pub const VOLUME_UP: &str = "volumeUp";
    pub const VOLUME_DOWN: &str = "volumeDown";
    pub const CONNECT: &str = "connect";
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const DISCONNECT: &str = "disconnect";
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// The outer JSON object of every frame.
///
/// `data` defaults to `null` when absent so that `{"event":"leftClick"}` and
/// `{"event":"leftClick","data":{}}` are both accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

// ── Client → Host ─────────────────────────────────────────────────────────────

/// Payload of a `mouseDelta` event: relative motion in host pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseDelta {
    pub x: f64,
    pub y: f64,
}

/// Every event a phone may send on an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientEvent {
    MouseDelta(MouseDelta),
    LeftClick,
    RightClick,
    VolumeUp,
    VolumeDown,
}

impl ClientEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientEvent::MouseDelta(_) => event_names::MOUSE_DELTA,
            ClientEvent::LeftClick => event_names::LEFT_CLICK,
            ClientEvent::RightClick => event_names::RIGHT_CLICK,
            ClientEvent::VolumeUp => event_names::VOLUME_UP,
            ClientEvent::VolumeDown => event_names::VOLUME_DOWN,
        }
    }
}

impl From<SemanticCommand> for ClientEvent {
    fn from(command: SemanticCommand) -> Self {
        match command {
            SemanticCommand::MoveDelta { dx, dy } => ClientEvent::MouseDelta(MouseDelta { x: dx, y: dy }),
            SemanticCommand::ClickLeft => ClientEvent::LeftClick,
            SemanticCommand::ClickRight => ClientEvent::RightClick,
            SemanticCommand::VolumeUp => ClientEvent::VolumeUp,
            SemanticCommand::VolumeDown => ClientEvent::VolumeDown,
        }
    }
}

impl From<ClientEvent> for SemanticCommand {
    fn from(event: ClientEvent) -> Self {
        match event {
            ClientEvent::MouseDelta(MouseDelta { x, y }) => SemanticCommand::MoveDelta { dx: x, dy: y },
            ClientEvent::LeftClick => SemanticCommand::ClickLeft,
            ClientEvent::RightClick => SemanticCommand::ClickRight,
            ClientEvent::VolumeUp => SemanticCommand::VolumeUp,
            ClientEvent::VolumeDown => SemanticCommand::VolumeDown,
        }
    }
}

// ── Host → Client ─────────────────────────────────────────────────────────────

/// Why the host refused a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    /// Credential missing or wrong.
    Auth,
    /// Another session is already active.
    Busy,
    /// The credential rotated while the handshake was in progress.
    Rotated,
}

/// Why the host ended an established session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectReason {
    /// The host application is stopping.
    Shutdown,
    /// The session was closed by the host operator.
    Closed,
    /// The client kept sending frames the host could not understand.
    Protocol,
}

/// Payload of a `connect` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectAccepted {
    pub session_id: Uuid,
}

/// Payload of a `connect_error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRejected {
    pub reason: RejectReason,
}

/// Payload of a `disconnect` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnected {
    pub reason: DisconnectReason,
}

/// Every lifecycle event the host sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Connect(ConnectAccepted),
    ConnectError(ConnectRejected),
    Disconnect(Disconnected),
}

impl HostEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            HostEvent::Connect(_) => event_names::CONNECT,
            HostEvent::ConnectError(_) => event_names::CONNECT_ERROR,
            HostEvent::Disconnect(_) => event_names::DISCONNECT,
        }
    }

    pub fn connect(session_id: Uuid) -> Self {
        HostEvent::Connect(ConnectAccepted { session_id })
    }

    pub fn rejected(reason: RejectReason) -> Self {
        HostEvent::ConnectError(ConnectRejected { reason })
    }

    pub fn disconnect(reason: DisconnectReason) -> Self {
        HostEvent::Disconnect(Disconnected { reason })
    }
}

//! # glide-core
//!
//! Shared library for Glide containing the pairing payload, the credential
//! type, semantic input commands, and the JSON wire protocol.
//!
//! This crate is used by both the host and client applications.
//! It has zero dependencies on OS APIs, UI frameworks, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! Glide turns a phone into a touchpad and volume remote for a computer on
//! the same network.  The computer (the "host") shows a six-digit PIN and a
//! QR code; the phone (the "client") scans or types it, opens an encrypted
//! WebSocket to the host, and streams input events.
//!
//! This crate (`glide-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure types with no I/O: the [`Credential`], the
//!   [`PairingPayload`] carried in the QR code, the [`SemanticCommand`]s a
//!   gesture turns into, and the [`Contact`]s the gesture engine tracks.
//!
//! - **`protocol`** – How events travel over the wire.  Each event is a JSON
//!   object `{"event": ..., "data": ...}` sent as a WebSocket text frame.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `glide_core::Credential` instead of `glide_core::domain::credential::Credential`.
pub use domain::command::SemanticCommand;
pub use domain::contact::{Contact, ContactId};
pub use domain::credential::{Credential, CredentialError};
pub use domain::fingerprint::certificate_fingerprint;
pub use domain::pairing::{PairingDecodeError, PairingPayload};
pub use protocol::codec::ProtocolError;
pub use protocol::messages::{ClientEvent, HostEvent};

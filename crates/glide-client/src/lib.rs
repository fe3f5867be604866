//! glide-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does glide-client do? (for beginners)
//!
//! The *client* is the phone side of Glide.  Fingers on the touch surface
//! become pointer events; the client turns them into a small set of
//! [`SemanticCommand`](glide_core::SemanticCommand)s and sends them to the
//! paired host, which injects them as real mouse and media-key input.
//!
//! The client application:
//!
//! 1. Resolves the host from a scanned pairing payload or a typed address
//!    and PIN.
//! 2. Connects over TLS, pins the host's self-signed certificate, and
//!    presents the PIN during the WebSocket upgrade.
//! 3. Runs each pointer event through the [`GestureEngine`], which emits
//!    scaled movement deltas while one finger drags, and a left or right
//!    click when one or two fingers tap.
//! 4. Maps the hardware volume keys to `VolumeUp` / `VolumeDown`.
//! 5. Reconnects with a bounded number of attempts when the network drops.
//!
//! [`GestureEngine`]: application::gesture_engine::GestureEngine

/// Application layer: gesture recognition and hardware key mapping.
pub mod application;

/// Infrastructure layer: network, input script, and storage.
pub mod infrastructure;

//! Infrastructure layer for the client application.
//!
//! Contains the adapters around the pure gesture engine: the secure channel
//! to the host, the line-based input script used by the headless binary, and
//! file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `glide_core`,
//! but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – Connects to the host, pins its certificate, and carries
//!   commands over the authenticated session.
//!
//! - **`script`** – Parses `down`/`move`/`up`/`cancel`/`key` lines into
//!   pointer events and hardware key presses.
//!
//! - **`storage`** – `client.toml` and the known-hosts file.

pub mod network;
pub mod script;
pub mod storage;

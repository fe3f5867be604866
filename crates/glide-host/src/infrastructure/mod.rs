//! Infrastructure layer for the host application.
//!
//! Contains OS-facing adapters: the network listener, TLS identity, input
//! injection surfaces, the pairing display, the operator console, and
//! file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `glide_core`,
//! but MUST NOT be imported by the `application` or domain layers.

pub mod injection;
pub mod network;
pub mod operator_console;
pub mod pairing_display;
pub mod storage;

//! Network infrastructure for the host application.
//!
//! # Sub-modules
//!
//! - **`secure_channel`** – The TLS + WebSocket listener.  Verifies the
//!   credential during the upgrade, enforces the single active session, and
//!   feeds decoded commands to the dispatcher.
//!
//! - **`tls`** – Creates and caches the host's self-signed certificate and
//!   builds the rustls server configuration.
//!
//! - **`local_address`** – Finds the LAN address phones should dial, for the
//!   pairing display.

pub mod local_address;
pub mod secure_channel;
pub mod tls;

//! Storage infrastructure: configuration and known-hosts persistence.
//!
//! - **`config`** – `client.toml`: log level, default host, gesture
//!   thresholds and connection policy.
//! - **`known_hosts`** – Certificate fingerprints pinned on first use, keyed
//!   by `host:port`.

pub mod config;
pub mod known_hosts;

//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module handles:
//!
//! - Reading the TOML configuration file from the platform-appropriate directory.
//! - Writing it back when asked to (`glide-host --write-default-config`).
//! - Providing sensible defaults when the file does not exist yet (first run).

pub mod config;

//! Domain entities for Glide.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain** (or "entities" layer).  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from OS APIs, network libraries, or UI frameworks.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Code in outer layers (the host and client crates) depends on the domain,
//! but the domain never depends on them.

/// Device-independent input intents exchanged between phone and host.
pub mod command;
/// Touch contacts tracked by the client's gesture engine.
pub mod contact;
/// The rotating six-digit credential.
pub mod credential;
/// SHA-256 fingerprints used to pin the host certificate.
pub mod fingerprint;
/// The QR pairing payload.
pub mod pairing;

//! Application layer use cases for the host application.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules, in `glide-core`) and the infrastructure
//! (OS/network/storage).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "apply this
//!   pointer delta to the host cursor").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the infrastructure can be swapped without changing this code.
//! - **Contain no network I/O and no file system access**.
//!
//! # Sub-modules
//!
//! - **`credentials`** – Generates, rotates and verifies the six-digit
//!   credential every handshake must present.
//!
//! - **`manage_sessions`** – The single active-session slot.
//!
//! - **`dispatch_commands`** – Applies semantic commands to the injection
//!   surface, one at a time, in arrival order.  This runs on every pointer
//!   movement the phone sends.

pub mod credentials;
pub mod dispatch_commands;
pub mod manage_sessions;

//! Application layer use cases for the client application.
//!
//! # What use cases does the client have?
//!
//! - **`gesture_engine`** – Turns raw pointer events from the touch surface
//!   into semantic commands (pointer deltas, left and right clicks).  Pure and
//!   synchronous: it never touches the network.
//!
//! - **`hardware_keys`** – Maps the device's volume keys straight to volume
//!   commands.

pub mod gesture_engine;
pub mod hardware_keys;

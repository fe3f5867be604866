//! Input injection adapters.
//!
//! OS-specific injection backends are external collaborators that implement
//! [`crate::application::dispatch_commands::InjectionSurface`].  This module
//! ships the recording surface used by headless runs and tests.

pub mod recording;

//! Network infrastructure for the client application.
//!
//! # Sub-modules
//!
//! - **`connector`** – Dials the host over TCP + TLS, upgrades to WebSocket
//!   with the credential header, and waits for the host's verdict.  Retries
//!   transport failures within a bounded number of attempts.
//!
//! - **`session`** – The authenticated [`ClientSession`]: sends commands as
//!   JSON frames and reports lifecycle events from the host.
//!
//! - **`trust`** – Certificate pinning for the host's self-signed
//!   certificate (trust on first use, refuse on mismatch).

pub mod connector;
pub mod session;
pub mod trust;

pub use connector::{ConnectError, ConnectOptions, Connector, Target};
pub use session::{ClientSession, SessionError};
pub use trust::TrustPolicy;
